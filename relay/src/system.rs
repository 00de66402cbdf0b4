// Copyright 2020-2022 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

//! Assembly of a partitioned memory: one bank authority thread per
//! partition, a router delivering requests by address, and a registry
//! delivering responses by participant identity.

use crate::{
    bank::MemoryBank,
    config::Configuration,
    errors::{RelayError, Result},
    protocol::{ParticipantId, Request, Response},
    relay::RelayNode,
};
use log::*;
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        mpsc::{channel, Receiver, Sender},
        Arc, Mutex,
    },
    thread,
};

type Registry = Arc<Mutex<HashMap<ParticipantId, Sender<Response>>>>;

/// The request half of the routing fabric. Each clone carries its own
/// set of mailbox handles, so nodes can live on any thread.
#[derive(Clone)]
pub(crate) struct Router {
    banks: Vec<Sender<Request>>,
}

impl Router {
    pub(crate) fn send(&self, request: Request) -> Result<()> {
        let bank = request.addr as usize % self.banks.len();
        self.banks[bank].send(request).map_err(|_| RelayError::Disconnected)
    }
}

/// A partitioned memory with the reservation relay on top.
///
/// Banks run on their own threads and exit once the system and every
/// participant created from it are gone.
pub struct MemorySystem {
    router: Router,
    registry: Registry,
    next_participant: AtomicUsize,
}

impl Default for MemorySystem {
    fn default() -> Self {
        Self::new(Configuration::default())
    }
}

impl MemorySystem {
    pub fn new(config: Configuration) -> Self {
        let registry: Registry = Arc::new(Mutex::new(HashMap::new()));
        let mut banks = Vec::with_capacity(config.banks.max(1));

        for id in 0..config.banks.max(1) {
            let (requests, mailbox) = channel();
            spawn_bank(MemoryBank::new(id, &config), mailbox, registry.clone());
            banks.push(requests);
        }

        Self {
            router: Router { banks },
            registry,
            next_participant: AtomicUsize::new(0),
        }
    }

    /// Creates the relay node for a new participant. Nodes are created
    /// once and reused for every reservation their participant takes.
    pub fn participant(&self) -> RelayNode {
        let id = self.next_participant.fetch_add(1, Ordering::SeqCst);
        let (responses, inbox) = channel();

        self.registry
            .lock()
            .expect("Could not get lock on registry")
            .insert(id, responses);

        RelayNode::new(id, inbox, self.router.clone())
    }
}

fn spawn_bank(mut bank: MemoryBank, mailbox: Receiver<Request>, registry: Registry) {
    thread::Builder::new()
        .name(format!("bank-{}", bank.id()))
        .spawn(move || {
            while let Ok(request) = mailbox.recv() {
                let response = bank.handle(request);
                let target = response.requester;

                let route = registry
                    .lock()
                    .expect("Could not get lock on registry")
                    .get(&target)
                    .cloned();

                match route {
                    // a node that already hung up loses its reply, which
                    // only happens during teardown
                    Some(responses) => {
                        let _ = responses.send(response);
                    }
                    None => warn!("BANK({}): no route to participant {}", bank.id(), target),
                }
            }
        })
        .expect("Failed to spawn bank thread");
}
