// Copyright 2020-2022 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

//! The bank authority: the per-partition owner of reservation queues.
//!
//! A bank processes one request to completion at a time and has exclusive
//! access to its backing store, so no two operations on the same address
//! ever interleave here. Every request produces exactly one outgoing
//! [`Response`]; for an enqueueing load-reserved that response is the
//! successor-update to the previous tail, while the enqueued requester
//! itself waits for a later hand-off.

use crate::{
    amo,
    config::Configuration,
    protocol::{Address, Operation, ParticipantId, Reply, Request, Response, Word},
    store::{BackingStore, SparseStore},
    table::ReservationTable,
};
use log::*;

pub struct MemoryBank<S = SparseStore>
where
    S: BackingStore,
{
    id: usize,
    store: S,
    table: ReservationTable,
    relay: bool,
}

impl MemoryBank<SparseStore> {
    pub fn new(id: usize, config: &Configuration) -> Self {
        Self::with_store(id, SparseStore::new(), config)
    }
}

impl<S> MemoryBank<S>
where
    S: BackingStore,
{
    pub fn with_store(id: usize, store: S, config: &Configuration) -> Self {
        Self {
            id,
            store,
            table: ReservationTable::new(config.table_capacity),
            relay: config.relay,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Serialization point for everything this bank owns.
    pub fn handle(&mut self, request: Request) -> Response {
        let Request { addr, requester, op } = request;

        match op {
            Operation::LoadReserved => self.load_reserved(addr, requester),
            Operation::StoreConditional(value) => self.store_conditional(addr, requester, value),
            Operation::HandOff { next } => self.hand_off(addr, requester, next),
            Operation::Read => {
                trace!("BANK({}): read {:#x}", self.id, addr);
                Response {
                    addr,
                    requester,
                    reply: Reply::Value(self.store.read(addr)),
                }
            }
            Operation::Write(value) => {
                trace!("BANK({}): write {:#x} <- {}", self.id, addr, value);
                self.invalidate(addr);
                self.store.write(addr, value);
                Response {
                    addr,
                    requester,
                    reply: Reply::WriteAck,
                }
            }
            Operation::Amo(op, operand) => {
                self.invalidate(addr);
                let (new, ret) = amo::apply(op, self.store.read(addr), operand);
                self.store.write(addr, new);
                Response {
                    addr,
                    requester,
                    reply: Reply::Value(ret),
                }
            }
        }
    }

    /// The three load-reserved paths: immediate grant for a fresh or
    /// vacated address, enqueue behind the current tail, or the bypass
    /// branch when the table is saturated.
    fn load_reserved(&mut self, addr: Address, requester: ParticipantId) -> Response {
        if !self.relay {
            return self.load_reserved_unordered(addr, requester);
        }

        if let Some(record) = self.table.lookup(addr) {
            if record.tail_valid {
                let previous = record.tail;
                record.tail = requester;
                debug!(
                    "BANK({}): enqueue {} behind {} on {:#x}",
                    self.id, requester, previous, addr
                );
                return Response {
                    addr,
                    requester: previous,
                    reply: Reply::SuccessorUpdate { successor: requester },
                };
            }

            // vacated by invalidation or fully drained, reuse in place
            record.rearm(requester);
            debug!("BANK({}): reuse grant {:#x} to {}", self.id, addr, requester);
            return self.grant(addr, requester);
        }

        if self.table.claim(addr, requester).is_none() {
            // Saturated table: no ordering guarantee for this address,
            // but the requester must not block either.
            debug!("BANK({}): table full, unordered load {:#x}", self.id, addr);
            return self.grant(addr, requester);
        }

        debug!("BANK({}): grant {:#x} to {}", self.id, addr, requester);
        self.grant(addr, requester)
    }

    /// Baseline without the relay: a fresh load-reserved displaces
    /// whatever reservation an address had, and nobody ever queues.
    fn load_reserved_unordered(&mut self, addr: Address, requester: ParticipantId) -> Response {
        match self.table.lookup(addr) {
            Some(record) => {
                record.head = requester;
                record.head_valid = true;
                record.tail = requester;
                record.tail_valid = true;
            }
            None => {
                // bypass on saturation, same as the relay path
                let _ = self.table.claim(addr, requester);
            }
        }

        self.grant(addr, requester)
    }

    /// A store-conditional commits iff the requester is the valid head.
    /// Either way a head spends its one attempt: the queue behind it must
    /// progress via the retiring node's hand-off, so only `head_valid`
    /// is cleared unless the head was the sole occupant.
    fn store_conditional(&mut self, addr: Address, requester: ParticipantId, value: Word) -> Response {
        let mut committed = false;

        if let Some(record) = self.table.lookup(addr) {
            if record.tail_valid && record.head == requester {
                committed = record.head_valid;
                record.head_valid = false;
                if record.solo() {
                    record.tail_valid = false;
                }
            }
        }

        if committed {
            self.store.write(addr, value);
        }

        debug!(
            "BANK({}): sc {:#x} by {} -> {}",
            self.id,
            addr,
            requester,
            if committed { "commit" } else { "fail" }
        );

        Response {
            addr,
            requester,
            reply: Reply::ScResult(committed),
        }
    }

    /// Installs the retiring node's successor as the new head and answers
    /// it with the current value: a load-reserved performed on its
    /// behalf, skipping the enqueue path it already went through.
    fn hand_off(&mut self, addr: Address, retiring: ParticipantId, next: ParticipantId) -> Response {
        match self.table.lookup(addr) {
            Some(record) if record.tail_valid => {
                debug_assert_eq!(record.head, retiring, "hand-off from a non-head");
                record.head = next;
                record.head_valid = true;
                debug!(
                    "BANK({}): hand-off {:#x} from {} to {}",
                    self.id, addr, retiring, next
                );
            }
            _ => {
                // Every enqueue is acknowledged before a hand-off can
                // name it, so an untracked address here is a logic
                // defect. Still answer the successor to keep it moving.
                debug_assert!(false, "hand-off for untracked address");
                error!(
                    "BANK({}): hand-off for untracked {:#x} ({} -> {})",
                    self.id, addr, retiring, next
                );
            }
        }

        Response {
            addr,
            requester: next,
            reply: Reply::Value(self.store.read(addr)),
        }
    }

    /// A plain write or amo breaks the current head's reservation. Only
    /// the head is affected: participants queued behind it keep their
    /// order and their eventual hand-off. A sole occupant's record is
    /// vacated entirely.
    fn invalidate(&mut self, addr: Address) {
        if let Some(record) = self.table.lookup(addr) {
            if record.tail_valid {
                debug!("BANK({}): invalidate reservation on {:#x}", self.id, addr);
                record.head_valid = false;
                if record.solo() {
                    record.tail_valid = false;
                }
            }
        }
    }

    fn grant(&mut self, addr: Address, requester: ParticipantId) -> Response {
        Response {
            addr,
            requester,
            reply: Reply::Value(self.store.read(addr)),
        }
    }
}
