// Copyright 2020-2022 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

//! The relay node: one per participant, between the caller and the
//! routing fabric.
//!
//! Plain reads, writes and amos pass through untouched. The node earns
//! its name on the reservation path: when the bank queues a later
//! participant directly behind this one, the node privately remembers
//! that successor, and once its own reservation is spent it issues the
//! hand-off that wakes the successor up. The bank only ever stores the
//! two ends of a queue; the links in between live here.

use crate::{
    errors::{RelayError, Result},
    protocol::{Address, Operation, ParticipantId, Reply, Request, Response, Word},
    system::Router,
    AmoOp,
};
use log::*;
use std::sync::mpsc::Receiver;

/// Lifecycle of the node's one reservation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    /// No reservation active.
    Idle,

    /// Load-reserved issued; blocked until the grant arrives, either
    /// immediately or through an eventual hand-off.
    Enqueued,

    /// Grant received. Exactly one store-conditional may be attempted.
    Holding,

    /// The commit is pending: a store-conditional has been issued and
    /// its ack has not arrived yet.
    Retiring,
}

pub struct RelayNode {
    id: ParticipantId,
    phase: Phase,
    reserved: Option<Address>,
    successor: Option<ParticipantId>,
    inbox: Receiver<Response>,
    router: Router,
}

impl RelayNode {
    pub(crate) fn new(id: ParticipantId, inbox: Receiver<Response>, router: Router) -> Self {
        Self {
            id,
            phase: Phase::Idle,
            reserved: None,
            successor: None,
            inbox,
            router,
        }
    }

    pub fn id(&self) -> ParticipantId {
        self.id
    }

    /// Reads the value at `addr` and establishes a reservation on it.
    ///
    /// Returns immediately when the address is uncontended. Otherwise the
    /// call blocks until every participant queued ahead has spent its
    /// reservation and the hand-off reaches this node; the value returned
    /// then is as current as an immediate grant would have been.
    ///
    /// Issuing a second load-reserved while one reservation is active is
    /// a protocol violation.
    pub fn load_reserved(&mut self, addr: Address) -> Result<Word> {
        if self.phase != Phase::Idle {
            error!("NODE({}): nested load-reserved on {:#x}", self.id, addr);
            return Err(RelayError::NestedReservation);
        }

        self.send(addr, Operation::LoadReserved)?;
        self.reserved = Some(addr);
        self.phase = Phase::Enqueued;

        let value = self.await_value(addr)?;
        self.phase = Phase::Holding;

        Ok(value)
    }

    /// Attempts to commit `value` under the reservation taken by the
    /// preceding [`Self::load_reserved`]. Returns `false` when the
    /// reservation was broken in the meantime; the reservation is spent
    /// either way and the caller is expected to retry from the
    /// load-reserved.
    ///
    /// A store-conditional without a preceding load-reserved to the same
    /// address is a protocol violation.
    pub fn store_conditional(&mut self, addr: Address, value: Word) -> Result<bool> {
        match self.reserved {
            Some(reserved) if self.phase == Phase::Holding => {
                if reserved != addr {
                    error!(
                        "NODE({}): store-conditional on {:#x}, reservation on {:#x}",
                        self.id, addr, reserved
                    );
                    return Err(RelayError::ReservationMismatch { reserved, got: addr });
                }
            }
            _ => {
                error!("NODE({}): unpaired store-conditional on {:#x}", self.id, addr);
                return Err(RelayError::UnpairedStoreConditional);
            }
        }

        self.send(addr, Operation::StoreConditional(value))?;
        self.phase = Phase::Retiring;

        let committed = self.await_sc_result(addr)?;
        self.retire(addr)?;

        Ok(committed)
    }

    /// Plain load; no reservation involved.
    pub fn read(&mut self, addr: Address) -> Result<Word> {
        self.send(addr, Operation::Read)?;
        self.await_value(addr)
    }

    /// Plain store. Breaks the current head reservation on `addr`,
    /// including this node's own.
    pub fn write(&mut self, addr: Address, value: Word) -> Result<()> {
        self.send(addr, Operation::Write(value))?;
        self.await_write_ack(addr)
    }

    /// Read-modify-write on `addr`. Breaks the current head reservation
    /// like a plain store does.
    pub fn amo(&mut self, op: AmoOp, addr: Address, operand: Word) -> Result<Word> {
        self.send(addr, Operation::Amo(op, operand))?;
        self.await_value(addr)
    }

    fn send(&self, addr: Address, op: Operation) -> Result<()> {
        self.router.send(Request {
            addr,
            requester: self.id,
            op,
        })
    }

    /// The reservation is spent. Forget it, and if a successor is on
    /// record, wake it with a hand-off: this fires at most once because
    /// the successor is taken out of the slot.
    fn retire(&mut self, addr: Address) -> Result<()> {
        self.reserved = None;
        self.phase = Phase::Idle;

        if let Some(next) = self.successor.take() {
            debug!("NODE({}): hand-off {:#x} to {}", self.id, addr, next);
            self.send(addr, Operation::HandOff { next })?;
        }

        Ok(())
    }

    /// A later participant was queued directly behind us. While our own
    /// reservation is pending the identity is parked here; if ours is
    /// already spent the hand-off fires on the spot, so the wake-up is
    /// never lost however the messages were timed.
    fn record_successor(&mut self, addr: Address, successor: ParticipantId) -> Result<()> {
        if self.reserved == Some(addr) {
            debug_assert!(self.successor.is_none(), "successor overwritten");
            trace!("NODE({}): successor {} on {:#x}", self.id, successor, addr);
            self.successor = Some(successor);
            return Ok(());
        }

        warn!(
            "NODE({}): late successor-update for {:#x}, relaying now",
            self.id, addr
        );
        self.send(addr, Operation::HandOff { next: successor })
    }

    fn await_value(&mut self, addr: Address) -> Result<Word> {
        loop {
            let response = self.recv()?;
            match response.reply {
                Reply::SuccessorUpdate { successor } => self.record_successor(response.addr, successor)?,
                Reply::Value(value) if response.addr == addr => return Ok(value),
                reply => return Err(self.unexpected(addr, reply)),
            }
        }
    }

    fn await_sc_result(&mut self, addr: Address) -> Result<bool> {
        loop {
            let response = self.recv()?;
            match response.reply {
                Reply::SuccessorUpdate { successor } => self.record_successor(response.addr, successor)?,
                Reply::ScResult(committed) if response.addr == addr => return Ok(committed),
                reply => return Err(self.unexpected(addr, reply)),
            }
        }
    }

    fn await_write_ack(&mut self, addr: Address) -> Result<()> {
        loop {
            let response = self.recv()?;
            match response.reply {
                Reply::SuccessorUpdate { successor } => self.record_successor(response.addr, successor)?,
                Reply::WriteAck if response.addr == addr => return Ok(()),
                reply => return Err(self.unexpected(addr, reply)),
            }
        }
    }

    fn recv(&self) -> Result<Response> {
        self.inbox.recv().map_err(|_| RelayError::Disconnected)
    }

    /// Each participant has at most one request in flight, so anything
    /// besides its reply or a successor-update points at a defect.
    fn unexpected(&self, addr: Address, reply: Reply) -> RelayError {
        debug_assert!(false, "unexpected reply");
        error!("NODE({}): unexpected {:?} while waiting on {:#x}", self.id, reply, addr);
        RelayError::UnexpectedReply(format!("{:?} while waiting on {:#x}", reply, addr))
    }
}
