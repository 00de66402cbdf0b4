// Copyright 2020-2022 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

//! The bounded per-bank table of reservation records.

use crate::protocol::{Address, ParticipantId};

/// Head and tail bookkeeping for one contended address.
///
/// A record only stores the two ends of the queue. The links between the
/// queued participants live distributed across their relay nodes as
/// successor references, so a record stays the same size no matter how
/// long the queue behind the address grows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Reservation {
    pub addr: Address,

    /// The participant currently entitled to commit a store-conditional.
    pub head: ParticipantId,

    /// Cleared by an interleaving write/amo, or once the head has spent
    /// its one allowed commit attempt. The record itself survives while
    /// participants are still queued behind the head.
    pub head_valid: bool,

    /// The most recently queued participant.
    pub tail: ParticipantId,

    /// True while at least one participant is associated with the
    /// address. A record with `tail_valid == false` is vacated and its
    /// slot may be reclaimed.
    pub tail_valid: bool,
}

impl Reservation {
    fn claim(addr: Address, owner: ParticipantId) -> Self {
        Self {
            addr,
            head: owner,
            head_valid: true,
            tail: owner,
            tail_valid: true,
        }
    }

    /// Head and tail coincide iff exactly one participant holds the
    /// address.
    pub fn solo(&self) -> bool {
        self.head == self.tail
    }

    pub fn vacated(&self) -> bool {
        !self.tail_valid
    }

    /// Re-arms a vacated record for a fresh sole occupant.
    pub(crate) fn rearm(&mut self, owner: ParticipantId) {
        debug_assert!(self.vacated(), "re-arming a live record");
        *self = Reservation::claim(self.addr, owner);
    }
}

/// Fixed-capacity associative table keyed by address, at most one record
/// per address. Vacated records linger in their slot until the space is
/// needed, so a drained address can be re-claimed in place. When every
/// slot holds a live record the caller must bypass reservation
/// bookkeeping for new addresses.
#[derive(Debug)]
pub struct ReservationTable {
    slots: Vec<Option<Reservation>>,
}

impl ReservationTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity],
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of live (non-vacated) records.
    pub fn live(&self) -> usize {
        self.slots
            .iter()
            .flatten()
            .filter(|record| !record.vacated())
            .count()
    }

    pub fn lookup(&mut self, addr: Address) -> Option<&mut Reservation> {
        self.slots
            .iter_mut()
            .flatten()
            .find(|record| record.addr == addr)
    }

    /// Claims a record for a fresh sole occupant of `addr`. Prefers an
    /// empty slot, then evicts a vacated record. Returns `None` when
    /// every slot holds a live record; the caller degrades to an
    /// unordered access.
    ///
    /// Callers must have checked that `addr` is not already tracked.
    pub fn claim(&mut self, addr: Address, owner: ParticipantId) -> Option<&mut Reservation> {
        debug_assert!(self.lookup(addr).is_none(), "address already tracked");

        let slot = match self.slots.iter().position(Option::is_none) {
            Some(free) => free,
            None => self
                .slots
                .iter()
                .position(|slot| slot.as_ref().is_some_and(Reservation::vacated))?,
        };

        self.slots[slot] = Some(Reservation::claim(addr, owner));
        self.slots[slot].as_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::ReservationTable;

    #[test]
    fn test_claim_lookup_vacate_reuse() {
        let mut table = ReservationTable::new(2);

        assert!(table.claim(0x10, 1).is_some());
        assert!(table.claim(0x20, 2).is_some());
        assert_eq!(table.live(), 2);

        // full of live records, nothing to evict
        assert!(table.claim(0x30, 3).is_none());

        // drain 0x10 and the slot becomes reclaimable
        let record = table.lookup(0x10).expect("record missing");
        record.head_valid = false;
        record.tail_valid = false;
        assert_eq!(table.live(), 1);

        let reclaimed = table.claim(0x30, 3).expect("eviction failed");
        assert_eq!(reclaimed.addr, 0x30);
        assert_eq!((reclaimed.head, reclaimed.tail), (3, 3));
        assert!(table.lookup(0x10).is_none());
    }

    #[test]
    fn test_vacated_record_rearms_in_place() {
        let mut table = ReservationTable::new(1);

        table.claim(0x10, 1).expect("claim failed");
        let record = table.lookup(0x10).expect("record missing");
        record.head_valid = false;
        record.tail_valid = false;

        let record = table.lookup(0x10).expect("vacated record evicted early");
        record.rearm(7);
        assert!(record.head_valid && record.tail_valid);
        assert_eq!((record.head, record.tail), (7, 7));
    }
}
