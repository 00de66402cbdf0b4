// Copyright 2020-2022 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

//! Deterministic tests of the bank authority, driven request by request.

use lrsc_relay::{AmoOp, Configuration, MemoryBank, Operation, Reply, Request, Response};

const A: usize = 0;
const B: usize = 1;
const C: usize = 2;
const D: usize = 3;

const X: u32 = 0x40;

fn bank(table_capacity: usize, relay: bool) -> MemoryBank {
    MemoryBank::new(
        0,
        &Configuration {
            banks: 1,
            table_capacity,
            relay,
        },
    )
}

fn lr(bank: &mut MemoryBank, addr: u32, who: usize) -> Response {
    bank.handle(Request {
        addr,
        requester: who,
        op: Operation::LoadReserved,
    })
}

fn sc(bank: &mut MemoryBank, addr: u32, who: usize, value: u32) -> Response {
    bank.handle(Request {
        addr,
        requester: who,
        op: Operation::StoreConditional(value),
    })
}

fn hand_off(bank: &mut MemoryBank, addr: u32, retiring: usize, next: usize) -> Response {
    bank.handle(Request {
        addr,
        requester: retiring,
        op: Operation::HandOff { next },
    })
}

fn write(bank: &mut MemoryBank, addr: u32, who: usize, value: u32) -> Response {
    bank.handle(Request {
        addr,
        requester: who,
        op: Operation::Write(value),
    })
}

fn read(bank: &mut MemoryBank, addr: u32, who: usize) -> Response {
    bank.handle(Request {
        addr,
        requester: who,
        op: Operation::Read,
    })
}

fn amo(bank: &mut MemoryBank, addr: u32, who: usize, op: AmoOp, operand: u32) -> Response {
    bank.handle(Request {
        addr,
        requester: who,
        op: Operation::Amo(op, operand),
    })
}

fn value_to(who: usize, addr: u32, value: u32) -> Response {
    Response {
        addr,
        requester: who,
        reply: Reply::Value(value),
    }
}

fn successor_to(who: usize, addr: u32, successor: usize) -> Response {
    Response {
        addr,
        requester: who,
        reply: Reply::SuccessorUpdate { successor },
    }
}

fn sc_result_to(who: usize, addr: u32, committed: bool) -> Response {
    Response {
        addr,
        requester: who,
        reply: Reply::ScResult(committed),
    }
}

fn write_ack_to(who: usize, addr: u32) -> Response {
    Response {
        addr,
        requester: who,
        reply: Reply::WriteAck,
    }
}

#[test]
fn test_fifo_relay_chain_of_three() {
    let mut bank = bank(8, true);

    // A arrives first and is granted immediately
    assert_eq!(lr(&mut bank, X, A), value_to(A, X, 0));
    // B queues; the bank tells A about its new successor
    assert_eq!(lr(&mut bank, X, B), successor_to(A, X, B));
    // C queues behind B the same way
    assert_eq!(lr(&mut bank, X, C), successor_to(B, X, C));

    // A commits and its node relays the reservation to B
    assert_eq!(sc(&mut bank, X, A, 1), sc_result_to(A, X, true));
    assert_eq!(hand_off(&mut bank, X, A, B), value_to(B, X, 1));

    assert_eq!(sc(&mut bank, X, B, 2), sc_result_to(B, X, true));
    assert_eq!(hand_off(&mut bank, X, B, C), value_to(C, X, 2));

    assert_eq!(sc(&mut bank, X, C, 3), sc_result_to(C, X, true));

    // the record is fully retired: the next arrival is granted in place
    assert_eq!(lr(&mut bank, X, D), value_to(D, X, 3));
    assert_eq!(sc(&mut bank, X, D, 4), sc_result_to(D, X, true));
    assert_eq!(read(&mut bank, X, D), value_to(D, X, 4));
}

#[test]
fn test_at_most_one_head() {
    let mut bank = bank(8, true);

    assert_eq!(lr(&mut bank, X, A), value_to(A, X, 0));
    assert_eq!(lr(&mut bank, X, B), successor_to(A, X, B));

    // B is queued, not head
    assert_eq!(sc(&mut bank, X, B, 9), sc_result_to(B, X, false));

    // A spends its one attempt; until the hand-off nobody is head
    assert_eq!(sc(&mut bank, X, A, 1), sc_result_to(A, X, true));
    assert_eq!(sc(&mut bank, X, A, 9), sc_result_to(A, X, false));

    assert_eq!(hand_off(&mut bank, X, A, B), value_to(B, X, 1));

    // head status moved to B and A cannot commit anymore
    assert_eq!(sc(&mut bank, X, A, 9), sc_result_to(A, X, false));
    assert_eq!(sc(&mut bank, X, B, 2), sc_result_to(B, X, true));
    assert_eq!(read(&mut bank, X, B), value_to(B, X, 2));
}

#[test]
fn test_write_invalidates_sole_reservation() {
    let mut bank = bank(8, true);

    assert_eq!(lr(&mut bank, X, A), value_to(A, X, 0));
    assert_eq!(write(&mut bank, X, D, 9), write_ack_to(D, X));

    // the reservation is gone and the failed commit leaves memory alone
    assert_eq!(sc(&mut bank, X, A, 7), sc_result_to(A, X, false));
    assert_eq!(read(&mut bank, X, A), value_to(A, X, 9));

    // the vacated record is re-armed for the next arrival
    assert_eq!(lr(&mut bank, X, B), value_to(B, X, 9));
    assert_eq!(sc(&mut bank, X, B, 11), sc_result_to(B, X, true));
}

#[test]
fn test_write_invalidation_spares_queued_successor() {
    let mut bank = bank(8, true);

    assert_eq!(lr(&mut bank, X, A), value_to(A, X, 0));
    assert_eq!(lr(&mut bank, X, B), successor_to(A, X, B));

    assert_eq!(write(&mut bank, X, D, 9), write_ack_to(D, X));

    // only the head is hit; B keeps its place in line
    assert_eq!(sc(&mut bank, X, A, 7), sc_result_to(A, X, false));
    assert_eq!(hand_off(&mut bank, X, A, B), value_to(B, X, 9));

    // B's reservation is younger than the write, so it commits
    assert_eq!(sc(&mut bank, X, B, 11), sc_result_to(B, X, true));
    assert_eq!(read(&mut bank, X, B), value_to(B, X, 11));
}

#[test]
fn test_amo_invalidates_like_a_write() {
    let mut bank = bank(8, true);

    assert_eq!(lr(&mut bank, X, A), value_to(A, X, 0));

    // add returns the computed result, swap the prior occupant
    assert_eq!(amo(&mut bank, X, D, AmoOp::Add, 5), value_to(D, X, 5));
    assert_eq!(sc(&mut bank, X, A, 7), sc_result_to(A, X, false));
    assert_eq!(amo(&mut bank, X, D, AmoOp::Swap, 9), value_to(D, X, 5));
    assert_eq!(read(&mut bank, X, D), value_to(D, X, 9));
}

#[test]
fn test_saturated_table_degrades_to_unordered_loads() {
    let mut bank = bank(1, true);
    let y: u32 = 0x44;

    assert_eq!(lr(&mut bank, X, A), value_to(A, X, 0));

    // no slot for y: a plain load comes back instead of a queue position
    assert_eq!(lr(&mut bank, y, B), value_to(B, y, 0));
    assert_eq!(sc(&mut bank, y, B, 5), sc_result_to(B, y, false));

    // the tracked address is unaffected
    assert_eq!(sc(&mut bank, X, A, 3), sc_result_to(A, X, true));

    // once X drains its slot is reclaimed and y is tracked again
    assert_eq!(lr(&mut bank, y, B), value_to(B, y, 0));
    assert_eq!(sc(&mut bank, y, B, 5), sc_result_to(B, y, true));
}

#[test]
fn test_unordered_baseline_last_reservation_wins() {
    let mut bank = bank(8, false);

    assert_eq!(lr(&mut bank, X, A), value_to(A, X, 0));
    // no queueing: B displaces A outright
    assert_eq!(lr(&mut bank, X, B), value_to(B, X, 0));

    assert_eq!(sc(&mut bank, X, A, 1), sc_result_to(A, X, false));
    assert_eq!(sc(&mut bank, X, B, 2), sc_result_to(B, X, true));
    assert_eq!(read(&mut bank, X, B), value_to(B, X, 2));
}

#[test]
#[should_panic(expected = "hand-off for untracked address")]
fn test_hand_off_for_untracked_address_fails_loudly() {
    let mut bank = bank(8, true);

    // every enqueue is acknowledged before a hand-off can name it, so
    // this cannot happen in a correctly operating system
    hand_off(&mut bank, X, A, B);
}
