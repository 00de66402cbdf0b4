// Copyright 2020-2022 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

//! # Queued load-reserved / store-conditional
//!
//! This crate implements a fair, FIFO, livelock-free LR/SC primitive for
//! a partitioned shared memory. Plain LR/SC lets every retry race every
//! other retry; under contention some participants can starve forever.
//! Here the participants waiting on a contended address form an explicit
//! queue: the bank authority owning the address keeps one bounded record
//! (head and tail) per contended address, each participant's relay node
//! remembers at most its direct successor, and a spent reservation is
//! handed off to that successor instead of reopening the race.
//!
//! ```
//! use lrsc_relay::{Configuration, MemorySystem};
//!
//! let system = MemorySystem::new(Configuration::default());
//! let mut node = system.participant();
//!
//! // fetch-and-increment, the LR/SC way
//! loop {
//!     let value = node.load_reserved(0x40).unwrap();
//!     if node.store_conditional(0x40, value + 1).unwrap() {
//!         break;
//!     }
//! }
//! assert_eq!(node.read(0x40).unwrap(), 1);
//! ```
//!
//! Liveness rests on cooperating participants: a queued participant that
//! never spends its reservation stalls its successors. Callers that need
//! to tolerate that wrap their retry loop in a timeout.

pub mod amo;
pub mod bank;
pub mod config;
pub mod errors;
pub mod protocol;
pub mod relay;
pub mod store;
pub mod system;
pub mod table;

pub use amo::{apply, AmoOp};
pub use bank::MemoryBank;
pub use config::Configuration;
pub use errors::{RelayError, Result};
pub use protocol::{Address, Operation, ParticipantId, Reply, Request, Response, Word};
pub use relay::RelayNode;
pub use store::{BackingStore, SparseStore};
pub use system::MemorySystem;
pub use table::{Reservation, ReservationTable};
