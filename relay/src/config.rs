// Copyright 2020-2022 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

/// Deployment knobs for a [`crate::MemorySystem`].
#[derive(Clone, Debug)]
pub struct Configuration {
    /// Number of independently addressable memory partitions. Requests
    /// are routed by `addr % banks`; different banks progress in
    /// parallel.
    pub banks: usize,

    /// Reservation records each bank can track at once. A load-reserved
    /// on a fresh address while every slot holds a live record degrades
    /// to a plain, unordered load.
    pub table_capacity: usize,

    /// Whether the reservation relay is active. Disabled, load-reserved
    /// never queues: the last reservation on an address wins and retries
    /// race freely, which is the unordered baseline.
    pub relay: bool,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            banks: 4,
            table_capacity: 32,
            relay: true,
        }
    }
}

impl Configuration {
    /// Baseline configuration with the relay switched off.
    pub fn unordered() -> Self {
        Self {
            relay: false,
            ..Self::default()
        }
    }
}
