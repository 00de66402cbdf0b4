// Copyright 2021 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

use rand::distributions::{Distribution, Standard};

// Random value for `T`.
pub fn random<T>() -> T
where
    Standard: Distribution<T>,
{
    rand::random()
}

// Random bool.
pub fn coinflip() -> bool {
    random()
}

// Random usize in range 0..upper_bound (excluding the upper bound).
pub fn usize(upper_bound: usize) -> usize {
    random::<usize>() % upper_bound
}

// Random 32-bit word.
pub fn word() -> u32 {
    random()
}

// Random word address in range 0..upper_bound (excluding the upper bound).
pub fn address(upper_bound: u32) -> u32 {
    random::<u32>() % upper_bound
}
