// Copyright 2020-2022 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

//! Random-data helpers shared by the workspace's tests and benches.

pub mod random;
