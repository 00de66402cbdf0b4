// Copyright 2020-2022 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error as DeriveError;

/// Global return type
pub type Result<T> = core::result::Result<T, RelayError>;

#[derive(Debug, DeriveError, PartialEq, Eq)]
pub enum RelayError {
    #[error("nested load-reserved: a reservation is already active")]
    NestedReservation,

    #[error("store-conditional without a preceding load-reserved")]
    UnpairedStoreConditional,

    #[error("store-conditional on {got:#x} but the reservation is on {reserved:#x}")]
    ReservationMismatch { reserved: u32, got: u32 },

    #[error("unsupported atomic op tag ({0:#04x})")]
    UnsupportedAmo(u8),

    #[error("memory system disconnected")]
    Disconnected,

    #[error("unexpected reply ({0})")]
    UnexpectedReply(String),
}
