// SPDX-FileCopyrightText: 2026 smsgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message lifecycle for smsgate.
//!
//! A submission is validated and stored as `Pending`, the target device is
//! woken through the push dispatcher, the device pulls its pending
//! messages and reports per-recipient outcomes back. Once a message is in
//! a terminal state its recipients are anonymized by [`HashingTask`].

pub mod converters;
pub mod domain;
pub mod hashing;
pub mod phone;
pub mod service;

pub use domain::{EnqueueOptions, MessageIn, MessageStateIn, MessageStateOut, MobileMessage};
pub use hashing::HashingTask;
pub use service::MessagesService;
