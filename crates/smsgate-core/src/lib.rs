// SPDX-FileCopyrightText: 2026 smsgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the smsgate delivery pipeline.
//!
//! This crate provides the domain types, error types, push events and the
//! trait seams shared by the storage backend, the push transports and the
//! services built on top of them.

pub mod cache;
pub mod error;
pub mod event;
pub mod hash;
pub mod ids;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use cache::ExpiringMap;
pub use error::{GatewayError, PhoneError, ValidationError};
pub use event::{PushEvent, PushEventKind};
pub use hash::anonymize_phone;
pub use ids::new_id;
pub use types::{
    DataContent, Device, DeviceFilter, Message, MessageContent, MessageFilter, MessageLoad,
    MessageStateUpdate, MessageType, NewMessage, ProcessingState, RecipientState,
    RetentionPolicy, StateEntry, TextContent,
};

pub use traits::{Cleanable, DeviceDirectory, MessageRepository, PushClient, PushOutcome};
