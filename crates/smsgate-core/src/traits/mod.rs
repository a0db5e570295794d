// SPDX-FileCopyrightText: 2026 smsgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait seams between the services and their backends.
//!
//! All traits use `#[async_trait]` so they can be held as `Arc<dyn Trait>`.

pub mod cleanable;
pub mod directory;
pub mod push;
pub mod repository;

pub use cleanable::Cleanable;
pub use directory::DeviceDirectory;
pub use push::{PushClient, PushOutcome};
pub use repository::MessageRepository;
