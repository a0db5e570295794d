// SPDX-FileCopyrightText: 2026 smsgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for smsgate integration tests.
//!
//! Provides a scriptable push transport and a harness that wires the real
//! services over a temporary SQLite database, so tests run without any
//! external service.
//!
//! # Components
//!
//! - [`MockPushClient`] - Push transport that records batches and fails on demand
//! - [`TestHarness`] - Storage, devices, push, hashing and messages services in one place

pub mod harness;
pub mod mock_push;

pub use harness::TestHarness;
pub use mock_push::MockPushClient;
