// SPDX-FileCopyrightText: 2026 smsgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Device directory service.
//!
//! Wraps a [`DeviceDirectory`] backend with user scoping, id and token
//! generation, a short-lived cache for auth-token lookups and the
//! unused-device retention sweep.

pub mod service;

pub use service::{DeviceRegistration, DevicesService};
pub use smsgate_core::DeviceDirectory;
