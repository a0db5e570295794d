// SPDX-FileCopyrightText: 2026 smsgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Device persistence trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::GatewayError;
use crate::types::{Device, DeviceFilter};

/// Durable store of registered devices.
#[async_trait]
pub trait DeviceDirectory: Send + Sync + 'static {
    /// Devices matching every set criterion. An empty filter is rejected.
    async fn select(&self, filter: DeviceFilter) -> Result<Vec<Device>, GatewayError>;

    async fn insert(&self, device: Device) -> Result<(), GatewayError>;

    /// Sets or clears the push token of a device.
    async fn update_push_token(
        &self,
        id: &str,
        push_token: Option<&str>,
    ) -> Result<(), GatewayError>;

    /// Moves `last_seen` forward. Earlier timestamps are ignored.
    async fn update_last_seen(&self, id: &str, at: DateTime<Utc>) -> Result<(), GatewayError>;

    /// Deletes matching devices. An empty filter is rejected.
    async fn remove(&self, filter: DeviceFilter) -> Result<u64, GatewayError>;

    /// Deletes devices not updated since `before`. Returns the number removed.
    async fn remove_unused(&self, before: DateTime<Utc>) -> Result<u64, GatewayError>;
}
