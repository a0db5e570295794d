// SPDX-FileCopyrightText: 2026 smsgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Push transport trait implemented by the FCM and upstream relay clients.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::GatewayError;
use crate::event::PushEvent;

/// Per-address failures of a batch. Addresses absent from the map were delivered.
pub type PushOutcome = HashMap<String, GatewayError>;

/// A transport that delivers one event per push address.
#[async_trait]
pub trait PushClient: Send + Sync + 'static {
    /// Short transport name used in logs.
    fn name(&self) -> &str;

    /// Prepares the transport (credentials, connections). Called once before the first send.
    async fn open(&self) -> Result<(), GatewayError> {
        Ok(())
    }

    /// Sends a batch keyed by push address.
    ///
    /// The outer `Err` means the transport itself failed and nothing was
    /// sent; per-address failures are reported in the returned map.
    async fn send(
        &self,
        batch: &HashMap<String, PushEvent>,
    ) -> Result<PushOutcome, GatewayError>;

    async fn close(&self) -> Result<(), GatewayError> {
        Ok(())
    }
}
