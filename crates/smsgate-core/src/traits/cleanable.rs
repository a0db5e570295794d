// SPDX-FileCopyrightText: 2026 smsgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use async_trait::async_trait;

use crate::error::GatewayError;

/// A service that owns expired data and can purge it on a schedule.
#[async_trait]
pub trait Cleanable: Send + Sync + 'static {
    fn name(&self) -> &str;

    /// Removes data past its retention window. Returns the number of records removed.
    async fn clean(&self) -> Result<u64, GatewayError>;
}
