// SPDX-FileCopyrightText: 2026 smsgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message persistence trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::GatewayError;
use crate::types::{
    Message, MessageFilter, MessageLoad, MessageStateUpdate, NewMessage, RetentionPolicy,
};

/// Durable store for messages, their recipients and their state history.
#[async_trait]
pub trait MessageRepository: Send + Sync + 'static {
    /// Persists a message with all recipients in `Pending` in a single transaction.
    ///
    /// Returns the new surrogate id, or [`GatewayError::Conflict`] when
    /// `(ext_id, device_id)` is already taken.
    async fn insert(&self, message: NewMessage) -> Result<i64, GatewayError>;

    /// Looks a message up by idempotency key within the filter's scope.
    ///
    /// Returns [`GatewayError::NotFound`] when nothing matches.
    async fn get(
        &self,
        ext_id: &str,
        filter: MessageFilter,
        load: MessageLoad,
    ) -> Result<Message, GatewayError>;

    /// All `Pending` messages of a device with recipients loaded,
    /// highest priority first, then by creation order.
    async fn select_pending(&self, device_id: &str) -> Result<Vec<Message>, GatewayError>;

    /// Applies an acknowledgment: overwrites the aggregate state, upserts
    /// recipient states and records first-seen timestamps per state.
    async fn update_state(&self, update: MessageStateUpdate) -> Result<(), GatewayError>;

    /// Anonymizes recipients of the given messages. Only messages in a
    /// terminal state that are neither hashed nor encrypted are touched.
    /// Returns the number of messages hashed.
    async fn hash_recipients(&self, ids: &[i64]) -> Result<usize, GatewayError>;

    /// Soft-deletes messages created before `before` whose state the
    /// policy allows. Returns the number of rows affected.
    async fn remove_processed(
        &self,
        before: DateTime<Utc>,
        policy: RetentionPolicy,
    ) -> Result<u64, GatewayError>;
}
