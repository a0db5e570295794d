// SPDX-FileCopyrightText: 2026 smsgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared by the services, the storage backend and the push layer.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Processing state of a message or of a single recipient.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    AsRefStr,
    Serialize,
    Deserialize,
)]
pub enum ProcessingState {
    Pending,
    Processed,
    Sent,
    Delivered,
    Failed,
}

impl ProcessingState {
    /// All states, in pipeline order.
    pub const ALL: [ProcessingState; 5] = [
        ProcessingState::Pending,
        ProcessingState::Processed,
        ProcessingState::Sent,
        ProcessingState::Delivered,
        ProcessingState::Failed,
    ];

    /// No further device-driven transition is expected from a terminal state.
    pub fn is_terminal(self) -> bool {
        matches!(self, ProcessingState::Delivered | ProcessingState::Failed)
    }

    /// Devices report `Pending` to mean "received"; the server records that as `Processed`.
    pub fn acknowledged(self) -> Self {
        match self {
            ProcessingState::Pending => ProcessingState::Processed,
            other => other,
        }
    }
}

/// Discriminator of the stored message payload.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr, Serialize, Deserialize,
)]
pub enum MessageType {
    Text,
    Data,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextContent {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataContent {
    /// Base64-encoded binary payload.
    pub data: String,
    pub port: u16,
}

/// Message payload. Exactly one kind per message, fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageContent {
    Text(TextContent),
    Data(DataContent),
}

impl MessageContent {
    pub fn kind(&self) -> MessageType {
        match self {
            MessageContent::Text(_) => MessageType::Text,
            MessageContent::Data(_) => MessageType::Data,
        }
    }

    /// Serializes the payload body for storage alongside its [`MessageType`].
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        match self {
            MessageContent::Text(text) => serde_json::to_string(text),
            MessageContent::Data(data) => serde_json::to_string(data),
        }
    }

    /// Inverse of [`MessageContent::to_json`].
    pub fn from_json(kind: MessageType, json: &str) -> Result<Self, serde_json::Error> {
        Ok(match kind {
            MessageType::Text => MessageContent::Text(serde_json::from_str(json)?),
            MessageType::Data => MessageContent::Data(serde_json::from_str(json)?),
        })
    }

    pub fn as_text(&self) -> Option<&TextContent> {
        match self {
            MessageContent::Text(text) => Some(text),
            MessageContent::Data(_) => None,
        }
    }

    pub fn as_data(&self) -> Option<&DataContent> {
        match self {
            MessageContent::Data(data) => Some(data),
            MessageContent::Text(_) => None,
        }
    }
}

/// Per-recipient delivery state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipientState {
    pub phone_number: String,
    pub state: ProcessingState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RecipientState {
    pub fn pending(phone_number: impl Into<String>) -> Self {
        Self {
            phone_number: phone_number.into(),
            state: ProcessingState::Pending,
            error: None,
        }
    }
}

/// First time a message was reported in a given state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateEntry {
    pub state: ProcessingState,
    pub updated_at: DateTime<Utc>,
}

/// A message ready to be persisted. Carries no surrogate id yet.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub device_id: String,
    pub ext_id: String,
    pub content: MessageContent,
    pub recipients: Vec<String>,
    pub valid_until: Option<DateTime<Utc>>,
    pub sim_number: Option<u8>,
    pub with_delivery_report: bool,
    pub priority: i8,
    pub is_encrypted: bool,
}

/// A stored message.
///
/// `recipients`, `states` and `device` are only populated when requested
/// through [`MessageLoad`].
#[derive(Debug, Clone)]
pub struct Message {
    pub id: i64,
    pub device_id: String,
    pub ext_id: String,
    pub content: MessageContent,
    pub state: ProcessingState,
    pub valid_until: Option<DateTime<Utc>>,
    pub sim_number: Option<u8>,
    pub with_delivery_report: bool,
    pub priority: i8,
    pub is_hashed: bool,
    pub is_encrypted: bool,
    pub created_at: DateTime<Utc>,
    pub recipients: Vec<RecipientState>,
    pub states: Vec<StateEntry>,
    pub device: Option<Device>,
}

/// Aggregate update applied by the acknowledgment path.
#[derive(Debug, Clone)]
pub struct MessageStateUpdate {
    pub id: i64,
    pub state: ProcessingState,
    pub recipients: Vec<RecipientState>,
    pub states: HashMap<ProcessingState, DateTime<Utc>>,
}

/// Scope applied when looking a message up by idempotency key.
#[derive(Debug, Clone, Default)]
pub struct MessageFilter {
    pub device_id: Option<String>,
    pub user_id: Option<String>,
}

impl MessageFilter {
    pub fn device(device_id: impl Into<String>) -> Self {
        Self {
            device_id: Some(device_id.into()),
            user_id: None,
        }
    }

    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            device_id: None,
            user_id: Some(user_id.into()),
        }
    }
}

/// Eager-loading options for message lookups.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageLoad {
    pub with_recipients: bool,
    pub with_states: bool,
    pub with_device: bool,
}

impl MessageLoad {
    pub fn all() -> Self {
        Self {
            with_recipients: true,
            with_states: true,
            with_device: true,
        }
    }
}

/// Which messages the retention sweep may remove once they are old enough.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RetentionPolicy {
    /// Anything the device has picked up.
    #[default]
    NonPending,
    /// Only `Delivered` and `Failed` messages.
    Terminal,
}

impl RetentionPolicy {
    pub fn states(self) -> Vec<ProcessingState> {
        ProcessingState::ALL
            .into_iter()
            .filter(|s| match self {
                RetentionPolicy::NonPending => *s != ProcessingState::Pending,
                RetentionPolicy::Terminal => s.is_terminal(),
            })
            .collect()
    }
}

/// A registered device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub id: String,
    pub name: Option<String>,
    pub auth_token: String,
    pub push_token: Option<String>,
    pub last_seen: DateTime<Utc>,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Criteria for device lookups. All set criteria must match.
#[derive(Debug, Clone, Default)]
pub struct DeviceFilter {
    pub id: Option<String>,
    pub user_id: Option<String>,
    pub token: Option<String>,
    pub active_within: Option<Duration>,
}

impl DeviceFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn active_within(mut self, duration: Duration) -> Self {
        self.active_within = Some(duration);
        self
    }

    /// An empty filter would match every device.
    pub fn is_empty(&self) -> bool {
        self.id.is_none()
            && self.user_id.is_none()
            && self.token.is_none()
            && self.active_within.is_none()
    }
}

/// Formats a timestamp the way it is stored: RFC 3339, millisecond precision, `Z` suffix.
///
/// The fixed width keeps lexical and chronological order identical.
pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// Parses a timestamp produced by [`format_timestamp`] (or any RFC 3339 string).
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn processing_state_round_trips_through_strings() {
        for state in ProcessingState::ALL {
            let s = state.to_string();
            assert_eq!(ProcessingState::from_str(&s).unwrap(), state);
        }
        assert!(ProcessingState::from_str("Unknown").is_err());
    }

    #[test]
    fn only_delivered_and_failed_are_terminal() {
        let terminal: Vec<_> = ProcessingState::ALL
            .into_iter()
            .filter(|s| s.is_terminal())
            .collect();
        assert_eq!(
            terminal,
            vec![ProcessingState::Delivered, ProcessingState::Failed]
        );
    }

    #[test]
    fn pending_is_acknowledged_as_processed() {
        assert_eq!(
            ProcessingState::Pending.acknowledged(),
            ProcessingState::Processed
        );
        assert_eq!(ProcessingState::Sent.acknowledged(), ProcessingState::Sent);
    }

    #[test]
    fn content_json_keeps_kind() {
        let data = MessageContent::Data(DataContent {
            data: "SGVsbG8=".into(),
            port: 53739,
        });
        let json = data.to_json().unwrap();
        assert_eq!(json, r#"{"data":"SGVsbG8=","port":53739}"#);
        let back = MessageContent::from_json(MessageType::Data, &json).unwrap();
        assert_eq!(back, data);
        assert!(MessageContent::from_json(MessageType::Text, &json).is_err());
    }

    #[test]
    fn retention_policy_states() {
        assert_eq!(
            RetentionPolicy::Terminal.states(),
            vec![ProcessingState::Delivered, ProcessingState::Failed]
        );
        assert!(!RetentionPolicy::NonPending
            .states()
            .contains(&ProcessingState::Pending));
        assert_eq!(RetentionPolicy::NonPending.states().len(), 4);
        assert_eq!(
            RetentionPolicy::from_str("terminal").unwrap(),
            RetentionPolicy::Terminal
        );
    }

    #[test]
    fn timestamps_are_fixed_width() {
        let at = parse_timestamp("2026-03-01T10:00:00Z").unwrap();
        assert_eq!(format_timestamp(&at), "2026-03-01T10:00:00.000Z");
        assert_eq!(parse_timestamp(&format_timestamp(&at)).unwrap(), at);
    }

    #[test]
    fn empty_device_filter_is_detected() {
        assert!(DeviceFilter::new().is_empty());
        assert!(!DeviceFilter::new().with_user_id("u1").is_empty());
    }
}
