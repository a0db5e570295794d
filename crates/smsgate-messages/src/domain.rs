// SPDX-FileCopyrightText: 2026 smsgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inputs and outputs of the message lifecycle service.
//!
//! Field names serialize in camelCase, the spelling the mobile app and
//! the third-party API exchange.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use smsgate_core::{DataContent, ProcessingState, RecipientState, TextContent};

/// A message submitted for sending.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageIn {
    /// Idempotency key. Generated when absent.
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub text_message: Option<TextContent>,
    #[serde(default)]
    pub data_message: Option<DataContent>,
    pub phone_numbers: Vec<String>,
    #[serde(default)]
    pub is_encrypted: bool,
    #[serde(default)]
    pub sim_number: Option<u8>,
    /// Defaults to `true`.
    #[serde(default)]
    pub with_delivery_report: Option<bool>,
    /// Lifetime in seconds. Takes precedence over `valid_until` when positive.
    #[serde(default)]
    pub ttl: Option<u64>,
    #[serde(default)]
    pub valid_until: Option<DateTime<Utc>>,
    #[serde(default)]
    pub priority: i8,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EnqueueOptions {
    /// Store recipients verbatim instead of normalizing them.
    pub skip_phone_validation: bool,
}

/// An acknowledgment posted by a device.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageStateIn {
    pub id: String,
    pub state: ProcessingState,
    #[serde(default)]
    pub recipients: Vec<RecipientState>,
    /// When the message first entered each state, as seen by the device.
    #[serde(default)]
    pub states: HashMap<ProcessingState, DateTime<Utc>>,
}

/// Current state of a message as reported to its owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageStateOut {
    pub id: String,
    pub device_id: String,
    pub state: ProcessingState,
    pub is_hashed: bool,
    pub is_encrypted: bool,
    pub recipients: Vec<RecipientState>,
    pub states: BTreeMap<ProcessingState, DateTime<Utc>>,
}

/// A pending message as handed to the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MobileMessage {
    pub id: String,
    /// Plain text for app versions that predate typed content. Empty for data messages.
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_message: Option<TextContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_message: Option<DataContent>,
    pub phone_numbers: Vec<String>,
    pub is_encrypted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sim_number: Option<u8>,
    pub with_delivery_report: bool,
    /// Seconds left until `valid_until`, floored at zero.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_until: Option<DateTime<Utc>>,
    pub priority: i8,
    pub created_at: DateTime<Utc>,
}
