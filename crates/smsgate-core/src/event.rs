// SPDX-FileCopyrightText: 2026 smsgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Push events: resync hints sent to devices.
//!
//! The payload never carries authoritative state. A device that receives
//! an event re-fetches pending messages, settings or webhooks on its own.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Kind of a push event. Variant names are the wire spelling devices understand.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr, Serialize, Deserialize,
)]
pub enum PushEventKind {
    MessageEnqueued,
    WebhooksUpdated,
    SettingsUpdated,
    MessagesExportRequested,
}

/// An immutable push notification payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushEvent {
    kind: PushEventKind,
    data: BTreeMap<String, String>,
}

impl PushEvent {
    pub fn new(kind: PushEventKind, data: BTreeMap<String, String>) -> Self {
        Self { kind, data }
    }

    pub fn message_enqueued() -> Self {
        Self::new(PushEventKind::MessageEnqueued, BTreeMap::new())
    }

    pub fn webhooks_updated() -> Self {
        Self::new(PushEventKind::WebhooksUpdated, BTreeMap::new())
    }

    pub fn settings_updated() -> Self {
        Self::new(PushEventKind::SettingsUpdated, BTreeMap::new())
    }

    /// Asks the device to export its inbox for the given window.
    pub fn messages_export_requested(since: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        let mut data = BTreeMap::new();
        data.insert(
            "since".to_string(),
            since.to_rfc3339_opts(SecondsFormat::Secs, true),
        );
        data.insert(
            "until".to_string(),
            until.to_rfc3339_opts(SecondsFormat::Secs, true),
        );
        Self::new(PushEventKind::MessagesExportRequested, data)
    }

    pub fn kind(&self) -> PushEventKind {
        self.kind
    }

    pub fn data(&self) -> &BTreeMap<String, String> {
        &self.data
    }

    /// Flat string map used as a provider data payload: `event` plus JSON-encoded `data`.
    pub fn to_map(&self) -> BTreeMap<String, String> {
        let data = serde_json::to_string(&self.data).unwrap_or_else(|_| "{}".to_string());
        let mut map = BTreeMap::new();
        map.insert("event".to_string(), self.kind.to_string());
        map.insert("data".to_string(), data);
        map
    }
}
