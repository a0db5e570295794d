// SPDX-FileCopyrightText: 2026 smsgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use chrono::{DateTime, Utc};

use smsgate_core::{Message, MessageContent};

use crate::domain::{MessageStateOut, MobileMessage};

/// Converts a stored message into what a device pulls, with the TTL measured from `now`.
pub fn to_mobile(message: Message, now: DateTime<Utc>) -> MobileMessage {
    let ttl = message
        .valid_until
        .map(|until| (until - now).num_seconds().max(0) as u64);

    let (legacy, text_message, data_message) = match message.content {
        MessageContent::Text(text) => (text.text.clone(), Some(text), None),
        MessageContent::Data(data) => (String::new(), None, Some(data)),
    };

    MobileMessage {
        id: message.ext_id,
        message: legacy,
        text_message,
        data_message,
        phone_numbers: message
            .recipients
            .into_iter()
            .map(|r| r.phone_number)
            .collect(),
        is_encrypted: message.is_encrypted,
        sim_number: message.sim_number,
        with_delivery_report: message.with_delivery_report,
        ttl,
        valid_until: message.valid_until,
        priority: message.priority,
        created_at: message.created_at,
    }
}

pub fn to_state(message: Message) -> MessageStateOut {
    MessageStateOut {
        id: message.ext_id,
        device_id: message.device_id,
        state: message.state,
        is_hashed: message.is_hashed,
        is_encrypted: message.is_encrypted,
        recipients: message.recipients,
        states: message
            .states
            .into_iter()
            .map(|entry| (entry.state, entry.updated_at))
            .collect(),
    }
}
