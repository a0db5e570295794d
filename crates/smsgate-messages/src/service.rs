// SPDX-FileCopyrightText: 2026 smsgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message lifecycle: submission, device pull, acknowledgment, state lookup.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use phonenumber::country;
use tracing::{debug, info, warn};

use smsgate_config::model::MessagesConfig;
use smsgate_core::{
    anonymize_phone, new_id, Cleanable, Device, GatewayError, MessageContent, MessageFilter,
    MessageLoad, MessageRepository, MessageStateUpdate, NewMessage, ProcessingState,
    RecipientState, RetentionPolicy, ValidationError,
};
use smsgate_push::{PushEvent, PushService};

use crate::converters;
use crate::domain::{EnqueueOptions, MessageIn, MessageStateIn, MessageStateOut, MobileMessage};
use crate::hashing::HashingTask;
use crate::phone;

pub struct MessagesService {
    repository: Arc<dyn MessageRepository>,
    push: Arc<PushService>,
    hashing: Arc<HashingTask>,
    region: country::Id,
    retention: Duration,
    retention_policy: RetentionPolicy,
}

impl MessagesService {
    pub fn new(
        config: &MessagesConfig,
        repository: Arc<dyn MessageRepository>,
        push: Arc<PushService>,
        hashing: Arc<HashingTask>,
    ) -> Result<Self, GatewayError> {
        Ok(Self {
            repository,
            push,
            hashing,
            region: phone::parse_region(&config.default_region)?,
            retention: config.retention(),
            retention_policy: config.retention_policy,
        })
    }

    /// Validates and stores a new message for `device`, then wakes the device.
    ///
    /// The submission is all-or-nothing: one bad recipient rejects it.
    pub async fn enqueue(
        &self,
        device: &Device,
        message: MessageIn,
        options: EnqueueOptions,
    ) -> Result<MessageStateOut, GatewayError> {
        let content = match (message.text_message, message.data_message) {
            (Some(text), None) => MessageContent::Text(text),
            (None, Some(data)) => MessageContent::Data(data),
            (None, None) => return Err(ValidationError::MissingContent.into()),
            (Some(_), Some(_)) => return Err(ValidationError::AmbiguousContent.into()),
        };

        if message.phone_numbers.is_empty() {
            return Err(ValidationError::NoRecipients.into());
        }

        let verbatim = message.is_encrypted || options.skip_phone_validation;
        let mut recipients = Vec::with_capacity(message.phone_numbers.len());
        let mut seen = HashSet::with_capacity(message.phone_numbers.len());
        for (i, raw) in message.phone_numbers.into_iter().enumerate() {
            let row = i + 1;
            let phone = if verbatim {
                raw
            } else {
                phone::normalize(&raw, self.region)
                    .map_err(|reason| ValidationError::Recipient { row, reason })?
            };
            if !seen.insert(phone.clone()) {
                return Err(ValidationError::DuplicateRecipient { row }.into());
            }
            recipients.push(phone);
        }

        let valid_until = match message.ttl {
            Some(ttl) if ttl > 0 => Some(deadline_after(ttl)?),
            _ => message.valid_until,
        };

        let ext_id = match message.id {
            Some(id) if !id.is_empty() => id,
            _ => new_id(),
        };

        self.repository
            .insert(NewMessage {
                device_id: device.id.clone(),
                ext_id: ext_id.clone(),
                content,
                recipients: recipients.clone(),
                valid_until,
                sim_number: message.sim_number,
                with_delivery_report: message.with_delivery_report.unwrap_or(true),
                priority: message.priority,
                is_encrypted: message.is_encrypted,
            })
            .await?;
        info!(device_id = %device.id, ext_id = %ext_id, recipients = recipients.len(), "message enqueued");

        #[cfg(feature = "prometheus")]
        smsgate_prometheus::record_message_state(ProcessingState::Pending);

        if let Some(token) = device.push_token.clone() {
            let push = self.push.clone();
            let device_id = device.id.clone();
            tokio::spawn(async move {
                if let Err(e) = push.enqueue(&token, PushEvent::message_enqueued()) {
                    warn!(device_id = %device_id, error = %e, "can't notify device about new message");
                }
            });
        }

        Ok(MessageStateOut {
            id: ext_id,
            device_id: device.id.clone(),
            state: ProcessingState::Pending,
            is_hashed: false,
            is_encrypted: message.is_encrypted,
            recipients: recipients.into_iter().map(RecipientState::pending).collect(),
            states: Default::default(),
        })
    }

    /// Messages waiting to be sent by `device_id`, in send order.
    pub async fn select_pending(&self, device_id: &str) -> Result<Vec<MobileMessage>, GatewayError> {
        let now = Utc::now();
        let messages = self.repository.select_pending(device_id).await?;
        debug!(device_id, count = messages.len(), "pending messages selected");
        Ok(messages
            .into_iter()
            .map(|m| converters::to_mobile(m, now))
            .collect())
    }

    /// Applies a device's report about one of its messages.
    ///
    /// Returns [`GatewayError::NotFound`] when the device does not own a
    /// message with that id.
    pub async fn update_state(
        &self,
        device_id: &str,
        report: MessageStateIn,
    ) -> Result<(), GatewayError> {
        let existing = self
            .repository
            .get(
                &report.id,
                MessageFilter::device(device_id),
                MessageLoad::default(),
            )
            .await?;

        let state = report.state.acknowledged();
        if state < existing.state {
            debug!(
                ext_id = %report.id,
                from = %existing.state,
                to = %state,
                "message state moves backwards"
            );
        }

        let recipients = report
            .recipients
            .into_iter()
            .map(|r| recipient_from_report(r, existing.is_hashed))
            .collect();

        self.repository
            .update_state(MessageStateUpdate {
                id: existing.id,
                state,
                recipients,
                states: report.states,
            })
            .await?;

        self.hashing.enqueue(existing.id);
        debug!(device_id, ext_id = %report.id, state = %state, "message state updated");

        #[cfg(feature = "prometheus")]
        smsgate_prometheus::record_message_state(state);
        Ok(())
    }

    /// State of a message owned by one of `user_id`'s devices.
    ///
    /// Messages of other users are reported as not found.
    pub async fn get_state(&self, user_id: &str, ext_id: &str) -> Result<MessageStateOut, GatewayError> {
        let message = self
            .repository
            .get(ext_id, MessageFilter::user(user_id), MessageLoad::all())
            .await?;

        match &message.device {
            Some(device) if device.user_id == user_id => Ok(converters::to_state(message)),
            _ => Err(GatewayError::NotFound),
        }
    }

    /// Asks `device` to upload the messages it received between `since` and `until`.
    pub fn export_inbox(
        &self,
        device: &Device,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<(), GatewayError> {
        let Some(token) = device.push_token.as_deref() else {
            return Err(ValidationError::Field {
                field: "push_token",
                reason: "no push token".to_string(),
            }
            .into());
        };
        if since > until {
            return Err(ValidationError::Field {
                field: "since",
                reason: "must not be after `until`".to_string(),
            }
            .into());
        }

        self.push
            .enqueue(token, PushEvent::messages_export_requested(since, until))
    }
}

/// Absolute expiry `ttl` seconds from now.
fn deadline_after(ttl: u64) -> Result<DateTime<Utc>, ValidationError> {
    i64::try_from(ttl)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .and_then(|ttl| Utc::now().checked_add_signed(ttl))
        .ok_or_else(|| ValidationError::Field {
            field: "ttl",
            reason: format!("{ttl} seconds is out of range"),
        })
}

/// Normalizes a recipient reported by a device before it is stored.
fn recipient_from_report(mut recipient: RecipientState, hashed: bool) -> RecipientState {
    // Older app versions strip the leading plus.
    if !recipient.phone_number.is_empty() && !recipient.phone_number.starts_with('+') {
        recipient.phone_number.insert(0, '+');
    }
    recipient.state = recipient.state.acknowledged();
    if hashed {
        recipient.phone_number = anonymize_phone(&recipient.phone_number);
    }
    recipient
}

#[async_trait]
impl Cleanable for MessagesService {
    fn name(&self) -> &str {
        "messages"
    }

    async fn clean(&self) -> Result<u64, GatewayError> {
        let retention = chrono::Duration::from_std(self.retention)
            .map_err(|e| GatewayError::Config(format!("invalid message retention: {e}")))?;
        let removed = self
            .repository
            .remove_processed(Utc::now() - retention, self.retention_policy)
            .await?;
        info!(count = removed, policy = %self.retention_policy, "processed messages cleaned");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reported_recipient_gets_plus_prefix() {
        let r = recipient_from_report(RecipientState::pending("79161234567"), false);
        assert_eq!(r.phone_number, "+79161234567");
        assert_eq!(r.state, ProcessingState::Processed);
    }

    #[test]
    fn reported_recipient_is_hashed_for_hashed_message() {
        let mut reported = RecipientState::pending("+79161234567");
        reported.state = ProcessingState::Failed;
        reported.error = Some("RESULT_ERROR_GENERIC_FAILURE".into());

        let r = recipient_from_report(reported, true);
        assert_eq!(r.phone_number, anonymize_phone("+79161234567"));
        assert_eq!(r.state, ProcessingState::Failed);
        assert!(r.error.is_some());
    }

    #[test]
    fn deadline_is_ttl_seconds_ahead() {
        let before = Utc::now();
        let deadline = deadline_after(3600).unwrap();
        assert!(deadline >= before + chrono::Duration::seconds(3600));
        assert!(deadline <= Utc::now() + chrono::Duration::seconds(3600));
    }

    #[test]
    fn unrepresentable_ttl_is_rejected() {
        for ttl in [u64::MAX, i64::MAX as u64, 10_000_000_000_000] {
            assert!(
                matches!(deadline_after(ttl), Err(ValidationError::Field { field: "ttl", .. })),
                "ttl {ttl}"
            );
        }
    }

    #[test]
    fn hashing_is_applied_after_prefixing() {
        let r = recipient_from_report(RecipientState::pending("79161234567"), true);
        assert_eq!(r.phone_number, anonymize_phone("+79161234567"));
    }
}
