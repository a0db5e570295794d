// SPDX-FileCopyrightText: 2026 smsgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the smsgate delivery pipeline.
//!
//! Callers map the variants of [`GatewayError`] to distinct outcomes:
//! validation and conflict are caller mistakes, not-found hides records
//! owned by someone else, and everything else is infrastructure.

use thiserror::Error;

/// The primary error type used across all smsgate services and traits.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Malformed input. Carries enough detail to pinpoint the offending field or row.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A message with the same idempotency key already exists for the device.
    #[error("message `{id}` already exists")]
    Conflict { id: String },

    /// The record does not exist or is not visible to the caller.
    #[error("not found")]
    NotFound,

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Push transport errors (provider unreachable, rejected token, bad response).
    #[error("push error: {message}")]
    Push {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration errors (missing credentials, invalid mode).
    #[error("configuration error: {0}")]
    Config(String),

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Wraps any error as a storage failure.
    pub fn storage(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Storage {
            source: source.into(),
        }
    }

    /// Builds a push error without an underlying cause.
    pub fn push(message: impl Into<String>) -> Self {
        Self::Push {
            message: message.into(),
            source: None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

/// Input validation failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// Neither text nor data content was supplied.
    #[error("no text or data content")]
    MissingContent,

    /// Both text and data content were supplied.
    #[error("only one of text or data content may be set")]
    AmbiguousContent,

    /// A recipient failed normalization. `row` is 1-based.
    #[error("can't use phone in row {row}: {reason}")]
    Recipient { row: usize, reason: PhoneError },

    /// The same recipient appears twice after normalization. `row` is 1-based.
    #[error("duplicate phone number in row {row}")]
    DuplicateRecipient { row: usize },

    /// The submission has no recipients at all.
    #[error("at least one phone number is required")]
    NoRecipients,

    /// A state name outside the known set.
    #[error("invalid state `{0}`")]
    InvalidState(String),

    /// A required field is empty or otherwise unusable.
    #[error("invalid field `{field}`: {reason}")]
    Field { field: &'static str, reason: String },
}

/// Reasons a phone number is rejected by the normalizer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PhoneError {
    #[error("can't parse phone number: {0}")]
    Unparsable(String),

    #[error("invalid phone number")]
    Invalid,

    #[error("not mobile phone number")]
    NotMobile,
}
