// SPDX-FileCopyrightText: 2026 smsgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric registration and recording helpers.
//!
//! Uses the metrics-rs facade so any recorder (Prometheus, statsd, etc.)
//! can collect these metrics.

use metrics::{describe_counter, describe_gauge, describe_histogram};
use smsgate_core::{ProcessingState, PushEventKind};

/// Register all smsgate metric descriptions.
///
/// Called once at startup after the recorder is installed.
pub fn register_metrics() {
    describe_counter!(
        "smsgate_messages_total",
        "Message state reports received from devices"
    );
    describe_counter!(
        "smsgate_push_enqueued_total",
        "Push events accepted into the coalescing table"
    );
    describe_counter!(
        "smsgate_push_retries_total",
        "Per-address push failures, by outcome"
    );
    describe_counter!(
        "smsgate_push_blacklist_total",
        "Push blacklist additions and skipped enqueues"
    );
    describe_histogram!(
        "smsgate_push_flush_seconds",
        "Duration of one push batch send in seconds"
    );
    describe_gauge!(
        "smsgate_hashing_queue_depth",
        "Message ids waiting for recipient anonymization"
    );
    describe_gauge!("smsgate_memory_heap_bytes", "Allocated heap bytes");
    describe_gauge!("smsgate_memory_resident_bytes", "Resident bytes");
}

/// Record a device state report.
pub fn record_message_state(state: ProcessingState) {
    metrics::counter!("smsgate_messages_total", "state" => state.as_ref().to_string()).increment(1);
}

/// Record an event accepted for push.
pub fn record_push_enqueued(kind: PushEventKind) {
    metrics::counter!("smsgate_push_enqueued_total", "event" => kind.as_ref().to_string())
        .increment(1);
}

/// Outcome of a failed per-address push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryOutcome {
    Retried,
    MaxAttempts,
}

impl RetryOutcome {
    fn as_str(self) -> &'static str {
        match self {
            RetryOutcome::Retried => "retried",
            RetryOutcome::MaxAttempts => "max_attempts",
        }
    }
}

/// Record a per-address push failure.
pub fn record_push_retry(outcome: RetryOutcome) {
    metrics::counter!("smsgate_push_retries_total", "outcome" => outcome.as_str()).increment(1);
}

/// Operation applied to the push blacklist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlacklistOperation {
    Added,
    Skipped,
}

impl BlacklistOperation {
    fn as_str(self) -> &'static str {
        match self {
            BlacklistOperation::Added => "added",
            BlacklistOperation::Skipped => "skipped",
        }
    }
}

/// Record a blacklist addition or a skipped enqueue.
pub fn record_push_blacklist(operation: BlacklistOperation) {
    metrics::counter!("smsgate_push_blacklist_total", "operation" => operation.as_str())
        .increment(1);
}

/// Record the duration of one batch send.
pub fn record_push_flush(seconds: f64) {
    metrics::histogram!("smsgate_push_flush_seconds").record(seconds);
}

/// Set the number of message ids awaiting anonymization.
pub fn set_hashing_queue_depth(depth: usize) {
    metrics::gauge!("smsgate_hashing_queue_depth").set(depth as f64);
}

/// Set allocator statistics.
pub fn set_memory(heap: f64, resident: f64) {
    metrics::gauge!("smsgate_memory_heap_bytes").set(heap);
    metrics::gauge!("smsgate_memory_resident_bytes").set(resident);
}
