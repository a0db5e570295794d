// SPDX-FileCopyrightText: 2026 smsgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prometheus metrics for smsgate.
//!
//! Uses the metrics-rs facade with the Prometheus exporter.
//! Metrics are rendered as Prometheus text format via [`PrometheusMetrics::render`].

pub mod recording;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use smsgate_core::GatewayError;

pub use recording::{
    record_message_state, record_push_blacklist, record_push_enqueued, record_push_flush,
    record_push_retry, set_hashing_queue_depth, set_memory, BlacklistOperation, RetryOutcome,
};

/// Installed Prometheus recorder.
pub struct PrometheusMetrics {
    handle: PrometheusHandle,
}

impl PrometheusMetrics {
    /// Installs the Prometheus recorder globally.
    ///
    /// Only one recorder can be installed per process. Returns an error if
    /// a recorder is already installed.
    pub fn install() -> Result<Self, GatewayError> {
        let handle = PrometheusBuilder::new().install_recorder().map_err(|e| {
            GatewayError::Internal(format!("failed to install Prometheus recorder: {e}"))
        })?;

        recording::register_metrics();

        tracing::info!("prometheus metrics recorder installed");

        Ok(Self { handle })
    }

    pub fn handle(&self) -> &PrometheusHandle {
        &self.handle
    }

    /// Render all collected metrics in Prometheus text format.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smsgate_core::{ProcessingState, PushEventKind};

    #[test]
    fn recorded_metrics_render_with_labels() {
        // A local recorder avoids clashing with a global one.
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            record_message_state(ProcessingState::Delivered);
            record_push_enqueued(PushEventKind::MessageEnqueued);
            record_push_retry(RetryOutcome::MaxAttempts);
            record_push_blacklist(BlacklistOperation::Skipped);
            set_hashing_queue_depth(3);
        });

        let rendered = handle.render();
        assert!(rendered.contains(r#"smsgate_messages_total{state="Delivered"} 1"#), "{rendered}");
        assert!(rendered.contains(r#"smsgate_push_enqueued_total{event="MessageEnqueued"} 1"#));
        assert!(rendered.contains(r#"smsgate_push_retries_total{outcome="max_attempts"} 1"#));
        assert!(rendered.contains(r#"smsgate_push_blacklist_total{operation="skipped"} 1"#));
        assert!(rendered.contains("smsgate_hashing_queue_depth 3"));
    }
}
