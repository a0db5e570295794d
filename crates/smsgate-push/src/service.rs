// SPDX-FileCopyrightText: 2026 smsgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Coalescing push dispatcher.
//!
//! Events are keyed by push address. Only the latest event per address
//! survives until the next flush, so a burst of changes becomes a single
//! wake-up for the device. Addresses that keep failing are blacklisted for
//! a while instead of being retried forever.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use smsgate_config::model::PushConfig;
use smsgate_core::{
    DeviceFilter, ExpiringMap, GatewayError, PushClient, PushEvent, ValidationError,
};
use smsgate_devices::DevicesService;

use crate::address_tag;

/// An event waiting for the next flush, with the number of failed attempts so far.
#[derive(Debug, Clone)]
struct Envelope {
    event: PushEvent,
    retries: u32,
}

/// What one flush cycle did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Addresses in the drained batch.
    pub total: usize,
    /// Addresses the transport reported as failed.
    pub failed: usize,
    /// Failed addresses queued again for the next cycle.
    pub retried: usize,
    /// Failed addresses that hit the retry limit.
    pub blacklisted: usize,
    /// The transport failed as a whole and the batch was discarded.
    pub dropped: bool,
}

/// Push dispatch service shared by everything that needs to wake a device.
pub struct PushService {
    client: Arc<dyn PushClient>,
    devices: Arc<DevicesService>,
    pending: ExpiringMap<String, Envelope>,
    blacklist: Arc<ExpiringMap<String, ()>>,
    debounce: Duration,
    timeout: Duration,
    max_retries: u32,
}

impl PushService {
    pub fn new(
        config: &PushConfig,
        client: Arc<dyn PushClient>,
        devices: Arc<DevicesService>,
    ) -> Self {
        if config.debounce_secs < config.debounce().as_secs() {
            warn!(
                configured = config.debounce_secs,
                effective = config.debounce().as_secs(),
                "push debounce below minimum, raised"
            );
        }

        Self {
            client,
            devices,
            pending: ExpiringMap::new(),
            blacklist: Arc::new(ExpiringMap::with_ttl(config.blacklist_ttl())),
            debounce: config.debounce(),
            timeout: config.timeout(),
            max_retries: config.max_retries,
        }
    }

    /// Queues `event` for `address`, replacing any event not yet sent.
    ///
    /// Blacklisted addresses are skipped silently.
    pub fn enqueue(&self, address: &str, event: PushEvent) -> Result<(), GatewayError> {
        if address.is_empty() {
            return Err(ValidationError::Field {
                field: "push_token",
                reason: "empty push address".to_string(),
            }
            .into());
        }

        if self.blacklist.contains(address) {
            debug!(address = %address_tag(address), "push address blacklisted, skipping");
            #[cfg(feature = "prometheus")]
            smsgate_prometheus::record_push_blacklist(
                smsgate_prometheus::BlacklistOperation::Skipped,
            );
            return Ok(());
        }

        let kind = event.kind();
        self.pending
            .set(address.to_string(), Envelope { event, retries: 0 });
        debug!(address = %address_tag(address), event = %kind, "push event enqueued");

        #[cfg(feature = "prometheus")]
        smsgate_prometheus::record_push_enqueued(kind);
        Ok(())
    }

    /// Queues `event` for every device of `user_id` that has a push address.
    ///
    /// With `device_id` only that device is considered. Returns how many
    /// devices were notified. Per-device failures do not stop the loop; they
    /// are combined into one error at the end.
    pub async fn notify(
        &self,
        user_id: &str,
        device_id: Option<&str>,
        event: PushEvent,
    ) -> Result<usize, GatewayError> {
        let filter = match device_id {
            Some(id) => DeviceFilter::new().with_id(id),
            None => DeviceFilter::new(),
        };
        let devices = self.devices.select(user_id, filter).await?;

        if devices.is_empty() {
            info!(user_id, device_id, "no devices to notify");
            return Ok(0);
        }

        let total = devices.len();
        let mut notified = 0;
        let mut failures = Vec::new();
        for device in devices {
            let Some(address) = device.push_token.as_deref() else {
                debug!(device_id = %device.id, "device has no push address, skipping");
                continue;
            };

            match self.enqueue(address, event.clone()) {
                Ok(()) => notified += 1,
                Err(e) => {
                    warn!(device_id = %device.id, error = %e, "failed to enqueue push event");
                    failures.push(format!("{}: {e}", device.id));
                }
            }
        }

        info!(user_id, notified, total, event = %event.kind(), "devices notified");

        if failures.is_empty() {
            Ok(notified)
        } else {
            Err(GatewayError::push(format!(
                "failed to notify {} of {total} devices: {}",
                failures.len(),
                failures.join("; ")
            )))
        }
    }

    /// Sends everything queued so far and applies the retry policy to failures.
    pub async fn flush(&self) -> FlushReport {
        let drained = self.pending.drain();
        if drained.is_empty() {
            return FlushReport::default();
        }

        let mut report = FlushReport {
            total: drained.len(),
            ..FlushReport::default()
        };

        let batch: HashMap<String, PushEvent> = drained
            .iter()
            .map(|(address, envelope)| (address.clone(), envelope.event.clone()))
            .collect();

        let started = Instant::now();
        let result = tokio::time::timeout(self.timeout, self.client.send(&batch)).await;
        #[cfg(feature = "prometheus")]
        smsgate_prometheus::record_push_flush(started.elapsed().as_secs_f64());

        let failures = match result {
            Ok(Ok(failures)) => failures,
            Ok(Err(e)) => {
                error!(client = self.client.name(), count = report.total, error = %e, "push batch failed");
                report.dropped = true;
                return report;
            }
            Err(_) => {
                let e = GatewayError::Timeout {
                    duration: self.timeout,
                };
                error!(client = self.client.name(), count = report.total, error = %e, "push batch failed");
                report.dropped = true;
                return report;
            }
        };

        let mut drained = drained;
        for (address, cause) in failures {
            let Some(mut envelope) = drained.remove(&address) else {
                continue;
            };
            report.failed += 1;
            envelope.retries += 1;

            if envelope.retries >= self.max_retries {
                self.blacklist.set(address.clone(), ());
                report.blacklisted += 1;
                warn!(
                    address = %address_tag(&address),
                    retries = envelope.retries,
                    error = %cause,
                    "push address blacklisted after repeated failures"
                );
                #[cfg(feature = "prometheus")]
                {
                    smsgate_prometheus::record_push_blacklist(
                        smsgate_prometheus::BlacklistOperation::Added,
                    );
                    smsgate_prometheus::record_push_retry(
                        smsgate_prometheus::RetryOutcome::MaxAttempts,
                    );
                }
                continue;
            }

            debug!(
                address = %address_tag(&address),
                retries = envelope.retries,
                error = %cause,
                "push send failed, will retry"
            );
            // A newer event queued during the send wins over the retry.
            if self.pending.set_if_absent(address, envelope) {
                report.retried += 1;
            }
            #[cfg(feature = "prometheus")]
            smsgate_prometheus::record_push_retry(smsgate_prometheus::RetryOutcome::Retried);
        }

        info!(
            client = self.client.name(),
            total = report.total,
            failed = report.failed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "push batch sent"
        );
        report
    }

    /// Whether `address` is currently blacklisted.
    pub fn is_blacklisted(&self, address: &str) -> bool {
        self.blacklist.contains(address)
    }

    /// Number of addresses waiting for the next flush.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Opens the transport and flushes every debounce period until `cancel` fires.
    ///
    /// The blacklist sweeper runs alongside and is joined before returning.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        if let Err(e) = self.client.open().await {
            warn!(client = self.client.name(), error = %e, "push client open failed, will retry on send");
        }

        let sweeper = tokio::spawn(
            self.blacklist
                .clone()
                .run_cleanup(self.debounce.max(Duration::from_secs(60)), cancel.clone()),
        );

        let mut ticker = tokio::time::interval(self.debounce);
        ticker.tick().await;
        info!(
            client = self.client.name(),
            debounce_secs = self.debounce.as_secs(),
            "push dispatcher started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.flush().await;
                }
                _ = cancel.cancelled() => break,
            }
        }

        if let Err(e) = sweeper.await {
            warn!(error = %e, "blacklist sweeper panicked");
        }
        if let Err(e) = self.client.close().await {
            warn!(client = self.client.name(), error = %e, "push client close failed");
        }
        info!("push dispatcher stopped");
    }
}
