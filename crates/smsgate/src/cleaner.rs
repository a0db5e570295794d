// SPDX-FileCopyrightText: 2026 smsgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Periodic retention cleaner.

use std::sync::Arc;
use std::time::Duration;

use smsgate_core::Cleanable;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Runs every cleanable once. A failing cleanable is logged and skipped.
///
/// Returns the total number of removed records.
pub async fn clean_all(cleanables: &[Arc<dyn Cleanable>]) -> u64 {
    let mut total = 0;
    for cleanable in cleanables {
        match cleanable.clean().await {
            Ok(removed) => {
                debug!(target_name = cleanable.name(), removed, "cleanup pass finished");
                total += removed;
            }
            Err(e) => {
                warn!(target_name = cleanable.name(), error = %e, "cleanup pass failed");
            }
        }
    }
    total
}

/// Cleans all targets every `interval` until `cancel` fires.
pub async fn run_cleaner(
    cleanables: Vec<Arc<dyn Cleanable>>,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    // The first tick completes immediately; run the first pass one interval in.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let removed = clean_all(&cleanables).await;
                info!(removed, "retention cleanup complete");
            }
            _ = cancel.cancelled() => {
                debug!("retention cleaner shutting down");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};

    use async_trait::async_trait;
    use smsgate_core::GatewayError;
    use tracing_test::traced_test;

    use super::*;

    struct Counting {
        name: &'static str,
        removed: u64,
        calls: AtomicU64,
    }

    impl Counting {
        fn new(name: &'static str, removed: u64) -> Arc<Self> {
            Arc::new(Self {
                name,
                removed,
                calls: AtomicU64::new(0),
            })
        }
    }

    #[async_trait]
    impl Cleanable for Counting {
        fn name(&self) -> &str {
            self.name
        }

        async fn clean(&self) -> Result<u64, GatewayError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.removed)
        }
    }

    struct Broken;

    #[async_trait]
    impl Cleanable for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        async fn clean(&self) -> Result<u64, GatewayError> {
            Err(GatewayError::storage("disk on fire"))
        }
    }

    #[tokio::test]
    #[traced_test]
    async fn failure_does_not_stop_other_cleanables() {
        let after = Counting::new("devices", 2);
        let cleanables: Vec<Arc<dyn Cleanable>> =
            vec![Counting::new("messages", 3), Arc::new(Broken), after.clone()];

        assert_eq!(clean_all(&cleanables).await, 5);
        assert_eq!(after.calls.load(Ordering::SeqCst), 1);
        assert!(logs_contain("cleanup pass failed"));
        assert!(logs_contain("disk on fire"));
    }

    #[tokio::test(start_paused = true)]
    async fn runs_once_per_interval_until_cancelled() {
        let target = Counting::new("messages", 1);
        let cancel = CancellationToken::new();
        let cleanables: Vec<Arc<dyn Cleanable>> = vec![target.clone()];
        let task = tokio::spawn(run_cleaner(
            cleanables,
            Duration::from_secs(60),
            cancel.clone(),
        ));

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(target.calls.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(100)).await;
        assert_eq!(target.calls.load(Ordering::SeqCst), 2);

        cancel.cancel();
        task.await.unwrap();
    }
}
