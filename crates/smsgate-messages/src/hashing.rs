// SPDX-FileCopyrightText: 2026 smsgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Background anonymization of recipient phone numbers.
//!
//! Acknowledged messages are queued here by id. Each sweep hands the whole
//! queue to the repository, which hashes recipients of the messages that
//! reached a terminal state. Ids of a failed sweep stay queued.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use smsgate_core::{GatewayError, MessageRepository};

pub struct HashingTask {
    repository: Arc<dyn MessageRepository>,
    queue: Mutex<HashSet<i64>>,
    interval: Option<Duration>,
}

impl HashingTask {
    /// `interval` of `None` disables periodic sweeps; the queue is still drained on shutdown.
    pub fn new(repository: Arc<dyn MessageRepository>, interval: Option<Duration>) -> Self {
        Self {
            repository,
            queue: Mutex::new(HashSet::new()),
            interval,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<i64>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queues a message id for the next sweep. Never blocks on I/O.
    pub fn enqueue(&self, id: i64) {
        let depth = {
            let mut queue = self.lock();
            queue.insert(id);
            queue.len()
        };
        report_depth(depth);
    }

    pub fn queued(&self) -> usize {
        self.lock().len()
    }

    /// Hashes everything queued so far. Returns the number of messages hashed.
    pub async fn sweep(&self) -> Result<usize, GatewayError> {
        let ids: Vec<i64> = {
            let mut queue = self.lock();
            std::mem::take(&mut *queue).into_iter().collect()
        };
        report_depth(0);
        if ids.is_empty() {
            return Ok(0);
        }

        match self.repository.hash_recipients(&ids).await {
            Ok(hashed) => {
                debug!(queued = ids.len(), hashed, "recipient hashing sweep done");
                Ok(hashed)
            }
            Err(e) => {
                let depth = {
                    let mut queue = self.lock();
                    queue.extend(ids);
                    queue.len()
                };
                report_depth(depth);
                Err(e)
            }
        }
    }

    /// Sweeps every interval until `cancel` fires, then sweeps once more.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        match self.interval {
            Some(interval) => {
                let mut ticker = tokio::time::interval(interval);
                ticker.tick().await;
                info!(interval_secs = interval.as_secs(), "hashing task started");

                loop {
                    tokio::select! {
                        _ = ticker.tick() => {
                            if let Err(e) = self.sweep().await {
                                error!(error = %e, "recipient hashing failed, ids kept for next sweep");
                            }
                        }
                        _ = cancel.cancelled() => break,
                    }
                }
            }
            None => {
                info!("periodic hashing disabled");
                cancel.cancelled().await;
            }
        }

        if let Err(e) = self.sweep().await {
            error!(error = %e, pending = self.queued(), "final hashing sweep failed");
        }
        info!("hashing task stopped");
    }
}

fn report_depth(depth: usize) {
    #[cfg(feature = "prometheus")]
    smsgate_prometheus::set_hashing_queue_depth(depth);
    #[cfg(not(feature = "prometheus"))]
    let _ = depth;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use smsgate_core::{
        Message, MessageFilter, MessageLoad, MessageStateUpdate, NewMessage, RetentionPolicy,
    };

    #[derive(Default)]
    struct RecordingRepository {
        calls: Mutex<Vec<Vec<i64>>>,
        failing: AtomicBool,
    }

    #[async_trait]
    impl MessageRepository for RecordingRepository {
        async fn insert(&self, _message: NewMessage) -> Result<i64, GatewayError> {
            unimplemented!()
        }
        async fn get(
            &self,
            _ext_id: &str,
            _filter: MessageFilter,
            _load: MessageLoad,
        ) -> Result<Message, GatewayError> {
            unimplemented!()
        }
        async fn select_pending(&self, _device_id: &str) -> Result<Vec<Message>, GatewayError> {
            unimplemented!()
        }
        async fn update_state(&self, _update: MessageStateUpdate) -> Result<(), GatewayError> {
            unimplemented!()
        }
        async fn hash_recipients(&self, ids: &[i64]) -> Result<usize, GatewayError> {
            let mut ids = ids.to_vec();
            ids.sort_unstable();
            self.calls.lock().unwrap().push(ids.clone());
            if self.failing.load(Ordering::SeqCst) {
                return Err(GatewayError::storage("database is locked"));
            }
            Ok(ids.len())
        }
        async fn remove_processed(
            &self,
            _before: DateTime<Utc>,
            _policy: RetentionPolicy,
        ) -> Result<u64, GatewayError> {
            unimplemented!()
        }
    }

    #[tokio::test]
    async fn duplicate_ids_are_swept_once() {
        let repo = Arc::new(RecordingRepository::default());
        let task = HashingTask::new(repo.clone(), None);
        task.enqueue(2);
        task.enqueue(1);
        task.enqueue(2);

        assert_eq!(task.sweep().await.unwrap(), 2);
        assert_eq!(repo.calls.lock().unwrap()[0], vec![1, 2]);
        assert_eq!(task.queued(), 0);
    }

    #[tokio::test]
    async fn empty_queue_does_not_touch_the_repository() {
        let repo = Arc::new(RecordingRepository::default());
        let task = HashingTask::new(repo.clone(), None);
        assert_eq!(task.sweep().await.unwrap(), 0);
        assert!(repo.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_sweep_keeps_ids() {
        let repo = Arc::new(RecordingRepository::default());
        repo.failing.store(true, Ordering::SeqCst);
        let task = HashingTask::new(repo.clone(), None);
        task.enqueue(7);

        assert!(task.sweep().await.is_err());
        assert_eq!(task.queued(), 1);

        repo.failing.store(false, Ordering::SeqCst);
        assert_eq!(task.sweep().await.unwrap(), 1);
        assert_eq!(task.queued(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn run_sweeps_periodically_and_on_shutdown() {
        let repo = Arc::new(RecordingRepository::default());
        let task = Arc::new(HashingTask::new(repo.clone(), Some(Duration::from_secs(60))));
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(task.clone().run(cancel.clone()));

        task.enqueue(1);
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(repo.calls.lock().unwrap().len(), 1);

        task.enqueue(2);
        cancel.cancel();
        handle.await.unwrap();
        assert_eq!(repo.calls.lock().unwrap().last().unwrap(), &vec![2]);
    }

    #[tokio::test]
    async fn disabled_interval_still_drains_on_shutdown() {
        let repo = Arc::new(RecordingRepository::default());
        let task = Arc::new(HashingTask::new(repo.clone(), None));
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(task.clone().run(cancel.clone()));

        task.enqueue(3);
        cancel.cancel();
        handle.await.unwrap();
        assert_eq!(repo.calls.lock().unwrap().as_slice(), &[vec![3]]);
    }
}
