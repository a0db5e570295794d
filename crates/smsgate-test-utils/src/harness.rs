// SPDX-FileCopyrightText: 2026 smsgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles the complete delivery pipeline with a mock push
//! transport and a temp SQLite database. Background loops are not started;
//! tests drive flushes and hashing sweeps explicitly.

use std::sync::Arc;

use smsgate_config::model::{
    DevicesConfig, HashingConfig, MessagesConfig, PushConfig, StorageConfig,
};
use smsgate_core::{Device, GatewayError};
use smsgate_devices::{DeviceRegistration, DevicesService};
use smsgate_messages::{HashingTask, MessagesService};
use smsgate_push::PushService;
use smsgate_storage::SqliteStorage;

use crate::mock_push::MockPushClient;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    push: PushConfig,
    messages: MessagesConfig,
    devices: DevicesConfig,
    hashing: HashingConfig,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            push: PushConfig::default(),
            messages: MessagesConfig::default(),
            devices: DevicesConfig::default(),
            hashing: HashingConfig::default(),
        }
    }

    /// Override push dispatch settings (retries, blacklist TTL, timeout).
    pub fn with_push_config(mut self, config: PushConfig) -> Self {
        self.push = config;
        self
    }

    pub fn with_messages_config(mut self, config: MessagesConfig) -> Self {
        self.messages = config;
        self
    }

    pub fn with_devices_config(mut self, config: DevicesConfig) -> Self {
        self.devices = config;
        self
    }

    /// Build the test harness, creating all required subsystems.
    pub async fn build(self) -> Result<TestHarness, GatewayError> {
        let temp_dir = tempfile::TempDir::new().map_err(GatewayError::storage)?;
        let db_path = temp_dir.path().join("test.db");

        let storage = Arc::new(SqliteStorage::new(StorageConfig {
            database_path: db_path.to_string_lossy().to_string(),
            wal_mode: true,
        }));
        storage.initialize().await?;

        let push_client = Arc::new(MockPushClient::new());
        let devices = Arc::new(DevicesService::new(&self.devices, storage.clone()));
        let push = Arc::new(PushService::new(
            &self.push,
            push_client.clone(),
            devices.clone(),
        ));
        let hashing = Arc::new(HashingTask::new(storage.clone(), self.hashing.interval()));
        let messages = Arc::new(MessagesService::new(
            &self.messages,
            storage.clone(),
            push.clone(),
            hashing.clone(),
        )?);

        Ok(TestHarness {
            storage,
            push_client,
            devices,
            push,
            hashing,
            messages,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete test environment with a mock push transport and temp storage.
pub struct TestHarness {
    /// SQLite storage (temp DB, cleaned up on drop).
    pub storage: Arc<SqliteStorage>,
    /// The mock push transport behind `push`.
    pub push_client: Arc<MockPushClient>,
    pub devices: Arc<DevicesService>,
    pub push: Arc<PushService>,
    pub hashing: Arc<HashingTask>,
    pub messages: Arc<MessagesService>,
    /// Temp directory kept alive for cleanup on drop.
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    /// Create a new builder for configuring the test harness.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Register a device for `user_id`, optionally with a push address.
    pub async fn register_device(
        &self,
        user_id: &str,
        push_token: Option<&str>,
    ) -> Result<Device, GatewayError> {
        self.devices
            .insert(
                user_id,
                DeviceRegistration {
                    name: Some(format!("{user_id}-phone")),
                    push_token: push_token.map(str::to_string),
                },
            )
            .await
    }

    /// Wait until spawned push enqueues have landed, then flush once.
    pub async fn settle_and_flush(&self) -> smsgate_push::FlushReport {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        self.push.flush().await
    }
}
