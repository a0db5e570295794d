// SPDX-FileCopyrightText: 2026 smsgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the message repository and device directory.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::OnceCell;
use tracing::debug;

use smsgate_config::model::StorageConfig;
use smsgate_core::{
    Device, DeviceDirectory, DeviceFilter, GatewayError, Message, MessageFilter, MessageLoad,
    MessageRepository, MessageStateUpdate, NewMessage, RetentionPolicy,
};

use crate::database::{map_tr_err, Database};
use crate::queries;

/// SQLite-backed storage.
///
/// Wraps a [`Database`] handle and delegates all query operations to the
/// typed query modules. The database is opened by [`SqliteStorage::initialize`].
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    /// Create a new SqliteStorage with the given configuration.
    ///
    /// The database connection is not opened until [`SqliteStorage::initialize`] is called.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Returns a reference to the underlying Database, or an error if not initialized.
    fn db(&self) -> Result<&Database, GatewayError> {
        self.db.get().ok_or_else(|| {
            GatewayError::storage("storage not initialized -- call initialize() first")
        })
    }

    /// Opens the database and applies migrations.
    pub async fn initialize(&self) -> Result<(), GatewayError> {
        let db = Database::open_with(&self.config.database_path, self.config.wal_mode).await?;
        self.db
            .set(db)
            .map_err(|_| GatewayError::storage("storage already initialized"))?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    /// Round-trips a trivial query.
    pub async fn health_check(&self) -> Result<(), GatewayError> {
        self.db()?
            .connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    /// Checkpoints the WAL. The connection stays usable.
    pub async fn close(&self) -> Result<(), GatewayError> {
        let db = self.db()?;
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        debug!("WAL checkpoint complete");
        Ok(())
    }
}

#[async_trait]
impl MessageRepository for SqliteStorage {
    async fn insert(&self, message: NewMessage) -> Result<i64, GatewayError> {
        queries::messages::insert_message(self.db()?, message).await
    }

    async fn get(
        &self,
        ext_id: &str,
        filter: MessageFilter,
        load: MessageLoad,
    ) -> Result<Message, GatewayError> {
        queries::messages::get_message(self.db()?, ext_id, filter, load).await
    }

    async fn select_pending(&self, device_id: &str) -> Result<Vec<Message>, GatewayError> {
        queries::messages::select_pending(self.db()?, device_id).await
    }

    async fn update_state(&self, update: MessageStateUpdate) -> Result<(), GatewayError> {
        queries::messages::update_state(self.db()?, update).await
    }

    async fn hash_recipients(&self, ids: &[i64]) -> Result<usize, GatewayError> {
        queries::messages::hash_recipients(self.db()?, ids).await
    }

    async fn remove_processed(
        &self,
        before: DateTime<Utc>,
        policy: RetentionPolicy,
    ) -> Result<u64, GatewayError> {
        queries::messages::remove_processed(self.db()?, before, policy).await
    }
}

#[async_trait]
impl DeviceDirectory for SqliteStorage {
    async fn select(&self, filter: DeviceFilter) -> Result<Vec<Device>, GatewayError> {
        queries::devices::select_devices(self.db()?, filter).await
    }

    async fn insert(&self, device: Device) -> Result<(), GatewayError> {
        queries::devices::insert_device(self.db()?, device).await
    }

    async fn update_push_token(
        &self,
        id: &str,
        push_token: Option<&str>,
    ) -> Result<(), GatewayError> {
        queries::devices::update_push_token(self.db()?, id, push_token).await
    }

    async fn update_last_seen(&self, id: &str, at: DateTime<Utc>) -> Result<(), GatewayError> {
        queries::devices::update_last_seen(self.db()?, id, at).await
    }

    async fn remove(&self, filter: DeviceFilter) -> Result<u64, GatewayError> {
        queries::devices::remove_devices(self.db()?, filter).await
    }

    async fn remove_unused(&self, before: DateTime<Utc>) -> Result<u64, GatewayError> {
        queries::devices::remove_unused(self.db()?, before).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smsgate_core::{MessageContent, TextContent};
    use tempfile::tempdir;

    fn make_config(path: &str) -> StorageConfig {
        StorageConfig {
            database_path: path.to_string(),
            wal_mode: true,
        }
    }

    #[tokio::test]
    async fn initialize_opens_database_at_configured_path() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("init_test.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));

        storage.initialize().await.unwrap();
        assert!(db_path.exists(), "database file should be created");
        storage.health_check().await.unwrap();
    }

    #[tokio::test]
    async fn initialize_twice_returns_error() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("double_init.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));

        storage.initialize().await.unwrap();
        assert!(storage.initialize().await.is_err());
    }

    #[tokio::test]
    async fn operations_fail_before_initialize() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("no_init.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));

        assert!(storage.health_check().await.is_err());
        assert!(storage.select_pending("dev").await.is_err());
    }

    #[tokio::test]
    async fn removing_a_device_cascades_to_messages() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("cascade.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));
        storage.initialize().await.unwrap();

        let now = Utc::now();
        DeviceDirectory::insert(
            &storage,
            Device {
                id: "dev-1".into(),
                name: None,
                auth_token: "tok".into(),
                push_token: None,
                last_seen: now,
                user_id: "u1".into(),
                created_at: now,
                updated_at: now,
            },
        )
        .await
        .unwrap();
        MessageRepository::insert(
            &storage,
            NewMessage {
                device_id: "dev-1".into(),
                ext_id: "m1".into(),
                content: MessageContent::Text(TextContent { text: "hi".into() }),
                recipients: vec!["+12025550123".into()],
                valid_until: None,
                sim_number: None,
                with_delivery_report: true,
                priority: 0,
                is_encrypted: false,
            },
        )
        .await
        .unwrap();

        let removed = storage
            .remove(DeviceFilter::new().with_id("dev-1").with_user_id("u1"))
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert!(storage.select_pending("dev-1").await.unwrap().is_empty());

        storage.close().await.unwrap();
    }
}
