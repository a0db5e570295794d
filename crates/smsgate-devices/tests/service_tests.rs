// SPDX-FileCopyrightText: 2026 smsgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the device directory service over SQLite.

use std::sync::Arc;

use smsgate_config::model::{DevicesConfig, StorageConfig};
use smsgate_core::{Cleanable, DeviceFilter};
use smsgate_devices::{DeviceRegistration, DevicesService};
use smsgate_storage::SqliteStorage;
use tempfile::TempDir;

async fn setup(config: DevicesConfig) -> (DevicesService, Arc<SqliteStorage>, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(SqliteStorage::new(StorageConfig {
        database_path: dir.path().join("devices.db").to_str().unwrap().to_string(),
        wal_mode: true,
    }));
    storage.initialize().await.unwrap();
    let service = DevicesService::new(&config, storage.clone());
    (service, storage, dir)
}

fn registration(name: &str) -> DeviceRegistration {
    DeviceRegistration {
        name: Some(name.to_string()),
        push_token: Some(format!("push-{name}")),
    }
}

#[tokio::test]
async fn insert_generates_identifiers() {
    let (service, _storage, _dir) = setup(DevicesConfig::default()).await;
    let device = service.insert("u1", registration("pixel")).await.unwrap();

    assert_eq!(device.id.len(), 21);
    assert_eq!(device.auth_token.len(), 21);
    assert_ne!(device.id, device.auth_token);
    assert_eq!(device.user_id, "u1");
}

#[tokio::test]
async fn lookups_are_scoped_to_user() {
    let (service, _storage, _dir) = setup(DevicesConfig::default()).await;
    let device = service.insert("u1", registration("pixel")).await.unwrap();

    let found = service
        .get("u1", DeviceFilter::new().with_id(&device.id))
        .await
        .unwrap();
    assert_eq!(found.id, device.id);

    let err = service
        .get("u2", DeviceFilter::new().with_id(&device.id))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert!(!service
        .exists("u2", DeviceFilter::new().with_id(&device.id))
        .await
        .unwrap());
}

#[tokio::test]
async fn get_with_several_matches_is_an_error() {
    let (service, _storage, _dir) = setup(DevicesConfig::default()).await;
    service.insert("u1", registration("a")).await.unwrap();
    service.insert("u1", registration("b")).await.unwrap();

    let err = service.get("u1", DeviceFilter::new()).await.unwrap_err();
    assert!(err.to_string().contains("more than one record"), "got {err}");
    assert_eq!(service.select("u1", DeviceFilter::new()).await.unwrap().len(), 2);
}

#[tokio::test]
async fn token_lookup_is_cached_until_removed() {
    let (service, _storage, _dir) = setup(DevicesConfig::default()).await;
    let device = service.insert("u1", registration("pixel")).await.unwrap();

    let first = service.get_by_token(&device.auth_token).await.unwrap();
    assert_eq!(first.id, device.id);

    service
        .remove("u1", DeviceFilter::new().with_id(&device.id))
        .await
        .unwrap();
    let err = service.get_by_token(&device.auth_token).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn cached_token_survives_backend_changes_within_ttl() {
    let (service, storage, _dir) = setup(DevicesConfig::default()).await;
    let device = service.insert("u1", registration("pixel")).await.unwrap();
    service.get_by_token(&device.auth_token).await.unwrap();

    // Delete behind the service's back; the cached entry still answers.
    use smsgate_core::DeviceDirectory;
    storage
        .remove(DeviceFilter::new().with_id(&device.id))
        .await
        .unwrap();
    assert_eq!(
        service.get_by_token(&device.auth_token).await.unwrap().id,
        device.id
    );
}

#[tokio::test]
async fn push_token_can_be_cleared() {
    let (service, _storage, _dir) = setup(DevicesConfig::default()).await;
    let device = service.insert("u1", registration("pixel")).await.unwrap();

    service.update_push_token(&device.id, None).await.unwrap();
    let found = service
        .get("u1", DeviceFilter::new().with_id(&device.id))
        .await
        .unwrap();
    assert_eq!(found.push_token, None);
}

#[tokio::test]
async fn clean_keeps_recent_devices() {
    let (service, _storage, _dir) = setup(DevicesConfig::default()).await;
    service.insert("u1", registration("pixel")).await.unwrap();

    assert_eq!(service.clean().await.unwrap(), 0);
    assert_eq!(service.name(), "devices");
}
