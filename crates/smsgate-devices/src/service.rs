// SPDX-FileCopyrightText: 2026 smsgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use smsgate_config::model::DevicesConfig;
use smsgate_core::hash::sha256_hex;
use smsgate_core::{
    new_id, Cleanable, Device, DeviceDirectory, DeviceFilter, ExpiringMap, GatewayError,
};

/// Caller-supplied part of a new device.
#[derive(Debug, Clone, Default)]
pub struct DeviceRegistration {
    pub name: Option<String>,
    pub push_token: Option<String>,
}

/// User-scoped access to registered devices.
pub struct DevicesService {
    directory: Arc<dyn DeviceDirectory>,
    tokens: Arc<ExpiringMap<String, Device>>,
    unused_lifetime: Duration,
}

impl DevicesService {
    pub fn new(config: &DevicesConfig, directory: Arc<dyn DeviceDirectory>) -> Self {
        Self {
            directory,
            tokens: Arc::new(ExpiringMap::with_ttl(config.token_cache_ttl())),
            unused_lifetime: config.unused_lifetime(),
        }
    }

    /// Registers a device for `user_id` with a fresh id and auth token.
    pub async fn insert(
        &self,
        user_id: &str,
        registration: DeviceRegistration,
    ) -> Result<Device, GatewayError> {
        let now = Utc::now();
        let device = Device {
            id: new_id(),
            name: registration.name,
            auth_token: new_id(),
            push_token: registration.push_token,
            last_seen: now,
            user_id: user_id.to_string(),
            created_at: now,
            updated_at: now,
        };
        self.directory.insert(device.clone()).await?;
        info!(device_id = %device.id, user_id, "device registered");
        Ok(device)
    }

    /// Devices of `user_id` matching `filter`.
    pub async fn select(
        &self,
        user_id: &str,
        filter: DeviceFilter,
    ) -> Result<Vec<Device>, GatewayError> {
        self.directory.select(filter.with_user_id(user_id)).await
    }

    pub async fn exists(&self, user_id: &str, filter: DeviceFilter) -> Result<bool, GatewayError> {
        Ok(!self.select(user_id, filter).await?.is_empty())
    }

    /// Exactly one device of `user_id` matching `filter`.
    pub async fn get(&self, user_id: &str, filter: DeviceFilter) -> Result<Device, GatewayError> {
        single(self.select(user_id, filter).await?)
    }

    /// Resolves a device by auth token, served from cache when possible.
    ///
    /// The cache is keyed by a hash of the token so raw tokens are never held.
    pub async fn get_by_token(&self, token: &str) -> Result<Device, GatewayError> {
        let key = sha256_hex(token);
        if let Some(device) = self.tokens.get(&key) {
            return Ok(device);
        }

        let device = single(
            self.directory
                .select(DeviceFilter::new().with_token(token))
                .await?,
        )?;
        self.tokens.set(key, device.clone());
        Ok(device)
    }

    /// Sets or clears the push address of a device.
    pub async fn update_push_token(
        &self,
        device_id: &str,
        push_token: Option<&str>,
    ) -> Result<(), GatewayError> {
        self.directory.update_push_token(device_id, push_token).await
    }

    pub async fn update_last_seen(&self, device_id: &str) -> Result<(), GatewayError> {
        self.directory.update_last_seen(device_id, Utc::now()).await
    }

    /// Removes the single device of `user_id` matching `filter`.
    pub async fn remove(&self, user_id: &str, filter: DeviceFilter) -> Result<(), GatewayError> {
        let filter = filter.with_user_id(user_id);
        let device = single(self.directory.select(filter.clone()).await?)?;

        self.tokens.remove(&sha256_hex(&device.auth_token));
        self.directory.remove(filter).await?;
        info!(device_id = %device.id, user_id, "device removed");
        Ok(())
    }

    /// Periodically purges expired token cache entries until `cancel` fires.
    pub async fn run_cache_cleanup(&self, cancel: CancellationToken) {
        let interval = self.tokens.ttl().unwrap_or(Duration::from_secs(60));
        self.tokens.clone().run_cleanup(interval, cancel).await;
        debug!("device token cache sweeper stopped");
    }
}

fn single(mut devices: Vec<Device>) -> Result<Device, GatewayError> {
    match devices.len() {
        0 => Err(GatewayError::NotFound),
        1 => Ok(devices.remove(0)),
        n => {
            warn!(count = n, "device filter matched more than one record");
            Err(GatewayError::Internal("more than one record".to_string()))
        }
    }
}

#[async_trait]
impl Cleanable for DevicesService {
    fn name(&self) -> &str {
        "devices"
    }

    async fn clean(&self) -> Result<u64, GatewayError> {
        let lifetime = chrono::Duration::from_std(self.unused_lifetime)
            .map_err(|e| GatewayError::Config(format!("invalid unused device lifetime: {e}")))?;
        let removed = self.directory.remove_unused(Utc::now() - lifetime).await?;
        info!(count = removed, "cleaned unused devices");
        Ok(removed)
    }
}
