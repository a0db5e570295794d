// SPDX-FileCopyrightText: 2026 smsgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the smsgate daemon.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use smsgate_core::RetentionPolicy;

/// Lowest accepted push debounce. Shorter values are raised to this.
pub const MIN_PUSH_DEBOUNCE: Duration = Duration::from_secs(5);

/// Top-level smsgate configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SmsgateConfig {
    /// Process-wide settings.
    #[serde(default)]
    pub daemon: DaemonConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Push transport and dispatch settings.
    #[serde(default)]
    pub push: PushConfig,

    /// Message lifecycle settings.
    #[serde(default)]
    pub messages: MessagesConfig,

    /// Recipient anonymization sweep.
    #[serde(default)]
    pub hashing: HashingConfig,

    /// Device directory settings.
    #[serde(default)]
    pub devices: DevicesConfig,

    /// Periodic retention cleaner.
    #[serde(default)]
    pub cleaner: CleanerConfig,

    /// Prometheus metrics.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Process-wide configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DaemonConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_true")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: true,
        }
    }
}

fn default_database_path() -> String {
    "smsgate.db".to_string()
}

fn default_true() -> bool {
    true
}

/// Which push transport delivers events to devices.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PushMode {
    /// Firebase Cloud Messaging HTTP v1.
    #[default]
    Fcm,
    /// Relay through another smsgate instance.
    Upstream,
}

/// Push dispatch configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PushConfig {
    #[serde(default)]
    pub mode: PushMode,

    /// FCM service-account JSON. Required in `fcm` mode.
    #[serde(default)]
    pub credentials_json: Option<String>,

    /// Base URL of the upstream relay, used in `upstream` mode.
    #[serde(default = "default_upstream_url")]
    pub upstream_url: String,

    /// Flush period of the coalescing table, in seconds. Floored at 5.
    #[serde(default = "default_debounce_secs")]
    pub debounce_secs: u64,

    /// Deadline for one batch send, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Failed sends per address before it is blacklisted.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// How long a blacklisted address is skipped, in seconds.
    #[serde(default = "default_blacklist_ttl_secs")]
    pub blacklist_ttl_secs: u64,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            mode: PushMode::default(),
            credentials_json: None,
            upstream_url: default_upstream_url(),
            debounce_secs: default_debounce_secs(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            blacklist_ttl_secs: default_blacklist_ttl_secs(),
        }
    }
}

impl PushConfig {
    /// Effective flush period, never below [`MIN_PUSH_DEBOUNCE`].
    pub fn debounce(&self) -> Duration {
        Duration::from_secs(self.debounce_secs).max(MIN_PUSH_DEBOUNCE)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn blacklist_ttl(&self) -> Duration {
        Duration::from_secs(self.blacklist_ttl_secs)
    }
}

fn default_upstream_url() -> String {
    "https://api.sms-gate.app/upstream/v1".to_string()
}

fn default_debounce_secs() -> u64 {
    5
}

fn default_timeout_secs() -> u64 {
    1
}

fn default_max_retries() -> u32 {
    3
}

fn default_blacklist_ttl_secs() -> u64 {
    15 * 60
}

/// Message lifecycle configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MessagesConfig {
    /// Age after which processed messages are removed, in days.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,

    /// Which states the retention sweep may remove.
    #[serde(default)]
    pub retention_policy: RetentionPolicy,

    /// Region used to parse numbers written without a country code.
    #[serde(default = "default_region")]
    pub default_region: String,
}

impl Default for MessagesConfig {
    fn default() -> Self {
        Self {
            retention_days: default_retention_days(),
            retention_policy: RetentionPolicy::default(),
            default_region: default_region(),
        }
    }
}

impl MessagesConfig {
    pub fn retention(&self) -> Duration {
        days(self.retention_days)
    }
}

fn default_retention_days() -> u32 {
    30
}

fn default_region() -> String {
    "RU".to_string()
}

/// Recipient anonymization configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HashingConfig {
    /// Sweep period in seconds. `0` disables the periodic sweep.
    #[serde(default = "default_hashing_interval_secs")]
    pub interval_secs: u64,
}

impl Default for HashingConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_hashing_interval_secs(),
        }
    }
}

impl HashingConfig {
    pub fn interval(&self) -> Option<Duration> {
        (self.interval_secs > 0).then(|| Duration::from_secs(self.interval_secs))
    }
}

fn default_hashing_interval_secs() -> u64 {
    60
}

/// Device directory configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DevicesConfig {
    /// Devices not updated for this many days are removed.
    #[serde(default = "default_unused_lifetime_days")]
    pub unused_lifetime_days: u32,

    /// Lifetime of cached token lookups, in seconds.
    #[serde(default = "default_token_cache_ttl_secs")]
    pub token_cache_ttl_secs: u64,
}

impl Default for DevicesConfig {
    fn default() -> Self {
        Self {
            unused_lifetime_days: default_unused_lifetime_days(),
            token_cache_ttl_secs: default_token_cache_ttl_secs(),
        }
    }
}

impl DevicesConfig {
    pub fn unused_lifetime(&self) -> Duration {
        days(self.unused_lifetime_days)
    }

    pub fn token_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.token_cache_ttl_secs)
    }
}

fn default_unused_lifetime_days() -> u32 {
    365
}

fn default_token_cache_ttl_secs() -> u64 {
    10 * 60
}

/// Retention cleaner configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CleanerConfig {
    #[serde(default = "default_cleaner_interval_secs")]
    pub interval_secs: u64,
}

impl Default for CleanerConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_cleaner_interval_secs(),
        }
    }
}

impl CleanerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

fn default_cleaner_interval_secs() -> u64 {
    60 * 60
}

/// Prometheus metrics configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

fn days(n: u32) -> Duration {
    Duration::from_secs(u64::from(n) * 24 * 60 * 60)
}
