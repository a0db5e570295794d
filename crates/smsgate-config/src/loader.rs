// SPDX-FileCopyrightText: 2026 smsgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./smsgate.toml` > `~/.config/smsgate/smsgate.toml` > `/etc/smsgate/smsgate.toml`
//! with environment variable overrides via `SMSGATE_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::SmsgateConfig;

/// System-wide config file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/smsgate/smsgate.toml";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_PATH: &str = "smsgate.toml";

/// Top-level sections that environment variables may address.
const SECTIONS: &[&str] = &[
    "daemon", "storage", "push", "messages", "hashing", "devices", "cleaner", "metrics",
];

/// Per-user config file under the XDG config directory.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("smsgate/smsgate.toml"))
}

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/smsgate/smsgate.toml` (system-wide)
/// 3. `~/.config/smsgate/smsgate.toml` (user XDG config)
/// 4. `./smsgate.toml` (local directory)
/// 5. `SMSGATE_*` environment variables
pub fn load_config() -> Result<SmsgateConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<SmsgateConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(SmsgateConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<SmsgateConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(SmsgateConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading.
///
/// Returns the Figment before extraction so callers can inspect metadata.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(SmsgateConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG_PATH))
        .merge(env_provider())
}

/// Maps a lowercased, prefix-stripped env var name to a dotted config path.
///
/// Only the section boundary is split, so `push_credentials_json` becomes
/// `push.credentials_json` rather than `push.credentials.json`. Names that
/// do not start with a known section are returned unchanged and rejected
/// later by `deny_unknown_fields`.
pub fn env_key_to_path(key: &str) -> String {
    for section in SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|rest| rest.strip_prefix('_'))
            && !rest.is_empty()
        {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}

fn env_provider() -> Env {
    Env::prefixed("SMSGATE_").map(|key| env_key_to_path(key.as_str()).into())
}
