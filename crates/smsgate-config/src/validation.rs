// SPDX-FileCopyrightText: 2026 smsgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as non-empty paths, positive durations and known region codes.

use phonenumber::country;

use crate::diagnostic::ConfigError;
use crate::model::{PushMode, SmsgateConfig};

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &SmsgateConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::EmptyDatabasePath);
    }

    let minimums = [
        ("push.timeout_secs", config.push.timeout_secs),
        ("push.max_retries", u64::from(config.push.max_retries)),
        ("push.blacklist_ttl_secs", config.push.blacklist_ttl_secs),
        ("messages.retention_days", u64::from(config.messages.retention_days)),
        ("cleaner.interval_secs", config.cleaner.interval_secs),
    ];
    for (key, value) in minimums {
        if value < 1 {
            errors.push(ConfigError::BelowMinimum { key, min: 1, value });
        }
    }

    match config.push.mode {
        PushMode::Fcm => {
            let missing = config
                .push
                .credentials_json
                .as_deref()
                .is_none_or(|c| c.trim().is_empty());
            if missing {
                errors.push(ConfigError::MissingFcmCredentials);
            }
        }
        PushMode::Upstream => {
            let url = config.push.upstream_url.trim();
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                errors.push(ConfigError::InvalidUpstreamUrl {
                    url: url.to_string(),
                });
            }
        }
    }

    let region = &config.messages.default_region;
    if region.parse::<country::Id>().is_err() {
        errors.push(ConfigError::UnknownRegion {
            region: region.clone(),
            suggestion: region_suggestion(region),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Canonical spelling of a region code written in the wrong case or padded.
fn region_suggestion(region: &str) -> Option<String> {
    let upper = region.trim().to_ascii_uppercase();
    (upper != region && upper.parse::<country::Id>().is_ok()).then_some(upper)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> SmsgateConfig {
        let mut config = SmsgateConfig::default();
        config.push.credentials_json = Some("{}".to_string());
        config
    }

    #[test]
    fn default_config_with_credentials_is_valid() {
        assert!(validate_config(&valid()).is_ok());
    }

    #[test]
    fn fcm_mode_requires_credentials() {
        let errors = validate_config(&SmsgateConfig::default()).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], ConfigError::MissingFcmCredentials));
    }

    #[test]
    fn blank_credentials_count_as_missing() {
        let mut config = SmsgateConfig::default();
        config.push.credentials_json = Some("  ".to_string());
        let errors = validate_config(&config).unwrap_err();
        assert!(matches!(&errors[..], [ConfigError::MissingFcmCredentials]));
    }

    #[test]
    fn upstream_mode_requires_http_url() {
        let mut config = SmsgateConfig::default();
        config.push.mode = PushMode::Upstream;
        config.push.upstream_url = "ftp://relay".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(
            |e| matches!(e, ConfigError::InvalidUpstreamUrl { url } if url == "ftp://relay")
        ));
    }

    #[test]
    fn padded_region_gets_a_suggestion() {
        let mut config = valid();
        config.messages.default_region = " US".to_string();
        let errors = validate_config(&config).unwrap_err();
        match &errors[..] {
            [ConfigError::UnknownRegion { suggestion, .. }] => {
                assert_eq!(suggestion.as_deref(), Some("US"));
            }
            other => panic!("unexpected errors: {other:?}"),
        }
    }

    #[test]
    fn made_up_region_has_no_suggestion() {
        let mut config = valid();
        config.messages.default_region = "QQ".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(matches!(
            &errors[..],
            [ConfigError::UnknownRegion { suggestion: None, .. }]
        ));
    }

    #[test]
    fn all_errors_are_collected() {
        let mut config = valid();
        config.storage.database_path = "  ".to_string();
        config.push.timeout_secs = 0;
        config.push.max_retries = 0;
        config.messages.retention_days = 0;
        config.messages.default_region = "QQ".to_string();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 5, "got: {errors:?}");
        let below: Vec<_> = errors
            .iter()
            .filter_map(|e| match e {
                ConfigError::BelowMinimum { key, value: 0, .. } => Some(*key),
                _ => None,
            })
            .collect();
        assert_eq!(
            below,
            ["push.timeout_secs", "push.max_retries", "messages.retention_days"]
        );
    }
}
