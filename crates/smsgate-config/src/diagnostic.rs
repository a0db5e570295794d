// SPDX-FileCopyrightText: 2026 smsgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration diagnostics rendered through miette.
//!
//! Parse failures from figment and semantic failures from
//! [`validate_config`](crate::validation::validate_config) share one error
//! type, so `smsgate check-config` can print every problem at once.

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use miette::Diagnostic;
use thiserror::Error;

use crate::model::MIN_PUSH_DEBOUNCE;

/// Jaro-Winkler score a candidate needs before it is offered as a correction.
const SUGGESTION_THRESHOLD: f64 = 0.75;

/// One problem with the effective configuration.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("unknown key `{key}` in {}", section_name(section))]
    #[diagnostic(
        code(smsgate::config::unknown_key),
        help("{}", unknown_key_help(suggestion.as_deref(), valid_keys))
    )]
    UnknownKey {
        key: String,
        /// Dotted section path, empty for the top level.
        section: String,
        suggestion: Option<String>,
        valid_keys: String,
        /// File or provider the key came from.
        origin: Option<String>,
    },

    #[error("`{key}` has the wrong type: found {found}{}", origin_suffix(origin))]
    #[diagnostic(code(smsgate::config::invalid_type), help("expected {expected}"))]
    InvalidType {
        key: String,
        found: String,
        expected: String,
        origin: Option<String>,
    },

    #[error("missing required key `{key}`")]
    #[diagnostic(
        code(smsgate::config::missing_key),
        help("add `{key} = <value>` to smsgate.toml")
    )]
    MissingKey { key: String },

    /// FCM delivery is selected but no service account is configured.
    #[error("push.mode = \"fcm\" needs a service account in push.credentials_json")]
    #[diagnostic(
        code(smsgate::config::fcm_credentials),
        help(
            "paste the Firebase service account JSON into push.credentials_json \
             or SMSGATE_PUSH_CREDENTIALS_JSON, or set push.mode = \"upstream\""
        )
    )]
    MissingFcmCredentials,

    #[error("push.upstream_url `{url}` is not an http(s) URL")]
    #[diagnostic(
        code(smsgate::config::upstream_url),
        help("the relay endpoint looks like https://api.sms-gate.app/upstream/v1")
    )]
    InvalidUpstreamUrl { url: String },

    /// Region used to read national-format phone numbers.
    #[error("messages.default_region `{region}` is not a known region code")]
    #[diagnostic(
        code(smsgate::config::region),
        help("{}", region_help(suggestion.as_deref()))
    )]
    UnknownRegion {
        region: String,
        suggestion: Option<String>,
    },

    #[error("{key} must be at least {min}, got {value}")]
    #[diagnostic(code(smsgate::config::below_minimum))]
    BelowMinimum {
        key: &'static str,
        min: u64,
        value: u64,
    },

    #[error("storage.database_path must not be empty")]
    #[diagnostic(
        code(smsgate::config::database_path),
        help("point it at a writable file, e.g. /var/lib/smsgate/smsgate.db")
    )]
    EmptyDatabasePath,

    #[error("configuration error: {0}")]
    #[diagnostic(code(smsgate::config::other))]
    Other(String),
}

fn section_name(section: &str) -> String {
    if section.is_empty() {
        "the top level".to_string()
    } else {
        format!("[{section}]")
    }
}

fn origin_suffix(origin: &Option<String>) -> String {
    origin
        .as_deref()
        .map(|o| format!(" (in {o})"))
        .unwrap_or_default()
}

fn unknown_key_help(suggestion: Option<&str>, valid_keys: &str) -> String {
    match suggestion {
        Some(s) => format!("did you mean `{s}`? Valid keys: {valid_keys}"),
        None => format!("valid keys: {valid_keys}"),
    }
}

fn region_help(suggestion: Option<&str>) -> String {
    match suggestion {
        Some(s) => format!("did you mean `{s}`?"),
        None => "use an ISO 3166-1 alpha-2 code such as `US` or `RU`".to_string(),
    }
}

/// Help line for the debounce floor, shown by `check-config`.
pub fn debounce_floor_note(debounce_secs: u64) -> Option<String> {
    let floor = MIN_PUSH_DEBOUNCE.as_secs();
    (debounce_secs < floor).then(|| {
        format!("push.debounce_secs = {debounce_secs} is below the {floor}s floor and will be raised")
    })
}

/// Converts every error inside a `figment::Error` into a diagnostic.
pub fn figment_to_config_errors(err: figment::Error) -> Vec<ConfigError> {
    use figment::error::Kind;

    err.into_iter()
        .map(|error| {
            let origin = error
                .metadata
                .as_ref()
                .map(|m| match &m.source {
                    Some(figment::Source::File(path)) => path.display().to_string(),
                    _ => m.name.to_string(),
                });
            let section = error.path.join(".");

            match &error.kind {
                Kind::UnknownField(field, expected) => ConfigError::UnknownKey {
                    key: field.clone(),
                    suggestion: suggest_key(field, expected),
                    valid_keys: expected.join(", "),
                    section,
                    origin,
                },
                Kind::MissingField(field) => ConfigError::MissingKey {
                    key: if section.is_empty() {
                        field.to_string()
                    } else {
                        format!("{section}.{field}")
                    },
                },
                Kind::InvalidType(actual, expected) => ConfigError::InvalidType {
                    key: section,
                    found: actual.to_string(),
                    expected: expected.to_string(),
                    origin,
                },
                _ => ConfigError::Other(error.to_string()),
            }
        })
        .collect()
}

/// Closest entry of `candidates` to `unknown`, if any is similar enough.
pub fn suggest_key(unknown: &str, candidates: &[&str]) -> Option<String> {
    candidates
        .iter()
        .map(|&c| (c, strsim::jaro_winkler(unknown, c)))
        .filter(|&(_, score)| score > SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(c, _)| c.to_string())
}

/// Prints each diagnostic to stderr with miette's graphical handler.
pub fn render_errors(errors: &[ConfigError]) {
    use miette::GraphicalReportHandler;

    let handler = GraphicalReportHandler::new();
    for error in errors {
        let mut buf = String::new();
        if handler.render_report(&mut buf, error).is_ok() {
            eprint!("{buf}");
        } else {
            eprintln!("Error: {error}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suggest_debounce_for_typo() {
        let valid = &["mode", "debounce_secs", "timeout_secs", "max_retries"];
        assert_eq!(
            suggest_key("debounse_secs", valid),
            Some("debounce_secs".to_string())
        );
    }

    #[test]
    fn no_suggestion_for_distant_typo() {
        let valid = &["database_path", "wal_mode"];
        assert_eq!(suggest_key("zzzzzz", valid), None);
    }

    #[test]
    fn fcm_credentials_diagnostic_offers_both_fixes() {
        let error = ConfigError::MissingFcmCredentials;
        assert_eq!(
            error.code().map(|c| c.to_string()).as_deref(),
            Some("smsgate::config::fcm_credentials")
        );
        let help = error.help().unwrap().to_string();
        assert!(help.contains("SMSGATE_PUSH_CREDENTIALS_JSON"), "{help}");
        assert!(help.contains("upstream"), "{help}");
    }

    #[test]
    fn region_help_prefers_suggestion() {
        let error = ConfigError::UnknownRegion {
            region: "us".into(),
            suggestion: Some("US".into()),
        };
        assert_eq!(error.help().unwrap().to_string(), "did you mean `US`?");
    }

    #[test]
    fn top_level_unknown_key_names_top_level() {
        let error = ConfigError::UnknownKey {
            key: "webhooks".into(),
            section: String::new(),
            suggestion: None,
            valid_keys: "daemon, storage".into(),
            origin: None,
        };
        assert_eq!(error.to_string(), "unknown key `webhooks` in the top level");
    }

    #[test]
    fn debounce_note_only_below_floor() {
        assert!(debounce_floor_note(1).unwrap().contains("5s floor"));
        assert_eq!(debounce_floor_note(5), None);
        assert_eq!(debounce_floor_note(30), None);
    }
}
