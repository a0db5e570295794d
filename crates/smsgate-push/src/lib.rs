// SPDX-FileCopyrightText: 2026 smsgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Push dispatch for smsgate.
//!
//! [`PushService`] coalesces outstanding events per device push address and
//! flushes them on a timer through a [`PushClient`] transport. Two
//! transports are provided: [`FcmClient`] talks to Firebase Cloud Messaging
//! directly, [`UpstreamClient`] relays through a hosted gateway.

pub mod fcm;
pub mod service;
pub mod upstream;

use std::sync::Arc;

use smsgate_config::model::{PushConfig, PushMode};
use smsgate_core::hash::sha256_hex;
use smsgate_core::{GatewayError, PushClient};

pub use fcm::FcmClient;
pub use service::{FlushReport, PushService};
pub use smsgate_core::{PushEvent, PushEventKind};
pub use upstream::UpstreamClient;

/// Builds the push transport selected by `push.mode`.
pub fn new_client(config: &PushConfig) -> Result<Arc<dyn PushClient>, GatewayError> {
    match config.mode {
        PushMode::Fcm => {
            let credentials = config.credentials_json.as_deref().ok_or_else(|| {
                GatewayError::Config("push.credentials_json is required in fcm mode".into())
            })?;
            Ok(Arc::new(FcmClient::new(credentials, config.timeout())?))
        }
        PushMode::Upstream => Ok(Arc::new(UpstreamClient::new(
            &config.upstream_url,
            config.timeout(),
        )?)),
    }
}

/// Short, non-reversible tag for a push address, safe to log.
pub(crate) fn address_tag(address: &str) -> String {
    let mut tag = sha256_hex(address);
    tag.truncate(8);
    tag
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_mode_builds_upstream_client() {
        let config = PushConfig {
            mode: PushMode::Upstream,
            ..PushConfig::default()
        };
        let client = new_client(&config).unwrap();
        assert_eq!(client.name(), "upstream");
    }

    #[test]
    fn fcm_mode_without_credentials_is_a_config_error() {
        let config = PushConfig::default();
        assert!(matches!(
            new_client(&config),
            Err(GatewayError::Config(_))
        ));
    }

    #[test]
    fn address_tag_hides_the_address() {
        let tag = address_tag("fcm-token-123");
        assert_eq!(tag.len(), 8);
        assert!(!tag.contains("fcm"));
        assert_eq!(tag, address_tag("fcm-token-123"));
    }
}
