// SPDX-FileCopyrightText: 2026 smsgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Push transport that relays events through a hosted upstream gateway.
//!
//! The whole batch goes out as one request, so a failed request fails
//! every address in it.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Serialize;
use tracing::{debug, warn};

use smsgate_core::{GatewayError, PushClient, PushEvent, PushEventKind, PushOutcome};

const USER_AGENT: &str = concat!("smsgate/", env!("CARGO_PKG_VERSION"), " (server; rust)");

/// One entry of the upstream push request body.
#[derive(Debug, Serialize)]
struct Notification<'a> {
    token: &'a str,
    event: PushEventKind,
    data: &'a BTreeMap<String, String>,
}

/// HTTP client for the upstream relay's `/push` endpoint.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    client: reqwest::Client,
    push_url: String,
}

impl UpstreamClient {
    /// Creates a client for the relay at `base_url`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, GatewayError> {
        let mut headers = HeaderMap::new();
        headers.insert("user-agent", HeaderValue::from_static(USER_AGENT));
        headers.insert("content-type", HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Push {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            push_url: format!("{}/push", base_url.trim_end_matches('/')),
        })
    }

    /// Fails every address of `batch` with the same `message`.
    fn fail_all(batch: &HashMap<String, PushEvent>, message: &str) -> PushOutcome {
        batch
            .keys()
            .map(|address| (address.clone(), GatewayError::push(message)))
            .collect()
    }
}

#[async_trait]
impl PushClient for UpstreamClient {
    fn name(&self) -> &str {
        "upstream"
    }

    async fn send(
        &self,
        batch: &HashMap<String, PushEvent>,
    ) -> Result<PushOutcome, GatewayError> {
        let payload: Vec<Notification<'_>> = batch
            .iter()
            .map(|(token, event)| Notification {
                token,
                event: event.kind(),
                data: event.data(),
            })
            .collect();

        let response = match self.client.post(&self.push_url).json(&payload).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, count = batch.len(), "upstream push request failed");
                return Ok(Self::fail_all(batch, &format!("can't send request: {e}")));
            }
        };

        let status = response.status();
        debug!(status = %status, count = batch.len(), "upstream push response received");

        if status.as_u16() >= 400 {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "upstream rejected push batch");
            return Ok(Self::fail_all(
                batch,
                &format!("unexpected status code: {}", status.as_u16()),
            ));
        }

        Ok(PushOutcome::new())
    }
}
