// SPDX-FileCopyrightText: 2026 smsgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Firebase Cloud Messaging HTTP v1 transport.
//!
//! Authenticates with a service account: an RS256-signed JWT assertion is
//! exchanged for an OAuth2 access token, which is cached until shortly
//! before it expires. Each address in a batch is one `messages:send` call.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use futures::future::join_all;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use smsgate_core::{GatewayError, PushClient, PushEvent, PushOutcome};

use crate::address_tag;

const FCM_BASE_URL: &str = "https://fcm.googleapis.com";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const MESSAGING_SCOPE: &str = "https://www.googleapis.com/auth/firebase.messaging";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Lifetime requested for each signed assertion.
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Cached tokens are refreshed this long before they expire.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// The fields of a Google service-account key file that FCM needs.
#[derive(Deserialize)]
struct ServiceAccountFile {
    project_id: String,
    client_email: String,
    private_key: String,
    #[serde(default = "default_token_uri")]
    token_uri: String,
}

/// Service-account identity kept after the private key has been loaded.
struct ServiceAccount {
    project_id: String,
    client_email: String,
    token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    grant_type: &'a str,
    assertion: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

struct AccessToken {
    value: SecretString,
    expires_at: Instant,
}

#[derive(Serialize)]
struct SendRequest<'a> {
    message: FcmMessage<'a>,
}

#[derive(Serialize)]
struct FcmMessage<'a> {
    token: &'a str,
    data: BTreeMap<String, String>,
    android: AndroidConfig,
}

#[derive(Serialize)]
struct AndroidConfig {
    priority: &'static str,
}

#[derive(Deserialize)]
struct FcmErrorResponse {
    error: FcmErrorBody,
}

#[derive(Deserialize)]
struct FcmErrorBody {
    #[serde(default)]
    status: String,
    #[serde(default)]
    message: String,
}

/// FCM HTTP v1 client authenticated with a service account.
pub struct FcmClient {
    client: reqwest::Client,
    account: ServiceAccount,
    key: EncodingKey,
    token: Mutex<Option<AccessToken>>,
    base_url: String,
}

impl FcmClient {
    /// Creates a client from the service-account JSON.
    ///
    /// Fails if the JSON is malformed or the private key is not an RSA PEM.
    pub fn new(credentials_json: &str, timeout: Duration) -> Result<Self, GatewayError> {
        let file: ServiceAccountFile = serde_json::from_str(credentials_json)
            .map_err(|e| GatewayError::Config(format!("invalid FCM credentials: {e}")))?;
        let key = EncodingKey::from_rsa_pem(file.private_key.as_bytes())
            .map_err(|e| GatewayError::Config(format!("invalid FCM private key: {e}")))?;
        let account = ServiceAccount {
            project_id: file.project_id,
            client_email: file.client_email,
            token_uri: file.token_uri,
        };

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Push {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            account,
            key,
            token: Mutex::new(None),
            base_url: FCM_BASE_URL.to_string(),
        })
    }

    /// Overrides the FCM base URL (for testing with wiremock).
    #[cfg(test)]
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url;
        self
    }

    pub fn project_id(&self) -> &str {
        &self.account.project_id
    }

    fn send_url(&self) -> String {
        format!(
            "{}/v1/projects/{}/messages:send",
            self.base_url, self.account.project_id
        )
    }

    fn sign_assertion(&self) -> Result<String, GatewayError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            iss: &self.account.client_email,
            scope: MESSAGING_SCOPE,
            aud: &self.account.token_uri,
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };
        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.key).map_err(|e| {
            GatewayError::Push {
                message: format!("failed to sign FCM assertion: {e}"),
                source: Some(Box::new(e)),
            }
        })
    }

    /// Returns a valid access token, exchanging a fresh assertion when the cached one is stale.
    async fn access_token(&self) -> Result<SecretString, GatewayError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() + TOKEN_REFRESH_MARGIN < token.expires_at {
                return Ok(SecretString::from(token.value.expose_secret().to_owned()));
            }
        }

        let assertion = self.sign_assertion()?;
        let form = serde_urlencoded::to_string(TokenRequest {
            grant_type: JWT_BEARER_GRANT,
            assertion: &assertion,
        })
        .map_err(|e| GatewayError::Push {
            message: format!("failed to encode token request: {e}"),
            source: Some(Box::new(e)),
        })?;

        let response = self
            .client
            .post(&self.account.token_uri)
            .header("content-type", "application/x-www-form-urlencoded")
            .body(form)
            .send()
            .await
            .map_err(|e| GatewayError::Push {
                message: format!("token request failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::push(format!(
                "token endpoint returned {status}: {body}"
            )));
        }

        let token: TokenResponse = response.json().await.map_err(|e| GatewayError::Push {
            message: format!("failed to parse token response: {e}"),
            source: Some(Box::new(e)),
        })?;
        debug!(expires_in = token.expires_in, "FCM access token refreshed");

        let bearer = SecretString::from(token.access_token.clone());
        *cached = Some(AccessToken {
            value: SecretString::from(token.access_token),
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        });
        Ok(bearer)
    }

    async fn send_one(
        &self,
        url: &str,
        bearer: &SecretString,
        address: &str,
        event: &PushEvent,
    ) -> Result<(), GatewayError> {
        let request = SendRequest {
            message: FcmMessage {
                token: address,
                data: event.to_map(),
                android: AndroidConfig { priority: "high" },
            },
        };

        let response = self
            .client
            .post(url)
            .bearer_auth(bearer.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| GatewayError::Push {
                message: format!("HTTP request failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<FcmErrorResponse>(&body) {
            Ok(err) => format!("FCM error ({}): {}", err.error.status, err.error.message),
            Err(_) => format!("FCM returned {status}: {body}"),
        };
        Err(GatewayError::push(message))
    }
}

#[async_trait]
impl PushClient for FcmClient {
    fn name(&self) -> &str {
        "fcm"
    }

    async fn open(&self) -> Result<(), GatewayError> {
        self.access_token().await.map(|_| ())
    }

    async fn send(
        &self,
        batch: &HashMap<String, PushEvent>,
    ) -> Result<PushOutcome, GatewayError> {
        let bearer = self.access_token().await?;
        let url = self.send_url();

        let results = join_all(batch.iter().map(|(address, event)| {
            let url = &url;
            let bearer = &bearer;
            async move { (address, self.send_one(url, bearer, address, event).await) }
        }))
        .await;

        let mut failures = PushOutcome::new();
        for (address, result) in results {
            if let Err(e) = result {
                warn!(address = %address_tag(address), error = %e, "FCM send failed");
                failures.insert(address.clone(), e);
            }
        }
        Ok(failures)
    }

    async fn close(&self) -> Result<(), GatewayError> {
        *self.token.lock().await = None;
        Ok(())
    }
}
