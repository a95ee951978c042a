//! OAuth2 client-credentials token management.
//!
//! The Kroger API hands out bearer tokens that expire after roughly half an
//! hour, and occasionally kills one early. The manager caches the current
//! token, refreshes it ahead of expiry, and exposes [`TokenManager::force_refresh`]
//! for the 401 recovery path in the fetcher.

use std::time::{Duration, Instant};

use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::error::KrogerError;
use crate::retry::retry_with_backoff;
use crate::truncate_chars;
use crate::types::TokenStatus;

const DEFAULT_TOKEN_URL: &str = "https://api.kroger.com/v1/connect/oauth2/token";

/// OAuth2 scope for the public products API.
const PRODUCT_SCOPE: &str = "product.compact";

/// Floor applied to `expires_in` so a malformed grant cannot cause a
/// refresh storm.
const MIN_TOKEN_LIFETIME_SECS: u64 = 60;

/// Token exchanges are small; they get a shorter timeout than product calls.
const TOKEN_TIMEOUT_SECS: u64 = 20;

/// Body snippet length kept in credential errors.
const ERROR_BODY_MAX: usize = 500;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_token_type")]
    token_type: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_token_type() -> String {
    "Bearer".to_owned()
}

fn default_expires_in() -> u64 {
    1800
}

struct CachedToken {
    access_token: String,
    token_type: String,
    expires_at: Instant,
}

/// Client-credentials token manager for the Kroger API.
///
/// The cache lock is held across the refresh await, so concurrent callers
/// coalesce into a single token request instead of racing the endpoint.
/// Use [`TokenManager::new`] for production or
/// [`TokenManager::with_token_url`] to point at a mock server in tests.
pub struct TokenManager {
    http: Client,
    token_url: Url,
    client_id: String,
    client_secret: String,
    refresh_buffer: Duration,
    max_retries: u32,
    backoff_base_ms: u64,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenManager {
    /// Creates a manager pointed at the production token endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`KrogerError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(
        client_id: &str,
        client_secret: &str,
        refresh_buffer_secs: u64,
        max_retries: u32,
        backoff_base_ms: u64,
    ) -> Result<Self, KrogerError> {
        Self::with_token_url(
            client_id,
            client_secret,
            refresh_buffer_secs,
            max_retries,
            backoff_base_ms,
            DEFAULT_TOKEN_URL,
        )
    }

    /// Creates a manager with a custom token endpoint (for testing with
    /// wiremock, or for a non-default API base).
    ///
    /// # Errors
    ///
    /// Returns [`KrogerError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`KrogerError::InvalidUrl`] if `token_url`
    /// does not parse.
    pub fn with_token_url(
        client_id: &str,
        client_secret: &str,
        refresh_buffer_secs: u64,
        max_retries: u32,
        backoff_base_ms: u64,
        token_url: &str,
    ) -> Result<Self, KrogerError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(TOKEN_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("pricewatch/0.1 (price-harvest)")
            .build()?;

        let token_url = Url::parse(token_url)
            .map_err(|e| KrogerError::InvalidUrl(format!("{token_url}: {e}")))?;

        Ok(Self {
            http,
            token_url,
            client_id: client_id.to_owned(),
            client_secret: client_secret.to_owned(),
            refresh_buffer: Duration::from_secs(refresh_buffer_secs),
            max_retries,
            backoff_base_ms,
            cached: Mutex::new(None),
        })
    }

    /// Returns a bearer token, refreshing first if the cached one expires
    /// within the refresh buffer.
    ///
    /// # Errors
    ///
    /// - [`KrogerError::CredentialRejected`] if the endpoint rejects the
    ///   credentials; callers treat this as fatal for the run.
    /// - [`KrogerError::RetryableStatus`] / [`KrogerError::Http`] once the
    ///   transient-failure retry budget is spent.
    /// - [`KrogerError::Deserialize`] if the grant body does not parse.
    pub async fn current(&self) -> Result<String, KrogerError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            // Refresh early: a token that expires mid-batch costs a 401
            // round trip, so anything inside the buffer counts as stale.
            if token.expires_at > Instant::now() + self.refresh_buffer {
                return Ok(token.access_token.clone());
            }
        }

        let fresh = self.request_token().await?;
        let access = fresh.access_token.clone();
        *cached = Some(fresh);
        Ok(access)
    }

    /// Unconditionally exchanges credentials and replaces the cached token.
    ///
    /// Used after a 401 from the products API, which means the token died
    /// before its reported expiry.
    ///
    /// # Errors
    ///
    /// Same as [`TokenManager::current`].
    pub async fn force_refresh(&self) -> Result<String, KrogerError> {
        let mut cached = self.cached.lock().await;
        let fresh = self.request_token().await?;
        let access = fresh.access_token.clone();
        *cached = Some(fresh);
        Ok(access)
    }

    /// Metadata about the cached token, or `None` before the first
    /// exchange. Never exposes the token itself.
    pub async fn status(&self) -> Option<TokenStatus> {
        let cached = self.cached.lock().await;
        cached.as_ref().map(|t| TokenStatus {
            token_type: t.token_type.clone(),
            expires_in_secs: t
                .expires_at
                .saturating_duration_since(Instant::now())
                .as_secs(),
        })
    }

    async fn request_token(&self) -> Result<CachedToken, KrogerError> {
        retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
            self.exchange_credentials()
        })
        .await
    }

    async fn exchange_credentials(&self) -> Result<CachedToken, KrogerError> {
        let response = self
            .http
            .post(self.token_url.clone())
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[
                ("grant_type", "client_credentials"),
                ("scope", PRODUCT_SCOPE),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Err(KrogerError::RetryableStatus {
                status: status.as_u16(),
                url: self.token_url.to_string(),
            });
        }
        if !status.is_success() {
            return Err(KrogerError::CredentialRejected {
                status: status.as_u16(),
                body: truncate_chars(&body, ERROR_BODY_MAX),
            });
        }

        let parsed: TokenResponse =
            serde_json::from_str(&body).map_err(|e| KrogerError::Deserialize {
                context: "token exchange response".to_owned(),
                source: e,
            })?;

        let lifetime_secs = parsed.expires_in.max(MIN_TOKEN_LIFETIME_SECS);
        tracing::debug!(expires_in_secs = lifetime_secs, "token exchange succeeded");

        Ok(CachedToken {
            access_token: parsed.access_token,
            token_type: parsed.token_type,
            expires_at: Instant::now() + Duration::from_secs(lifetime_secs),
        })
    }
}
