//! HTTP client for the Kroger products API.
//!
//! Wraps `reqwest` with the retry/backoff discipline for transient failures.
//! The client deliberately does NOT interpret non-retryable statuses: a 401
//! or 404 comes back as a [`RawResponse`] value so the fetch layer can apply
//! its own policy.

use std::time::Duration;

use reqwest::{Client, StatusCode, Url};

use crate::error::KrogerError;
use crate::retry::retry_with_backoff;
use crate::types::RawResponse;

const DEFAULT_BASE_URL: &str = "https://api.kroger.com/v1";

/// Client for the products endpoint.
///
/// Use [`KrogerClient::new`] for production or
/// [`KrogerClient::with_base_url`] to point at a mock server in tests.
pub struct KrogerClient {
    client: Client,
    products_url: Url,
    max_retries: u32,
    backoff_base_ms: u64,
}

impl KrogerClient {
    /// Creates a client pointed at the production API.
    ///
    /// # Errors
    ///
    /// Returns [`KrogerError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(
        timeout_secs: u64,
        user_agent: &str,
        max_retries: u32,
        backoff_base_ms: u64,
    ) -> Result<Self, KrogerError> {
        Self::with_base_url(
            timeout_secs,
            user_agent,
            max_retries,
            backoff_base_ms,
            DEFAULT_BASE_URL,
        )
    }

    /// Creates a client with a custom API base (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`KrogerError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`KrogerError::InvalidUrl`] if `base_url`
    /// is not a valid URL.
    pub fn with_base_url(
        timeout_secs: u64,
        user_agent: &str,
        max_retries: u32,
        backoff_base_ms: u64,
        base_url: &str,
    ) -> Result<Self, KrogerError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;

        // Normalise: ensure the base ends with exactly one slash so that
        // join() appends a path segment instead of replacing the last one.
        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base = Url::parse(&normalised)
            .map_err(|e| KrogerError::InvalidUrl(format!("{base_url}: {e}")))?;
        let products_url = base
            .join("products")
            .map_err(|e| KrogerError::InvalidUrl(format!("{base_url}/products: {e}")))?;

        Ok(Self {
            client,
            products_url,
            max_retries,
            backoff_base_ms,
        })
    }

    /// Fetches one batch of product prices for a store location.
    ///
    /// Issues `GET /products?filter.locationId=...&filter.productId=a,b,c`
    /// with the given bearer token. 429s, 5xx and transport failures are
    /// retried with backoff; any other response, including 401, is returned
    /// as-is for the caller to interpret.
    ///
    /// # Errors
    ///
    /// - [`KrogerError::RetryableStatus`] once the retry budget is spent.
    /// - [`KrogerError::Http`] on a non-retryable transport failure or when
    ///   transport retries are exhausted.
    pub async fn get_products(
        &self,
        bearer_token: &str,
        location_id: &str,
        product_ids: &[&str],
    ) -> Result<RawResponse, KrogerError> {
        let url = self.products_url(location_id, product_ids);
        retry_with_backoff(self.max_retries, self.backoff_base_ms, || async {
            let response = self
                .client
                .get(url.clone())
                .bearer_auth(bearer_token)
                .send()
                .await?;

            let status = response.status();
            if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                return Err(KrogerError::RetryableStatus {
                    status: status.as_u16(),
                    url: url.to_string(),
                });
            }

            let body = response.text().await?;
            Ok(RawResponse { status, body })
        })
        .await
    }

    /// Builds the products request URL with percent-encoded query
    /// parameters. Product ids are joined with commas into a single
    /// `filter.productId` value, the API's bulk-lookup form.
    fn products_url(&self, location_id: &str, product_ids: &[&str]) -> Url {
        let mut url = self.products_url.clone();
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("filter.locationId", location_id);
            pairs.append_pair("filter.productId", &product_ids.join(","));
        }
        url
    }
}
