//! Batch fetching of store prices.
//!
//! The cohort is split into groups of at most `batch_size` products and one
//! logical API call is made per group. Group failures are recorded and the
//! fetch moves on; only token manager failures propagate, because a run
//! that cannot authenticate cannot do anything useful.

use chrono::NaiveDate;
use reqwest::StatusCode;
use serde_json::Value;

use pricewatch_core::ProductRef;

use crate::auth::TokenManager;
use crate::client::KrogerClient;
use crate::error::KrogerError;
use crate::normalize::normalize_page;
use crate::truncate_chars;
use crate::types::{BatchOutcome, StoreFetch};

/// Response-body snippet length kept in batch outcomes for the request log.
const BODY_SNIPPET_MAX: usize = 2000;

/// Fetches prices for `cohort` at one store location, in groups of
/// `batch_size` products per call.
///
/// Per-group policy:
/// - On HTTP 401 the token is force-refreshed and the group retried exactly
///   once; the second outcome stands whatever it is. A 401 here means the
///   token died before its reported expiry, not that credentials are bad.
/// - A group whose retry budget is spent, whose final status is non-2xx, or
///   whose body is not valid JSON is recorded in its [`BatchOutcome`] and
///   the remaining groups still run.
///
/// # Errors
///
/// Only token manager failures escape: [`KrogerError::CredentialRejected`],
/// or a transport/retry error from the token endpoint. The caller treats
/// these as fatal for the whole run.
pub async fn fetch_store_prices(
    client: &KrogerClient,
    tokens: &TokenManager,
    location_id: &str,
    cohort: &[ProductRef],
    batch_size: usize,
    observed_date: NaiveDate,
) -> Result<StoreFetch, KrogerError> {
    let mut fetch = StoreFetch::default();

    for group in cohort.chunks(batch_size.max(1)) {
        let pids: Vec<&str> = group.iter().map(|p| p.product_id.as_str()).collect();

        let token = tokens.current().await?;
        let mut result = client.get_products(&token, location_id, &pids).await;

        if matches!(&result, Ok(r) if r.status == StatusCode::UNAUTHORIZED) {
            tracing::info!(
                location_id,
                "401 from products API, forcing token refresh and retrying batch once"
            );
            let token = tokens.force_refresh().await?;
            result = client.get_products(&token, location_id, &pids).await;
        }

        match result {
            Ok(response) => {
                let ok = response.status.is_success();
                let mut outcome = BatchOutcome {
                    status: Some(response.status.as_u16()),
                    ok,
                    requested: group.len(),
                    observations: 0,
                    message: truncate_chars(&response.body, BODY_SNIPPET_MAX),
                };

                if ok {
                    match serde_json::from_str::<Value>(&response.body) {
                        Ok(body) => {
                            let observations =
                                normalize_page(&body, group, location_id, observed_date);
                            outcome.observations = observations.len();
                            fetch.observations.extend(observations);
                        }
                        Err(error) => {
                            // The raw body is already in the outcome message
                            // for diagnosis; the batch just yields no rows.
                            tracing::warn!(
                                location_id,
                                %error,
                                "products response is not valid JSON, skipping batch"
                            );
                        }
                    }
                } else {
                    tracing::warn!(
                        location_id,
                        status = response.status.as_u16(),
                        "products batch failed, continuing with next batch"
                    );
                }
                fetch.batches.push(outcome);
            }
            Err(error) => {
                tracing::warn!(
                    location_id,
                    %error,
                    "products batch errored after retries, continuing with next batch"
                );
                fetch.batches.push(BatchOutcome {
                    status: None,
                    ok: false,
                    requested: group.len(),
                    observations: 0,
                    message: error.to_string(),
                });
            }
        }
    }

    Ok(fetch)
}
