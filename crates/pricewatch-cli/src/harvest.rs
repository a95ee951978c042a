//! One harvest pass: cohort selection, the sequential per-store fetch loop,
//! and the database writes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{NaiveDate, Utc};
use sqlx::PgPool;

use pricewatch_core::{
    shard::{select_cohort, shard_for_date},
    AppConfig, ProductRef,
};
use pricewatch_db::{
    connect_pool_from_config, insert_request_log, list_active_stores, list_harvestable_products,
    write_price_observations,
};
use pricewatch_kroger::{
    fetch_store_prices, BatchOutcome, KrogerClient, KrogerError, TokenManager,
};

/// Flags for one harvest invocation.
#[derive(Debug, Default)]
pub struct HarvestOptions {
    /// Harvest date; `None` means today in UTC.
    pub date: Option<NaiveDate>,
    /// Explicit shard override; wrapped modulo the bucket count.
    pub shard_index: Option<u32>,
    /// When set, nothing is written: no prices, no request log rows.
    pub dry_run: bool,
}

#[derive(Debug, Default)]
struct RunTotals {
    stores_processed: usize,
    stores_failed: usize,
    requests: u64,
    observations: u64,
    rows_written: u64,
}

pub(crate) fn build_token_manager(config: &AppConfig) -> Result<TokenManager, KrogerError> {
    let token_url = format!(
        "{}/connect/oauth2/token",
        config.kroger_api_base.trim_end_matches('/')
    );
    TokenManager::with_token_url(
        &config.kroger_client_id,
        &config.kroger_client_secret,
        config.token_refresh_buffer_secs,
        config.token_max_retries,
        config.backoff_base_ms,
        &token_url,
    )
}

fn build_client(config: &AppConfig) -> Result<KrogerClient, KrogerError> {
    KrogerClient::with_base_url(
        config.request_timeout_secs,
        &config.user_agent,
        config.http_max_retries,
        config.backoff_base_ms,
        &config.kroger_api_base,
    )
}

/// Runs one full harvest pass and prints a summary line to stdout.
///
/// Stores are processed strictly sequentially with a short pacing delay, to
/// stay inside the upstream rate limits. Failures scoped to one batch or one
/// store are logged and counted, never escalated; the run only aborts when
/// the token endpoint rejects the credentials outright or exhausts its retry
/// budget. An interrupt, the run deadline, and the request cap are honored
/// between stores.
///
/// # Errors
///
/// Returns an error if configuration, database connection, or the token
/// lifecycle fail; per-store harvest errors are absorbed into the totals.
pub async fn run_harvest(config: &AppConfig, options: HarvestOptions) -> anyhow::Result<()> {
    let price_date = options.date.unwrap_or_else(|| Utc::now().date_naive());
    let buckets = config.shard_buckets.max(1);
    let shard_index = options
        .shard_index
        .map_or_else(|| shard_for_date(price_date, buckets), |index| index % buckets);

    tracing::info!(%price_date, shard_index, dry_run = options.dry_run, "starting harvest");

    let pool = connect_pool_from_config(config).await?;
    let mut stores = list_active_stores(&pool).await?;
    let products = list_harvestable_products(&pool).await?;

    let catalog: Vec<ProductRef> = products
        .into_iter()
        .filter_map(|p| {
            let product_id = p.product_id?;
            Some(ProductRef {
                upc: p.upc,
                product_id,
            })
        })
        .collect();

    let cohort = select_cohort(&catalog, shard_index, buckets);
    let batch_size = config.product_batch_size.max(1);
    let calls_per_store = cohort.len().div_ceil(batch_size);
    tracing::info!(
        cohort = cohort.len(),
        catalog = catalog.len(),
        calls_per_store,
        "cohort selected"
    );

    if config.store_limit > 0 && stores.len() > config.store_limit {
        stores.truncate(config.store_limit);
        tracing::info!(stores = stores.len(), "store limit active");
    }

    let tokens = build_token_manager(config)?;
    let client = build_client(config)?;

    let deadline = (config.run_deadline_secs > 0)
        .then(|| Instant::now() + Duration::from_secs(config.run_deadline_secs));

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = Arc::clone(&shutdown);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                shutdown.store(true, Ordering::Relaxed);
            }
        });
    }

    let store_count = stores.len();
    let mut totals = RunTotals::default();

    for (index, store) in stores.iter().enumerate() {
        if shutdown.load(Ordering::Relaxed) {
            tracing::info!(
                completed = index,
                of = store_count,
                "interrupt received, stopping between stores"
            );
            break;
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            tracing::info!(
                completed = index,
                of = store_count,
                "run deadline reached, stopping"
            );
            break;
        }
        if config.max_requests > 0 && totals.requests >= config.max_requests {
            tracing::info!(requests = totals.requests, "request cap reached, stopping");
            break;
        }

        // Token failures abort the run; everything else stays scoped to the store.
        let fetch = fetch_store_prices(
            &client,
            &tokens,
            &store.location_id,
            &cohort,
            batch_size,
            price_date,
        )
        .await?;

        totals.requests += fetch.batches.len() as u64;

        if !options.dry_run {
            for outcome in &fetch.batches {
                log_batch_best_effort(&pool, &store.location_id, outcome).await;
            }
        }

        let mut store_failed = fetch.all_batches_failed();

        totals.observations += fetch.observations.len() as u64;
        if !options.dry_run && !fetch.observations.is_empty() {
            match write_price_observations(&pool, &fetch.observations).await {
                Ok(written) => totals.rows_written += written,
                Err(e) => {
                    tracing::error!(
                        location_id = %store.location_id,
                        error = %e,
                        "price write failed, continuing with next store"
                    );
                    store_failed = true;
                }
            }
        }

        if store_failed {
            totals.stores_failed += 1;
        } else {
            totals.stores_processed += 1;
        }

        tracing::info!(
            store = index + 1,
            of = store_count,
            requests = totals.requests,
            rows = totals.rows_written,
            "store complete"
        );

        if index + 1 < store_count && config.inter_store_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(config.inter_store_delay_ms)).await;
        }
    }

    let skipped = store_count - totals.stores_processed - totals.stores_failed;

    // The summary goes to stdout whatever happened store by store.
    println!(
        "Harvest complete. Stores processed: {} | failed: {} | skipped: {} | \
         Est. requests: ~{} | Observations: {} | Rows upserted: {} | Dry-run={}",
        totals.stores_processed,
        totals.stores_failed,
        skipped,
        totals.requests,
        totals.observations,
        totals.rows_written,
        options.dry_run
    );

    Ok(())
}

/// Record one batch outcome in the request log. Log-write failures are
/// swallowed; diagnostics must never take down a harvest.
async fn log_batch_best_effort(pool: &PgPool, location_id: &str, outcome: &BatchOutcome) {
    let target = format!("loc={location_id} pids={}", outcome.requested);
    let status = outcome.status.map(i32::from);
    if let Err(e) = insert_request_log(
        pool,
        "fetch_prices",
        &target,
        status,
        outcome.ok,
        &outcome.message,
    )
    .await
    {
        tracing::warn!(error = %e, "request log write failed");
    }
}
