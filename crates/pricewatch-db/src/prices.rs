//! Write path for the `daily_prices` history table and the derived
//! `latest_prices` snapshot.

use std::collections::{hash_map::Entry, HashMap};

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::DbError;
use pricewatch_core::PriceObservation;

/// Upper bound on rows per statement, to keep statement size and bind-array
/// length reasonable.
const WRITE_CHUNK_SIZE: usize = 500;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `daily_prices` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DailyPriceRow {
    pub location_id: String,
    pub upc: String,
    pub price_date: NaiveDate,
    pub regular_price: Option<Decimal>,
    pub promo_price: Option<Decimal>,
    pub currency: String,
    pub price_source: String,
    pub raw_payload: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A row from the `latest_prices` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LatestPriceRow {
    pub location_id: String,
    pub upc: String,
    pub price_date: NaiveDate,
    pub regular_price: Option<Decimal>,
    pub promo_price: Option<Decimal>,
    pub currency: String,
    pub price_source: String,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

/// Upsert a batch of observations into `daily_prices` and `latest_prices`.
///
/// Returns the number of history rows written. No-op on empty input.
///
/// Rows are written in chunks of [`WRITE_CHUNK_SIZE`], each chunk in one
/// transaction covering both tables, using `INSERT … SELECT * FROM UNNEST(…)
/// ON CONFLICT` so a chunk is upserted in one round-trip per table. Prices are
/// bound as `Option<Decimal>` slices and cast to `NUMERIC(10,2)[]` inside the
/// SQL statement so the database engine performs the coercion consistently.
///
/// Re-writing the same `(location_id, upc, price_date)` overwrites the history
/// row in place. The snapshot row only moves forward: the conflict update
/// carries a `WHERE EXCLUDED.price_date >= latest_prices.price_date` guard, so
/// a late-arriving older observation can never clobber a newer snapshot, even
/// across concurrent writers.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any statement in a chunk fails; the failed
/// chunk's transaction rolls back as a unit, leaving earlier chunks committed.
pub async fn write_price_observations(
    pool: &PgPool,
    observations: &[PriceObservation],
) -> Result<u64, DbError> {
    if observations.is_empty() {
        return Ok(0);
    }

    // Postgres rejects a statement whose ON CONFLICT update would touch the
    // same row twice, so duplicates must be collapsed before binding. The last
    // observation for a history key wins, keeping its first-seen position.
    let mut seen: HashMap<(&str, &str, NaiveDate), usize> = HashMap::new();
    let mut deduped: Vec<&PriceObservation> = Vec::with_capacity(observations.len());
    for obs in observations {
        let key = (obs.location_id.as_str(), obs.upc.as_str(), obs.observed_date);
        match seen.entry(key) {
            Entry::Occupied(slot) => deduped[*slot.get()] = obs,
            Entry::Vacant(slot) => {
                slot.insert(deduped.len());
                deduped.push(obs);
            }
        }
    }

    let mut rows_written = 0_u64;

    for chunk in deduped.chunks(WRITE_CHUNK_SIZE) {
        let mut tx = pool.begin().await?;

        rows_written += upsert_daily_chunk(&mut tx, chunk).await?;
        upsert_latest_chunk(&mut tx, &latest_candidates(chunk)).await?;

        tx.commit().await?;
    }

    Ok(rows_written)
}

/// Collapse a chunk to one observation per `(location_id, upc)`, keeping the
/// newest date. One snapshot statement cannot update the same key twice; the
/// `>=` guard in the SQL resolves ordering across chunks and writers.
fn latest_candidates<'a>(chunk: &[&'a PriceObservation]) -> Vec<&'a PriceObservation> {
    let mut seen: HashMap<(&str, &str), usize> = HashMap::new();
    let mut candidates: Vec<&PriceObservation> = Vec::with_capacity(chunk.len());
    for obs in chunk {
        let key = (obs.location_id.as_str(), obs.upc.as_str());
        match seen.entry(key) {
            Entry::Occupied(slot) => {
                let slot = *slot.get();
                if obs.observed_date >= candidates[slot].observed_date {
                    candidates[slot] = obs;
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(candidates.len());
                candidates.push(obs);
            }
        }
    }
    candidates
}

async fn upsert_daily_chunk(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    chunk: &[&PriceObservation],
) -> Result<u64, DbError> {
    // Collect each column into a parallel Vec for UNNEST binding.
    let mut location_ids: Vec<String> = Vec::with_capacity(chunk.len());
    let mut upcs: Vec<String> = Vec::with_capacity(chunk.len());
    let mut price_dates: Vec<NaiveDate> = Vec::with_capacity(chunk.len());
    let mut regular_prices: Vec<Option<Decimal>> = Vec::with_capacity(chunk.len());
    let mut promo_prices: Vec<Option<Decimal>> = Vec::with_capacity(chunk.len());
    let mut currencies: Vec<String> = Vec::with_capacity(chunk.len());
    let mut price_sources: Vec<String> = Vec::with_capacity(chunk.len());
    let mut raw_payloads: Vec<serde_json::Value> = Vec::with_capacity(chunk.len());

    for obs in chunk {
        location_ids.push(obs.location_id.clone());
        upcs.push(obs.upc.clone());
        price_dates.push(obs.observed_date);
        regular_prices.push(obs.regular_price);
        promo_prices.push(obs.promo_price);
        currencies.push(obs.currency.clone());
        price_sources.push(obs.source.clone());
        raw_payloads.push(obs.raw_payload.clone());
    }

    let rows_affected = sqlx::query(
        "INSERT INTO daily_prices \
             (location_id, upc, price_date, regular_price, promo_price, \
              currency, price_source, raw_payload) \
         SELECT * FROM UNNEST(\
              $1::text[], $2::text[], $3::date[], $4::numeric(10,2)[], \
              $5::numeric(10,2)[], $6::text[], $7::text[], $8::jsonb[]) \
         ON CONFLICT (location_id, upc, price_date) DO UPDATE SET \
             regular_price = EXCLUDED.regular_price, \
             promo_price   = EXCLUDED.promo_price, \
             currency      = EXCLUDED.currency, \
             price_source  = EXCLUDED.price_source, \
             raw_payload   = EXCLUDED.raw_payload, \
             updated_at    = NOW()",
    )
    .bind(&location_ids)
    .bind(&upcs)
    .bind(&price_dates)
    .bind(&regular_prices)
    .bind(&promo_prices)
    .bind(&currencies)
    .bind(&price_sources)
    .bind(&raw_payloads)
    .execute(&mut **tx)
    .await?
    .rows_affected();

    Ok(rows_affected)
}

async fn upsert_latest_chunk(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    candidates: &[&PriceObservation],
) -> Result<(), DbError> {
    if candidates.is_empty() {
        return Ok(());
    }

    let mut location_ids: Vec<String> = Vec::with_capacity(candidates.len());
    let mut upcs: Vec<String> = Vec::with_capacity(candidates.len());
    let mut price_dates: Vec<NaiveDate> = Vec::with_capacity(candidates.len());
    let mut regular_prices: Vec<Option<Decimal>> = Vec::with_capacity(candidates.len());
    let mut promo_prices: Vec<Option<Decimal>> = Vec::with_capacity(candidates.len());
    let mut currencies: Vec<String> = Vec::with_capacity(candidates.len());
    let mut price_sources: Vec<String> = Vec::with_capacity(candidates.len());

    for obs in candidates {
        location_ids.push(obs.location_id.clone());
        upcs.push(obs.upc.clone());
        price_dates.push(obs.observed_date);
        regular_prices.push(obs.regular_price);
        promo_prices.push(obs.promo_price);
        currencies.push(obs.currency.clone());
        price_sources.push(obs.source.clone());
    }

    sqlx::query(
        "INSERT INTO latest_prices \
             (location_id, upc, price_date, regular_price, promo_price, \
              currency, price_source) \
         SELECT * FROM UNNEST(\
              $1::text[], $2::text[], $3::date[], $4::numeric(10,2)[], \
              $5::numeric(10,2)[], $6::text[], $7::text[]) \
         ON CONFLICT (location_id, upc) DO UPDATE SET \
             price_date    = EXCLUDED.price_date, \
             regular_price = EXCLUDED.regular_price, \
             promo_price   = EXCLUDED.promo_price, \
             currency      = EXCLUDED.currency, \
             price_source  = EXCLUDED.price_source, \
             updated_at    = NOW() \
         WHERE EXCLUDED.price_date >= latest_prices.price_date",
    )
    .bind(&location_ids)
    .bind(&upcs)
    .bind(&price_dates)
    .bind(&regular_prices)
    .bind(&promo_prices)
    .bind(&currencies)
    .bind(&price_sources)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// Returns the history row for one `(store, product, day)`, or `None`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_daily_price(
    pool: &PgPool,
    location_id: &str,
    upc: &str,
    price_date: NaiveDate,
) -> Result<Option<DailyPriceRow>, DbError> {
    let row = sqlx::query_as::<_, DailyPriceRow>(
        "SELECT location_id, upc, price_date, regular_price, promo_price, \
                currency, price_source, raw_payload, created_at, updated_at \
         FROM daily_prices \
         WHERE location_id = $1 AND upc = $2 AND price_date = $3",
    )
    .bind(location_id)
    .bind(upc)
    .bind(price_date)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Returns the snapshot row for one `(store, product)`, or `None`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_latest_price(
    pool: &PgPool,
    location_id: &str,
    upc: &str,
) -> Result<Option<LatestPriceRow>, DbError> {
    let row = sqlx::query_as::<_, LatestPriceRow>(
        "SELECT location_id, upc, price_date, regular_price, promo_price, \
                currency, price_source, updated_at \
         FROM latest_prices \
         WHERE location_id = $1 AND upc = $2",
    )
    .bind(location_id)
    .bind(upc)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}
