//! Read-side catalog queries for the `stores` and `products` tables.
//!
//! The harvester treats both tables as externally managed input: rows are
//! seeded by hand or by separate tooling, and a run only ever reads them.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `stores` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoreRow {
    pub id: i64,
    pub location_id: String,
    pub name: Option<String>,
    pub is_active: Option<bool>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A row from the `products` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProductRow {
    pub upc: String,
    pub product_id: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Returns all active stores, ordered by location id.
///
/// A `NULL` `is_active` counts as active so that hand-seeded rows without the
/// flag still get harvested.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_active_stores(pool: &PgPool) -> Result<Vec<StoreRow>, DbError> {
    let rows = sqlx::query_as::<_, StoreRow>(
        "SELECT id, location_id, name, is_active, created_at, updated_at \
         FROM stores \
         WHERE is_active IS NOT FALSE \
         ORDER BY location_id",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Returns all products that can be queried against the API, ordered by UPC.
///
/// Products without a `product_id` cannot appear in a `filter.productId`
/// request and are skipped entirely.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_harvestable_products(pool: &PgPool) -> Result<Vec<ProductRow>, DbError> {
    let rows = sqlx::query_as::<_, ProductRow>(
        "SELECT upc, product_id, description, created_at, updated_at \
         FROM products \
         WHERE product_id IS NOT NULL AND product_id <> '' \
         ORDER BY upc",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
