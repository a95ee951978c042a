//! Best-effort diagnostics log for upstream API calls.
//!
//! One row per logical request. Callers are expected to swallow insert
//! failures; losing a log row must never affect the harvest itself.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

/// Hard cap on stored message length, in characters. Response bodies can be
/// arbitrarily large; anything past this is noise for diagnostics.
const MESSAGE_MAX_CHARS: usize = 9000;

/// A row from the `request_log` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RequestLogRow {
    pub id: i64,
    pub op: String,
    pub target: Option<String>,
    pub status_code: Option<i32>,
    pub ok: bool,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Insert one diagnostics row, truncating `message` to [`MESSAGE_MAX_CHARS`].
/// An empty message is stored as NULL.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_request_log(
    pool: &PgPool,
    op: &str,
    target: &str,
    status_code: Option<i32>,
    ok: bool,
    message: &str,
) -> Result<(), DbError> {
    let message: Option<String> = if message.is_empty() {
        None
    } else {
        Some(message.chars().take(MESSAGE_MAX_CHARS).collect())
    };

    sqlx::query(
        "INSERT INTO request_log (op, target, status_code, ok, message) \
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(op)
    .bind(target)
    .bind(status_code)
    .bind(ok)
    .bind(message)
    .execute(pool)
    .await?;

    Ok(())
}
