use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A harvestable catalog entry: the UPC a product is stored under paired
/// with the retailer-side identifier used to query it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRef {
    pub upc: String,
    /// Retailer product ID, sent in `filter.productId` queries. Catalog rows
    /// without one are filtered out before sharding.
    pub product_id: String,
}

/// One per-store price reading, normalized from the retailer's payload.
///
/// This is the unit that flows from the fetcher into storage: a row in
/// `daily_prices` and a candidate row for `latest_prices`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceObservation {
    pub location_id: String,
    pub upc: String,
    /// Calendar date the reading is attributed to (the run date, not a
    /// response timestamp).
    pub observed_date: NaiveDate,
    pub regular_price: Option<Decimal>,
    pub promo_price: Option<Decimal>,
    /// Always `"USD"` today; the API does not report currency.
    pub currency: String,
    /// Origin tag for the reading, e.g. `"kroger_api"`.
    pub source: String,
    /// Raw item JSON as returned by the API, kept for forensics.
    pub raw_payload: serde_json::Value,
}
