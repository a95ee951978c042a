//! Lenient normalization of product payloads into price observations.
//!
//! The API's response shape has drifted across revisions: item arrays appear
//! under `data` or `items`, product ids under `productId` or `productID`,
//! prices nested in variant items or at the item level, as objects or bare
//! numbers, with promos called `promo` or `sale`. Normalization accepts all
//! of it. A malformed item costs one warning and one skipped row, a
//! malformed price becomes NULL; neither ever fails the run.

use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::Value;

use pricewatch_core::{PriceObservation, ProductRef};

/// Source tag stamped on every observation.
pub const PRICE_SOURCE: &str = "kroger_api";

/// The API does not state a currency; all prices are US dollars.
pub const CURRENCY: &str = "USD";

/// Result of coercing a single price node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoercedPrice {
    /// No price node present.
    Absent,
    /// A node was present but not interpretable as a number.
    Unparseable,
    /// A usable price.
    Value(Decimal),
}

impl CoercedPrice {
    fn into_option(self) -> Option<Decimal> {
        match self {
            CoercedPrice::Value(d) => Some(d),
            CoercedPrice::Absent | CoercedPrice::Unparseable => None,
        }
    }
}

/// Coerces one JSON node into a price.
///
/// Numbers and numeric strings (`"3.99"`) both count; anything else is
/// [`CoercedPrice::Unparseable`] and is stored as NULL.
#[must_use]
pub fn coerce_price(node: Option<&Value>) -> CoercedPrice {
    match node {
        None | Some(Value::Null) => CoercedPrice::Absent,
        Some(Value::Number(n)) => n
            .to_string()
            .parse::<Decimal>()
            .map_or(CoercedPrice::Unparseable, CoercedPrice::Value),
        Some(Value::String(s)) => s
            .trim()
            .parse::<Decimal>()
            .map_or(CoercedPrice::Unparseable, CoercedPrice::Value),
        Some(_) => CoercedPrice::Unparseable,
    }
}

/// Normalizes one response body into observations for a store.
///
/// `group` is the batch the request asked for; its pid-to-upc mapping
/// supplies the UPC when the response item lacks one. Items that resolve to
/// no UPC at all are skipped with a warning.
#[must_use]
pub fn normalize_page(
    body: &Value,
    group: &[ProductRef],
    location_id: &str,
    observed_date: NaiveDate,
) -> Vec<PriceObservation> {
    let upc_by_pid: HashMap<&str, &str> = group
        .iter()
        .map(|p| (p.product_id.as_str(), p.upc.as_str()))
        .collect();

    let mut observations = Vec::new();
    for item in item_array(body) {
        let product_id = item
            .get("productId")
            .or_else(|| item.get("productID"))
            .and_then(Value::as_str);

        let upc = item
            .get("upc")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .or_else(|| product_id.and_then(|pid| upc_by_pid.get(pid).copied()));

        let Some(upc) = upc else {
            tracing::warn!(location_id, ?product_id, "item resolves to no UPC, skipping");
            continue;
        };

        let (regular, promo) = extract_prices(price_node(item));
        if regular == CoercedPrice::Unparseable || promo == CoercedPrice::Unparseable {
            tracing::warn!(location_id, upc, "unparseable price value, storing NULL");
        }

        observations.push(PriceObservation {
            location_id: location_id.to_owned(),
            upc: upc.to_owned(),
            observed_date,
            regular_price: regular.into_option(),
            promo_price: promo.into_option(),
            currency: CURRENCY.to_owned(),
            source: PRICE_SOURCE.to_owned(),
            raw_payload: item.clone(),
        });
    }
    observations
}

/// Returns the item array at `data` or `items`, or empty when neither key
/// holds an array.
fn item_array(body: &Value) -> &[Value] {
    body.get("data")
        .and_then(Value::as_array)
        .or_else(|| body.get("items").and_then(Value::as_array))
        .map_or(&[], Vec::as_slice)
}

/// Locates the price node for an item: the first variant's `price` when the
/// item carries a variant array, otherwise the item-level `price`. Explicit
/// JSON nulls count as missing, matching how the API reports "no price at
/// this store".
fn price_node(item: &Value) -> Option<&Value> {
    let variant_price = item
        .get("items")
        .and_then(Value::as_array)
        .and_then(|a| a.first())
        .and_then(|v| v.get("price"))
        .filter(|p| !p.is_null());

    variant_price
        .or_else(|| item.get("price"))
        .filter(|p| !p.is_null())
}

/// Splits a price node into (regular, promo).
///
/// Objects use `regular` plus `promo`, falling back to `sale` when the
/// `promo` key is absent or null; a bare number or string is a regular
/// price with no promo.
fn extract_prices(node: Option<&Value>) -> (CoercedPrice, CoercedPrice) {
    match node {
        Some(Value::Object(map)) => {
            let regular = coerce_price(map.get("regular"));
            let promo = match map.get("promo").filter(|p| !p.is_null()) {
                Some(p) => coerce_price(Some(p)),
                None => coerce_price(map.get("sale")),
            };
            (regular, promo)
        }
        other => (coerce_price(other), CoercedPrice::Absent),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group() -> Vec<ProductRef> {
        vec![
            ProductRef {
                upc: "0001111041700".to_owned(),
                product_id: "0001111041700".to_owned(),
            },
            ProductRef {
                upc: "0007680828001".to_owned(),
                product_id: "9999999999999".to_owned(),
            },
        ]
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 25).unwrap()
    }

    /// Helper: parse a decimal literal.
    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn coerce_price_absent() {
        assert_eq!(coerce_price(None), CoercedPrice::Absent);
        assert_eq!(coerce_price(Some(&Value::Null)), CoercedPrice::Absent);
    }

    #[test]
    fn coerce_price_number() {
        let v = serde_json::json!(3.99);
        assert_eq!(coerce_price(Some(&v)), CoercedPrice::Value(dec("3.99")));
        let v = serde_json::json!(4);
        assert_eq!(coerce_price(Some(&v)), CoercedPrice::Value(dec("4")));
    }

    #[test]
    fn coerce_price_numeric_string() {
        let v = serde_json::json!("3.99");
        assert_eq!(coerce_price(Some(&v)), CoercedPrice::Value(dec("3.99")));
        let v = serde_json::json!(" 2.50 ");
        assert_eq!(coerce_price(Some(&v)), CoercedPrice::Value(dec("2.50")));
    }

    #[test]
    fn coerce_price_garbage_is_unparseable() {
        let v = serde_json::json!("n/a");
        assert_eq!(coerce_price(Some(&v)), CoercedPrice::Unparseable);
        let v = serde_json::json!([1, 2]);
        assert_eq!(coerce_price(Some(&v)), CoercedPrice::Unparseable);
    }

    #[test]
    fn items_found_under_data_key() {
        let body = serde_json::json!({
            "data": [
                {"productId": "0001111041700", "upc": "0001111041700",
                 "items": [{"price": {"regular": 3.99, "promo": 2.99}}]}
            ]
        });
        let obs = normalize_page(&body, &group(), "01400441", date());
        assert_eq!(obs.len(), 1);
        assert_eq!(obs[0].upc, "0001111041700");
        assert_eq!(obs[0].regular_price, Some(dec("3.99")));
        assert_eq!(obs[0].promo_price, Some(dec("2.99")));
        assert_eq!(obs[0].currency, "USD");
        assert_eq!(obs[0].source, "kroger_api");
    }

    #[test]
    fn items_found_under_items_key() {
        let body = serde_json::json!({
            "items": [
                {"productId": "0001111041700", "upc": "0001111041700", "price": 1.25}
            ]
        });
        let obs = normalize_page(&body, &group(), "01400441", date());
        assert_eq!(obs.len(), 1);
        assert_eq!(obs[0].regular_price, Some(dec("1.25")));
        assert_eq!(obs[0].promo_price, None);
    }

    #[test]
    fn missing_item_array_yields_empty() {
        let body = serde_json::json!({"meta": {"pagination": {"total": 0}}});
        assert!(normalize_page(&body, &group(), "01400441", date()).is_empty());
        assert!(normalize_page(&Value::Null, &group(), "01400441", date()).is_empty());
    }

    #[test]
    fn product_id_capital_d_alias_is_accepted() {
        let body = serde_json::json!({
            "data": [
                {"productID": "0001111041700", "upc": "0001111041700", "price": "2.19"}
            ]
        });
        let obs = normalize_page(&body, &group(), "01400441", date());
        assert_eq!(obs.len(), 1);
        assert_eq!(obs[0].regular_price, Some(dec("2.19")));
    }

    #[test]
    fn missing_upc_falls_back_to_requested_group() {
        // pid 9999999999999 maps back to upc 0007680828001 in the group
        let body = serde_json::json!({
            "data": [
                {"productId": "9999999999999", "price": {"regular": 5.49}}
            ]
        });
        let obs = normalize_page(&body, &group(), "01400441", date());
        assert_eq!(obs.len(), 1);
        assert_eq!(obs[0].upc, "0007680828001");
    }

    #[test]
    fn empty_upc_string_falls_back_to_requested_group() {
        let body = serde_json::json!({
            "data": [
                {"productId": "9999999999999", "upc": "", "price": 5.49}
            ]
        });
        let obs = normalize_page(&body, &group(), "01400441", date());
        assert_eq!(obs.len(), 1);
        assert_eq!(obs[0].upc, "0007680828001");
    }

    #[test]
    fn item_with_no_resolvable_upc_is_skipped() {
        let body = serde_json::json!({
            "data": [
                {"productId": "unknown-pid", "price": 5.49},
                {"description": "no identifiers at all"}
            ]
        });
        assert!(normalize_page(&body, &group(), "01400441", date()).is_empty());
    }

    #[test]
    fn variant_price_wins_over_item_price() {
        let body = serde_json::json!({
            "data": [
                {"productId": "0001111041700", "upc": "0001111041700",
                 "price": 9.99,
                 "items": [{"price": {"regular": 3.99}}]}
            ]
        });
        let obs = normalize_page(&body, &group(), "01400441", date());
        assert_eq!(obs[0].regular_price, Some(dec("3.99")));
    }

    #[test]
    fn null_variant_price_falls_back_to_item_price() {
        let body = serde_json::json!({
            "data": [
                {"productId": "0001111041700", "upc": "0001111041700",
                 "price": 9.99,
                 "items": [{"price": null}]}
            ]
        });
        let obs = normalize_page(&body, &group(), "01400441", date());
        assert_eq!(obs[0].regular_price, Some(dec("9.99")));
    }

    #[test]
    fn sale_key_stands_in_for_promo() {
        let body = serde_json::json!({
            "data": [
                {"productId": "0001111041700", "upc": "0001111041700",
                 "price": {"regular": 4.99, "sale": 3.49}}
            ]
        });
        let obs = normalize_page(&body, &group(), "01400441", date());
        assert_eq!(obs[0].promo_price, Some(dec("3.49")));
    }

    #[test]
    fn null_promo_falls_back_to_sale() {
        let body = serde_json::json!({
            "data": [
                {"productId": "0001111041700", "upc": "0001111041700",
                 "price": {"regular": 4.99, "promo": null, "sale": 3.49}}
            ]
        });
        let obs = normalize_page(&body, &group(), "01400441", date());
        assert_eq!(obs[0].promo_price, Some(dec("3.49")));
    }

    #[test]
    fn unparseable_price_keeps_row_with_null_prices() {
        let body = serde_json::json!({
            "data": [
                {"productId": "0001111041700", "upc": "0001111041700",
                 "price": {"regular": "call for price", "promo": 1.99}}
            ]
        });
        let obs = normalize_page(&body, &group(), "01400441", date());
        assert_eq!(obs.len(), 1);
        assert_eq!(obs[0].regular_price, None);
        assert_eq!(obs[0].promo_price, Some(dec("1.99")));
    }

    #[test]
    fn missing_price_keeps_row_with_null_prices() {
        let body = serde_json::json!({
            "data": [
                {"productId": "0001111041700", "upc": "0001111041700"}
            ]
        });
        let obs = normalize_page(&body, &group(), "01400441", date());
        assert_eq!(obs.len(), 1);
        assert_eq!(obs[0].regular_price, None);
        assert_eq!(obs[0].promo_price, None);
    }

    #[test]
    fn raw_payload_carries_the_item() {
        let body = serde_json::json!({
            "data": [
                {"productId": "0001111041700", "upc": "0001111041700",
                 "description": "Kroger 2% Milk", "price": 2.89}
            ]
        });
        let obs = normalize_page(&body, &group(), "01400441", date());
        assert_eq!(obs[0].raw_payload["description"], "Kroger 2% Milk");
    }
}
