//! Deterministic catalog sharding.
//!
//! Every run covers one shard of the product catalog, derived from the run
//! date, so that over `bucket_count` consecutive days the whole catalog is
//! harvested exactly once. Bucketing must be stable across processes and
//! deploys, so it hashes with SHA-256 rather than the std hasher (which is
//! seeded per process).

use chrono::{Datelike, NaiveDate};
use sha2::{Digest, Sha256};

use crate::ProductRef;

/// Bucket index for a UPC: first four bytes of the SHA-256 digest of the
/// UPC string, big-endian, modulo the bucket count.
///
/// A bucket count of zero is treated as one, so every product lands in
/// bucket 0 and a misconfigured run still harvests everything.
#[must_use]
pub fn upc_bucket(upc: &str, bucket_count: u32) -> u32 {
    let buckets = bucket_count.max(1);
    let hash = Sha256::digest(upc.as_bytes());
    let bytes: [u8; 4] = hash[..4]
        .try_into()
        .expect("SHA-256 digest is at least 4 bytes");
    u32::from_be_bytes(bytes) % buckets
}

/// Shard index for a calendar date: the proleptic-Gregorian ordinal day
/// number modulo the bucket count, so consecutive days walk the buckets in
/// order and wrap.
#[must_use]
pub fn shard_for_date(date: NaiveDate, bucket_count: u32) -> u32 {
    let buckets = i64::from(bucket_count.max(1));
    let shard = i64::from(date.num_days_from_ce()).rem_euclid(buckets);
    u32::try_from(shard).expect("shard index is below the bucket count")
}

/// Products whose UPC hashes into `shard_index` under `bucket_count`
/// buckets. An empty result is valid and yields an empty harvest.
#[must_use]
pub fn select_cohort(
    products: &[ProductRef],
    shard_index: u32,
    bucket_count: u32,
) -> Vec<ProductRef> {
    products
        .iter()
        .filter(|p| upc_bucket(&p.upc, bucket_count) == shard_index)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn synthetic_catalog(n: usize) -> Vec<ProductRef> {
        (0..n)
            .map(|i| ProductRef {
                upc: format!("00011110{i:05}"),
                product_id: format!("{i:013}"),
            })
            .collect()
    }

    #[test]
    fn upc_bucket_is_stable_for_known_upcs() {
        // Pinned values; a change here means every deployed shard moves.
        assert_eq!(upc_bucket("0001111041700", 3), 3_979_843_017 % 3);
        assert_eq!(upc_bucket("0001111060903", 3), 4_190_359_406 % 3);
        assert_eq!(upc_bucket("0007680828001", 3), 630_996_865 % 3);
    }

    #[test]
    fn upc_bucket_is_deterministic_across_calls() {
        for upc in ["0001111041700", "0007680828001", ""] {
            assert_eq!(upc_bucket(upc, 7), upc_bucket(upc, 7));
        }
    }

    #[test]
    fn upc_bucket_stays_below_bucket_count() {
        for p in synthetic_catalog(200) {
            assert!(upc_bucket(&p.upc, 3) < 3);
            assert!(upc_bucket(&p.upc, 10) < 10);
        }
    }

    #[test]
    fn zero_bucket_count_collapses_to_single_bucket() {
        assert_eq!(upc_bucket("0001111041700", 0), 0);
        assert_eq!(upc_bucket("0007680828001", 0), 0);
        let catalog = synthetic_catalog(25);
        assert_eq!(select_cohort(&catalog, 0, 0).len(), catalog.len());
    }

    #[test]
    fn shard_for_date_matches_ordinal_modulo() {
        // 2026-08-25 has ordinal day 739853.
        let date = NaiveDate::from_ymd_opt(2026, 8, 25).unwrap();
        assert_eq!(i64::from(date.num_days_from_ce()), 739_853);
        assert_eq!(shard_for_date(date, 3), (739_853 % 3) as u32);
        assert_eq!(shard_for_date(date, 3), 2);

        let date = NaiveDate::from_ymd_opt(2015, 9, 18).unwrap();
        assert_eq!(shard_for_date(date, 3), (735_859 % 3) as u32);
    }

    #[test]
    fn consecutive_days_advance_the_shard() {
        let start = NaiveDate::from_ymd_opt(2026, 8, 25).unwrap();
        let a = shard_for_date(start, 3);
        let b = shard_for_date(start.succ_opt().unwrap(), 3);
        assert_eq!(b, (a + 1) % 3);
    }

    #[test]
    fn three_consecutive_days_cover_the_catalog_exactly_once() {
        let catalog = synthetic_catalog(100);
        let start = NaiveDate::from_ymd_opt(2026, 8, 25).unwrap();

        let mut seen: HashSet<String> = HashSet::new();
        let mut total = 0usize;
        for offset in 0..3u64 {
            let date = start + chrono::Days::new(offset);
            let shard = shard_for_date(date, 3);
            for p in select_cohort(&catalog, shard, 3) {
                assert!(seen.insert(p.upc.clone()), "upc selected twice: {}", p.upc);
                total += 1;
            }
        }
        assert_eq!(total, catalog.len());
        assert_eq!(seen.len(), catalog.len());
    }

    #[test]
    fn select_cohort_on_empty_catalog_is_empty() {
        assert!(select_cohort(&[], 0, 3).is_empty());
    }
}
