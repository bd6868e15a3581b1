//! Sequential `INV-YY-NNNN` bill numbers.
//!
//! The allocator scans the store for the greatest existing number under each
//! prefix a given year has been written with, and returns the highest
//! numeric suffix. Uniqueness is enforced by the store, not here.

use crate::services::store::{Store, StoreError};
use tracing::{debug, instrument};

/// Two-digit years are taken as 20xx.
pub fn normalize_year(year: i32) -> i32 {
    if (0..100).contains(&year) {
        2000 + year
    } else {
        year
    }
}

/// `INV-YY-` for the given (normalised) year.
pub fn canonical_prefix(year: i32) -> String {
    format!("INV-{:02}-", normalize_year(year).rem_euclid(100))
}

/// Every prefix a bill for `year` may have been stored under.
pub fn lookup_prefixes(year: i32) -> [String; 4] {
    let full = normalize_year(year);
    let yy = full.rem_euclid(100);
    [
        format!("INV-{:02}-", yy),
        format!("inv-{:02}-", yy),
        format!("INV-{}-", full),
        format!("inv-{}-", full),
    ]
}

/// Numeric value of the last `-`-delimited segment, 0 when it is not a number.
pub fn parse_suffix(bill_number: &str) -> u64 {
    bill_number
        .rsplit('-')
        .next()
        .and_then(|s| s.parse().ok())
        .unwrap_or(0)
}

/// Canonical number for `suffix`. Suffixes above 9999 print unpadded.
pub fn format_bill_number(year: i32, suffix: u64) -> String {
    format!("{}{:04}", canonical_prefix(year), suffix)
}

/// Highest suffix in use for `year`, or 0.
#[instrument(skip(store))]
pub async fn current_max_suffix(store: &dyn Store, year: i32) -> Result<u64, StoreError> {
    let mut max = 0;
    for prefix in lookup_prefixes(year) {
        if let Some(number) = store.max_bill_number_with_prefix(&prefix).await? {
            let suffix = parse_suffix(&number);
            debug!(prefix = %prefix, bill_number = %number, suffix, "Found existing bill number");
            max = max.max(suffix);
        }
    }
    Ok(max)
}
