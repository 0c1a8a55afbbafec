//! Output ordering: newest year first, then most cited.

use crate::record::PublicationRecord;
use std::cmp::Reverse;

/// Year as a sort key; anything that is not a plain non-negative integer counts as 0.
pub fn year_key(year: &str) -> u64 {
    let year = year.trim();
    if year.is_empty() || !year.bytes().all(|b| b.is_ascii_digit()) {
        return 0;
    }
    year.parse().unwrap_or(0)
}

/// Sort records by year descending, then citations descending.
///
/// The sort is stable, so ties keep their incoming order.
pub fn sort_records(records: &mut [PublicationRecord]) {
    records.sort_by_key(|r| (Reverse(year_key(&r.year)), Reverse(r.citations)));
}
