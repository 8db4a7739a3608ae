//! Order counting with the post-open time-bucket correction.
//!
//! Counting distinct order references over-counts once the market has
//! been open past the cutoff, because several prints can be fragments of
//! one logical order that the raw reference does not collapse. After the
//! cutoff, prints sharing an exact time of day are treated as one order:
//! only the first print of each time bucket contributes its reference.

use std::collections::{HashMap, HashSet};

/// Cutoff compared on the HHMM prefix of the trade time.
pub const ORDER_CUTOFF_HHMM: &str = "0858";

/// Naive and corrected distinct-order counts for one side of a
/// (broker, instrument) pair. Both are kept so downstream reports can
/// show the correction alongside the raw figure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OrderCounts {
    pub raw: usize,
    pub corrected: usize,
}

/// Normalize `HHMMSS` or `HH:MM:SS` to `HH:MM:SS`; returns the input
/// unchanged when it matches neither shape.
pub fn normalize_time(raw: &str) -> String {
    let trimmed = raw.trim();
    let digits: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() == 6 && (trimmed.len() == 6 || trimmed.len() == 8) {
        format!("{}:{}:{}", &digits[0..2], &digits[2..4], &digits[4..6])
    } else {
        trimmed.to_string()
    }
}

fn hhmm_prefix(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter(|c| c.is_ascii_digit())
        .take(4)
        .collect()
}

fn is_after_cutoff(raw_time: &str) -> bool {
    let prefix = hhmm_prefix(raw_time);
    prefix.len() == 4 && prefix.as_str() >= ORDER_CUTOFF_HHMM
}

/// Count distinct orders for one side given `(trade_time, order_ref)`
/// pairs, in tape order.
///
/// Before-cutoff references count individually. At or after the cutoff,
/// prints are bucketed by normalized time of day and each bucket
/// contributes the reference of its first print only; a before-cutoff
/// reference that already appears among the bucket representatives is
/// not counted again.
pub fn corrected_order_count<I>(side: I) -> OrderCounts
where
    I: IntoIterator<Item = (String, i64)>,
{
    let mut raw_refs: HashSet<i64> = HashSet::new();
    let mut before_refs: HashSet<i64> = HashSet::new();
    let mut bucket_reps: HashMap<String, i64> = HashMap::new();

    for (time, order_ref) in side {
        raw_refs.insert(order_ref);
        if is_after_cutoff(&time) {
            bucket_reps
                .entry(normalize_time(&time))
                .or_insert(order_ref);
        } else {
            before_refs.insert(order_ref);
        }
    }

    let mut union: HashSet<i64> = bucket_reps.into_values().collect();
    union.extend(before_refs);

    OrderCounts {
        raw: raw_refs.len(),
        corrected: union.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn side(rows: &[(&str, i64)]) -> Vec<(String, i64)> {
        rows.iter().map(|(t, r)| (t.to_string(), *r)).collect()
    }

    #[test]
    fn single_bucket_collapses_to_one_regardless_of_size() {
        for n in [1, 2, 10, 500] {
            let rows: Vec<(String, i64)> =
                (0..n).map(|_| ("09:15:00".to_string(), 42)).collect();
            let counts = corrected_order_count(rows);
            assert_eq!(counts.corrected, 1, "n={n}");
            assert_eq!(counts.raw, 1);
        }
    }

    #[test]
    fn before_cutoff_references_count_individually() {
        let counts = corrected_order_count(side(&[
            ("083000", 1),
            ("083000", 2),
            ("084500", 3),
        ]));
        assert_eq!(counts.raw, 3);
        assert_eq!(counts.corrected, 3);
    }

    #[test]
    fn after_cutoff_buckets_take_first_reference_only() {
        // Two buckets after the cutoff; refs 11 and 12 share 09:00:00.
        let counts = corrected_order_count(side(&[
            ("090000", 11),
            ("090000", 12),
            ("090001", 13),
        ]));
        assert_eq!(counts.raw, 3);
        assert_eq!(counts.corrected, 2);
    }

    #[test]
    fn before_cutoff_reference_seen_after_cutoff_is_not_double_counted() {
        let counts = corrected_order_count(side(&[
            ("083000", 7),
            ("090000", 7),
            ("090100", 8),
        ]));
        assert_eq!(counts.raw, 2);
        assert_eq!(counts.corrected, 2);
    }

    #[test]
    fn cutoff_compares_on_hhmm_prefix() {
        // 08:58:xx is already after the cutoff: same-second prints
        // collapse into one bucket.
        let counts = corrected_order_count(side(&[("085810", 1), ("085810", 2)]));
        assert_eq!(counts.corrected, 1);

        // Distinct seconds after the cutoff stay distinct buckets.
        let counts = corrected_order_count(side(&[("085810", 1), ("085859", 2)]));
        assert_eq!(counts.corrected, 2);

        // 08:57:xx is before the cutoff: references count individually
        // with no bucketing at all.
        let counts = corrected_order_count(side(&[("085759", 1), ("085759", 2)]));
        assert_eq!(counts.corrected, 2);
    }

    #[test]
    fn colon_and_compact_times_share_buckets() {
        let counts = corrected_order_count(side(&[("09:00:00", 1), ("090000", 2)]));
        assert_eq!(counts.corrected, 1);
    }

    #[test]
    fn normalize_time_handles_both_forms() {
        assert_eq!(normalize_time("090102"), "09:01:02");
        assert_eq!(normalize_time("09:01:02"), "09:01:02");
        assert_eq!(normalize_time(" 090102 "), "09:01:02");
    }
}
