//! Fetch planning over a date range

use crate::snapshot::SnapshotStatus;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::debug;

/// Status of every date that has a readable snapshot on record
pub type SnapshotIndex = BTreeMap<NaiveDate, SnapshotStatus>;

/// Inclusive range of dates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Dates in the range, ascending. Empty when `end` is before `start`.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.start.iter_days().take_while(move |day| *day <= self.end)
    }
}

/// Dates in `range` that still lack a final snapshot
///
/// Dates with no snapshot or with an empty one are planned, oldest first,
/// up to `max_days` per run.
pub fn plan_fetch(range: &DateRange, existing: &SnapshotIndex, max_days: usize) -> Vec<NaiveDate> {
    let planned: Vec<NaiveDate> = range
        .days()
        .filter(|day| !existing.get(day).is_some_and(SnapshotStatus::is_final))
        .take(max_days)
        .collect();

    debug!(
        "Planned {} dates between {} and {} (cap {})",
        planned.len(),
        range.start,
        range.end,
        max_days
    );
    planned
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, d).unwrap()
    }

    #[test]
    fn test_plan_skips_final_and_retries_empty() {
        let mut existing = SnapshotIndex::new();
        existing.insert(day(1), SnapshotStatus::FetchedNonEmpty);
        existing.insert(day(2), SnapshotStatus::FetchedNonEmpty);
        existing.insert(day(3), SnapshotStatus::FetchedEmpty);

        let planned = plan_fetch(&DateRange::new(day(1), day(4)), &existing, 10);
        assert_eq!(planned, vec![day(3), day(4)]);
    }

    #[test]
    fn test_plan_respects_cap_oldest_first() {
        let planned = plan_fetch(&DateRange::new(day(1), day(20)), &SnapshotIndex::new(), 5);
        assert_eq!(planned, vec![day(1), day(2), day(3), day(4), day(5)]);
    }

    #[test]
    fn test_inverted_range_plans_nothing() {
        let planned = plan_fetch(&DateRange::new(day(5), day(1)), &SnapshotIndex::new(), 5);
        assert!(planned.is_empty());
    }

    #[test]
    fn test_single_day_range() {
        let range = DateRange::new(day(7), day(7));
        assert_eq!(range.days().collect::<Vec<_>>(), vec![day(7)]);
    }
}
