use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use snapshot_store::{Snapshot, StatObservation};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info};

/// Daily increment for one entity, stat and date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeltaRecord {
    pub entity_key: String,
    pub stat_id: String,
    pub date: NaiveDate,

    /// Season-to-date total as of `date`
    pub cumulative_value: f64,

    /// Change since the previous observed date (the total itself on the first)
    pub daily_value: f64,

    /// Name the stat response carried
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// Counts describing one delta computation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaSummary {
    /// Distinct (entity_key, stat_id) series with at least one numeric value
    pub series: usize,

    /// Delta records produced
    pub records: usize,

    /// Observations left out because their value was not numeric
    pub skipped_unparsable: usize,

    /// Repeated (entity_key, stat_id, date) observations left out
    pub duplicates_dropped: usize,

    /// Deltas below zero (upstream stat corrections)
    pub negative_deltas: usize,
}

impl fmt::Display for DeltaSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} records across {} series ({} unparsable skipped, {} duplicates dropped, {} negative)",
            self.records,
            self.series,
            self.skipped_unparsable,
            self.duplicates_dropped,
            self.negative_deltas
        )
    }
}

/// Delta records, sorted by (entity_key, stat_id, date), with their summary
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeltaOutput {
    pub records: Vec<DeltaRecord>,
    pub summary: DeltaSummary,
}

/// Compute daily deltas from every observation on record
///
/// Observations whose value did not parse as a number are excluded from their
/// series before differencing, so one bad value never shifts the rest of the
/// series. Negative deltas are kept as reported.
pub fn compute_deltas<'a, I>(observations: I) -> DeltaOutput
where
    I: IntoIterator<Item = &'a StatObservation>,
{
    let mut summary = DeltaSummary::default();
    let mut groups: BTreeMap<(&str, &str), Vec<(&StatObservation, f64)>> = BTreeMap::new();

    for observation in observations {
        let Some(value) = observation.cumulative_value else {
            summary.skipped_unparsable += 1;
            continue;
        };
        groups
            .entry((observation.entity_key.as_str(), observation.stat_id.as_str()))
            .or_default()
            .push((observation, value));
    }

    let mut records = Vec::new();
    for ((entity_key, stat_id), mut series) in groups {
        // Stable sort keeps the first of any same-date repeats
        series.sort_by_key(|(observation, _)| observation.snapshot_date);
        let before = series.len();
        series.dedup_by_key(|(observation, _)| observation.snapshot_date);
        summary.duplicates_dropped += before - series.len();
        summary.series += 1;

        let mut previous: Option<f64> = None;
        for (observation, cumulative_value) in series {
            let daily_value = match previous {
                Some(prev) => cumulative_value - prev,
                None => cumulative_value,
            };
            if daily_value < 0.0 {
                summary.negative_deltas += 1;
                debug!(
                    "Correction for {} stat {} on {}: {}",
                    entity_key, stat_id, observation.snapshot_date, daily_value
                );
            }
            previous = Some(cumulative_value);

            records.push(DeltaRecord {
                entity_key: entity_key.to_string(),
                stat_id: stat_id.to_string(),
                date: observation.snapshot_date,
                cumulative_value,
                daily_value,
                display_name: observation.display_name.clone(),
            });
        }
    }

    summary.records = records.len();
    info!("Computed deltas: {}", summary);
    DeltaOutput { records, summary }
}

/// Compute daily deltas across a snapshot history
pub fn compute_from_snapshots(snapshots: &[Snapshot]) -> DeltaOutput {
    compute_deltas(snapshots.iter().flat_map(|snapshot| snapshot.observations.iter()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, d).unwrap()
    }

    fn obs(entity: &str, stat: &str, d: u32, raw: &str) -> StatObservation {
        StatObservation::new(entity, stat, day(d), Some(raw.to_string()))
    }

    fn snapshot(d: u32, observations: Vec<StatObservation>) -> Snapshot {
        Snapshot::from_observations(day(d), observations).0
    }

    #[test]
    fn test_gap_in_dates_uses_previous_observed_date() {
        let history = vec![
            snapshot(1, vec![obs("P1", "7", 1, "10")]),
            snapshot(2, vec![obs("P1", "7", 2, "15")]),
            // Day 3 was empty and never became final, so it is not in the history
            snapshot(4, vec![obs("P1", "7", 4, "15")]),
        ];

        let output = compute_from_snapshots(&history);
        let deltas: Vec<(NaiveDate, f64)> = output.records.iter().map(|r| (r.date, r.daily_value)).collect();
        assert_eq!(deltas, vec![(day(1), 10.0), (day(2), 5.0), (day(4), 0.0)]);
    }

    #[test]
    fn test_daily_values_sum_to_last_cumulative() {
        let observations = vec![
            obs("P1", "12", 5, "40"),
            obs("P1", "12", 1, "12"),
            obs("P1", "12", 3, "31"),
            obs("P1", "12", 2, "20"),
        ];

        let output = compute_deltas(&observations);
        let total: f64 = output.records.iter().map(|r| r.daily_value).sum();
        assert_eq!(total, 40.0);
        assert_eq!(output.records.last().map(|r| r.cumulative_value), Some(40.0));
    }

    #[test]
    fn test_unparsable_values_excluded_not_zeroed() {
        let observations = vec![
            obs("P1", "7", 1, "10"),
            obs("P1", "7", 2, "-"),
            obs("P1", "7", 3, "18"),
            obs("P1", "9004003", 3, "45/100"),
        ];

        let output = compute_deltas(&observations);
        assert_eq!(output.summary.skipped_unparsable, 2);
        assert_eq!(output.summary.series, 1);
        let deltas: Vec<f64> = output.records.iter().map(|r| r.daily_value).collect();
        assert_eq!(deltas, vec![10.0, 8.0]);
    }

    #[test]
    fn test_negative_delta_preserved() {
        let observations = vec![obs("P1", "15", 1, "12"), obs("P1", "15", 2, "11")];

        let output = compute_deltas(&observations);
        assert_eq!(output.records[1].daily_value, -1.0);
        assert_eq!(output.summary.negative_deltas, 1);
    }

    #[test]
    fn test_output_sorted_by_entity_stat_date() {
        let observations = vec![
            obs("P2", "7", 2, "4"),
            obs("P1", "9", 1, "1"),
            obs("P2", "7", 1, "3"),
            obs("P1", "12", 1, "8"),
        ];

        let output = compute_deltas(&observations);
        let keys: Vec<(&str, &str, NaiveDate)> = output
            .records
            .iter()
            .map(|r| (r.entity_key.as_str(), r.stat_id.as_str(), r.date))
            .collect();
        assert_eq!(
            keys,
            vec![("P1", "12", day(1)), ("P1", "9", day(1)), ("P2", "7", day(1)), ("P2", "7", day(2))]
        );
    }

    #[test]
    fn test_same_date_repeat_keeps_first() {
        let observations = vec![obs("P1", "7", 1, "10"), obs("P1", "7", 1, "11")];

        let output = compute_deltas(&observations);
        assert_eq!(output.records.len(), 1);
        assert_eq!(output.records[0].cumulative_value, 10.0);
        assert_eq!(output.summary.duplicates_dropped, 1);
    }

    #[test]
    fn test_recompute_is_identical() {
        let history = vec![
            snapshot(1, vec![obs("P1", "7", 1, "10"), obs("P2", "7", 1, "2")]),
            snapshot(2, vec![obs("P2", "7", 2, "6"), obs("P1", "7", 2, "15")]),
        ];

        let first = serde_json::to_string(&compute_from_snapshots(&history).records).unwrap();
        let second = serde_json::to_string(&compute_from_snapshots(&history).records).unwrap();
        assert_eq!(first, second);
    }
}
