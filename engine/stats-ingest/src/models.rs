use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What one pipeline run did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// Distinct entities tracked this run
    pub entities_processed: usize,

    /// Observations written to final snapshots
    pub observations_written: usize,

    /// Dates that ended with a final snapshot
    pub dates_completed: Vec<NaiveDate>,

    /// Dates written empty, to be planned again on the next run
    pub dates_retried: Vec<NaiveDate>,

    /// Entity fetches that failed (entity missing from that date)
    pub fetch_failures: usize,

    /// Records dropped: unresolvable identifiers and duplicate observations
    pub records_dropped: usize,

    /// Delta records regenerated from the full history
    pub delta_records: usize,

    /// Combined view rows regenerated
    pub view_rows: usize,

    /// Teams written to the standings table, `None` when standings were not refreshed
    pub standings_rows: Option<usize>,

    /// The entity listing could not be read to the end; no dates were fetched
    pub discovery_incomplete: bool,

    /// Run stopped early; the in-progress date was not written
    pub cancelled: bool,
}

impl RunReport {
    /// Nothing was planned or everything planned was completed
    pub fn is_complete(&self) -> bool {
        !self.cancelled && !self.discovery_incomplete && self.dates_retried.is_empty()
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "entities={} observations={} dates_completed={} dates_retried={} fetch_failures={} dropped={} deltas={} view_rows={}",
            self.entities_processed,
            self.observations_written,
            self.dates_completed.len(),
            self.dates_retried.len(),
            self.fetch_failures,
            self.records_dropped,
            self.delta_records,
            self.view_rows
        )?;
        if self.discovery_incomplete {
            write!(f, " (listing incomplete)")?;
        }
        if self.cancelled {
            write!(f, " (cancelled)")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_display() {
        let report = RunReport {
            entities_processed: 2,
            observations_written: 10,
            dates_completed: vec![NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()],
            cancelled: true,
            ..RunReport::default()
        };
        let text = report.to_string();
        assert!(text.contains("entities=2"));
        assert!(text.contains("dates_completed=1"));
        assert!(text.ends_with("(cancelled)"));
        assert!(!report.is_complete());
    }
}
