//! ==============================================================================
//! align.rs - exact-horizon temporal join
//! ==============================================================================
//!
//! purpose:
//!     pairs every reading at time t with the reading at exactly t + horizon
//!     and emits (features at t, temperature at t + horizon) training rows.
//!
//! semantics:
//!     - exact instant match only. no tolerance window, no nearest neighbour,
//!       no interpolation. a reading at t + 5min + 1s does not count.
//!     - readings without a successor (end of log, sampling gap, cadence
//!       drift) are dropped and counted as unmatched. with a drifting
//!       sampler this can discard most of the log; the count is logged so
//!       the loss stays visible.
//!     - duplicate timestamps are not deduplicated. sorting is stable and the
//!       first reading at the matching instant supplies the target.
//!     - output is ascending by timestamp and identical across runs.
//!
//! relationships:
//!     - used by: training.rs, main.rs (align subcommand)
//!     - uses: features.rs (feature vector for the earlier reading)
//!
//! ==============================================================================

use chrono::Duration;

use crate::dataset::LoadedReadings;
use crate::domain::{AlignedRow, Reading};
use crate::error::TrainError;
use crate::features;

pub const DEFAULT_HORIZON_MINUTES: i64 = 5;

/// aggregate counters for one alignment pass, loader counts included
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AlignmentReport {
    pub rows_read: usize,
    pub bad_timestamps: usize,
    pub malformed: usize,
    pub unmatched: usize,
    pub aligned: usize,
}

#[derive(Clone, Debug)]
pub struct TimeAligner {
    horizon_minutes: i64,
    horizon: Duration,
}

impl Default for TimeAligner {
    fn default() -> Self {
        Self {
            horizon_minutes: DEFAULT_HORIZON_MINUTES,
            horizon: Duration::minutes(DEFAULT_HORIZON_MINUTES),
        }
    }
}

impl TimeAligner {
    /// horizon must be at least one minute; zero would pair every reading with itself
    pub fn try_new(horizon_minutes: i64) -> Result<Self, TrainError> {
        if horizon_minutes < 1 {
            return Err(TrainError::InvalidParams(format!(
                "alignment.horizon_minutes must be >= 1, got {horizon_minutes}"
            )));
        }
        let horizon = Duration::try_minutes(horizon_minutes).ok_or_else(|| {
            TrainError::InvalidParams(format!(
                "alignment.horizon_minutes out of range: {horizon_minutes}"
            ))
        })?;
        Ok(Self {
            horizon_minutes,
            horizon,
        })
    }

    pub fn horizon_minutes(&self) -> i64 {
        self.horizon_minutes
    }

    /// returns the aligned rows and how many readings found no exact successor
    pub fn align(&self, readings: &[Reading]) -> (Vec<AlignedRow>, usize) {
        let mut sorted: Vec<&Reading> = readings.iter().collect();
        sorted.sort_by_key(|r| r.timestamp);

        let mut rows = Vec::with_capacity(sorted.len());
        let mut unmatched = 0;

        for reading in &sorted {
            match self.successor(&sorted, reading) {
                Some(future) => rows.push(AlignedRow {
                    timestamp: reading.timestamp,
                    features: features::build(reading),
                    target: future.temperature,
                }),
                None => unmatched += 1,
            }
        }

        (rows, unmatched)
    }

    /// align a loaded log and fold the loader's skip counts into the report
    pub fn align_loaded(&self, loaded: &LoadedReadings) -> (Vec<AlignedRow>, AlignmentReport) {
        let (rows, unmatched) = self.align(&loaded.readings);
        let report = AlignmentReport {
            rows_read: loaded.rows_read,
            bad_timestamps: loaded.bad_timestamps,
            malformed: loaded.malformed,
            unmatched,
            aligned: rows.len(),
        };

        if unmatched > 0 {
            tracing::warn!(
                unmatched,
                aligned = report.aligned,
                horizon_minutes = self.horizon_minutes,
                "readings dropped: no reading at exactly t + horizon"
            );
        }
        tracing::info!(?report, "alignment complete");

        (rows, report)
    }

    /// binary search the sorted log for the first reading at exactly t + horizon
    fn successor<'a>(&self, sorted: &[&'a Reading], reading: &Reading) -> Option<&'a Reading> {
        let wanted = reading.timestamp.checked_add_signed(self.horizon)?;
        let idx = sorted.partition_point(|r| r.timestamp < wanted);
        sorted.get(idx).copied().filter(|r| r.timestamp == wanted)
    }
}

// ==============================================================================
// tests
// ==============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::parse_timestamp;
    use crate::features::FeatureVector;

    fn reading(ts: &str, temperature: f64) -> Reading {
        Reading {
            timestamp: parse_timestamp(ts).unwrap(),
            temperature,
            humidity_air: 1.0,
            humidity_soil: 1.0,
            light: 1.0,
        }
    }

    #[test]
    fn pairs_reading_with_exact_successor() {
        let readings = vec![
            reading("2024-05-01 10:00:00", 20.0),
            reading("2024-05-01 10:05:00", 21.5),
        ];
        let (rows, unmatched) = TimeAligner::default().align(&readings);

        assert_eq!(unmatched, 1);
        assert_eq!(rows.len(), 1);
        assert_eq!(
            rows[0].features,
            FeatureVector {
                temperature: 20.0,
                humidity_air: 1.0,
                humidity_soil: 1.0,
                light: 1.0,
                hour: 10,
                minute_of_day: 600,
            }
        );
        assert_eq!(rows[0].features.to_array(), [20.0, 1.0, 1.0, 1.0, 10.0, 600.0]);
        assert_eq!(rows[0].target, 21.5);
    }

    #[test]
    fn near_misses_are_not_matched() {
        for late in ["2024-05-01 10:05:01", "2024-05-01 10:04:59", "2024-05-01 10:05:00.001"] {
            let readings = vec![reading("2024-05-01 10:00:00", 20.0), reading(late, 21.5)];
            let (rows, unmatched) = TimeAligner::default().align(&readings);
            assert!(rows.is_empty(), "{late} must not pair with 10:00:00");
            assert_eq!(unmatched, 2);
        }
    }

    #[test]
    fn input_order_does_not_matter_and_output_is_chronological() {
        let readings = vec![
            reading("2024-05-01 10:10:00", 22.0),
            reading("2024-05-01 10:00:00", 20.0),
            reading("2024-05-01 10:05:00", 21.0),
        ];
        let (rows, _) = TimeAligner::default().align(&readings);

        assert_eq!(rows.len(), 2);
        assert!(rows[0].timestamp < rows[1].timestamp);
        assert_eq!((rows[0].features.temperature, rows[0].target), (20.0, 21.0));
        assert_eq!((rows[1].features.temperature, rows[1].target), (21.0, 22.0));
    }

    #[test]
    fn mixed_offsets_join_on_the_instant() {
        let readings = vec![
            reading("2024-05-01T10:00:00Z", 20.0),
            reading("2024-05-01T12:05:00+02:00", 21.5),
        ];
        let (rows, _) = TimeAligner::default().align(&readings);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].target, 21.5);
    }

    #[test]
    fn gap_drops_only_the_reading_before_it() {
        let readings = vec![
            reading("2024-05-01 10:00:00", 20.0),
            reading("2024-05-01 10:05:00", 20.5),
            // 10:10 missing
            reading("2024-05-01 10:15:00", 21.0),
            reading("2024-05-01 10:20:00", 21.5),
        ];
        let (rows, unmatched) = TimeAligner::default().align(&readings);
        let starts: Vec<u32> = rows.iter().map(|r| r.features.minute_of_day).collect();
        assert_eq!(starts, vec![600, 615]);
        assert_eq!(unmatched, 2);
    }

    #[test]
    fn alignment_is_deterministic() {
        let readings: Vec<Reading> = (0..50)
            .map(|i| {
                let ts = format!("2024-05-01 {:02}:{:02}:00", 8 + i * 5 / 60, (i * 5) % 60);
                reading(&ts, 18.0 + i as f64 * 0.1)
            })
            .collect();
        let aligner = TimeAligner::default();
        let (first, _) = aligner.align(&readings);
        let (second, _) = aligner.align(&readings);
        assert_eq!(first.len(), 49);
        assert_eq!(first, second);
    }

    #[test]
    fn empty_log_yields_zero_rows() {
        let (rows, unmatched) = TimeAligner::default().align(&[]);
        assert!(rows.is_empty());
        assert_eq!(unmatched, 0);
    }

    #[test]
    fn report_folds_loader_counts() {
        let loaded = LoadedReadings {
            readings: vec![
                reading("2024-05-01 10:00:00", 20.0),
                reading("2024-05-01 10:05:00", 21.5),
            ],
            rows_read: 5,
            bad_timestamps: 2,
            malformed: 1,
        };
        let (_, report) = TimeAligner::default().align_loaded(&loaded);
        assert_eq!(
            report,
            AlignmentReport {
                rows_read: 5,
                bad_timestamps: 2,
                malformed: 1,
                unmatched: 1,
                aligned: 1,
            }
        );
    }

    #[test]
    fn horizon_is_configurable() {
        let readings = vec![
            reading("2024-05-01 10:00:00", 20.0),
            reading("2024-05-01 10:05:00", 21.0),
            reading("2024-05-01 10:10:00", 22.0),
        ];
        let (rows, _) = TimeAligner::try_new(10).unwrap().align(&readings);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].target, 22.0);
    }

    #[test]
    fn zero_or_negative_horizon_is_rejected() {
        for minutes in [0, -5] {
            assert!(matches!(
                TimeAligner::try_new(minutes),
                Err(TrainError::InvalidParams(_))
            ));
        }
    }

    #[test]
    fn out_of_range_horizon_is_an_error_not_a_panic() {
        assert!(matches!(
            TimeAligner::try_new(i64::MAX / 2),
            Err(TrainError::InvalidParams(_))
        ));
        assert_eq!(TimeAligner::try_new(60).unwrap().horizon_minutes(), 60);
    }
}
