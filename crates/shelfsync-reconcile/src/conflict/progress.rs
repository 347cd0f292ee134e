use chrono::{DateTime, Utc};
use serde::Serialize;
use shelfsync_core::{BookRecord, ProgressConfig};
use tracing::debug;

use super::{
    ConflictDetails, ConflictDetector, ConflictRecord, DetectorKind, DetectorMetadata, Severity,
};

pub const PROGRESS_ALGORITHM: &str = "time_decay_weighted_difference";
pub const PROGRESS_VERSION: &str = "1.0.0";

const BASE_CONFIDENCE: f64 = 0.8;
const HOURS_PER_DAY: f64 = 24.0;
const STALE_MONTH_DAYS: f64 = 30.0;
const STALE_MONTH_FACTOR: f64 = 0.7;
const STALE_WEEK_DAYS: f64 = 7.0;
const STALE_WEEK_FACTOR: f64 = 0.85;
const REGRESSION_FACTOR: f64 = 1.2;
const LARGE_DIFFERENCE: f64 = 50.0;
const LARGE_DIFFERENCE_FACTOR: f64 = 1.15;
const SMALL_DIFFERENCE: f64 = 10.0;
const SMALL_DIFFERENCE_FACTOR: f64 = 0.9;

/// How the chronologically later report relates to the earlier one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressDirection {
    /// Later report is further along: ordinary reading.
    Forward,
    /// Later report is behind the earlier one.
    Regression,
    /// Both reports carry the same timestamp.
    Simultaneous,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressDetails {
    pub value_left: f64,
    pub value_right: f64,
    pub timestamp_left: DateTime<Utc>,
    pub timestamp_right: DateTime<Utc>,
    pub raw_difference: f64,
    pub adjusted_difference: f64,
    pub hours_between: f64,
    pub direction: ProgressDirection,
    pub reliability: f64,
}

/// Compares two reading-progress reports.
///
/// The raw percentage gap is decayed by the time between reports and
/// down-weighted when the later report is simply further along.
#[derive(Debug, Clone, Default)]
pub struct ProgressConflictDetector {
    config: ProgressConfig,
}

impl ProgressConflictDetector {
    pub fn new(config: ProgressConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProgressConfig {
        &self.config
    }

    pub fn detect(&self, left: &BookRecord, right: &BookRecord) -> Option<ConflictRecord> {
        let (value_left, at_left) = reading(left)?;
        let (value_right, at_right) = reading(right)?;

        let raw_difference = (value_left - value_right).abs();
        if raw_difference <= self.config.allowable_variance {
            return None;
        }

        let hours_between =
            (at_left - at_right).num_milliseconds().unsigned_abs() as f64 / 3_600_000.0;
        let direction = direction(value_left, at_left, value_right, at_right);
        let progression_factor = match direction {
            ProgressDirection::Forward => self.config.progression_factor,
            _ => 1.0,
        };
        let decay = (-self.config.decay_rate_per_hour * hours_between).exp();
        let adjusted_difference = raw_difference * decay * progression_factor;

        let thresholds = &self.config.thresholds;
        if adjusted_difference <= thresholds.low {
            debug!(
                raw_difference,
                adjusted_difference, "progress difference within decayed tolerance"
            );
            return None;
        }

        let severity = if adjusted_difference > thresholds.critical {
            Severity::Critical
        } else if adjusted_difference > thresholds.high {
            Severity::High
        } else if adjusted_difference > thresholds.medium {
            Severity::Medium
        } else {
            Severity::Low
        };

        let reliability = (self.config.reliability_of(left.source.as_deref())
            + self.config.reliability_of(right.source.as_deref()))
            / 2.0;
        let confidence = confidence(raw_difference, hours_between, direction, reliability);

        let details = ProgressDetails {
            value_left,
            value_right,
            timestamp_left: at_left,
            timestamp_right: at_right,
            raw_difference,
            adjusted_difference,
            hours_between,
            direction,
            reliability,
        };

        Some(ConflictRecord::new(
            severity,
            confidence,
            ConflictDetails::Progress(details),
            DetectorMetadata::new(DetectorKind::Progress, PROGRESS_ALGORITHM, PROGRESS_VERSION),
        ))
    }
}

impl ConflictDetector for ProgressConflictDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Progress
    }

    fn detect(&self, left: &BookRecord, right: &BookRecord) -> Option<ConflictRecord> {
        ProgressConflictDetector::detect(self, left, right)
    }
}

/// Progress value in `[0, 100]` together with its timestamp.
fn reading(record: &BookRecord) -> Option<(f64, DateTime<Utc>)> {
    let value = record
        .progress
        .filter(|v| v.is_finite() && (0.0..=100.0).contains(v))?;
    Some((value, record.last_updated?))
}

fn direction(
    value_left: f64,
    at_left: DateTime<Utc>,
    value_right: f64,
    at_right: DateTime<Utc>,
) -> ProgressDirection {
    let (earlier, later) = match at_left.cmp(&at_right) {
        std::cmp::Ordering::Equal => return ProgressDirection::Simultaneous,
        std::cmp::Ordering::Less => (value_left, value_right),
        std::cmp::Ordering::Greater => (value_right, value_left),
    };
    if later > earlier {
        ProgressDirection::Forward
    } else {
        ProgressDirection::Regression
    }
}

fn confidence(
    raw_difference: f64,
    hours_between: f64,
    direction: ProgressDirection,
    reliability: f64,
) -> f64 {
    let mut confidence = BASE_CONFIDENCE;

    let days = hours_between / HOURS_PER_DAY;
    if days > STALE_MONTH_DAYS {
        confidence *= STALE_MONTH_FACTOR;
    } else if days > STALE_WEEK_DAYS {
        confidence *= STALE_WEEK_FACTOR;
    }

    if direction == ProgressDirection::Regression {
        confidence *= REGRESSION_FACTOR;
    }

    if raw_difference > LARGE_DIFFERENCE {
        confidence *= LARGE_DIFFERENCE_FACTOR;
    } else if raw_difference < SMALL_DIFFERENCE {
        confidence *= SMALL_DIFFERENCE_FACTOR;
    }

    confidence * reliability
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn at(progress: f64, time: DateTime<Utc>) -> BookRecord {
        BookRecord::new().with_progress(progress, time)
    }

    fn detector() -> ProgressConflictDetector {
        ProgressConflictDetector::default()
    }

    #[test]
    fn regression_within_an_hour_is_at_least_medium() {
        let record = detector()
            .detect(&at(60.0, t0()), &at(15.0, t0() + Duration::hours(1)))
            .expect("conflict");
        assert!(record.severity >= Severity::Medium);
        let ConflictDetails::Progress(details) = &record.details else {
            panic!("expected progress details");
        };
        assert_eq!(details.direction, ProgressDirection::Regression);
        assert_eq!(details.raw_difference, 45.0);
        assert!(details.adjusted_difference < 45.0);
    }

    #[test]
    fn differences_within_variance_are_ignored() {
        let d = detector();
        for (a, b) in [(50.0, 52.0), (50.0, 48.0), (0.0, 2.0), (10.0, 10.0)] {
            assert!(d.detect(&at(a, t0()), &at(b, t0() + Duration::hours(3))).is_none());
        }
    }

    #[test]
    fn regression_is_more_confident_than_forward_progress() {
        let d = detector();
        let later = t0() + Duration::hours(1);
        let forward = d.detect(&at(20.0, t0()), &at(60.0, later)).expect("forward");
        let regression = d.detect(&at(60.0, t0()), &at(20.0, later)).expect("regression");
        assert!(regression.confidence() > forward.confidence());
    }

    #[test]
    fn forward_progress_is_down_weighted() {
        let d = detector();
        let later = t0() + Duration::hours(1);
        // 8 points forward: 8 × 0.7 ≈ 5.6, barely above the LOW threshold.
        let small = d.detect(&at(40.0, t0()), &at(48.0, later)).expect("conflict");
        assert_eq!(small.severity, Severity::Low);
        // 7 points forward: 4.9 after weighting, below the LOW threshold.
        assert!(d.detect(&at(40.0, t0()), &at(47.0, later)).is_none());
    }

    #[test]
    fn severity_thresholds() {
        let d = detector();
        let same = t0();
        let severity = |a: f64, b: f64| d.detect(&at(a, same), &at(b, same)).map(|r| r.severity);
        assert_eq!(severity(50.0, 60.0), Some(Severity::Low));
        assert_eq!(severity(50.0, 70.0), Some(Severity::Medium));
        assert_eq!(severity(10.0, 50.0), Some(Severity::High));
        assert_eq!(severity(0.0, 90.0), Some(Severity::Critical));
    }

    #[test]
    fn old_gaps_decay_and_lower_confidence() {
        let d = detector();
        let recent = d
            .detect(&at(90.0, t0()), &at(10.0, t0() + Duration::hours(2)))
            .expect("recent");
        let stale = d
            .detect(&at(90.0, t0()), &at(10.0, t0() + Duration::days(40)))
            .expect("stale");
        assert!(stale.confidence() < recent.confidence());
        let (ConflictDetails::Progress(r), ConflictDetails::Progress(s)) =
            (&recent.details, &stale.details)
        else {
            panic!("expected progress details");
        };
        assert!(s.adjusted_difference < r.adjusted_difference);
    }

    #[test]
    fn missing_or_invalid_values_yield_none() {
        let d = detector();
        let valid = at(50.0, t0());
        assert!(d.detect(&valid, &BookRecord::new()).is_none());
        assert!(d.detect(&valid, &at(150.0, t0())).is_none());
        assert!(d.detect(&valid, &at(-1.0, t0())).is_none());
        assert!(d.detect(&valid, &at(f64::NAN, t0())).is_none());

        let mut no_time = at(10.0, t0());
        no_time.last_updated = None;
        assert!(d.detect(&valid, &no_time).is_none());
    }

    #[test]
    fn reliable_sources_raise_confidence() {
        let d = detector();
        let later = t0() + Duration::hours(1);
        let unknown = d.detect(&at(60.0, t0()), &at(20.0, later)).expect("conflict");
        let manual = d
            .detect(
                &at(60.0, t0()).with_source("manual"),
                &at(20.0, later).with_source("manual"),
            )
            .expect("conflict");
        assert!(manual.confidence() > unknown.confidence());
    }

    #[test]
    fn confidence_stays_in_range() {
        let d = detector();
        let record = d
            .detect(
                &at(100.0, t0()).with_source("manual"),
                &at(0.0, t0() + Duration::minutes(5)).with_source("manual"),
            )
            .expect("conflict");
        assert!((0.1..=1.0).contains(&record.confidence()));
        assert_eq!(record.metadata.algorithm, PROGRESS_ALGORITHM);
    }
}
