use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

/// Number of seconds in a calendar day; the exclusive upper bound of a segment.
pub const SECONDS_PER_DAY: i64 = 86_400;

/// Half-open `[start, end)` window of seconds since local midnight.
///
/// Segments arrive from the alert document unvalidated. An invalid segment
/// (`start < 0`, `end > 86400` or `start >= end`) never matches but does not
/// invalidate the schedule it belongs to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DayTimeRange {
    #[serde(default)]
    pub start: i64,
    #[serde(default)]
    pub end: i64,
}

impl DayTimeRange {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    /// Whole-hour window, as used by the legacy `timeRangeNMin/Max` fields.
    pub fn from_hours(start_hour: i64, end_hour: i64) -> Self {
        Self::new(start_hour * 3600, end_hour * 3600)
    }

    pub fn is_valid(&self) -> bool {
        self.start >= 0 && self.end <= SECONDS_PER_DAY && self.start < self.end
    }

    /// `start <= seconds < end` on a valid segment.
    pub fn contains(&self, seconds_of_day: i64) -> bool {
        self.is_valid() && self.start <= seconds_of_day && seconds_of_day < self.end
    }
}

/// `hour*3600 + minute*60 + second`; sub-second precision is dropped.
pub fn seconds_of_day(time: NaiveTime) -> i64 {
    i64::from(time.num_seconds_from_midnight())
}

/// True when any segment in `segments` contains `seconds`.
pub(crate) fn any_segment_contains(segments: &[DayTimeRange], seconds: i64) -> bool {
    segments.iter().any(|segment| segment.contains(seconds))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_validity_bounds() {
        assert!(DayTimeRange::new(0, SECONDS_PER_DAY).is_valid());
        assert!(DayTimeRange::new(3600, 3601).is_valid());
        assert!(!DayTimeRange::new(-1, 10).is_valid());
        assert!(!DayTimeRange::new(0, SECONDS_PER_DAY + 1).is_valid());
        assert!(!DayTimeRange::new(600, 600).is_valid());
        assert!(!DayTimeRange::new(900, 600).is_valid());
    }

    #[test]
    fn test_contains_is_end_exclusive() {
        let segment = DayTimeRange::new(100, 200);
        assert!(segment.contains(100));
        assert!(segment.contains(199));
        assert!(!segment.contains(200));
        assert!(!segment.contains(99));
    }

    #[test]
    fn test_degenerate_segment_never_matches() {
        let segment = DayTimeRange::new(37_800, 37_800);
        assert!(!segment.contains(37_800));
    }

    #[test]
    fn test_inverted_segment_never_matches() {
        let segment = DayTimeRange::new(500, 100);
        for s in [50, 100, 300, 500, 600] {
            assert!(!segment.contains(s));
        }
    }

    #[test]
    fn test_invalid_segment_skipped_among_valid_ones() {
        let segments = [DayTimeRange::new(500, 100), DayTimeRange::new(200, 400)];
        assert!(any_segment_contains(&segments, 300));
        assert!(!any_segment_contains(&segments, 450));
    }

    #[test]
    fn test_seconds_of_day() {
        let time = NaiveTime::from_hms_milli_opt(10, 30, 15, 999).unwrap();
        assert_eq!(seconds_of_day(time), 10 * 3600 + 30 * 60 + 15);
    }

    #[test]
    fn test_from_hours() {
        assert_eq!(DayTimeRange::from_hours(6, 11), DayTimeRange::new(21_600, 39_600));
    }
}
