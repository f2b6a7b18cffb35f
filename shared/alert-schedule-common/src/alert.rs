use chrono::{DateTime, TimeZone, Weekday};
use serde::{Deserialize, Serialize};

use crate::date_range::DateRangeSchedule;
use crate::rules::{evaluate_rules, DEFAULT_RULES};
use crate::segment::DayTimeRange;
use crate::serde_helpers::null_as_default;
use crate::timezone::{global_resolver, ScheduleInstant, TimezoneResolver};
use crate::weekly::WeeklySchedule;

/// Timezone historically implied by the hour-based `timeRangeN` fields.
pub const LEGACY_TIME_RANGE_TIMEZONE: &str = "Europe/Brussels";

const WEEK: [Weekday; 7] = [
    Weekday::Sun,
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
];

/// Scheduling facet of a custom alert document.
///
/// Only the fields that drive scheduling are decoded; channels, devices and
/// delivery settings in the same document are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertSchedule {
    #[serde(default, deserialize_with = "null_as_default")]
    pub weekly_schedule: Vec<WeeklySchedule>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub date_range_schedule: Vec<DateRangeSchedule>,

    /// Legacy: the alert UI's "advanced time" toggle.
    #[serde(default)]
    pub time_advanced: bool,
    /// Legacy hour windows (0..=24), superseded by `weekly_schedule`.
    #[serde(default, rename = "timeRange1Min")]
    pub time_range1_min: i32,
    #[serde(default, rename = "timeRange1Max")]
    pub time_range1_max: i32,
    #[serde(default, rename = "timeRange2Min")]
    pub time_range2_min: i32,
    #[serde(default, rename = "timeRange2Max")]
    pub time_range2_max: i32,
}

impl AlertSchedule {
    pub fn is_unscheduled(&self) -> bool {
        self.weekly_schedule.is_empty() && self.date_range_schedule.is_empty()
    }

    /// Whether the alert may fire at `at`, using the process-wide resolver.
    pub fn is_scheduled_at<T: TimeZone>(&self, at: &DateTime<T>) -> bool {
        self.is_scheduled_with(global_resolver(), &ScheduleInstant::from_datetime(at))
    }

    pub fn is_scheduled_at_unix(&self, unix: i64) -> bool {
        self.is_scheduled_with(global_resolver(), &ScheduleInstant::from_unix(unix))
    }

    pub fn is_scheduled_with(&self, resolver: &dyn TimezoneResolver, at: &ScheduleInstant) -> bool {
        evaluate_rules(DEFAULT_RULES.iter().copied(), self, at, resolver)
    }

    /// Expand the legacy hour windows into one weekly schedule per weekday.
    ///
    /// A window is kept when `0 <= min < max <= 24`. Returns an empty list
    /// when neither window is usable.
    pub fn weekly_schedule_from_deprecated_time_ranges(
        &self,
        timezone: &str,
    ) -> Vec<WeeklySchedule> {
        let segments: Vec<DayTimeRange> = [
            (self.time_range1_min, self.time_range1_max),
            (self.time_range2_min, self.time_range2_max),
        ]
        .into_iter()
        .map(|(min, max)| DayTimeRange::from_hours(i64::from(min), i64::from(max)))
        .filter(DayTimeRange::is_valid)
        .collect();

        if segments.is_empty() {
            return Vec::new();
        }

        WEEK.iter()
            .map(|day| WeeklySchedule::new(*day, segments.clone()).with_timezone(timezone))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn legacy(r1: (i32, i32), r2: (i32, i32)) -> AlertSchedule {
        AlertSchedule {
            time_range1_min: r1.0,
            time_range1_max: r1.1,
            time_range2_min: r2.0,
            time_range2_max: r2.1,
            ..Default::default()
        }
    }

    fn expected(segments: Vec<DayTimeRange>) -> Vec<WeeklySchedule> {
        (0..7)
            .map(|day| WeeklySchedule {
                day,
                segments: segments.clone(),
                enabled: true,
                timezone: LEGACY_TIME_RANGE_TIMEZONE.to_string(),
            })
            .collect()
    }

    #[test]
    fn test_full_day_both_ranges() {
        let got = legacy((0, 24), (0, 24))
            .weekly_schedule_from_deprecated_time_ranges(LEGACY_TIME_RANGE_TIMEZONE);
        assert_eq!(
            got,
            expected(vec![
                DayTimeRange::new(0, 86_400),
                DayTimeRange::new(0, 86_400)
            ])
        );
    }

    #[test]
    fn test_custom_ranges() {
        let got = legacy((6, 11), (12, 20))
            .weekly_schedule_from_deprecated_time_ranges(LEGACY_TIME_RANGE_TIMEZONE);
        assert_eq!(
            got,
            expected(vec![
                DayTimeRange::from_hours(6, 11),
                DayTimeRange::from_hours(12, 20)
            ])
        );
    }

    #[test]
    fn test_invalid_ranges_skipped() {
        let got = legacy((-1, 10), (18, 18))
            .weekly_schedule_from_deprecated_time_ranges(LEGACY_TIME_RANGE_TIMEZONE);
        assert!(got.is_empty());
    }

    #[test]
    fn test_one_valid_range_kept() {
        let got = legacy((22, 25), (8, 17)).weekly_schedule_from_deprecated_time_ranges("UTC");
        assert_eq!(got.len(), 7);
        assert_eq!(got[0].segments, vec![DayTimeRange::from_hours(8, 17)]);
        assert_eq!(got[6].day, 6);
        assert_eq!(got[6].timezone, "UTC");
    }

    #[test]
    fn test_unscheduled() {
        assert!(AlertSchedule::default().is_unscheduled());
        assert!(AlertSchedule::default().is_scheduled_at_unix(0));
    }
}
