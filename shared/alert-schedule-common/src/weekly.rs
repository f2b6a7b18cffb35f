use chrono::{DateTime, TimeZone, Weekday};
use serde::{Deserialize, Serialize};

use crate::segment::{any_segment_contains, DayTimeRange};
use crate::serde_helpers::null_as_default;
use crate::timezone::{global_resolver, ScheduleInstant, TimezoneResolver};

/// Recurring availability on one day of the week.
///
/// `day` uses Sunday = 0 .. Saturday = 6. Out-of-range values are kept as
/// configured and simply never match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklySchedule {
    #[serde(default)]
    pub day: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub segments: Vec<DayTimeRange>,
    #[serde(default)]
    pub enabled: bool,
    /// IANA name or fixed offset; empty means "the instant's own timezone".
    #[serde(default, deserialize_with = "null_as_default")]
    pub timezone: String,
}

impl WeeklySchedule {
    /// Enabled schedule for `day` in the instant's own timezone.
    pub fn new(day: Weekday, segments: Vec<DayTimeRange>) -> Self {
        Self {
            day: i64::from(day.num_days_from_sunday()),
            segments,
            enabled: true,
            timezone: String::new(),
        }
    }

    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = timezone.into();
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn is_active_at<T: TimeZone>(&self, at: &DateTime<T>) -> bool {
        self.is_active_with(global_resolver(), &ScheduleInstant::from_datetime(at))
    }

    pub fn is_active_at_unix(&self, unix: i64) -> bool {
        self.is_active_with(global_resolver(), &ScheduleInstant::from_unix(unix))
    }

    /// Local weekday must equal `day` and a segment must contain the local
    /// time of day, both taken in the schedule's resolved timezone.
    pub fn is_active_with<R: TimezoneResolver + ?Sized>(
        &self,
        resolver: &R,
        at: &ScheduleInstant,
    ) -> bool {
        if !self.enabled {
            return false;
        }
        let Some(clock) = at.clock_in(resolver, &self.timezone) else {
            return false;
        };
        if clock.day_index() != self.day {
            return false;
        }
        any_segment_contains(&self.segments, clock.seconds_of_day)
    }
}
