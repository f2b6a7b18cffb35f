use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};

use crate::segment::{any_segment_contains, DayTimeRange};
use crate::serde_helpers::null_as_default;
use crate::timezone::{global_resolver, ScheduleInstant, TimezoneResolver};

/// Bounded override window with its own per-day segments.
///
/// `start_date` and `end_date` are absolute unix seconds compared directly
/// against the evaluated instant. They are not re-derived from local
/// midnight: a range meant to cover whole local days must already store the
/// unix instants of those local boundaries.
///
/// Coverage (`date_in_range`) is inclusive on both ends, so the `end_date`
/// instant itself still overrides weekly schedules. Activity is half-open
/// like the segments: no segment can match at or after `end_date`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRangeSchedule {
    #[serde(default)]
    pub start_date: i64,
    #[serde(default)]
    pub end_date: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub segments: Vec<DayTimeRange>,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub timezone: String,
}

impl DateRangeSchedule {
    pub fn new(start_date: i64, end_date: i64, segments: Vec<DayTimeRange>) -> Self {
        Self {
            start_date,
            end_date,
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

    /// Whether the range covers `unix` at all, ignoring its segments.
    ///
    /// An inverted range (`start_date > end_date`) covers nothing.
    pub fn date_in_range(&self, unix: i64) -> bool {
        self.enabled && unix >= self.start_date && unix <= self.end_date
    }

    pub fn is_active_at<T: TimeZone>(&self, at: &DateTime<T>) -> bool {
        self.is_active_with(global_resolver(), &ScheduleInstant::from_datetime(at))
    }

    pub fn is_active_at_unix(&self, unix: i64) -> bool {
        self.is_active_with(global_resolver(), &ScheduleInstant::from_unix(unix))
    }

    pub fn is_active_with<R: TimezoneResolver + ?Sized>(
        &self,
        resolver: &R,
        at: &ScheduleInstant,
    ) -> bool {
        if !self.date_in_range(at.unix) || at.unix >= self.end_date {
            return false;
        }
        at.clock_in(resolver, &self.timezone)
            .map_or(false, |clock| any_segment_contains(&self.segments, clock.seconds_of_day))
    }
}
