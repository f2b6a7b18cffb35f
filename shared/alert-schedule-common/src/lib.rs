//! Alert schedule evaluation.
//!
//! Decides whether a custom alert is allowed to fire at a given instant from
//! its weekly availability windows and its date-range overrides. Evaluation
//! is a pure, synchronous predicate: malformed configuration degrades to a
//! conservative verdict instead of an error, and the only shared state is
//! the process-wide timezone cache.
//!
//! Precedence, first verdict wins:
//! - a date range covering the instant decides, even when it rejects;
//! - otherwise configured weekly schedules decide;
//! - otherwise the alert is active unless it only has date ranges.

pub mod alert;
pub mod config;
pub mod date_range;
pub mod engine;
pub mod error;
pub mod rules;
pub mod segment;
mod serde_helpers;
pub mod timezone;
pub mod weekly;

pub use alert::{AlertSchedule, LEGACY_TIME_RANGE_TIMEZONE};
pub use config::ScheduleConfig;
pub use date_range::DateRangeSchedule;
pub use engine::ScheduleEngine;
pub use error::{Result, ScheduleError};
pub use rules::{
    default_rules, evaluate_rules, DateRangeOverride, DefaultActive, RuleOutcome, ScheduleRule,
    WeeklyRecurrence, DEFAULT_RULES,
};
pub use segment::{DayTimeRange, SECONDS_PER_DAY};
pub use timezone::{
    global_resolver, parse_location, CachingResolver, FallbackPolicy, LocalClock, Location,
    PolicyResolver, ScheduleInstant, TimezoneResolver, TzDatabaseLoader, ZoneLoader,
};
pub use weekly::WeeklySchedule;
