//! Ordered precedence rules for alert scheduling.
//!
//! Each rule either gives a verdict or abstains. Rules run in order and the
//! first verdict wins:
//!
//! 1. [`DateRangeOverride`] - a date range covering the instant decides,
//!    even when none of its segments match.
//! 2. [`WeeklyRecurrence`] - configured weekly schedules decide.
//! 3. [`DefaultActive`] - active only when no date ranges are configured.

use std::fmt;

use tracing::trace;

use crate::alert::AlertSchedule;
use crate::timezone::{ScheduleInstant, TimezoneResolver};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleOutcome {
    Active,
    Inactive,
    NoOpinion,
}

impl RuleOutcome {
    pub fn from_active(active: bool) -> Self {
        if active {
            RuleOutcome::Active
        } else {
            RuleOutcome::Inactive
        }
    }

    pub fn verdict(self) -> Option<bool> {
        match self {
            RuleOutcome::Active => Some(true),
            RuleOutcome::Inactive => Some(false),
            RuleOutcome::NoOpinion => None,
        }
    }
}

pub trait ScheduleRule: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    fn evaluate(
        &self,
        schedule: &AlertSchedule,
        at: &ScheduleInstant,
        resolver: &dyn TimezoneResolver,
    ) -> RuleOutcome;
}

/// Date-range overrides. Coverage without a matching segment suppresses
/// every later rule.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateRangeOverride;

impl ScheduleRule for DateRangeOverride {
    fn name(&self) -> &'static str {
        "date_range_override"
    }

    fn evaluate(
        &self,
        schedule: &AlertSchedule,
        at: &ScheduleInstant,
        resolver: &dyn TimezoneResolver,
    ) -> RuleOutcome {
        let mut covered = false;
        for range in schedule.date_range_schedule.iter().filter(|dr| dr.enabled) {
            if range.date_in_range(at.unix) {
                covered = true;
            }
            if range.is_active_with(resolver, at) {
                return RuleOutcome::Active;
            }
        }

        if covered {
            RuleOutcome::Inactive
        } else {
            RuleOutcome::NoOpinion
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WeeklyRecurrence;

impl ScheduleRule for WeeklyRecurrence {
    fn name(&self) -> &'static str {
        "weekly_recurrence"
    }

    fn evaluate(
        &self,
        schedule: &AlertSchedule,
        at: &ScheduleInstant,
        resolver: &dyn TimezoneResolver,
    ) -> RuleOutcome {
        if schedule.weekly_schedule.is_empty() {
            return RuleOutcome::NoOpinion;
        }
        let active = schedule
            .weekly_schedule
            .iter()
            .filter(|ws| ws.enabled)
            .any(|ws| ws.is_active_with(resolver, at));
        RuleOutcome::from_active(active)
    }
}

/// Unscheduled alerts are always active; alerts whose only schedules are
/// date ranges that do not cover the instant are not.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultActive;

impl ScheduleRule for DefaultActive {
    fn name(&self) -> &'static str {
        "default_active"
    }

    fn evaluate(
        &self,
        schedule: &AlertSchedule,
        _at: &ScheduleInstant,
        _resolver: &dyn TimezoneResolver,
    ) -> RuleOutcome {
        RuleOutcome::from_active(schedule.date_range_schedule.is_empty())
    }
}

pub static DEFAULT_RULES: &[&dyn ScheduleRule] =
    &[&DateRangeOverride, &WeeklyRecurrence, &DefaultActive];

pub fn default_rules() -> Vec<Box<dyn ScheduleRule>> {
    vec![
        Box::new(DateRangeOverride),
        Box::new(WeeklyRecurrence),
        Box::new(DefaultActive),
    ]
}

/// Run `rules` in order and return the first verdict.
///
/// A rule list where every rule abstains leaves the alert unrestricted.
pub fn evaluate_rules<'a, I>(
    rules: I,
    schedule: &AlertSchedule,
    at: &ScheduleInstant,
    resolver: &dyn TimezoneResolver,
) -> bool
where
    I: IntoIterator<Item = &'a (dyn ScheduleRule + 'static)>,
{
    for rule in rules {
        let outcome = rule.evaluate(schedule, at, resolver);
        trace!("schedule rule {} at {}: {:?}", rule.name(), at.unix, outcome);
        if let Some(verdict) = outcome.verdict() {
            return verdict;
        }
    }
    true
}
