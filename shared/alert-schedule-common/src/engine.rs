use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, TimeZone};
use tracing::{debug, warn};

use crate::alert::AlertSchedule;
use crate::config::ScheduleConfig;
use crate::rules::{default_rules, evaluate_rules, ScheduleRule};
use crate::timezone::{
    global_resolver, parse_location, Location, ScheduleInstant, TimezoneResolver,
};
use crate::weekly::WeeklySchedule;

/// Configured entry point for schedule evaluation.
///
/// Holds the resolver and rule list so callers evaluating many alerts share
/// one timezone cache. The engine never mutates the schedules it reads.
pub struct ScheduleEngine {
    config: ScheduleConfig,
    resolver: Arc<dyn TimezoneResolver>,
    rules: Vec<Box<dyn ScheduleRule>>,
    default_location: Option<Location>,
}

impl ScheduleEngine {
    pub fn new(config: ScheduleConfig) -> Self {
        let resolver: Arc<dyn TimezoneResolver> =
            Arc::new(global_resolver().with_fallback_policy(config.fallback_policy));

        let default_location = if config.default_timezone.is_empty() {
            None
        } else {
            match parse_location(&config.default_timezone) {
                Ok(location) => Some(location),
                Err(err) => {
                    warn!(
                        "ignoring default_timezone {}: {}",
                        config.default_timezone, err
                    );
                    None
                }
            }
        };

        debug!(
            "schedule engine ready (policy={:?}, default_location={:?})",
            config.fallback_policy, default_location
        );

        Self {
            config,
            resolver,
            rules: default_rules(),
            default_location,
        }
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn TimezoneResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_rules(mut self, rules: Vec<Box<dyn ScheduleRule>>) -> Self {
        self.rules = rules;
        self
    }

    pub fn config(&self) -> &ScheduleConfig {
        &self.config
    }

    pub fn is_scheduled_at<T: TimeZone>(&self, schedule: &AlertSchedule, at: &DateTime<T>) -> bool {
        self.evaluate(schedule, ScheduleInstant::from_datetime(at))
    }

    pub fn is_scheduled_at_unix(&self, schedule: &AlertSchedule, unix: i64) -> bool {
        self.evaluate(schedule, ScheduleInstant::from_unix(unix))
    }

    /// Weekly schedules for an alert still configured with legacy hour
    /// windows, in the configured legacy timezone.
    pub fn legacy_weekly_schedules(&self, schedule: &AlertSchedule) -> Vec<WeeklySchedule> {
        schedule.weekly_schedule_from_deprecated_time_ranges(&self.config.legacy_timezone)
    }

    fn evaluate(&self, schedule: &AlertSchedule, at: ScheduleInstant) -> bool {
        let at = match self.default_location {
            Some(location) => at.with_fallback(location),
            None => at,
        };
        evaluate_rules(
            self.rules.iter().map(|rule| &**rule),
            schedule,
            &at,
            &*self.resolver,
        )
    }
}

impl Default for ScheduleEngine {
    fn default() -> Self {
        Self::new(ScheduleConfig::default())
    }
}

impl fmt::Debug for ScheduleEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduleEngine")
            .field("config", &self.config)
            .field("rules", &self.rules)
            .field("default_location", &self.default_location)
            .finish()
    }
}
