//! Configuration for alert schedule evaluation

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::alert::LEGACY_TIME_RANGE_TIMEZONE;
use crate::error::Result;
use crate::timezone::FallbackPolicy;

/// Environment variable prefix for `ScheduleConfig::from_env`.
pub const ENV_PREFIX: &str = "ALERT_SCHEDULE_";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ScheduleConfig {
    /// Timezone given to weekly schedules expanded from legacy hour windows
    #[serde(default = "default_legacy_timezone")]
    pub legacy_timezone: String,

    /// Logging behaviour when a schedule's timezone cannot be resolved
    #[serde(default)]
    pub fallback_policy: FallbackPolicy,

    /// Location used for schedules without a timezone. Empty keeps the
    /// evaluated instant's own offset.
    #[serde(default)]
    pub default_timezone: String,
}

impl ScheduleConfig {
    /// Load configuration from `ALERT_SCHEDULE_*` environment variables
    pub fn from_env() -> Result<Self> {
        Ok(envy::prefixed(ENV_PREFIX).from_env::<Self>()?)
    }

    /// Load configuration from a host-provided properties map
    pub fn from_properties(props: &HashMap<String, String>) -> Result<Self> {
        let legacy_timezone = props
            .get("legacy_timezone")
            .cloned()
            .unwrap_or_else(default_legacy_timezone);

        let fallback_policy = match props.get("fallback_policy") {
            Some(value) => value.parse()?,
            None => FallbackPolicy::default(),
        };

        let default_timezone = props
            .get("default_timezone")
            .cloned()
            .unwrap_or_default();

        Ok(Self {
            legacy_timezone,
            fallback_policy,
            default_timezone,
        })
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            legacy_timezone: default_legacy_timezone(),
            fallback_policy: FallbackPolicy::Silent,
            default_timezone: String::new(),
        }
    }
}

fn default_legacy_timezone() -> String {
    LEGACY_TIME_RANGE_TIMEZONE.to_string()
}
