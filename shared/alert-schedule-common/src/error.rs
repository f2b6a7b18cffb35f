//! Error types for alert schedule parsing and configuration
//!
//! Evaluation itself never fails; these errors only come out of the
//! timezone parser and the configuration loaders.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("Unknown timezone: {0}")]
    UnknownTimezone(String),

    #[error("Invalid UTC offset: {0}")]
    InvalidOffset(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Environment configuration error: {0}")]
    Env(#[from] envy::Error),
}

pub type Result<T> = std::result::Result<T, ScheduleError>;
