//! Pipeline configuration loaded from environment variables.

use std::time::Duration;

use aiyou_core::error::CoreError;
use aiyou_core::planner::{validate_max_group_duration, DEFAULT_MAX_GROUP_DURATION_SECS};
use aiyou_core::policy::{
    GenerationPolicy, DEFAULT_POLL_INTERVAL, DEFAULT_STALE_AFTER, DEFAULT_TASK_TIMEOUT,
};

/// Timing and planning parameters for the generation pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub poll_interval: Duration,
    pub task_timeout: Duration,
    pub stale_after: Duration,
    pub max_group_duration_secs: f64,
    /// How long shutdown waits for polling loops to exit.
    pub shutdown_timeout: Duration,
    /// Per-request timeout of provider HTTP calls.
    pub provider_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            task_timeout: DEFAULT_TASK_TIMEOUT,
            stale_after: DEFAULT_STALE_AFTER,
            max_group_duration_secs: DEFAULT_MAX_GROUP_DURATION_SECS,
            shutdown_timeout: Duration::from_secs(10),
            provider_timeout: Duration::from_secs(60),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from environment variables.
    ///
    /// | Env var                   | Default |
    /// |---------------------------|---------|
    /// | `POLL_INTERVAL_SECS`      | `5`     |
    /// | `TASK_TIMEOUT_SECS`       | `600`   |
    /// | `STALE_TASK_SECS`         | `600`   |
    /// | `MAX_GROUP_DURATION_SECS` | `10`    |
    /// | `SHUTDOWN_TIMEOUT_SECS`   | `10`    |
    /// | `PROVIDER_TIMEOUT_SECS`   | `60`    |
    pub fn from_env() -> Result<Self, CoreError> {
        let defaults = Self::default();
        let config = Self {
            poll_interval: env_secs("POLL_INTERVAL_SECS", defaults.poll_interval)?,
            task_timeout: env_secs("TASK_TIMEOUT_SECS", defaults.task_timeout)?,
            stale_after: env_secs("STALE_TASK_SECS", defaults.stale_after)?,
            max_group_duration_secs: env_parse(
                "MAX_GROUP_DURATION_SECS",
                defaults.max_group_duration_secs,
            )?,
            shutdown_timeout: env_secs("SHUTDOWN_TIMEOUT_SECS", defaults.shutdown_timeout)?,
            provider_timeout: env_secs("PROVIDER_TIMEOUT_SECS", defaults.provider_timeout)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.poll_interval.is_zero() {
            return Err(CoreError::Validation(
                "POLL_INTERVAL_SECS must be greater than zero".to_string(),
            ));
        }
        validate_max_group_duration(self.max_group_duration_secs)
    }

    pub fn policy(&self) -> GenerationPolicy {
        GenerationPolicy {
            poll_interval: self.poll_interval,
            task_timeout: self.task_timeout,
            stale_after: self.stale_after,
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> Result<T, CoreError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| CoreError::Validation(format!("{name} is not a valid number: '{raw}'"))),
        Err(_) => Ok(default),
    }
}

fn env_secs(name: &str, default: Duration) -> Result<Duration, CoreError> {
    env_parse(name, default.as_secs()).map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_policy_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.policy(), GenerationPolicy::default());
        assert_eq!(config.max_group_duration_secs, 10.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_poll_interval_rejected() {
        let config = PipelineConfig {
            poll_interval: Duration::ZERO,
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn unset_variable_uses_default() {
        let value = env_secs("AIYOU_TEST_UNSET_VARIABLE", Duration::from_secs(7)).unwrap();
        assert_eq!(value, Duration::from_secs(7));
    }
}
