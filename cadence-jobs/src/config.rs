//! Job configuration.

use crate::error::{JobError, JobResult};
use std::str::FromStr;

/// What `Job::stop` does when no run is active.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IdleStop {
    /// Do nothing; the returned acknowledgment resolves to `None` at once
    #[default]
    Ignore,
    /// Fail with `JobError::NotRunning`
    Reject,
}

impl FromStr for IdleStop {
    type Err = JobError;

    fn from_str(s: &str) -> JobResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ignore" => Ok(IdleStop::Ignore),
            "reject" => Ok(IdleStop::Reject),
            other => Err(JobError::Config(format!(
                "unknown idle stop policy '{}', expected 'ignore' or 'reject'",
                other
            ))),
        }
    }
}

/// Per-job configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobConfig {
    /// Behavior of `Job::stop` while the job is idle
    pub idle_stop: IdleStop,
}

impl JobConfig {
    /// Read `CADENCE_IDLE_STOP` from the process environment.
    pub fn from_env() -> JobResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> JobResult<Self> {
        let idle_stop = match lookup("CADENCE_IDLE_STOP") {
            Some(raw) => raw.parse()?,
            None => IdleStop::default(),
        };
        Ok(Self { idle_stop })
    }

    /// Set the idle stop policy.
    pub fn idle_stop(mut self, idle_stop: IdleStop) -> Self {
        self.idle_stop = idle_stop;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ignores_idle_stop() {
        assert_eq!(JobConfig::default().idle_stop, IdleStop::Ignore);
    }

    #[test]
    fn test_parse_idle_stop() {
        assert_eq!("ignore".parse::<IdleStop>().unwrap(), IdleStop::Ignore);
        assert_eq!(" REJECT ".parse::<IdleStop>().unwrap(), IdleStop::Reject);

        let err = "explode".parse::<IdleStop>().unwrap_err();
        assert!(matches!(err, JobError::Config(_)));
        assert!(err.to_string().contains("explode"));
    }

    #[test]
    fn test_from_lookup() {
        let config = JobConfig::from_lookup(|key| {
            (key == "CADENCE_IDLE_STOP").then(|| "reject".to_string())
        })
        .unwrap();
        assert_eq!(config.idle_stop, IdleStop::Reject);

        let config = JobConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, JobConfig::default());

        assert!(JobConfig::from_lookup(|_| Some("sometimes".to_string())).is_err());
    }

    #[test]
    fn test_builder() {
        let config = JobConfig::default().idle_stop(IdleStop::Reject);
        assert_eq!(config.idle_stop, IdleStop::Reject);
    }
}
