//! # Configuration
//!
//! Settings for the event bus and the background job manager.
//!
//! Sources are layered, later ones winning:
//!
//! 1. built-in defaults
//! 2. an optional TOML file
//! 3. `BUFFER__`-prefixed environment variables, `__` separating sections
//!    (e.g. `BUFFER__JOBS__MAX_CONCURRENT_JOBS=8`)

use crate::error::{BufferError, Result};
use crate::events::EventBusConfig;
use crate::jobs::JobManagerConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

const ENV_PREFIX: &str = "BUFFER";
const ENV_SEPARATOR: &str = "__";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    pub event_bus: EventBusConfig,
    pub jobs: JobManagerConfig,
}

impl BufferConfig {
    /// Load from defaults and the process environment
    pub fn from_env() -> Result<Self> {
        Self::load(None, None)
    }

    /// Load from defaults, an optional file, then the process environment
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::load(Some(path.as_ref()), None)
    }

    /// Load with an explicit environment map instead of the process environment.
    ///
    /// Useful for tests, which otherwise race on shared environment variables.
    pub fn load(path: Option<&Path>, env: Option<HashMap<String, String>>) -> Result<Self> {
        let mut builder =
            ::config::Config::builder().add_source(::config::Config::try_from(&Self::default())?);

        if let Some(path) = path {
            debug!(path = %path.display(), "Loading configuration file");
            builder = builder.add_source(::config::File::from(path).required(false));
        }

        builder = builder.add_source(
            ::config::Environment::with_prefix(ENV_PREFIX)
                .separator(ENV_SEPARATOR)
                .try_parsing(true)
                .source(env),
        );

        let config: BufferConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the job manager cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.jobs.queue_capacity == 0 {
            return Err(BufferError::ValidationError(
                "jobs.queue_capacity must be greater than zero".to_string(),
            ));
        }
        if self.jobs.max_concurrent_jobs == 0 {
            return Err(BufferError::ValidationError(
                "jobs.max_concurrent_jobs must be greater than zero".to_string(),
            ));
        }
        // Shutdown drains by acquiring every permit in one u32-sized request
        if u32::try_from(self.jobs.max_concurrent_jobs).is_err() {
            return Err(BufferError::ValidationError(format!(
                "jobs.max_concurrent_jobs must not exceed {}",
                u32::MAX
            )));
        }
        if self.jobs.job_timeout_ms == 0 {
            return Err(BufferError::ValidationError(
                "jobs.job_timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> Option<HashMap<String, String>> {
        Some(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = BufferConfig::load(None, env(&[])).unwrap();
        assert_eq!(config, BufferConfig::default());
        assert!(config.event_bus.catch_handler_panics);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[jobs]\nmax_concurrent_jobs = 2\nqueue_capacity = 10").unwrap();

        let config = BufferConfig::load(Some(file.path()), env(&[])).unwrap();
        assert_eq!(config.jobs.max_concurrent_jobs, 2);
        assert_eq!(config.jobs.queue_capacity, 10);
        assert_eq!(config.jobs.job_timeout_ms, JobManagerConfig::default().job_timeout_ms);
    }

    #[test]
    fn test_environment_overrides_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[jobs]\nmax_concurrent_jobs = 2").unwrap();

        let config = BufferConfig::load(
            Some(file.path()),
            env(&[
                ("BUFFER__JOBS__MAX_CONCURRENT_JOBS", "8"),
                ("BUFFER__EVENT_BUS__LOG_DEAD_EVENTS", "false"),
            ]),
        )
        .unwrap();
        assert_eq!(config.jobs.max_concurrent_jobs, 8);
        assert!(!config.event_bus.log_dead_events);
    }

    #[test]
    fn test_missing_file_is_tolerated() {
        let config =
            BufferConfig::load(Some(Path::new("/nonexistent/buffer.toml")), env(&[])).unwrap();
        assert_eq!(config, BufferConfig::default());
    }

    #[test]
    fn test_zero_workers_rejected() {
        let err = BufferConfig::load(None, env(&[("BUFFER__JOBS__MAX_CONCURRENT_JOBS", "0")]))
            .unwrap_err();
        assert!(matches!(err, BufferError::ValidationError(_)));
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_oversized_workers_rejected() {
        let err = BufferConfig::load(
            None,
            env(&[("BUFFER__JOBS__MAX_CONCURRENT_JOBS", "4294967296")]),
        )
        .unwrap_err();
        assert!(matches!(err, BufferError::ValidationError(_)));

        let mut config = BufferConfig::default();
        config.jobs.max_concurrent_jobs = u32::MAX as usize;
        assert!(config.validate().is_ok());
    }
}
