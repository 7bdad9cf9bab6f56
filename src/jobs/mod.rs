//! # Background Jobs
//!
//! Fire-and-forget work items and the scheduler that runs them.
//!
//! ## Architecture
//!
//! ```text
//! submit() → [bounded queue] → dispatcher → [Semaphore] → Job::run()
//! ```
//!
//! Submitters never see the outcome of a job. Results travel over the event
//! bus (see [`GetConfigurationJob`]); failures are logged and counted by the
//! [`JobManager`].

pub mod get_configuration;
pub mod manager;

use crate::error::Result;
use async_trait::async_trait;

pub use get_configuration::{ConfigurationFetcher, GetConfigurationJob};
pub use manager::{JobManager, JobManagerConfig, JobManagerStats};

/// A unit of asynchronous background work
#[async_trait]
pub trait Job: Send {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Execute the job, consuming it
    async fn run(self: Box<Self>) -> Result<()>;
}

/// Accepts jobs for background execution
pub trait JobScheduler: Send + Sync {
    /// Queue `job` and return immediately
    fn submit(&self, job: Box<dyn Job>);
}
