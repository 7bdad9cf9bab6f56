//! # Bootstrap
//!
//! Wires an event bus, a job manager and a controller together from a
//! [`BufferConfig`].

use crate::config::BufferConfig;
use crate::controller::ConfigurationController;
use crate::error::Result;
use crate::events::EventBus;
use crate::jobs::{ConfigurationFetcher, JobManager};
use std::sync::Arc;
use tracing::info;

/// A ready-to-use controller with its collaborators
pub struct ConfigurationSystem {
    pub bus: Arc<EventBus>,
    pub jobs: Arc<JobManager>,
    pub controller: ConfigurationController,
}

impl ConfigurationSystem {
    /// Build and start the system.
    ///
    /// Fails with `JobError` when called outside a Tokio runtime.
    pub fn bootstrap(config: &BufferConfig, fetcher: Arc<dyn ConfigurationFetcher>) -> Result<Self> {
        config.validate()?;

        let bus = Arc::new(EventBus::with_config(config.event_bus.clone()));
        let jobs = Arc::new(JobManager::new(config.jobs.clone())?);
        let controller = ConfigurationController::new(bus.clone(), jobs.clone(), fetcher);
        controller.on_start()?;

        info!(
            subscriber_id = %controller.subscriber_id(),
            "Configuration system bootstrapped"
        );

        Ok(Self {
            bus,
            jobs,
            controller,
        })
    }

    /// Stop the controller and drain the job queue
    pub async fn shutdown(&self) -> Result<()> {
        if self.controller.is_started() {
            self.controller.on_stop()?;
        }
        self.jobs.shutdown().await;
        info!("Configuration system shut down");
        Ok(())
    }
}
