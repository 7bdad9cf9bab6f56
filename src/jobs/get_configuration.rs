//! # Get Configuration Job
//!
//! Fetches the remote configuration and announces it on the event bus as a
//! [`GotConfigurationEvent`] with [`DataSource::Network`](crate::events::DataSource).
//!
//! The transport is not part of this crate: the embedding application supplies
//! a [`ConfigurationFetcher`] that knows how to talk to the API.

use super::Job;
use crate::error::Result;
use crate::events::{EventBus, GotConfigurationEvent};
use crate::models::Configuration;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

/// Retrieves the current configuration from the remote API
#[async_trait]
pub trait ConfigurationFetcher: Send + Sync {
    async fn fetch(&self) -> Result<Configuration>;
}

/// Background job that fetches and publishes the configuration
pub struct GetConfigurationJob {
    fetcher: Arc<dyn ConfigurationFetcher>,
    bus: Arc<EventBus>,
}

impl GetConfigurationJob {
    pub const NAME: &'static str = "get_configuration";

    pub fn new(fetcher: Arc<dyn ConfigurationFetcher>, bus: Arc<EventBus>) -> Self {
        Self { fetcher, bus }
    }
}

#[async_trait]
impl Job for GetConfigurationJob {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn run(self: Box<Self>) -> Result<()> {
        let configuration = match self.fetcher.fetch().await {
            Ok(configuration) => configuration,
            Err(e) => {
                warn!(error = %e, "Configuration fetch failed");
                return Err(e);
            }
        };

        let delivered = self.bus.publish(GotConfigurationEvent::network(configuration));
        debug!(delivered = delivered, "Published fetched configuration");
        Ok(())
    }
}
