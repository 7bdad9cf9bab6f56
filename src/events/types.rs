//! # Event Types
//!
//! Typed events carried by the [`EventBus`](super::EventBus). Every event type
//! names itself through [`Event::EVENT_NAME`] so logs and statistics stay
//! readable without relying on Rust type names.

use crate::models::Configuration;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Event names used in logs
pub mod constants {
    pub const GOT_CONFIGURATION: &str = "configuration.got";
}

/// Marker trait for values that can travel over the event bus
pub trait Event: Send + Sync + 'static {
    /// Stable, human readable event name
    const EVENT_NAME: &'static str;
}

/// Where a published configuration came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    /// Replayed from the in-memory cache
    Cached,
    /// Freshly fetched from the remote API
    Network,
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::Cached => write!(f, "cached"),
            DataSource::Network => write!(f, "network"),
        }
    }
}

/// Published whenever a configuration value becomes available
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GotConfigurationEvent {
    pub source: DataSource,
    pub configuration: Configuration,
    pub published_at: DateTime<Utc>,
}

impl GotConfigurationEvent {
    pub fn new(source: DataSource, configuration: Configuration) -> Self {
        Self {
            source,
            configuration,
            published_at: Utc::now(),
        }
    }

    pub fn cached(configuration: Configuration) -> Self {
        Self::new(DataSource::Cached, configuration)
    }

    pub fn network(configuration: Configuration) -> Self {
        Self::new(DataSource::Network, configuration)
    }
}

impl Event for GotConfigurationEvent {
    const EVENT_NAME: &'static str = constants::GOT_CONFIGURATION;
}
