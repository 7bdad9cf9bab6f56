#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Buffer Config
//!
//! In-memory cache for the configuration served by the Buffer API.
//!
//! ## Overview
//!
//! A single [`ConfigurationController`] owns a zero-or-one value cache slot.
//! Consumers ask it to load the configuration and receive the answer as a
//! [`GotConfigurationEvent`] on the [`EventBus`], whether the value was served
//! from cache or fetched by a background [`GetConfigurationJob`].
//!
//! ## Module Organization
//!
//! - [`controller`] - The cache controller and its lifecycle guard
//! - [`events`] - Typed synchronous event bus and event types
//! - [`jobs`] - Job scheduler, job manager and the configuration fetch job
//! - [`models`] - The opaque configuration value
//! - [`config`] - Layered settings for the bus and job manager
//! - [`bootstrap`] - Wiring everything together from settings
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured logging setup and helpers
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use buffer_config::bootstrap::ConfigurationSystem;
//! use buffer_config::config::BufferConfig;
//! use buffer_config::error::Result;
//! use buffer_config::jobs::ConfigurationFetcher;
//! use buffer_config::models::Configuration;
//! use std::sync::Arc;
//!
//! struct ApiFetcher;
//!
//! #[async_trait::async_trait]
//! impl ConfigurationFetcher for ApiFetcher {
//!     async fn fetch(&self) -> Result<Configuration> {
//!         Configuration::from_json_str(r#"{"services": {"twitter": {}}}"#)
//!     }
//! }
//!
//! # async fn example() -> Result<()> {
//! buffer_config::logging::init_structured_logging();
//!
//! let config = BufferConfig::from_env()?;
//! let system = ConfigurationSystem::bootstrap(&config, Arc::new(ApiFetcher))?;
//!
//! system.controller.load_configuration();
//! system.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod bootstrap;
pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod jobs;
pub mod logging;
pub mod models;

pub use crate::bootstrap::ConfigurationSystem;
pub use crate::config::BufferConfig;
pub use crate::controller::{ConfigurationController, ControllerAttachment, ControllerStats};
pub use crate::error::{BufferError, Result};
pub use crate::events::{
    DataSource, EventBus, EventBusConfig, GotConfigurationEvent, Subscriber, SubscriberId,
};
pub use crate::jobs::{
    ConfigurationFetcher, GetConfigurationJob, Job, JobManager, JobManagerConfig, JobScheduler,
};
pub use crate::models::Configuration;
