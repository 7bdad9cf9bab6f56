//! # Configuration Controller
//!
//! Keeps the Buffer API [`Configuration`] in memory for the lifetime of its host
//! and hands it out through the event bus.
//!
//! ## Overview
//!
//! Callers never receive the configuration as a return value. They subscribe to
//! [`GotConfigurationEvent`] and call [`ConfigurationController::load_configuration`]:
//!
//! - **cache hit**: a `Cached` event is published synchronously
//! - **cache miss**: a [`GetConfigurationJob`] is submitted and the call returns;
//!   the job later publishes a `Network` event
//!
//! While started, the controller listens for every `GotConfigurationEvent`
//! (its own cache replays included) and stores the carried value, so the first
//! completed fetch populates the cache for later hits.
//!
//! ## Lifecycle
//!
//! The host calls [`on_start`](ConfigurationController::on_start) when it becomes
//! active and [`on_stop`](ConfigurationController::on_stop) when it goes away, or
//! holds the guard returned by [`attach`](ConfigurationController::attach) for
//! the duration of its active period.
//!
//! The cache slot lives behind an `RwLock`; the lock is never held while
//! publishing or submitting, so subscribers may call back into the controller.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use buffer_config::controller::ConfigurationController;
//! use buffer_config::error::Result;
//! use buffer_config::events::EventBus;
//! use buffer_config::jobs::{ConfigurationFetcher, JobManager};
//! use buffer_config::models::Configuration;
//! use std::sync::Arc;
//!
//! struct ApiFetcher;
//!
//! #[async_trait::async_trait]
//! impl ConfigurationFetcher for ApiFetcher {
//!     async fn fetch(&self) -> Result<Configuration> {
//!         Configuration::from_json_str(r#"{"services": {}}"#)
//!     }
//! }
//!
//! # async fn example() -> Result<()> {
//! let bus = Arc::new(EventBus::new());
//! let jobs = Arc::new(JobManager::with_defaults()?);
//! let controller = ConfigurationController::new(bus, jobs, Arc::new(ApiFetcher));
//!
//! let _attachment = controller.attach()?;
//! controller.load_configuration();
//! # Ok(())
//! # }
//! ```

use crate::error::Result;
use crate::events::{DataSource, EventBus, GotConfigurationEvent, Subscriber, SubscriberId};
use crate::jobs::{ConfigurationFetcher, GetConfigurationJob, JobScheduler};
use crate::logging::log_cache_operation;
use crate::models::Configuration;
use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Cache slot plus the counters describing how it has been used.
///
/// Shared between the controller and its bus registration.
#[derive(Default)]
struct CacheState {
    slot: RwLock<Option<Configuration>>,
    cache_hits: AtomicU64,
    fetches_submitted: AtomicU64,
    updates_received: AtomicU64,
    invalidations: AtomicU64,
}

impl CacheState {
    fn store(&self, configuration: Configuration) {
        *self.slot.write() = Some(configuration);
        self.updates_received.fetch_add(1, Ordering::Relaxed);
    }

    fn holds(&self, configuration: &Configuration) -> bool {
        self.slot
            .read()
            .as_ref()
            .is_some_and(|current| current.ptr_eq(configuration))
    }
}

impl Subscriber<GotConfigurationEvent> for CacheState {
    fn on_event(&self, event: &GotConfigurationEvent) {
        if event.source == DataSource::Cached && self.holds(&event.configuration) {
            // Replay of the value already in the slot
            self.updates_received.fetch_add(1, Ordering::Relaxed);
        } else {
            self.store(event.configuration.clone());
        }
        log_cache_operation("update", event.source, true);
    }

    fn subscriber_name(&self) -> &str {
        "configuration_controller"
    }
}

/// Lifecycle-bound cache of the remote configuration
pub struct ConfigurationController {
    bus: Arc<EventBus>,
    job_scheduler: Arc<dyn JobScheduler>,
    fetcher: Arc<dyn ConfigurationFetcher>,
    subscriber_id: SubscriberId,
    state: Arc<CacheState>,
}

impl ConfigurationController {
    /// Create a controller with an empty cache. Does not touch the bus.
    pub fn new(
        bus: Arc<EventBus>,
        job_scheduler: Arc<dyn JobScheduler>,
        fetcher: Arc<dyn ConfigurationFetcher>,
    ) -> Self {
        Self {
            bus,
            job_scheduler,
            fetcher,
            subscriber_id: SubscriberId::new(),
            state: Arc::new(CacheState::default()),
        }
    }

    /// Start observing configuration events.
    ///
    /// Fails with `AlreadyRegistered` if the controller is already started.
    pub fn on_start(&self) -> Result<()> {
        self.bus.register::<GotConfigurationEvent, _>(self.subscriber_id, Arc::clone(&self.state))
    }

    /// Stop observing configuration events.
    ///
    /// Fails with `NotRegistered` if the controller was not started.
    ///
    /// A publish that snapshotted the subscriber list before this call still
    /// delivers to the controller, so the slot may change once more after
    /// `on_stop` returns.
    pub fn on_stop(&self) -> Result<()> {
        self.bus.unregister(self.subscriber_id)
    }

    /// Start observing and stop again when the returned guard is dropped
    pub fn attach(&self) -> Result<ControllerAttachment<'_>> {
        self.on_start()?;
        Ok(ControllerAttachment { controller: self })
    }

    pub fn is_started(&self) -> bool {
        self.bus.is_registered(self.subscriber_id)
    }

    /// Deliver the configuration to subscribers.
    ///
    /// Publishes a cached event right away when a value is held, otherwise
    /// queues a fetch job. Two calls while the cache is empty queue two jobs.
    ///
    /// The slot lock is released before publishing. A network value stored in
    /// that window is overwritten by the older replayed value; a replay of the
    /// value still in the slot leaves it untouched.
    pub fn load_configuration(&self) {
        let cached = self.state.slot.read().clone();

        match cached {
            Some(configuration) => {
                self.state.cache_hits.fetch_add(1, Ordering::Relaxed);
                log_cache_operation("load", DataSource::Cached, true);
                self.bus.publish(GotConfigurationEvent::cached(configuration));
            }
            None => {
                self.state.fetches_submitted.fetch_add(1, Ordering::Relaxed);
                log_cache_operation("load", DataSource::Network, false);
                self.job_scheduler.submit(Box::new(GetConfigurationJob::new(
                    Arc::clone(&self.fetcher),
                    Arc::clone(&self.bus),
                )));
            }
        }
    }

    /// Replace the cached value with the event's configuration
    pub fn on_got_new_configuration(&self, event: &GotConfigurationEvent) {
        self.state.on_event(event);
    }

    /// Drop the cached value so the next load fetches again
    pub fn remove_configuration(&self) {
        let previous = self.state.slot.write().take();
        self.state.invalidations.fetch_add(1, Ordering::Relaxed);
        debug!(
            had_value = previous.is_some(),
            "Removed cached configuration"
        );
    }

    /// Current cache slot contents
    pub fn cached_configuration(&self) -> Option<Configuration> {
        self.state.slot.read().clone()
    }

    pub fn subscriber_id(&self) -> SubscriberId {
        self.subscriber_id
    }

    /// Get cache usage statistics
    pub fn stats(&self) -> ControllerStats {
        ControllerStats {
            cached: self.state.slot.read().is_some(),
            cache_hits: self.state.cache_hits.load(Ordering::Relaxed),
            fetches_submitted: self.state.fetches_submitted.load(Ordering::Relaxed),
            updates_received: self.state.updates_received.load(Ordering::Relaxed),
            invalidations: self.state.invalidations.load(Ordering::Relaxed),
        }
    }
}

impl fmt::Debug for ConfigurationController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigurationController")
            .field("subscriber_id", &self.subscriber_id)
            .field("cached", &self.state.slot.read().is_some())
            .finish()
    }
}

/// Keeps a controller registered on the bus until dropped
#[must_use = "the controller stops observing events when the attachment is dropped"]
pub struct ControllerAttachment<'a> {
    controller: &'a ConfigurationController,
}

impl ControllerAttachment<'_> {
    pub fn controller(&self) -> &ConfigurationController {
        self.controller
    }
}

impl Drop for ControllerAttachment<'_> {
    fn drop(&mut self) {
        // on_stop was possibly called by hand already
        if let Err(e) = self.controller.on_stop() {
            debug!(error = %e, "Attachment dropped for a stopped controller");
        }
    }
}

/// Cache usage statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControllerStats {
    pub cached: bool,
    pub cache_hits: u64,
    pub fetches_submitted: u64,
    pub updates_received: u64,
    pub invalidations: u64,
}
