//! # Event Bus
//!
//! Synchronous publish/subscribe bus with typed dispatch.
//!
//! ## Overview
//!
//! Subscribers implement [`Subscriber<E>`] for each event type they care about
//! and are registered under a [`SubscriberId`]. Publishing an event delivers it,
//! on the caller's thread and before `publish` returns, to every subscriber
//! currently registered for that exact event type.
//!
//! Dispatch is keyed by [`TypeId`], so the set of handlers that can receive an
//! event is fixed at compile time by the trait bounds at the registration site.
//!
//! ## Usage
//!
//! ```rust
//! use buffer_config::events::{EventBus, GotConfigurationEvent, Subscriber, SubscriberId};
//! use buffer_config::models::Configuration;
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl Subscriber<GotConfigurationEvent> for Printer {
//!     fn on_event(&self, event: &GotConfigurationEvent) {
//!         println!("configuration from {}", event.source);
//!     }
//! }
//!
//! let bus = EventBus::new();
//! let id = SubscriberId::new();
//! bus.register::<GotConfigurationEvent, _>(id, Arc::new(Printer)).unwrap();
//!
//! let delivered = bus.publish(GotConfigurationEvent::network(
//!     Configuration::from_value(serde_json::json!({})),
//! ));
//! assert_eq!(delivered, 1);
//!
//! bus.unregister(id).unwrap();
//! ```

use crate::error::{BufferError, Result};
use crate::events::types::Event;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::any::{Any, TypeId};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info};
use uuid::Uuid;

/// Receives events of type `E` from the bus
pub trait Subscriber<E: Event>: Send + Sync {
    /// Handle a published event. Runs synchronously inside `publish`.
    fn on_event(&self, event: &E);

    /// Name used in logs and statistics
    fn subscriber_name(&self) -> &str {
        "unnamed_subscriber"
    }
}

/// Identity of a registration on the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub_{}", &self.0.simple().to_string()[..8])
    }
}

/// Event bus configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventBusConfig {
    /// Catch panics raised by handlers so delivery continues to other subscribers
    pub catch_handler_panics: bool,
    /// Log events that were published while nobody was listening
    pub log_dead_events: bool,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            catch_handler_panics: true,
            log_dead_events: true,
        }
    }
}

type ErasedHandler = Arc<dyn Fn(&dyn Any) + Send + Sync>;

#[derive(Clone)]
struct Subscription {
    subscriber_id: SubscriberId,
    subscriber_name: String,
    event_name: &'static str,
    handler: ErasedHandler,
    registered_at: DateTime<Utc>,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("subscriber_id", &self.subscriber_id)
            .field("subscriber_name", &self.subscriber_name)
            .field("event_name", &self.event_name)
            .field("handler", &"<Arc<dyn Fn(&dyn Any)>>")
            .field("registered_at", &self.registered_at)
            .finish()
    }
}

/// Typed synchronous event bus
pub struct EventBus {
    config: EventBusConfig,
    /// Event type to its registered subscriptions, in registration order
    subscriptions: DashMap<TypeId, Vec<Subscription>>,
    events_published: AtomicU64,
    deliveries: AtomicU64,
}

/// Shared EventBus wrapped in Arc for thread-safe sharing
pub type SharedEventBus = Arc<EventBus>;

impl EventBus {
    /// Create a new event bus with default configuration
    pub fn new() -> Self {
        Self::with_config(EventBusConfig::default())
    }

    /// Create a new event bus with custom configuration
    pub fn with_config(config: EventBusConfig) -> Self {
        debug!(
            catch_handler_panics = config.catch_handler_panics,
            "EventBus initialized"
        );
        Self {
            config,
            subscriptions: DashMap::new(),
            events_published: AtomicU64::new(0),
            deliveries: AtomicU64::new(0),
        }
    }

    /// Register `subscriber` for events of type `E`.
    ///
    /// A subscriber id may hold one registration per event type; a second
    /// registration for the same type is rejected.
    pub fn register<E, S>(&self, subscriber_id: SubscriberId, subscriber: Arc<S>) -> Result<()>
    where
        E: Event,
        S: Subscriber<E> + 'static,
    {
        let subscriber_name = subscriber.subscriber_name().to_string();
        let handler: ErasedHandler = Arc::new(move |event: &dyn Any| {
            if let Some(event) = event.downcast_ref::<E>() {
                subscriber.on_event(event);
            }
        });

        let mut entry = self.subscriptions.entry(TypeId::of::<E>()).or_default();
        if entry.iter().any(|s| s.subscriber_id == subscriber_id) {
            return Err(BufferError::AlreadyRegistered {
                subscriber_id: subscriber_id.to_string(),
                event_type: E::EVENT_NAME,
            });
        }

        entry.push(Subscription {
            subscriber_id,
            subscriber_name: subscriber_name.clone(),
            event_name: E::EVENT_NAME,
            handler,
            registered_at: Utc::now(),
        });
        drop(entry);

        info!(
            subscriber_id = %subscriber_id,
            subscriber_name = %subscriber_name,
            event_name = E::EVENT_NAME,
            "Registered subscriber"
        );
        Ok(())
    }

    /// Remove every registration held by `subscriber_id`
    pub fn unregister(&self, subscriber_id: SubscriberId) -> Result<()> {
        let mut removed = 0usize;
        self.subscriptions.retain(|_, subs| {
            let before = subs.len();
            subs.retain(|s| s.subscriber_id != subscriber_id);
            removed += before - subs.len();
            !subs.is_empty()
        });

        if removed == 0 {
            return Err(BufferError::NotRegistered {
                subscriber_id: subscriber_id.to_string(),
            });
        }

        info!(
            subscriber_id = %subscriber_id,
            registrations = removed,
            "Unregistered subscriber"
        );
        Ok(())
    }

    /// Whether `subscriber_id` holds any registration
    pub fn is_registered(&self, subscriber_id: SubscriberId) -> bool {
        self.subscriptions
            .iter()
            .any(|entry| entry.value().iter().any(|s| s.subscriber_id == subscriber_id))
    }

    /// Deliver `event` to every subscriber registered for `E`.
    ///
    /// Returns the number of subscribers the event was handed to.
    pub fn publish<E: Event>(&self, event: E) -> usize {
        self.events_published.fetch_add(1, Ordering::Relaxed);

        // Snapshot so handlers may publish or (un)register without deadlocking
        let targets: Vec<Subscription> = self
            .subscriptions
            .get(&TypeId::of::<E>())
            .map(|subs| subs.value().clone())
            .unwrap_or_default();

        if targets.is_empty() {
            if self.config.log_dead_events {
                debug!(event_name = E::EVENT_NAME, "No subscribers for event");
            }
            return 0;
        }

        let mut delivered = 0;
        for subscription in &targets {
            if self.deliver(subscription, &event) {
                delivered += 1;
            }
        }

        self.deliveries.fetch_add(delivered as u64, Ordering::Relaxed);
        debug!(
            event_name = E::EVENT_NAME,
            delivered = delivered,
            "Published event"
        );
        delivered
    }

    fn deliver(&self, subscription: &Subscription, event: &dyn Any) -> bool {
        if !self.config.catch_handler_panics {
            (subscription.handler)(event);
            return true;
        }

        match catch_unwind(AssertUnwindSafe(|| (subscription.handler)(event))) {
            Ok(()) => true,
            Err(_) => {
                error!(
                    subscriber_id = %subscription.subscriber_id,
                    subscriber_name = %subscription.subscriber_name,
                    event_name = subscription.event_name,
                    "Subscriber panicked while handling event"
                );
                false
            }
        }
    }

    /// Number of subscribers currently registered for `E`
    pub fn subscriber_count<E: Event>(&self) -> usize {
        self.subscriptions
            .get(&TypeId::of::<E>())
            .map(|subs| subs.len())
            .unwrap_or(0)
    }

    /// Get bus statistics
    pub fn stats(&self) -> EventBusStats {
        let mut stats = EventBusStats {
            event_types: self.subscriptions.len(),
            subscriptions: 0,
            events_published: self.events_published.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            subscription_details: Vec::new(),
        };

        for entry in self.subscriptions.iter() {
            for subscription in entry.value() {
                stats.subscriptions += 1;
                stats.subscription_details.push(SubscriptionDetail {
                    subscriber_id: subscription.subscriber_id,
                    subscriber_name: subscription.subscriber_name.clone(),
                    event_name: subscription.event_name,
                    registered_at: subscription.registered_at,
                });
            }
        }

        stats
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("config", &self.config)
            .field("event_types", &self.subscriptions.len())
            .field("events_published", &self.events_published.load(Ordering::Relaxed))
            .finish()
    }
}

/// Statistics about the bus
#[derive(Debug, Clone)]
pub struct EventBusStats {
    pub event_types: usize,
    pub subscriptions: usize,
    pub events_published: u64,
    pub deliveries: u64,
    pub subscription_details: Vec<SubscriptionDetail>,
}

/// Details about a single registration
#[derive(Debug, Clone)]
pub struct SubscriptionDetail {
    pub subscriber_id: SubscriberId,
    pub subscriber_name: String,
    pub event_name: &'static str,
    pub registered_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    struct Ping(u32);

    impl Event for Ping {
        const EVENT_NAME: &'static str = "test.ping";
    }

    #[derive(Debug, Clone)]
    struct Pong;

    impl Event for Pong {
        const EVENT_NAME: &'static str = "test.pong";
    }

    /// Test subscriber implementation
    #[derive(Default)]
    struct Recorder {
        pings: Mutex<Vec<u32>>,
        pongs: Mutex<u32>,
    }

    impl Subscriber<Ping> for Recorder {
        fn on_event(&self, event: &Ping) {
            self.pings.lock().push(event.0);
        }

        fn subscriber_name(&self) -> &str {
            "recorder"
        }
    }

    impl Subscriber<Pong> for Recorder {
        fn on_event(&self, _event: &Pong) {
            *self.pongs.lock() += 1;
        }
    }

    struct Panicker;

    impl Subscriber<Ping> for Panicker {
        fn on_event(&self, _event: &Ping) {
            panic!("handler failure");
        }
    }

    #[test]
    fn test_publish_reaches_matching_type_only() {
        let bus = EventBus::new();
        let recorder = Arc::new(Recorder::default());
        let id = SubscriberId::new();

        bus.register::<Ping, _>(id, recorder.clone()).unwrap();

        assert_eq!(bus.publish(Ping(7)), 1);
        assert_eq!(bus.publish(Pong), 0);

        assert_eq!(*recorder.pings.lock(), vec![7]);
        assert_eq!(*recorder.pongs.lock(), 0);
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let bus = EventBus::new();
        let recorder = Arc::new(Recorder::default());
        let id = SubscriberId::new();

        bus.register::<Ping, _>(id, recorder.clone()).unwrap();
        let err = bus.register::<Ping, _>(id, recorder.clone()).unwrap_err();
        assert!(matches!(err, BufferError::AlreadyRegistered { .. }));

        // Same id may still subscribe to a different event type
        bus.register::<Pong, _>(id, recorder).unwrap();
        assert_eq!(bus.stats().subscriptions, 2);
    }

    #[test]
    fn test_unregister_removes_all_event_types() {
        let bus = EventBus::new();
        let recorder = Arc::new(Recorder::default());
        let id = SubscriberId::new();

        bus.register::<Ping, _>(id, recorder.clone()).unwrap();
        bus.register::<Pong, _>(id, recorder.clone()).unwrap();
        assert!(bus.is_registered(id));

        bus.unregister(id).unwrap();
        assert!(!bus.is_registered(id));
        assert_eq!(bus.publish(Ping(1)), 0);
        assert_eq!(bus.stats().event_types, 0);

        let err = bus.unregister(id).unwrap_err();
        assert!(matches!(err, BufferError::NotRegistered { .. }));
    }

    #[test]
    fn test_panicking_subscriber_does_not_block_others() {
        let bus = EventBus::new();
        let recorder = Arc::new(Recorder::default());

        bus.register::<Ping, _>(SubscriberId::new(), Arc::new(Panicker))
            .unwrap();
        bus.register::<Ping, _>(SubscriberId::new(), recorder.clone())
            .unwrap();

        assert_eq!(bus.publish(Ping(3)), 1);
        assert_eq!(*recorder.pings.lock(), vec![3]);
    }

    #[test]
    fn test_reentrant_publish_from_handler() {
        struct Relay {
            bus: Arc<EventBus>,
        }

        impl Subscriber<Ping> for Relay {
            fn on_event(&self, _event: &Ping) {
                self.bus.publish(Pong);
            }
        }

        let bus = Arc::new(EventBus::new());
        let recorder = Arc::new(Recorder::default());

        bus.register::<Ping, _>(SubscriberId::new(), Arc::new(Relay { bus: bus.clone() }))
            .unwrap();
        bus.register::<Pong, _>(SubscriberId::new(), recorder.clone())
            .unwrap();

        bus.publish(Ping(1));
        assert_eq!(*recorder.pongs.lock(), 1);
    }

    #[test]
    fn test_stats_track_deliveries() {
        let bus = EventBus::new();
        let a = Arc::new(Recorder::default());
        let b = Arc::new(Recorder::default());

        bus.register::<Ping, _>(SubscriberId::new(), a).unwrap();
        bus.register::<Ping, _>(SubscriberId::new(), b).unwrap();

        bus.publish(Ping(1));
        bus.publish(Pong);

        let stats = bus.stats();
        assert_eq!(stats.events_published, 2);
        assert_eq!(stats.deliveries, 2);
        assert_eq!(bus.subscriber_count::<Ping>(), 2);
        assert_eq!(bus.subscriber_count::<Pong>(), 0);
        assert!(stats
            .subscription_details
            .iter()
            .all(|d| d.subscriber_name == "recorder" && d.event_name == "test.ping"));
    }
}
