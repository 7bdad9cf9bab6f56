pub mod bus;
pub mod types;

// Re-export key types for convenience
pub use bus::{
    EventBus, EventBusConfig, EventBusStats, SharedEventBus, Subscriber, SubscriberId,
    SubscriptionDetail,
};
pub use types::{constants, DataSource, Event, GotConfigurationEvent};
