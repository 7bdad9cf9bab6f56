//! # Models
//!
//! Value objects handed between the controller, the event bus and fetch jobs.

pub mod configuration;

pub use configuration::Configuration;
