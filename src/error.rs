//! Error types for the configuration cache and its collaborators.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BufferError {
    #[error("Job error: {0}")]
    JobError(String),
    #[error("Fetch error: {0}")]
    FetchError(String),
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Subscriber {subscriber_id} is already registered for {event_type}")]
    AlreadyRegistered {
        subscriber_id: String,
        event_type: &'static str,
    },
    #[error("Subscriber {subscriber_id} is not registered")]
    NotRegistered { subscriber_id: String },
}

impl From<serde_json::Error> for BufferError {
    fn from(error: serde_json::Error) -> Self {
        BufferError::ValidationError(format!("JSON serialization error: {error}"))
    }
}

impl From<::config::ConfigError> for BufferError {
    fn from(error: ::config::ConfigError) -> Self {
        BufferError::ConfigurationError(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BufferError>;
