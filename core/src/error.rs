//! Error types for surge-core

use thiserror::Error;

use crate::config::ConfigError;

/// Core error type
///
/// Only conditions detected before or around dispatch end up here. Failures of
/// individual requests are carried as [`crate::OutcomeStatus`] values instead.
#[derive(Error, Debug)]
pub enum Error {
    /// Run configuration is invalid
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A required builder field was not set
    #[error("missing required configuration: {0}")]
    MissingConfig(&'static str),

    /// The HTTP client could not be constructed
    #[error("HTTP client error: {0}")]
    Client(String),

    /// The dispatcher or aggregator task failed
    #[error("dispatch error: {0}")]
    Dispatch(String),
}

impl Error {
    /// Error for a builder field that was never provided
    pub fn missing_config(field: &'static str) -> Self {
        Self::MissingConfig(field)
    }

    /// Error raised while building an HTTP client
    pub fn client(message: impl Into<String>) -> Self {
        Self::Client(message.into())
    }

    /// Error raised by the dispatch pipeline itself
    pub fn dispatch(message: impl Into<String>) -> Self {
        Self::Dispatch(message.into())
    }

    /// Whether this error stems from user-supplied configuration
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_) | Self::MissingConfig(_))
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_config_message() {
        let err = Error::missing_config("executor");
        assert!(err.to_string().contains("executor"));
        assert!(err.is_config());
    }

    #[test]
    fn test_config_error_conversion() {
        let err: Error = ConfigError::InvalidConcurrency(0).into();
        assert!(err.is_config());
        assert!(err.to_string().starts_with("configuration error"));
    }

    #[test]
    fn test_dispatch_error_is_not_config() {
        assert!(!Error::dispatch("aggregator panicked").is_config());
        assert!(!Error::client("bad tls").is_config());
    }
}
