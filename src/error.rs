//! Error types for the Formguard service.

use thiserror::Error;

/// Main error type for Formguard operations.
///
/// The rate limiter itself never fails; these cover configuration loading,
/// inquiry delivery and the HTTP listener.
#[derive(Error, Debug)]
pub enum FormguardError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// An inquiry could not be handed to its delivery sink
    #[error("Delivery error: {0}")]
    Delivery(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<::config::ConfigError> for FormguardError {
    fn from(err: ::config::ConfigError) -> Self {
        FormguardError::Config(err.to_string())
    }
}

/// Result type alias for Formguard operations.
pub type Result<T> = std::result::Result<T, FormguardError>;
