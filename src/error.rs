//! Error types for the optwatch library.

use thiserror::Error;

/// Main error type for options resolution operations.
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// The backing configuration store could not be read
    #[error("Source error: {message}")]
    Source { message: String },

    /// Malformed content in the backing configuration store
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// A validator rejected the fully-configured options value
    #[error("Validation of options '{name}' failed: {reason}")]
    Validation {
        /// Name of the pipeline that produced the rejected value
        name: String,
        /// First failure reason reported, in validator registration order
        reason: String,
    },
}

/// Result type alias for optwatch operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Configuration {
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Configuration {
            message: err.to_string(),
        }
    }
}
