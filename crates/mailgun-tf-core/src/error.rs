//! Error types for the Mailgun provider
//!
//! Every fallible operation in the workspace returns [`Result`]. Handler
//! failures are wrapped with the name of the failing operation through
//! [`Error::context`] so the host can surface a short, readable message while
//! callers can still inspect the underlying cause.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for provider operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the Mailgun provider
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input (bad resource configuration, malformed address, ...)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Authentication errors (HTTP 401/403)
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Remote object not found (HTTP 404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limiting errors (HTTP 429)
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Transport-level HTTP errors
    #[error("HTTP error: {0}")]
    Http(String),

    /// Provider-specific error
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// A handler or retry loop ran past its deadline
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// State store-related errors
    #[error("State store error: {0}")]
    StateStore(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A failure wrapped with the operation that produced it
    #[error("{operation}: {source}")]
    Operation {
        /// Short static description of the failing operation
        operation: String,
        /// Underlying error
        #[source]
        source: Box<Error>,
    },

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a rate limit error
    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create a state store error
    pub fn state_store(msg: impl Into<String>) -> Self {
        Self::StateStore(msg.into())
    }

    /// Create a provider-specific error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Wrap an error with the operation that failed
    pub fn context(operation: impl Into<String>, source: Error) -> Self {
        Self::Operation {
            operation: operation.into(),
            source: Box::new(source),
        }
    }

    /// The innermost error, skipping operation wrappers
    pub fn root(&self) -> &Error {
        match self {
            Self::Operation { source, .. } => source.root(),
            other => other,
        }
    }

    /// Whether the root cause is a missing remote object
    pub fn is_not_found(&self) -> bool {
        matches!(self.root(), Self::NotFound(_))
    }

    /// Whether the root cause is a deadline expiry
    pub fn is_timeout(&self) -> bool {
        matches!(self.root(), Self::Timeout(_))
    }
}

/// Extension for attaching an operation description to a fallible call
pub trait ResultExt<T> {
    /// Wrap the error (if any) with `operation`
    fn context(self, operation: &'static str) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, operation: &'static str) -> Result<T> {
        self.map_err(|e| Error::context(operation, e))
    }
}
