//! Error types for the thrift-messaging library.
//!
//! Validation and authorization failures carry a specific, mappable kind.
//! Storage failures are collapsed into a generic [`MessagingError::Persistence`]
//! whose display text never leaks the underlying storage detail; the source is
//! still available for logging.

use thiserror::Error;

/// Errors that can occur in the messaging core.
#[derive(Error, Debug)]
pub enum MessagingError {
    /// Input rejected before touching storage
    #[error("Validation error: {0}")]
    Validation(String),

    /// Conversation or message does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller is not allowed to perform the operation
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Storage failure (connectivity, constraint violation, worker crash)
    #[error("Operation failed")]
    Persistence(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Notification could not be delivered. Never surfaced to senders.
    #[error("Notification delivery failed: {0}")]
    Notification(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Convenience type alias for Result with `MessagingError`
pub type Result<T> = std::result::Result<T, MessagingError>;

impl MessagingError {
    /// HTTP-style status code for an outer transport layer.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) | Self::InvalidConfig(_) => 400,
            Self::Forbidden(_) => 403,
            Self::NotFound(_) => 404,
            Self::Persistence(_) | Self::Notification(_) => 500,
        }
    }

    /// Short machine-readable kind, used as a metrics label.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::NotFound(_) => "not_found",
            Self::Forbidden(_) => "forbidden",
            Self::Persistence(_) => "persistence",
            Self::Notification(_) => "notification",
            Self::InvalidConfig(_) => "config",
        }
    }
}

impl From<rusqlite::Error> for MessagingError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Persistence(Box::new(err))
    }
}

impl From<r2d2::Error> for MessagingError {
    fn from(err: r2d2::Error) -> Self {
        Self::Persistence(Box::new(err))
    }
}

impl From<tokio::task::JoinError> for MessagingError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Persistence(Box::new(err))
    }
}
