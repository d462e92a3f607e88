//! Common error types for upup.

use thiserror::Error;

/// Top-level error type for upup operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Required environment values are absent or empty.
    ///
    /// Fatal: aborts aggregator construction. `missing` lists every absent
    /// name, in declaration order.
    #[error("Missing environment variables: {}", .missing.join(", "))]
    Configuration { missing: Vec<String> },

    /// Provider rejected authentication or the user cancelled it.
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Provider listing call failed.
    #[error("Listing error: {0}")]
    Listing(String),

    /// Transfer to object storage failed.
    #[error("Transfer error: {0}")]
    Transfer(String),

    /// A transfer was requested while the upload gate is closed.
    #[error("Upload disabled: {0}")]
    UploadDisabled(String),

    /// The adapter does not implement this operation.
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Operation is not valid in the adapter's current state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Resource already exists.
    #[error("Already exists: {0}")]
    AlreadyExists(String),
}

impl Error {
    /// Build a configuration error from the missing variable names.
    pub fn missing_env<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Configuration {
            missing: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether the host may retry the failed operation on the same adapter.
    ///
    /// Configuration errors are fatal; everything reported per adapter is
    /// recoverable.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Authentication(_)
                | Error::Listing(_)
                | Error::Transfer(_)
                | Error::UploadDisabled(_)
        )
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
