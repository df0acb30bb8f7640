//! Error types for dballoc core

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using the dballoc Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while selecting, allocating or probing a test database
#[derive(Error, Debug)]
pub enum Error {
    /// Missing, empty or out-of-range configuration property, unknown mode
    #[error("Configuration error: {0}")]
    Config(String),

    /// Driver artifact cannot be read or resolved
    #[error("Driver artifact {path:?} is not usable: {reason}")]
    DriverArtifact {
        /// Path (or coordinate) that was tried
        path: PathBuf,
        /// Why it was rejected
        reason: String,
    },

    /// No driver is registered under the requested class name
    #[error("Unknown driver class: {0}")]
    UnknownDriver(String),

    /// The loaded driver does not understand the connection URL
    #[error("Malformed connection URL: {0}")]
    MalformedUrl(String),

    /// Connection or statement failure; retried by the heartbeat probe
    #[error("SQL error: {0}")]
    Sql(String),

    /// The external allocation service refused or failed a request
    #[error("Allocation error: {0}")]
    Allocation(String),

    /// Container runtime failure
    #[error("Container error: {0}")]
    Container(String),

    /// The database never answered the heartbeat statement in time
    #[error("Database not ready: {0}")]
    NotReady(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP transport errors talking to the allocation service
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Configuration file parse errors
    #[error("Config file error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a SQL error
    pub fn sql(msg: impl Into<String>) -> Self {
        Self::Sql(msg.into())
    }

    /// Create an allocation error
    pub fn allocation(msg: impl Into<String>) -> Self {
        Self::Allocation(msg.into())
    }

    /// Create a container error
    pub fn container(msg: impl Into<String>) -> Self {
        Self::Container(msg.into())
    }

    /// Create a driver artifact error
    pub fn driver_artifact(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::DriverArtifact {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Setup failures that retrying cannot fix.
    ///
    /// Everything except [`Error::Sql`] aborts a probe immediately.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::Sql(_))
    }
}
