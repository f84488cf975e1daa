use std::io;
use thiserror::Error;

/// Result type for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Unified error type for all bridge operations
///
/// The C boundary flattens every variant into the operation's sentinel value;
/// Rust callers get the full error for logging and tests.
#[derive(Debug, Error)]
pub enum BridgeError {
    // Archive errors
    #[error("Archive not found: {0}")]
    ArchiveNotFound(String),

    #[error("Failed to open archive {path}: {source}")]
    ArchiveOpen {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Invalid archive name: {0:?}")]
    InvalidArchiveName(String),

    // Navigation errors
    #[error("Node not found in {archive}: {segment}")]
    NodeNotFound { archive: String, segment: String },

    #[error("Invalid node reference: {0}")]
    InvalidNode(u32),

    // Handle and argument errors
    #[error("Invalid or stale node handle")]
    InvalidHandle,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // Decode errors
    #[error("Decode failed: {0}")]
    Decode(String),

    // Lifecycle errors
    #[error("Bridge is not initialized")]
    NotInitialized,

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BridgeError {
    /// True for errors that mean "the thing asked for does not exist"
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            BridgeError::ArchiveNotFound(_)
                | BridgeError::ArchiveOpen { .. }
                | BridgeError::NodeNotFound { .. }
        )
    }
}

impl From<toml::de::Error> for BridgeError {
    fn from(err: toml::de::Error) -> Self {
        BridgeError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for BridgeError {
    fn from(err: toml::ser::Error) -> Self {
        BridgeError::Config(err.to_string())
    }
}
