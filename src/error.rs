//! Error types for the snippet pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while highlighting, capturing or sharing a snippet.
///
/// None of these are fatal: the pipeline translates highlight, capture and
/// storage failures into state values, and the remaining variants are
/// surfaced to the caller of the corresponding action.
#[derive(Error, Debug)]
pub enum Error {
    /// The highlighting engine failed
    #[error("Highlighting failed: {0}")]
    HighlightError(String),

    /// The capture engine failed to produce a bitmap
    #[error("Capture failed: {0}")]
    CaptureError(String),

    /// Reading or writing the snippet store failed
    #[error("Storage error: {0}")]
    StorageError(String),

    /// The remote service rejected a publish request
    #[error("Publish failed ({status}): {body}")]
    PublishError { status: u16, body: String },

    /// Network error
    #[error("Network error: {0}")]
    NetworkError(String),

    /// A creation id was neither numeric nor a URL
    #[error("Invalid creation id: {0}")]
    InvalidCreationId(String),

    /// No clipboard is available on this platform
    #[error("Clipboard is not supported here: {0}")]
    ClipboardUnsupported(String),

    /// Writing to the clipboard failed
    #[error("Clipboard error: {0}")]
    ClipboardError(String),

    /// A copy is already running
    #[error("A copy is already in progress")]
    CopyInProgress,

    /// The action needs an image and none has been generated
    #[error("No image has been generated yet")]
    NoArtifact,

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// The pipeline controller has shut down
    #[error("Pipeline closed")]
    Closed,

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::StorageError(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::StorageError(err.to_string())
    }
}

#[cfg(feature = "publish")]
impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::NetworkError(err.to_string())
    }
}
