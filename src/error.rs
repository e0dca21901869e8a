//! Error types for the relay pipeline
//!
//! [`TransportError`] is what the remote transport and local storage raise.
//! [`ClassifiedError`] is what the operator sees.

use std::fmt;
use thiserror::Error;

/// Errors raised by the remote transport or local storage
#[derive(Error, Debug)]
pub enum TransportError {
    /// MTProto call rejected by Telegram or lost on the wire
    #[error("{0}")]
    Remote(String),
    /// The client is not connected, or was already disconnected
    #[error("not connected")]
    NotConnected,
    /// Local file system error
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Any other transport failure
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Build a free-form transport error
    #[must_use]
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }

    /// Wrap a client-side failure, keeping only its message
    #[must_use]
    pub fn remote(err: impl fmt::Display) -> Self {
        Self::Remote(err.to_string())
    }
}

/// Failure classes reported to the operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Photo could not be downloaded
    Download,
    /// Photo could not be uploaded to the destination conversation
    Upload,
    /// Staged file could not be removed
    FileDelete,
    /// Anything else, including startup failures
    General,
}

impl ErrorKind {
    /// Name shown in the operator notice
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Download => "DownloadError",
            Self::Upload => "UploadError",
            Self::FileDelete => "FileDeleteError",
            Self::General => "GeneralError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A failure tagged with the step that produced it
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct ClassifiedError {
    /// Failure class
    pub kind: ErrorKind,
    /// Human-readable description including the underlying cause
    pub message: String,
}

impl ClassifiedError {
    /// Create a classified error of the given kind
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Download step failure
    #[must_use]
    pub fn download(cause: &impl fmt::Display) -> Self {
        Self::new(ErrorKind::Download, format!("Error downloading media: {cause}"))
    }

    /// Upload step failure
    #[must_use]
    pub fn upload(cause: &impl fmt::Display) -> Self {
        Self::new(ErrorKind::Upload, format!("Error uploading media: {cause}"))
    }

    /// Cleanup step failure
    #[must_use]
    pub fn file_delete(cause: &impl fmt::Display) -> Self {
        Self::new(
            ErrorKind::FileDelete,
            format!("Error deleting local file: {cause}"),
        )
    }

    /// Catch-all failure inside the per-event handler
    #[must_use]
    pub fn handler(cause: &impl fmt::Display) -> Self {
        Self::new(ErrorKind::General, format!("Error in handler: {cause}"))
    }

    /// Catch-all failure during startup
    #[must_use]
    pub fn setup(cause: &impl fmt::Display) -> Self {
        Self::new(ErrorKind::General, format!("Error in main setup: {cause}"))
    }

    /// Two-line notice delivered to the operator
    #[must_use]
    pub fn notice(&self) -> String {
        format!("Error: {}\nMessage: {}", self.kind, self.message)
    }
}
