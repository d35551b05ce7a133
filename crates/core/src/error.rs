//! Error taxonomy for an analysis session.
//!
//! Every variant's display string is what the user sees in the error panel,
//! so upload rejections display the server's reason verbatim.

use std::time::Duration;
use thiserror::Error;

/// A submit that never starts a session. The phase does not change.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please select a file to analyze")]
    NoFileSelected,
    #[error("Unsupported file type for '{name}'. Supported types: {allowed}")]
    UnsupportedFileType { name: String, allowed: String },
    #[error("File '{name}' is {size} bytes, which exceeds the {limit} byte limit")]
    FileTooLarge { name: String, size: u64, limit: u64 },
    #[error("File '{0}' is empty")]
    EmptyFile(String),
}

/// The upload request failed; no stream is opened.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadError {
    /// The server answered with a non-success status.
    #[error("{reason}")]
    Rejected { status: u16, reason: String },
    /// The request never completed.
    #[error("{0}")]
    Network(String),
    #[error("Upload timed out after {0:?}")]
    TimedOut(Duration),
    #[error("Invalid upload response: {0}")]
    MalformedResponse(String),
    #[error("Failed to read '{name}': {reason}")]
    Unreadable { name: String, reason: String },
}

/// A stream frame could not be decoded into the expected record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("Malformed stream frame: {0}")]
    InvalidJson(String),
    #[error("Stream frame carried neither a preview nor a message")]
    EmptyFrame,
    #[error("Stream frame was not valid UTF-8")]
    InvalidUtf8,
    #[error("Malformed event-stream framing: {0}")]
    Framing(String),
    /// More than this many bytes arrived without completing an event.
    #[error("Stream event exceeded {0} bytes")]
    EventTooLarge(usize),
}

/// The stream connection failed or was dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Failed to open analysis stream: {0}")]
    Connect(String),
    #[error("Analysis stream was refused with status {status}: {reason}")]
    Status { status: u16, reason: String },
    #[error("Analysis stream dropped: {0}")]
    Dropped(String),
    /// The client shut down while the stream was still open.
    #[error("Analysis stream closed by the client")]
    ClosedLocally,
}

/// Anything that terminates a session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Upload(#[from] UploadError),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The backend reported a failure inside the stream itself.
    #[error("{0}")]
    Server(String),
}

impl SessionError {
    /// A short machine-friendly label, used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            SessionError::Validation(_) => "validation",
            SessionError::Upload(_) => "upload",
            SessionError::Protocol(_) => "protocol",
            SessionError::Transport(_) => "transport",
            SessionError::Server(_) => "server",
        }
    }
}
