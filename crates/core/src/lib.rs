//! Domain types for an incrementally streamed data-analysis session.
//!
//! Nothing here performs I/O beyond reading file metadata; transport and the
//! control loop live in the client crate.

pub mod error;
pub mod event;
pub mod file;
pub mod role;
pub mod session;
pub mod transcript;

pub use error::{ProtocolError, SessionError, TransportError, UploadError, ValidationError};
pub use event::{StreamEvent, StreamUpdate};
pub use file::{SelectedFile, UploadPolicy};
pub use role::{RoleClass, classify};
pub use session::{Phase, SessionState};
pub use transcript::{TranscriptEntry, parse};
