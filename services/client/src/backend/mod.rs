//! The seam between the session controller and the analysis backend.
//!
//! - `protocol`: JSON bodies returned by the backend's HTTP endpoints.
//! - `http`: the `reqwest` implementation used by the binary.

pub mod http;
pub mod protocol;

use async_trait::async_trait;
use bytes::Bytes;
use eda_core::{SelectedFile, TransportError, UploadError};
use futures::Stream;
use std::pin::Pin;

pub use http::HttpBackend;

/// Raw bytes of the server-push connection, in arrival order.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<Bytes, TransportError>> + Send>>;

/// What the backend returns for an accepted upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    /// Opaque identifier addressing the analysis stream.
    pub upload_id: String,
    pub message: Option<String>,
}

/// The two operations the controller needs from the analysis backend.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    /// Uploads the file and returns the identifier of the stored data.
    async fn upload(&self, file: &SelectedFile) -> Result<UploadReceipt, UploadError>;

    /// Opens the event stream for previously uploaded data.
    async fn open_stream(&self, upload_id: &str) -> Result<FrameStream, TransportError>;
}
