//! The record carried by each frame of the analysis stream and the typed
//! updates it decodes into.

use crate::error::{ProtocolError, SessionError};
use serde::Deserialize;

/// One decoded stream frame. At least one field is present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct StreamEvent {
    pub preview: Option<String>,
    pub message: Option<String>,
    /// Set by the backend when it cannot analyze the uploaded data.
    pub error: Option<String>,
}

/// A typed update handed to the session controller, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamUpdate {
    /// Replaces the current data preview.
    Preview(String),
    /// Appends one raw line to the transcript.
    Message(String),
    /// The server closed the stream normally.
    Ended,
    /// The stream cannot continue.
    Failed(SessionError),
}

impl StreamUpdate {
    /// Terminal updates end the sequence; nothing follows them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamUpdate::Ended | StreamUpdate::Failed(_))
    }
}

impl StreamEvent {
    /// Decodes one frame payload.
    ///
    /// `null` fields count as absent. A frame with no known field is a
    /// protocol violation rather than something to skip.
    pub fn decode(payload: &str) -> Result<Self, ProtocolError> {
        let event: StreamEvent = serde_json::from_str(payload)
            .map_err(|e| ProtocolError::InvalidJson(e.to_string()))?;
        if event.preview.is_none() && event.message.is_none() && event.error.is_none() {
            return Err(ProtocolError::EmptyFrame);
        }
        Ok(event)
    }

    /// Splits the record into updates: preview first, then message, then
    /// any server-reported failure. Empty strings produce no update.
    pub fn into_updates(self) -> Vec<StreamUpdate> {
        let mut updates = Vec::with_capacity(2);
        if let Some(preview) = self.preview.filter(|p| !p.is_empty()) {
            updates.push(StreamUpdate::Preview(preview));
        }
        if let Some(message) = self.message.filter(|m| !m.is_empty()) {
            updates.push(StreamUpdate::Message(message));
        }
        if let Some(error) = self.error {
            let reason = if error.trim().is_empty() {
                "The analysis server reported an error".to_string()
            } else {
                error
            };
            updates.push(StreamUpdate::Failed(SessionError::Server(reason)));
        }
        updates
    }
}
