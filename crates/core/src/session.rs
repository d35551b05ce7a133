//! Session state and its transitions.
//!
//! `SessionState` is a single record so that a transition always replaces
//! phase and data together. The controller is its only writer; every other
//! component reads cloned snapshots.

use crate::error::{SessionError, ValidationError};
use crate::event::StreamUpdate;
use crate::file::SelectedFile;
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

/// The lifecycle stage of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Idle,
    Uploading,
    Streaming,
    Settled,
}

impl Phase {
    /// True while a session is in flight and the submit control is disabled.
    pub fn is_busy(&self) -> bool {
        matches!(self, Phase::Uploading | Phase::Streaming)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionState {
    /// Locally generated, identifies the session in logs.
    pub session_id: Option<Uuid>,
    pub phase: Phase,
    pub selected_file: Option<SelectedFile>,
    /// The identifier the server assigned to the uploaded data.
    pub upload_id: Option<String>,
    /// Last preview received. Replaced, never appended.
    pub preview: Option<String>,
    /// Raw message lines in arrival order.
    pub transcript: Vec<String>,
    /// Why the session failed. Only ever set together with `Settled`.
    pub error: Option<String>,
    /// A rejected submit. Does not affect the phase.
    pub notice: Option<String>,
}

impl SessionState {
    pub fn is_settled(&self) -> bool {
        self.phase == Phase::Settled
    }

    /// Starts a fresh session for `file`, discarding everything from the
    /// previous one.
    pub fn begin(&mut self, file: SelectedFile) -> Uuid {
        let session_id = Uuid::new_v4();
        *self = SessionState {
            session_id: Some(session_id),
            phase: Phase::Uploading,
            selected_file: Some(file),
            ..SessionState::default()
        };
        session_id
    }

    /// Records a rejected submit without touching the current session.
    pub fn reject(&mut self, err: &ValidationError) {
        self.notice = Some(err.to_string());
    }

    /// `Uploading -> Streaming`. Returns false if the phase did not allow it.
    pub fn upload_succeeded(&mut self, upload_id: String) -> bool {
        if self.phase != Phase::Uploading {
            warn!(phase = ?self.phase, "Ignoring upload result outside of Uploading");
            return false;
        }
        self.phase = Phase::Streaming;
        self.upload_id = Some(upload_id);
        true
    }

    /// Moves an in-flight session to `Settled` with `err`. Received preview
    /// and transcript are kept.
    pub fn fail(&mut self, err: &SessionError) -> bool {
        if !self.phase.is_busy() {
            warn!(phase = ?self.phase, error = %err, "Ignoring failure outside of an active session");
            return false;
        }
        self.phase = Phase::Settled;
        self.error = Some(err.to_string());
        true
    }

    /// Folds one stream update into the state. Only valid while `Streaming`.
    pub fn apply(&mut self, update: StreamUpdate) -> bool {
        if self.phase != Phase::Streaming {
            warn!(phase = ?self.phase, ?update, "Dropping stream update outside of Streaming");
            return false;
        }
        match update {
            StreamUpdate::Preview(preview) => self.preview = Some(preview),
            StreamUpdate::Message(message) => self.transcript.push(message),
            StreamUpdate::Ended => self.phase = Phase::Settled,
            StreamUpdate::Failed(err) => return self.fail(&err),
        }
        true
    }
}
