//! Terminal presentation of a session.
//!
//! Everything here is derived from a [`SessionState`] snapshot; nothing in
//! this module changes session state.

use eda_core::{Phase, RoleClass, SessionState, TranscriptEntry, transcript};
use std::fmt;
use std::io::{self, Write};
use uuid::Uuid;

pub const SUBMIT_LABEL: &str = "Upload and Analyze";
pub const BUSY_LABEL: &str = "Analyzing...";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitControl {
    pub enabled: bool,
    pub label: &'static str,
}

/// Everything the user sees for one snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct View {
    pub submit: SubmitControl,
    pub file_name: Option<String>,
    pub notice: Option<String>,
    pub error: Option<String>,
    /// Only present when the preview is non-empty.
    pub preview: Option<String>,
    pub entries: Vec<TranscriptEntry>,
}

impl View {
    pub fn from_state(state: &SessionState) -> Self {
        let busy = state.phase.is_busy();
        Self {
            submit: SubmitControl {
                enabled: !busy,
                label: if busy { BUSY_LABEL } else { SUBMIT_LABEL },
            },
            file_name: state.selected_file.as_ref().map(|file| file.name.clone()),
            notice: state.notice.clone(),
            error: state.error.clone(),
            preview: state.preview.clone().filter(|preview| !preview.is_empty()),
            entries: transcript::entries(&state.transcript),
        }
    }
}

fn entry_line(entry: &TranscriptEntry) -> String {
    match entry.role {
        RoleClass::Neutral => format!("{}: {}", entry.sender, entry.content),
        role => format!("[{}] {}: {}", role, entry.sender, entry.content),
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let marker = if self.submit.enabled { "" } else { " (disabled)" };
        match &self.file_name {
            Some(name) => writeln!(f, "[{}]{} {}", self.submit.label, marker, name)?,
            None => writeln!(f, "[{}]{}", self.submit.label, marker)?,
        }
        if let Some(notice) = &self.notice {
            writeln!(f, "Notice: {}", notice)?;
        }
        if let Some(error) = &self.error {
            writeln!(f, "Error: {}", error)?;
        }
        if let Some(preview) = &self.preview {
            writeln!(f, "\nData Preview:\n{}", preview)?;
        }
        if !self.entries.is_empty() {
            writeln!(f, "\nAgent Chat History:")?;
            for entry in &self.entries {
                writeln!(f, "{}", entry_line(entry))?;
            }
        }
        Ok(())
    }
}

/// Writes a session to a terminal as it unfolds, printing each piece once.
pub struct TerminalPrinter<W: Write> {
    out: W,
    session_id: Option<Uuid>,
    printed_entries: usize,
    preview: Option<String>,
    notice: Option<String>,
    settled: bool,
}

impl<W: Write> TerminalPrinter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            session_id: None,
            printed_entries: 0,
            preview: None,
            notice: None,
            settled: false,
        }
    }

    /// Prints whatever `state` adds over the snapshots already printed.
    pub fn render(&mut self, state: &SessionState) -> io::Result<()> {
        let view = View::from_state(state);

        if view.notice != self.notice {
            if let Some(notice) = &view.notice {
                writeln!(self.out, "Notice: {}", notice)?;
            }
            self.notice = view.notice.clone();
        }

        if state.session_id != self.session_id {
            self.session_id = state.session_id;
            self.printed_entries = 0;
            self.preview = None;
            self.settled = false;
            if let Some(name) = &view.file_name {
                writeln!(self.out, "{} {}", BUSY_LABEL, name)?;
            }
        }

        if view.preview.is_some() && view.preview != self.preview {
            if let Some(preview) = &view.preview {
                writeln!(self.out, "\nData Preview:\n{}\n", preview)?;
            }
            self.preview = view.preview.clone();
        }

        for entry in view.entries.iter().skip(self.printed_entries) {
            writeln!(self.out, "{}", entry_line(entry))?;
        }
        self.printed_entries = self.printed_entries.max(view.entries.len());

        if state.phase == Phase::Settled && !self.settled {
            self.settled = true;
            match &view.error {
                Some(error) => writeln!(self.out, "\nError: {}", error)?,
                None => writeln!(
                    self.out,
                    "\nAnalysis complete ({} messages)",
                    view.entries.len()
                )?,
            }
        }
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
