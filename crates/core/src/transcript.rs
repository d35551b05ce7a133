//! Transcript line handling.
//!
//! Each message pushed by the backend is a single `"<sender>:<content>"`
//! string. Lines are kept raw in the session state and only turned into
//! [`TranscriptEntry`] values when they are displayed.

use crate::role::{RoleClass, classify};
use serde::Serialize;

/// Whether a raw line contained the `:` separator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineShape {
    /// Sender and content were split at the first `:`.
    Separated,
    /// No `:` was present; the whole line is the sender.
    SenderOnly,
}

/// The result of splitting a raw transcript line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLine {
    pub sender: String,
    pub content: String,
    pub shape: LineShape,
}

impl ParsedLine {
    /// Lines whose trimmed content is empty carry nothing to display.
    pub fn is_displayable(&self) -> bool {
        !self.content.is_empty()
    }
}

/// Splits a line at the first `:`, trimming both halves.
///
/// Later colons belong to the content, so `"Coder: x: y"` keeps `"x: y"`.
pub fn parse(line: &str) -> ParsedLine {
    match line.split_once(':') {
        Some((sender, content)) => ParsedLine {
            sender: sender.trim().to_string(),
            content: content.trim().to_string(),
            shape: LineShape::Separated,
        },
        None => ParsedLine {
            sender: line.trim().to_string(),
            content: String::new(),
            shape: LineShape::SenderOnly,
        },
    }
}

/// A displayed (sender, content, role) triple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranscriptEntry {
    pub sender: String,
    pub content: String,
    pub role: RoleClass,
}

impl TranscriptEntry {
    /// Derives an entry from a raw line, or `None` when it has no content.
    pub fn from_line(line: &str) -> Option<Self> {
        let parsed = parse(line);
        if !parsed.is_displayable() {
            return None;
        }
        let role = classify(&parsed.sender);
        Some(Self {
            sender: parsed.sender,
            content: parsed.content,
            role,
        })
    }
}

/// Derives the displayable entries of a transcript, preserving order.
pub fn entries<S: AsRef<str>>(lines: &[S]) -> Vec<TranscriptEntry> {
    lines
        .iter()
        .filter_map(|line| TranscriptEntry::from_line(line.as_ref()))
        .collect()
}
