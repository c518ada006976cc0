use thiserror::Error;

use crate::beat::Beat;
use crate::engine::TimingIssue;
use crate::notes::Note;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Malformed note data or timing text.
    #[error("format error{}: {message}", location(.beat, .column))]
    Format {
        beat: Option<Beat>,
        column: Option<usize>,
        message: String,
    },

    #[error("orphaned head note: {0:?}")]
    OrphanedHead(Note),

    #[error("orphaned tail note: {0:?}")]
    OrphanedTail(Note),

    #[error("timing inconsistency: {0}")]
    TimingInconsistency(TimingIssue),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn format(message: impl Into<String>) -> Self {
        Self::Format {
            beat: None,
            column: None,
            message: message.into(),
        }
    }

    pub(crate) fn format_at(beat: Beat, column: Option<usize>, message: impl Into<String>) -> Self {
        Self::Format {
            beat: Some(beat),
            column,
            message: message.into(),
        }
    }

    /// The beat the error points at, when it has one.
    pub fn beat(&self) -> Option<Beat> {
        match self {
            Self::Format { beat, .. } => *beat,
            Self::OrphanedHead(note) | Self::OrphanedTail(note) => Some(note.beat),
            Self::TimingInconsistency(issue) => Some(issue.beat()),
        }
    }
}

fn location(beat: &Option<Beat>, column: &Option<usize>) -> String {
    match (beat, column) {
        (Some(beat), Some(column)) => format!(" at beat {beat}, column {column}"),
        (Some(beat), None) => format!(" at beat {beat}"),
        (None, Some(column)) => format!(" in column {column}"),
        (None, None) => String::new(),
    }
}
