use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::ticket::TicketStatus;

/// Errors surfaced by the triage pipeline and the ticket store.
#[derive(Error, Debug)]
pub enum TriageError {
    /// No bucket holds a ticket with this id.
    #[error("Ticket not found: {0}")]
    NotFound(String),

    #[error("Transition not allowed: {from} -> {to}")]
    InvalidTransition {
        from: TicketStatus,
        to: TicketStatus,
    },

    /// The label is not one of the four lifecycle states.
    #[error("Invalid status: {0}")]
    InvalidStatus(String),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl TriageError {
    pub fn io(path: &Path, source: io::Error) -> Self {
        TriageError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, TriageError>;
