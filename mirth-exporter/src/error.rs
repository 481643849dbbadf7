//! Error types for report fetching.

use std::process::ExitStatus;
use std::time::Duration;

use thiserror::Error;

/// Result type alias using [`FetchError`].
pub type Result<T> = std::result::Result<T, FetchError>;

/// Errors that abort a single collection cycle.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The query script file could not be created or written.
    #[error("Failed to prepare query file: {0}")]
    TempFile(#[source] std::io::Error),

    /// The CLI could not be started.
    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The CLI did not finish in time and was killed.
    #[error("Mirth CLI did not finish within {0:?}")]
    Timeout(Duration),

    /// The CLI exited unsuccessfully.
    #[error("Mirth CLI exited with {status}: {stderr}")]
    ExitStatus { status: ExitStatus, stderr: String },

    /// The CLI printed too little to be a status report.
    #[error("Unexpected output: {0}")]
    UnexpectedOutput(String),
}

impl FetchError {
    /// Short, stable name of the error kind, used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TempFile(_) => "temp_file",
            Self::Spawn { .. } => "spawn",
            Self::Timeout(_) => "timeout",
            Self::ExitStatus { .. } => "exit_status",
            Self::UnexpectedOutput(_) => "unexpected_output",
        }
    }
}
