use std::path::PathBuf;
use thiserror::Error;

/// Per-file failures. Every one of these ends up as a `file-error` notification.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Analysis(#[from] midi_analysis::Error),

    #[error("rejected {file}: {reason}")]
    Rejected { file: String, reason: String },

    #[error("processing panicked: {0}")]
    Panicked(String),
}

impl IngestError {
    pub fn rejected(file: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Rejected {
            file: file.into(),
            reason: reason.into(),
        }
    }
}
