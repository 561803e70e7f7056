use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("cannot read {}: {source}", path.display())]
    Scan {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid stack manifest {}: {reason}", path.display())]
    Manifest { path: PathBuf, reason: String },

    #[error("failed to load archive {}: {reason}", archive.display())]
    Load { archive: PathBuf, reason: String },

    #[error("failed to pull image {reference}: {reason}")]
    Pull { reference: String, reason: String },

    #[error("failed to bring up stack {stack}: {reason}")]
    BringUp { stack: String, reason: String },

    #[error("'{program}' failed: {reason}")]
    Subprocess { program: String, reason: String },

    #[error("'{0}' not found on PATH")]
    ToolMissing(String),

    #[error("housekeeping failed for {}: {source}", path.display())]
    Housekeeping {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("interrupted by shutdown")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl LoaderError {
    /// Housekeeping (boot log, delete-after-load) is best-effort; every other
    /// failure aborts the remainder of the cycle.
    pub fn aborts_cycle(&self) -> bool {
        !matches!(self, LoaderError::Housekeeping { .. })
    }
}

pub type Result<T> = std::result::Result<T, LoaderError>;
