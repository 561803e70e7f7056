//! Best-effort side effects: the boot-event log and delete-after-load.
//! Boot-log failures are logged and dropped here; a failed delete is
//! returned as `Housekeeping` for the caller to tolerate.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{LoaderError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BootPhase {
    Loading,
    Done,
}

#[derive(Debug, Serialize)]
struct BootEvent<'a> {
    phase: BootPhase,
    msg: &'a str,
}

/// Append-only, line-delimited JSON record of provisioning milestones.
#[derive(Debug, Clone)]
pub struct BootLog {
    path: PathBuf,
}

impl BootLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record(&self, phase: BootPhase, msg: impl AsRef<str>) {
        if let Err(e) = self.append(phase, msg.as_ref()) {
            tracing::warn!("boot log: {e}");
        }
    }

    fn append(&self, phase: BootPhase, msg: &str) -> Result<()> {
        let housekeeping = |source: std::io::Error| LoaderError::Housekeeping {
            path: self.path.clone(),
            source,
        };
        let mut line = serde_json::to_string(&BootEvent { phase, msg })
            .map_err(|e| housekeeping(std::io::Error::other(e)))?;
        line.push('\n');
        let mut f = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(housekeeping)?;
        f.write_all(line.as_bytes()).map_err(housekeeping)?;
        f.flush().map_err(housekeeping)?;
        Ok(())
    }
}

/// Delete a processed archive or manifest.
pub fn remove_artifact(path: &Path) -> Result<()> {
    tracing::info!(path = %path.display(), "removing processed artifact");
    std::fs::remove_file(path).map_err(|source| LoaderError::Housekeeping {
        path: path.to_path_buf(),
        source,
    })
}
