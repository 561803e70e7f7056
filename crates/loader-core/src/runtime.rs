//! Capability interfaces for the external tools a cycle drives.
//!
//! The sequencer only talks to these traits; [`crate::docker`] provides the
//! subprocess-backed implementations and tests substitute in-memory doubles.

use std::path::Path;

use async_trait::async_trait;

use crate::error::Result;
use crate::shutdown::Shutdown;

/// Receives the cumulative number of archive bytes handed to the runtime.
pub type BytesProgress<'a> = dyn FnMut(u64) + Send + 'a;

/// Receives each line of a pull's progress stream as it arrives.
pub type LineProgress<'a> = dyn FnMut(&str) + Send + 'a;

#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Stream an image archive into the runtime, reporting bytes as they go.
    /// Shutdown is checked before every chunk. Returns the tool's output.
    async fn load_archive(
        &self,
        archive: &Path,
        progress: &mut BytesProgress<'_>,
        shutdown: &Shutdown,
    ) -> Result<String>;

    async fn image_exists(&self, reference: &str) -> Result<bool>;

    /// Pull an image, forwarding every progress line. Returns the transcript.
    async fn pull(&self, reference: &str, progress: &mut LineProgress<'_>) -> Result<String>;
}

#[async_trait]
pub trait StackOrchestrator: Send + Sync {
    /// Start the services of `manifest` under `project`. Returns the tool's
    /// diagnostic output.
    async fn bring_up(&self, manifest: &Path, project: &str) -> Result<String>;
}
