//! Subprocess-backed collaborators: the `docker` CLI and `docker-compose`.

use std::collections::HashSet;
use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

use crate::error::{LoaderError, Result};
use crate::runtime::{BytesProgress, ContainerRuntime, LineProgress, StackOrchestrator};
use crate::shutdown::Shutdown;

/// Archive bytes written to `docker load` per chunk.
pub const LOAD_CHUNK_BYTES: usize = 8 * 1024 * 1024;

const STDERR_EXCERPT: usize = 500;

/// Resolve `program` on `PATH`, distinguishing a missing tool from a failing one.
fn locate(program: &str) -> Result<std::path::PathBuf> {
    which::which(program).map_err(|_| LoaderError::ToolMissing(program.to_string()))
}

fn excerpt(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim()
        .chars()
        .take(STDERR_EXCERPT)
        .collect()
}

fn exit_reason(status: std::process::ExitStatus, stderr: &[u8]) -> String {
    let code = match status.code() {
        Some(code) => format!("exited with code {code}"),
        None => "terminated by signal".to_string(),
    };
    let stderr = excerpt(stderr);
    if stderr.is_empty() {
        code
    } else {
        format!("{code}: {stderr}")
    }
}

/// Fill `buf` unless the reader hits EOF first.
async fn read_chunk<R>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// Read a child pipe to the end on its own task.
fn drain<R>(pipe: Option<R>) -> Option<JoinHandle<Vec<u8>>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    pipe.map(|mut pipe| {
        tokio::spawn(async move {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf).await;
            buf
        })
    })
}

async fn collect(task: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    match task {
        Some(task) => task.await.unwrap_or_default(),
        None => Vec::new(),
    }
}

async fn cancel<T>(mut child: Child) -> Result<T> {
    let _ = child.kill().await;
    Err(LoaderError::Cancelled)
}

// ---------------------------------------------------------------------------
// DockerCli
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct DockerCli {
    program: String,
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new("docker")
    }
}

impl DockerCli {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn subprocess_error(&self, reason: impl std::fmt::Display) -> LoaderError {
        LoaderError::Subprocess {
            program: self.program.clone(),
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl ContainerRuntime for DockerCli {
    async fn load_archive(
        &self,
        archive: &Path,
        progress: &mut BytesProgress<'_>,
        shutdown: &Shutdown,
    ) -> Result<String> {
        let exe = locate(&self.program)?;
        let mut file = tokio::fs::File::open(archive).await?;

        let mut child = Command::new(exe)
            .arg("load")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.subprocess_error(e))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| self.subprocess_error("stdin not captured"))?;
        // Both pipes drain while the archive is written, so a tool that
        // reports before it finishes reading cannot stall the write.
        let stdout_task = drain(child.stdout.take());
        let stderr_task = drain(child.stderr.take());

        let mut buf = vec![0u8; LOAD_CHUNK_BYTES];
        let mut transferred = 0u64;
        loop {
            if shutdown.is_triggered() {
                return cancel(child).await;
            }
            let n = read_chunk(&mut file, &mut buf).await?;
            if n == 0 {
                break;
            }
            let written = tokio::select! {
                res = stdin.write_all(&buf[..n]) => Some(res),
                _ = shutdown.triggered() => None,
            };
            match written {
                None => return cancel(child).await,
                Some(Err(e)) => {
                    // The tool closed its input early; its exit status explains why.
                    tracing::debug!(archive = %archive.display(), "docker load stdin closed: {e}");
                    break;
                }
                Some(Ok(())) => {}
            }
            transferred += n as u64;
            progress(transferred);
        }
        drop(stdin);

        let status = child.wait().await.map_err(|e| self.subprocess_error(e))?;
        let stdout = collect(stdout_task).await;
        let stderr = collect(stderr_task).await;
        if !status.success() {
            return Err(LoaderError::Load {
                archive: archive.to_path_buf(),
                reason: exit_reason(status, &stderr),
            });
        }
        Ok(String::from_utf8_lossy(&stdout).into_owned())
    }

    async fn image_exists(&self, reference: &str) -> Result<bool> {
        let exe = locate(&self.program)?;
        let output = Command::new(exe)
            .args(["images", "--format", "{{.Repository}}:{{.Tag}}"])
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| self.subprocess_error(e))?;
        if !output.status.success() {
            return Err(self.subprocess_error(exit_reason(output.status, &output.stderr)));
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        let images: HashSet<&str> = stdout.lines().map(str::trim).collect();
        Ok(images.contains(reference))
    }

    async fn pull(&self, reference: &str, progress: &mut LineProgress<'_>) -> Result<String> {
        let exe = locate(&self.program)?;
        let mut child = Command::new(exe)
            .args(["pull", reference])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.subprocess_error(e))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| self.subprocess_error("stdout not captured"))?;

        // Drain stderr concurrently so a chatty failure cannot stall stdout.
        let stderr_task = drain(child.stderr.take());

        let mut transcript = String::new();
        let mut lines = BufReader::new(stdout).lines();
        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            transcript.push('\n');
            transcript.push_str(line);
            progress(line);
        }

        let status = child.wait().await.map_err(|e| self.subprocess_error(e))?;
        let stderr = collect(stderr_task).await;
        if !status.success() {
            return Err(LoaderError::Pull {
                reference: reference.to_string(),
                reason: exit_reason(status, &stderr),
            });
        }
        Ok(transcript)
    }
}

// ---------------------------------------------------------------------------
// ComposeCli
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ComposeCli {
    program: String,
}

impl Default for ComposeCli {
    fn default() -> Self {
        Self::new("docker-compose")
    }
}

impl ComposeCli {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl StackOrchestrator for ComposeCli {
    async fn bring_up(&self, manifest: &Path, project: &str) -> Result<String> {
        let exe = locate(&self.program)?;
        let output = Command::new(exe)
            .arg("-p")
            .arg(project)
            .arg("--file")
            .arg(manifest)
            .args(["up", "-d"])
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| LoaderError::Subprocess {
                program: self.program.clone(),
                reason: e.to_string(),
            })?;
        if !output.status.success() {
            return Err(LoaderError::BringUp {
                stack: project.to_string(),
                reason: exit_reason(output.status, &output.stderr),
            });
        }
        // compose reports container progress on stderr
        Ok(String::from_utf8_lossy(&output.stderr).into_owned())
    }
}
