//! Per-cycle discovery of staged archives and stack manifests.

use std::path::{Path, PathBuf};

use crate::error::{LoaderError, Result};
use crate::settings::{LoaderSettings, Policy};

/// Everything one cycle will work on. Rebuilt from disk at the start of
/// every cycle; nothing carries over between cycles.
#[derive(Debug, Clone)]
pub struct RunConfiguration {
    pub uncompressed: Vec<PathBuf>,
    pub compressed: Vec<PathBuf>,
    pub stacks_to_run: Vec<PathBuf>,
    pub stacks_to_load: Vec<PathBuf>,
    pub policy: Policy,
}

impl RunConfiguration {
    pub fn scan(settings: &LoaderSettings) -> Result<Self> {
        let images = settings.images_dir();
        let config = Self {
            uncompressed: list_with_suffix(&images, &[".tar"])?,
            compressed: list_with_suffix(&images, &[".tar.gz"])?,
            stacks_to_run: list_with_suffix(&settings.stacks_to_run_dir(), &[".yaml", ".yml"])?,
            stacks_to_load: list_with_suffix(&settings.stacks_to_load_dir(), &[".yaml", ".yml"])?,
            policy: settings.policy.clone(),
        };
        config.log_summary();
        Ok(config)
    }

    pub fn is_empty(&self) -> bool {
        self.uncompressed.is_empty()
            && self.compressed.is_empty()
            && self.stacks_to_run.is_empty()
            && self.stacks_to_load.is_empty()
    }

    fn log_summary(&self) {
        tracing::info!(
            uncompressed = %file_names(&self.uncompressed),
            compressed = %file_names(&self.compressed),
            stacks_to_load = %file_names(&self.stacks_to_load),
            stacks_to_run = %file_names(&self.stacks_to_run),
            exclude_run = %self.policy.excluded().collect::<Vec<_>>().join(","),
            delete = self.policy.delete_after_load,
            "scanned loader configuration"
        );
    }
}

/// Regular files directly inside `dir` whose name ends with one of
/// `suffixes`, sorted by path. A missing directory has no files.
fn list_with_suffix(dir: &Path, suffixes: &[&str]) -> Result<Vec<PathBuf>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(LoaderError::Scan {
                path: dir.to_path_buf(),
                source,
            })
        }
    };

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| LoaderError::Scan {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if name.starts_with('.') {
            continue;
        }
        if suffixes.iter().any(|s| name.ends_with(s)) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn file_names(paths: &[PathBuf]) -> String {
    if paths.is_empty() {
        return "(none)".to_string();
    }
    paths.iter().map(|p| file_name(p)).collect::<Vec<_>>().join(", ")
}
