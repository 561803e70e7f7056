use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{LoaderError, Result};

#[derive(Debug, Deserialize)]
struct ComposeFile {
    services: Option<BTreeMap<String, ComposeService>>,
}

#[derive(Debug, Deserialize)]
struct ComposeService {
    #[serde(default)]
    image: Option<String>,
}

/// A stack manifest reduced to what a cycle needs: where it lives, what the
/// stack is called and which images its services reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackManifest {
    pub path: PathBuf,
    pub name: String,
    /// Unique image references, sorted.
    pub images: Vec<String>,
}

impl StackManifest {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| LoaderError::Scan {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(path, &text)
    }

    pub fn parse(path: &Path, text: &str) -> Result<Self> {
        let file: ComposeFile = serde_yaml::from_str(text).map_err(|e| LoaderError::Manifest {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let services = file.services.ok_or_else(|| LoaderError::Manifest {
            path: path.to_path_buf(),
            reason: "no 'services' mapping".to_string(),
        })?;

        let mut images = BTreeSet::new();
        for (service, config) in services {
            match config.image {
                Some(image) if !image.trim().is_empty() => {
                    images.insert(image.trim().to_string());
                }
                _ => tracing::warn!(
                    manifest = %path.display(),
                    service = %service,
                    "service declares no image, skipping"
                ),
            }
        }

        Ok(Self {
            path: path.to_path_buf(),
            name: stack_name(path),
            images: images.into_iter().collect(),
        })
    }
}

/// File name with a trailing `.yaml` or `.yml` removed.
pub fn stack_name(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    name.strip_suffix(".yaml")
        .or_else(|| name.strip_suffix(".yml"))
        .map(str::to_string)
        .unwrap_or(name)
}
