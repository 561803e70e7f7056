use std::path::PathBuf;

use serde::Serialize;

use crate::error::Result;
use crate::manifest::StackManifest;
use crate::scan::RunConfiguration;

#[derive(Debug, Clone, Serialize)]
pub struct PlannedStack {
    pub path: PathBuf,
    pub name: String,
    pub images: Vec<String>,
    /// Images are still pulled, but the stack is never brought up.
    pub excluded: bool,
}

impl PlannedStack {
    fn new(manifest: StackManifest, excluded: bool) -> Self {
        Self {
            path: manifest.path,
            name: manifest.name,
            images: manifest.images,
            excluded,
        }
    }
}

/// The deterministic unit-of-work list for one cycle, in execution order.
#[derive(Debug, Clone, Serialize)]
pub struct CyclePlan {
    pub uncompressed: Vec<PathBuf>,
    pub compressed: Vec<PathBuf>,
    pub stacks_to_run: Vec<PlannedStack>,
    pub stacks_to_load: Vec<PlannedStack>,
    pub delete_after_load: bool,
}

impl CyclePlan {
    /// Parse every manifest up front so a broken one fails the cycle before
    /// any work starts.
    pub fn build(config: &RunConfiguration) -> Result<Self> {
        let stacks_to_run = config
            .stacks_to_run
            .iter()
            .map(|path| {
                let manifest = StackManifest::load(path)?;
                let excluded = config.policy.is_excluded(&manifest.name);
                Ok(PlannedStack::new(manifest, excluded))
            })
            .collect::<Result<Vec<_>>>()?;
        let stacks_to_load = config
            .stacks_to_load
            .iter()
            .map(|path| Ok(PlannedStack::new(StackManifest::load(path)?, false)))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            uncompressed: config.uncompressed.clone(),
            compressed: config.compressed.clone(),
            stacks_to_run,
            stacks_to_load,
            delete_after_load: config.policy.delete_after_load,
        })
    }

    /// Leaf units of work across every phase: one per archive and one per
    /// image reference in every stack. Bring-ups are not counted.
    pub fn root_total(&self) -> u64 {
        let archives = self.uncompressed.len() + self.compressed.len();
        let images: usize = self
            .stacks_to_run
            .iter()
            .chain(&self.stacks_to_load)
            .map(|s| s.images.len())
            .sum();
        (archives + images) as u64
    }
}
