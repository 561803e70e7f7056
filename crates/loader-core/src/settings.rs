use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_DATA_DIR: &str = "/data/loader";
pub const DEFAULT_BOOT_LOG: &str = "/data/boot-log.txt";
pub const DEFAULT_TEMPERATURE_FILE: &str = "/sys/class/thermal/thermal_zone0/temp";
pub const DEFAULT_RECHECK_SECS: u64 = 60;
pub const DEFAULT_RETRY_SECS: u64 = 10;

const IMAGES_TO_LOAD: &str = "images_to_load";
const STACKS_TO_RUN: &str = "stacks_to_run";
const STACKS_TO_LOAD: &str = "stacks_to_load";

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// Static policy applied to every cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    excluded: BTreeSet<String>,
    pub delete_after_load: bool,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            excluded: BTreeSet::new(),
            delete_after_load: true,
        }
    }
}

impl Policy {
    pub fn new<I, S>(excluded: I, delete_after_load: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let excluded = excluded
            .into_iter()
            .map(|s| s.as_ref().trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();
        Self {
            excluded,
            delete_after_load,
        }
    }

    /// Case-insensitive membership in the excluded set.
    pub fn is_excluded(&self, stack_name: &str) -> bool {
        self.excluded.contains(&stack_name.to_lowercase())
    }

    pub fn excluded(&self) -> impl Iterator<Item = &str> {
        self.excluded.iter().map(String::as_str)
    }
}

// ---------------------------------------------------------------------------
// LoaderSettings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct LoaderSettings {
    pub data_dir: PathBuf,
    pub boot_log: PathBuf,
    pub policy: Policy,
    /// Wait after a successful cycle.
    pub recheck_period: Duration,
    /// Wait after a failed cycle.
    pub retry_period: Duration,
}

impl LoaderSettings {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            boot_log: PathBuf::from(DEFAULT_BOOT_LOG),
            policy: Policy::default(),
            recheck_period: Duration::from_secs(DEFAULT_RECHECK_SECS),
            retry_period: Duration::from_secs(DEFAULT_RETRY_SECS),
        }
    }

    pub fn images_dir(&self) -> PathBuf {
        self.data_dir.join(IMAGES_TO_LOAD)
    }

    pub fn stacks_to_run_dir(&self) -> PathBuf {
        self.data_dir.join(STACKS_TO_RUN)
    }

    pub fn stacks_to_load_dir(&self) -> PathBuf {
        self.data_dir.join(STACKS_TO_LOAD)
    }
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self::new(DEFAULT_DATA_DIR)
    }
}
