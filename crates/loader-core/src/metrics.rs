use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::Serialize;
use sysinfo::{Disks, System};

use crate::aggregate::percentage;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiskUsage {
    /// Bytes.
    pub total: u64,
    /// Bytes available.
    pub free: u64,
    /// Percent used.
    pub usage: u32,
}

impl DiskUsage {
    pub fn new(total: u64, free: u64) -> Self {
        Self {
            total,
            free,
            usage: percentage(total.saturating_sub(free), total),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CpuStatus {
    /// Percent across all cores.
    pub usage: u32,
    /// Degrees Celsius; 0 when unavailable.
    pub temperature: i64,
}

/// Host readings included in every status snapshot.
pub trait HostMetrics: Send + Sync {
    fn disk(&self) -> DiskUsage;
    fn cpu(&self) -> CpuStatus;
}

/// [`HostMetrics`] backed by `sysinfo` plus a thermal-zone file.
pub struct SystemMetrics {
    data_root: PathBuf,
    temperature_file: PathBuf,
    // CPU usage is a delta between refreshes, so the same System is reused.
    system: Mutex<System>,
}

impl SystemMetrics {
    pub fn new(data_root: impl Into<PathBuf>, temperature_file: impl Into<PathBuf>) -> Self {
        let mut system = System::new();
        system.refresh_cpu();
        Self {
            data_root: data_root.into(),
            temperature_file: temperature_file.into(),
            system: Mutex::new(system),
        }
    }
}

impl HostMetrics for SystemMetrics {
    fn disk(&self) -> DiskUsage {
        let disks = Disks::new_with_refreshed_list();
        let target = self
            .data_root
            .canonicalize()
            .unwrap_or_else(|_| self.data_root.clone());
        // The filesystem holding the data root is the deepest mount above it.
        disks
            .list()
            .iter()
            .filter(|d| target.starts_with(d.mount_point()))
            .max_by_key(|d| d.mount_point().as_os_str().len())
            .map(|d| DiskUsage::new(d.total_space(), d.available_space()))
            .unwrap_or_default()
    }

    fn cpu(&self) -> CpuStatus {
        let usage = match self.system.lock() {
            Ok(mut system) => {
                system.refresh_cpu();
                system.global_cpu_info().cpu_usage().clamp(0.0, 100.0) as u32
            }
            Err(_) => 0,
        };
        CpuStatus {
            usage,
            temperature: read_temperature(&self.temperature_file),
        }
    }
}

/// Millidegree thermal-zone reading in whole degrees; 0 if unreadable.
pub fn read_temperature(path: &Path) -> i64 {
    std::fs::read_to_string(path)
        .ok()
        .and_then(|s| s.trim().parse::<f64>().ok())
        .map(|milli| (milli / 1000.0) as i64)
        .unwrap_or(0)
}
