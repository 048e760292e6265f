use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Mutex;
use sysinfo::{Disks, System};

use super::SystemLoadReader;

/// Host-wide utilisation, each value a percentage in `0.0..=100.0`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SystemLoad {
    pub cpu: f32,
    pub mem: f32,
    pub disk: f32,
}

/// [`SystemLoadReader`] backed by `sysinfo`.
pub struct SysinfoLoadReader {
    system: Mutex<System>,
}

impl SysinfoLoadReader {
    pub fn new() -> Self {
        let mut system = System::new();
        // CPU usage is a delta between refreshes; take the baseline now.
        system.refresh_cpu_usage();
        Self {
            system: Mutex::new(system),
        }
    }
}

impl Default for SysinfoLoadReader {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemLoadReader for SysinfoLoadReader {
    fn is_available(&self) -> bool {
        sysinfo::IS_SUPPORTED_SYSTEM
    }

    fn read_system_load(&self) -> Option<SystemLoad> {
        let mut system = self.system.lock().unwrap_or_else(|e| e.into_inner());

        system.refresh_cpu_usage();
        std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
        system.refresh_cpu_usage();
        system.refresh_memory();

        let total_mem = system.total_memory();
        if total_mem == 0 {
            log::debug!("sysinfo reported zero total memory; no reading");
            return None;
        }
        let mem = percent(total_mem - system.available_memory().min(total_mem), total_mem);
        let cpu = system.global_cpu_usage();

        let disks = Disks::new_with_refreshed_list();
        let disk = disks
            .list()
            .iter()
            .find(|d| d.mount_point() == Path::new("/"))
            .or_else(|| disks.list().first())
            .filter(|d| d.total_space() > 0)
            .map(|d| {
                let total = d.total_space();
                percent(total - d.available_space().min(total), total)
            })?;

        Some(SystemLoad { cpu, mem, disk })
    }
}

fn percent(used: u64, total: u64) -> f32 {
    ((used as f64 / total as f64) * 1000.0).round() as f32 / 10.0
}
