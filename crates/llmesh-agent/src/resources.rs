//! Host resource detection.
//!
//! CPU and RAM come from the host; accelerators are declared in config
//! because there is no vendor probing.

use sysinfo::System;
use tracing::debug;

use llmesh_core::{GpuInfo, ResourceInfo};

/// Total physical memory in MB (best effort).
pub fn total_memory_mb() -> i64 {
    let mut sys = System::new();
    sys.refresh_memory();
    (sys.total_memory() / 1024 / 1024) as i64
}

/// Snapshot the host's resources with nothing allocated yet. Layer
/// capacity is operator-configured, not derived from the host.
pub fn detect_resources(max_layers: i32, gpus: Vec<GpuInfo>) -> ResourceInfo {
    let resources = ResourceInfo {
        cpu_cores: num_cpus::get() as i64,
        memory_mb: total_memory_mb(),
        gpus,
        max_layers,
        used_layers: 0,
    };
    debug!(
        cpu_cores = resources.cpu_cores,
        memory_mb = resources.memory_mb,
        gpus = resources.gpus.len(),
        max_layers,
        "detected host resources"
    );
    resources
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detection_reports_host() {
        let gpus = vec![GpuInfo {
            name: "A100".into(),
            memory_mb: 40960,
            uuid: "gpu-0".into(),
        }];
        let resources = detect_resources(20, gpus);
        assert!(resources.cpu_cores >= 1);
        assert!(resources.memory_mb > 0);
        assert_eq!(resources.max_layers, 20);
        assert_eq!(resources.used_layers, 0);
        assert!(resources.has_gpus());
    }
}
