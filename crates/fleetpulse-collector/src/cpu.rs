use crate::{round_to, Collector};
use anyhow::Result;
use fleetpulse_common::types::Record;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Instant;
use sysinfo::{System, MINIMUM_CPU_UPDATE_INTERVAL};

const CPUFREQ_ROOT: &str = "/sys/devices/system/cpu/cpu0/cpufreq";

pub struct CpuCollector {
    system: System,
    cpufreq_root: PathBuf,
    last_refresh: Instant,
}

impl CpuCollector {
    pub fn new() -> Self {
        Self::with_cpufreq_root(CPUFREQ_ROOT)
    }

    /// Reads the frequency range from `cpufreq_root` instead of sysfs.
    pub fn with_cpufreq_root(cpufreq_root: impl Into<PathBuf>) -> Self {
        let mut system = System::new();
        // Usage is a delta between refreshes; prime the first sample.
        system.refresh_cpu_all();
        Self {
            system,
            cpufreq_root: cpufreq_root.into(),
            last_refresh: Instant::now(),
        }
    }

    fn refresh(&mut self) {
        let elapsed = self.last_refresh.elapsed();
        if elapsed < MINIMUM_CPU_UPDATE_INTERVAL {
            std::thread::sleep(MINIMUM_CPU_UPDATE_INTERVAL - elapsed);
        }
        self.system.refresh_cpu_all();
        self.last_refresh = Instant::now();
    }
}

impl Default for CpuCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl Collector for CpuCollector {
    fn name(&self) -> &str {
        "cpu"
    }

    fn collect(&mut self) -> Result<Record> {
        self.refresh();
        let cpus = self.system.cpus();
        let mut record = Record::new();

        let brand = cpus.first().map(|c| c.brand().trim()).unwrap_or_default();
        record.insert(
            "processor",
            if brand.is_empty() {
                std::env::consts::ARCH
            } else {
                brand
            },
        );
        record.insert(
            "physical_cpu_cores",
            self.system
                .physical_core_count()
                .map(Value::from)
                .unwrap_or(Value::Null),
        );
        record.insert("logical_cpu_cores", cpus.len());

        let per_core: Vec<f64> = cpus.iter().map(|c| c.cpu_usage() as f64).collect();
        let avg = average_usage(&per_core);
        record.insert("avg_cpu_per_core_usage_percent", avg);
        record.insert("cpu_usage_percent", avg);

        let freq = cpus.first().map(|c| c.frequency()).unwrap_or(0);
        let (min, max) = frequency_range(&self.cpufreq_root);
        record.insert("cpu_freq_current_mhz", freq);
        record.insert("cpu_freq_min_mhz", min);
        record.insert("cpu_freq_max_mhz", max);

        Ok(record)
    }
}

fn average_usage(per_core: &[f64]) -> f64 {
    if per_core.is_empty() {
        return 0.0;
    }
    round_to(per_core.iter().sum::<f64>() / per_core.len() as f64, 1)
}

/// Hardware frequency limits in MHz; `0` when the kernel does not expose them.
fn frequency_range(cpufreq_root: &Path) -> (u64, u64) {
    let read_mhz = |name: &str| {
        std::fs::read_to_string(cpufreq_root.join(name))
            .ok()
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map(|khz| khz / 1000)
            .unwrap_or(0)
    };
    (read_mhz("cpuinfo_min_freq"), read_mhz("cpuinfo_max_freq"))
}
