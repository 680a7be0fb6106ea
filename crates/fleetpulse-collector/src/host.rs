use crate::Collector;
use anyhow::Result;
use fleetpulse_common::types::Record;
use std::path::{Path, PathBuf};
use sysinfo::{Networks, System};

const DMI_ROOT: &str = "/sys/class/dmi/id";
const UNKNOWN_DEVICE: &str = "Unknown";
const UNAVAILABLE: &str = "Unavailable";

/// Host identity: names, hardware identifiers and operating system.
pub struct HostCollector {
    dmi_root: PathBuf,
    networks: Networks,
}

impl HostCollector {
    pub fn new() -> Self {
        Self::with_dmi_root(DMI_ROOT)
    }

    /// Reads device and serial information from `dmi_root` instead of sysfs.
    pub fn with_dmi_root(dmi_root: impl Into<PathBuf>) -> Self {
        Self {
            dmi_root: dmi_root.into(),
            networks: Networks::new_with_refreshed_list(),
        }
    }

    fn primary_mac(&self) -> Option<String> {
        let mut interfaces: Vec<_> = self.networks.iter().collect();
        interfaces.sort_by(|a, b| a.0.cmp(b.0));
        interfaces
            .into_iter()
            .filter(|(name, _)| name.as_str() != "lo")
            .map(|(_, data)| data.mac_address().to_string())
            .find(|mac| mac != "00:00:00:00:00:00")
    }
}

impl Default for HostCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl Collector for HostCollector {
    fn name(&self) -> &str {
        "host"
    }

    fn collect(&mut self) -> Result<Record> {
        let mut record = Record::new();
        record.insert(
            "hostname",
            System::host_name().unwrap_or_else(|| "unknown".to_string()),
        );
        record.insert("device_name", device_name(&self.dmi_root));
        record.insert(
            "serial_number",
            serial_number(&self.dmi_root).unwrap_or_else(|| UNAVAILABLE.to_string()),
        );
        record.insert(
            "mac_address",
            self.primary_mac().unwrap_or_else(|| UNAVAILABLE.to_string()),
        );
        record.insert("os", os_family(std::env::consts::OS));
        record.insert("os_release", System::kernel_version().unwrap_or_default());
        record.insert(
            "os_version",
            System::long_os_version()
                .or_else(System::os_version)
                .unwrap_or_default(),
        );
        record.insert("architecture", format!("{}bit", usize::BITS));
        record.insert("machine", std::env::consts::ARCH);
        record.insert("agent_version", env!("CARGO_PKG_VERSION"));
        Ok(record)
    }
}

fn os_family(os: &str) -> String {
    match os {
        "linux" => "Linux".to_string(),
        "macos" => "Darwin".to_string(),
        "windows" => "Windows".to_string(),
        other => other.to_string(),
    }
}

fn read_trimmed(path: &Path) -> Option<String> {
    std::fs::read_to_string(path)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// `"<vendor> <product>"`, or whichever of the two is known.
fn device_name(dmi_root: &Path) -> String {
    let vendor = read_trimmed(&dmi_root.join("sys_vendor"));
    let product = read_trimmed(&dmi_root.join("product_name"));
    match (vendor, product) {
        (Some(v), Some(p)) => format!("{v} {p}"),
        (Some(v), None) => v,
        (None, Some(p)) => p,
        (None, None) => UNKNOWN_DEVICE.to_string(),
    }
}

fn serial_number(dmi_root: &Path) -> Option<String> {
    read_trimmed(&dmi_root.join("product_serial")).filter(|s| !s.eq_ignore_ascii_case("none"))
}
