use crate::Collector;
use anyhow::Result;
use fleetpulse_common::types::Record;
use serde_json::Value;
use std::path::{Path, PathBuf};

const POWER_SUPPLY_ROOT: &str = "/sys/class/power_supply";

/// Battery state from the Linux power-supply class.
///
/// Hosts without a readable battery report `battery_present = false`.
pub struct BatteryCollector {
    root: PathBuf,
}

impl BatteryCollector {
    pub fn new() -> Self {
        Self::with_root(POWER_SUPPLY_ROOT)
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn find_battery(&self) -> Option<PathBuf> {
        let mut candidates: Vec<PathBuf> = std::fs::read_dir(&self.root)
            .ok()?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| read_field(path, "type").as_deref() == Some("Battery"))
            .collect();
        candidates.sort();
        candidates.into_iter().next()
    }
}

impl Default for BatteryCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl Collector for BatteryCollector {
    fn name(&self) -> &str {
        "battery"
    }

    fn collect(&mut self) -> Result<Record> {
        let mut record = Record::new();
        let Some(battery) = self.find_battery() else {
            record.insert("battery_present", false);
            return Ok(record);
        };

        let status = read_field(&battery, "status").unwrap_or_default();
        let plugged_in = status != "Discharging";

        record.insert("battery_present", true);
        record.insert(
            "battery_percent",
            read_number(&battery, "capacity")
                .map(Value::from)
                .unwrap_or(Value::Null),
        );
        record.insert("battery_plugged_in", plugged_in);

        if plugged_in {
            record.insert("battery_time_left_seconds", Value::Null);
            record.insert("battery_time_left_approx", "Charging or Full");
        } else {
            match time_left_secs(&battery) {
                Some(secs) => {
                    record.insert("battery_time_left_seconds", secs);
                    record.insert("battery_time_left_approx", format_battery_time(secs));
                }
                None => {
                    record.insert("battery_time_left_seconds", 0);
                    record.insert("battery_time_left_approx", "Unknown");
                }
            }
        }

        record.insert(
            "battery_cycle_count",
            read_number(&battery, "cycle_count")
                .map(Value::from)
                .unwrap_or(Value::Null),
        );
        Ok(record)
    }
}

fn read_field(dir: &Path, name: &str) -> Option<String> {
    std::fs::read_to_string(dir.join(name))
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn read_number(dir: &Path, name: &str) -> Option<u64> {
    read_field(dir, name)?.parse().ok()
}

/// Remaining discharge time from energy (µWh) over power (µW), falling back
/// to charge (µAh) over current (µA).
fn time_left_secs(dir: &Path) -> Option<u64> {
    let (remaining, rate) = match (
        read_number(dir, "energy_now"),
        read_number(dir, "power_now"),
    ) {
        (Some(e), Some(p)) => (e, p),
        _ => (
            read_number(dir, "charge_now")?,
            read_number(dir, "current_now")?,
        ),
    };
    if rate == 0 {
        return None;
    }
    Some(remaining.saturating_mul(3600) / rate)
}

pub fn format_battery_time(secs: u64) -> String {
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}
