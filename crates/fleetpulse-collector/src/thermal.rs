use crate::{round_to, Collector};
use anyhow::Result;
use fleetpulse_common::types::Record;
use serde_json::json;
use sysinfo::Components;

/// Sensor drivers that report CPU or board temperatures.
const CPU_SENSOR_DRIVERS: &[&str] = &["coretemp", "cpu_thermal", "k10temp", "acpitz", "iwlwifi"];

pub struct ThermalCollector {
    components: Components,
}

impl ThermalCollector {
    pub fn new() -> Self {
        Self {
            components: Components::new_with_refreshed_list(),
        }
    }
}

impl Default for ThermalCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl Collector for ThermalCollector {
    fn name(&self) -> &str {
        "thermal"
    }

    fn collect(&mut self) -> Result<Record> {
        self.components.refresh();
        let readings = self
            .components
            .iter()
            .map(|c| (c.label().to_string(), c.temperature()));
        Ok(cpu_temperatures(readings))
    }
}

/// Keeps readings from known CPU sensor drivers. Component labels look like
/// `"coretemp Package id 0"`: the driver name, then the sensor name.
fn cpu_temperatures(readings: impl Iterator<Item = (String, f32)>) -> Record {
    let temps: Vec<_> = readings
        .filter(|(_, temp)| temp.is_finite())
        .filter_map(|(label, temp)| {
            let (driver, sensor) = match label.split_once(' ') {
                Some((d, s)) => (d.to_string(), s.trim().to_string()),
                None => (label.clone(), "unknown".to_string()),
            };
            CPU_SENSOR_DRIVERS.contains(&driver.as_str()).then(|| {
                json!({
                    "label": driver,
                    "sensor": sensor,
                    "temperature_c": round_to(temp as f64, 1),
                })
            })
        })
        .collect();

    let mut record = Record::new();
    if !temps.is_empty() {
        record.insert("cpu_temperatures_c", temps);
    }
    record
}
