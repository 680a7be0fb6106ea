use crate::battery::BatteryCollector;
use crate::cpu::CpuCollector;
use crate::disk::DiskCollector;
use crate::host::HostCollector;
use crate::memory::MemoryCollector;
use crate::thermal::ThermalCollector;
use crate::uptime::UptimeCollector;
use crate::{Collector, RecordProducer};
use chrono::Utc;
use fleetpulse_common::types::{Record, TIMESTAMP_FIELD};

/// Runs a fixed set of collectors and merges their output into one record.
pub struct SystemMetrics {
    collectors: Vec<Box<dyn Collector>>,
}

impl SystemMetrics {
    /// The standard collector set, in record field order.
    pub fn new() -> Self {
        Self::with_collectors(vec![
            Box::new(HostCollector::new()),
            Box::new(CpuCollector::new()),
            Box::new(MemoryCollector::new()),
            Box::new(DiskCollector::new()),
            Box::new(UptimeCollector::new()),
            Box::new(BatteryCollector::new()),
            Box::new(ThermalCollector::new()),
        ])
    }

    pub fn with_collectors(collectors: Vec<Box<dyn Collector>>) -> Self {
        Self { collectors }
    }
}

impl Default for SystemMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordProducer for SystemMetrics {
    fn produce(&mut self) -> Record {
        let mut record = Record::new();
        record.insert(TIMESTAMP_FIELD, Utc::now().to_rfc3339());

        for collector in &mut self.collectors {
            match collector.collect() {
                Ok(fragment) => record.extend(fragment),
                Err(e) => {
                    tracing::warn!(collector = collector.name(), error = %e, "Collection failed")
                }
            }
        }

        tracing::debug!(fields = record.len(), "Collected record");
        record
    }
}
