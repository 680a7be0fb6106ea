use crate::{bytes_to_gb, round_to, Collector};
use anyhow::Result;
use fleetpulse_common::types::Record;
use serde_json::Value;
use sysinfo::Disks;

/// Aggregates usage across every mounted disk into host-wide totals.
pub struct DiskCollector {
    disks: Disks,
}

impl DiskCollector {
    pub fn new() -> Self {
        Self {
            disks: Disks::new_with_refreshed_list(),
        }
    }
}

impl Default for DiskCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl Collector for DiskCollector {
    fn name(&self) -> &str {
        "disk"
    }

    fn collect(&mut self) -> Result<Record> {
        self.disks.refresh();
        let sizes = self
            .disks
            .iter()
            .map(|disk| (disk.total_space(), disk.available_space()));
        Ok(disk_totals(sizes))
    }
}

/// Builds the total fields from `(total, available)` byte pairs.
fn disk_totals(sizes: impl Iterator<Item = (u64, u64)>) -> Record {
    let (mut total, mut used) = (0u64, 0u64);
    for (disk_total, available) in sizes {
        total = total.saturating_add(disk_total);
        used = used.saturating_add(disk_total.saturating_sub(available));
    }

    let mut record = Record::new();
    if total == 0 {
        record.insert("total_disk_usage_gb", Value::Null);
        record.insert("total_disk_size_gb", Value::Null);
        record.insert("total_disk_used_percent", Value::Null);
    } else {
        record.insert("total_disk_usage_gb", bytes_to_gb(used));
        record.insert("total_disk_size_gb", bytes_to_gb(total));
        record.insert(
            "total_disk_used_percent",
            round_to(used as f64 / total as f64 * 100.0, 1),
        );
    }
    record
}
