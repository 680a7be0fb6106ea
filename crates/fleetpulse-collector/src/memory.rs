use crate::{bytes_to_gb, percent, Collector};
use anyhow::Result;
use fleetpulse_common::types::Record;
use sysinfo::System;

pub struct MemoryCollector {
    system: System,
}

impl MemoryCollector {
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }
}

impl Default for MemoryCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl Collector for MemoryCollector {
    fn name(&self) -> &str {
        "memory"
    }

    fn collect(&mut self) -> Result<Record> {
        self.system.refresh_memory();
        let mut record = Record::new();

        let total = self.system.total_memory();
        let used = self.system.used_memory();
        let available = self.system.available_memory();
        record.insert("memory_total_gb", bytes_to_gb(total));
        record.insert("memory_used_gb", bytes_to_gb(used));
        record.insert("memory_free_gb", bytes_to_gb(available));
        record.insert("memory_used_percent", percent(used, total));

        // Swap
        let swap_total = self.system.total_swap();
        let swap_used = self.system.used_swap();
        record.insert("swap_total_gb", bytes_to_gb(swap_total));
        record.insert("swap_used_gb", bytes_to_gb(swap_used));
        record.insert("swap_used_percent", percent(swap_used, swap_total));

        Ok(record)
    }
}
