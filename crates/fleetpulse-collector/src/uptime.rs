use crate::Collector;
use anyhow::{anyhow, Result};
use chrono::DateTime;
use fleetpulse_common::types::Record;
use sysinfo::System;

pub struct UptimeCollector;

impl UptimeCollector {
    pub fn new() -> Self {
        Self
    }
}

impl Default for UptimeCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl Collector for UptimeCollector {
    fn name(&self) -> &str {
        "uptime"
    }

    fn collect(&mut self) -> Result<Record> {
        let boot = System::boot_time();
        let uptime = System::uptime();
        let boot_time = i64::try_from(boot)
            .ok()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .ok_or_else(|| anyhow!("boot time {boot} out of range"))?;

        let mut record = Record::new();
        record.insert("boot_time_utc", boot_time.to_rfc3339());
        record.insert("uptime_seconds", uptime);
        record.insert("uptime_hms", format_uptime(uptime));
        Ok(record)
    }
}

/// Formats seconds as `H:MM:SS`, prefixed with `N day(s), ` past 24 hours.
pub fn format_uptime(secs: u64) -> String {
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;
    let clock = format!("{hours}:{minutes:02}:{seconds:02}");
    match days {
        0 => clock,
        1 => format!("1 day, {clock}"),
        n => format!("{n} days, {clock}"),
    }
}
