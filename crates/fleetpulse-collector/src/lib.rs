//! Host metric collection for the fleetpulse agent.
//!
//! Each [`Collector`] gathers one category of host facts (identity, CPU,
//! memory, disk, uptime, battery, thermal) as a fragment of fields.
//! [`SystemMetrics`] runs them in order and merges the fragments into one
//! timestamped [`Record`] per collection tick.

pub mod battery;
pub mod cpu;
pub mod disk;
pub mod host;
pub mod memory;
pub mod producer;
pub mod thermal;
pub mod uptime;

use anyhow::Result;
use fleetpulse_common::types::Record;

pub use producer::SystemMetrics;

/// A host metric collector that runs on the agent.
///
/// Implementations are registered with [`SystemMetrics`] and called once per
/// collection tick. The returned fragment is merged into the tick's record.
pub trait Collector: Send + Sync {
    /// Returns the collector name (e.g., `"cpu"`, `"disk"`), used for logging.
    fn name(&self) -> &str;

    /// Collects the current field values.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying system API call fails. The caller
    /// drops this collector's fields for the tick and keeps the rest.
    fn collect(&mut self) -> Result<Record>;
}

/// Source of one record per collection tick.
///
/// Production never fails outright: a record with missing fields is still a
/// record worth queueing.
pub trait RecordProducer: Send + Sync {
    fn produce(&mut self) -> Record;
}

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

pub(crate) fn bytes_to_gb(bytes: u64) -> f64 {
    round_to(bytes as f64 / BYTES_PER_GB, 2)
}

pub(crate) fn percent(part: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round_to(part as f64 / total as f64 * 100.0, 1)
}

pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
