//! Date-partitioned durable queue of records awaiting delivery.
//!
//! Each calendar day owns one file, `metrics_<YYYY-MM-DD>.json`, holding a
//! JSON array of records in append order. The set of pending days is whatever
//! the directory listing says; there is no separate index to drift out of
//! sync. A partition is rewritten atomically on every append and removed
//! only after its contents were accepted by the endpoint.

use crate::error::{QueueError, Result};
use chrono::{Days, NaiveDate, Utc};
use fleetpulse_common::types::{PartitionInfo, Record};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

const PARTITION_PREFIX: &str = "metrics_";
const PARTITION_SUFFIX: &str = ".json";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Outcome of reading one partition.
#[derive(Debug, Clone, PartialEq)]
pub enum PartitionRead {
    /// No file, or a file holding an empty array.
    Empty,
    /// The partition's records in append order.
    Records(Vec<Record>),
    /// The file exists but is not a JSON array of objects.
    Corrupt { reason: String },
}

impl PartitionRead {
    /// Number of readable records; corrupt partitions count as zero.
    pub fn len(&self) -> usize {
        match self {
            PartitionRead::Records(records) => records.len(),
            PartitionRead::Empty | PartitionRead::Corrupt { .. } => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct DurableQueue {
    dir: PathBuf,
}

impl DurableQueue {
    /// Opens the queue rooted at `dir`, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| QueueError::io(&dir, e))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn partition_path(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(format!(
            "{PARTITION_PREFIX}{}{PARTITION_SUFFIX}",
            date.format(DATE_FORMAT)
        ))
    }

    fn parse_partition_name(name: &str) -> Option<NaiveDate> {
        let raw = name
            .strip_prefix(PARTITION_PREFIX)?
            .strip_suffix(PARTITION_SUFFIX)?;
        let date = NaiveDate::parse_from_str(raw, DATE_FORMAT).ok()?;
        // `metrics_2026-1-5.json` parses but is not a file this queue writes.
        (date.format(DATE_FORMAT).to_string() == raw).then_some(date)
    }

    /// Appends `record` to the partition for `date` and returns the
    /// partition's new record count.
    ///
    /// A corrupt partition is quarantined first and a fresh one started, so
    /// appending never overwrites bytes that could not be read.
    pub fn append(&self, date: NaiveDate, record: &Record) -> Result<usize> {
        let mut records = match self.read_all(date)? {
            PartitionRead::Empty => Vec::new(),
            PartitionRead::Records(records) => records,
            PartitionRead::Corrupt { reason } => {
                tracing::error!(date = %date, reason = %reason, "Corrupt partition on append");
                self.quarantine(date)?;
                Vec::new()
            }
        };
        records.push(record.clone());
        self.write_atomic(date, &records)?;
        Ok(records.len())
    }

    /// Reads every record stored for `date`.
    ///
    /// # Errors
    ///
    /// Only filesystem failures other than a missing file are errors;
    /// unparsable content is reported as [`PartitionRead::Corrupt`].
    pub fn read_all(&self, date: NaiveDate) -> Result<PartitionRead> {
        let path = self.partition_path(date);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(PartitionRead::Empty),
            Err(e) => return Err(QueueError::io(path, e)),
        };
        match serde_json::from_slice::<Vec<Record>>(&bytes) {
            Ok(records) if records.is_empty() => Ok(PartitionRead::Empty),
            Ok(records) => Ok(PartitionRead::Records(records)),
            Err(e) => Ok(PartitionRead::Corrupt {
                reason: e.to_string(),
            }),
        }
    }

    /// Dates with a partition on disk, oldest first.
    ///
    /// Always computed from a fresh directory listing. A missing storage
    /// directory means nothing is pending. Contents are not inspected, so a
    /// leftover `[]` partition is listed until a flush removes it.
    pub fn list_pending_dates(&self) -> Result<Vec<NaiveDate>> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(QueueError::io(&self.dir, e)),
        };

        let mut dates = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| QueueError::io(&self.dir, e))?;
            let name = entry.file_name();
            if let Some(date) = name.to_str().and_then(Self::parse_partition_name) {
                dates.push(date);
            }
        }
        dates.sort();
        Ok(dates)
    }

    /// Deletes the partition for `date`. Returns `false` if it was already gone.
    pub fn clear(&self, date: NaiveDate) -> Result<bool> {
        let path = self.partition_path(date);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(QueueError::io(path, e)),
        }
    }

    /// Moves an unreadable partition aside as
    /// `metrics_<date>.json.corrupt-<unix-seconds>`. The quarantined file is
    /// no longer listed and is left for manual recovery.
    ///
    /// An earlier quarantine of the same date in the same second is never
    /// overwritten; the call fails instead and can be retried later.
    pub fn quarantine(&self, date: NaiveDate) -> Result<Option<PathBuf>> {
        let path = self.partition_path(date);
        let mut target = path.clone().into_os_string();
        target.push(format!(".corrupt-{}", Utc::now().timestamp()));
        let target = PathBuf::from(target);

        if target.symlink_metadata().is_ok() {
            return Err(QueueError::io(
                &target,
                std::io::Error::new(ErrorKind::AlreadyExists, "quarantine target already exists"),
            ));
        }

        match std::fs::rename(&path, &target) {
            Ok(()) => {
                tracing::error!(
                    date = %date,
                    quarantined = %target.display(),
                    "Quarantined corrupt partition"
                );
                Ok(Some(target))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(QueueError::io(path, e)),
        }
    }

    /// Deletes partitions dated more than `retention_days` before `today`,
    /// delivered or not. Returns the evicted dates. `0` disables eviction.
    pub fn evict_older_than(&self, today: NaiveDate, retention_days: u32) -> Result<Vec<NaiveDate>> {
        if retention_days == 0 {
            return Ok(Vec::new());
        }
        let Some(cutoff) = today.checked_sub_days(Days::new(u64::from(retention_days))) else {
            return Ok(Vec::new());
        };

        let mut evicted = Vec::new();
        for date in self.list_pending_dates()? {
            if date >= cutoff {
                break;
            }
            let read = self.read_all(date);
            if !self.clear(date)? {
                continue;
            }
            match read {
                Ok(PartitionRead::Corrupt { reason }) => tracing::warn!(
                    date = %date,
                    reason = %reason,
                    retention_days,
                    "Evicted corrupt partition past retention"
                ),
                Ok(read) => tracing::warn!(
                    date = %date,
                    records = read.len(),
                    retention_days,
                    "Evicted undelivered partition past retention"
                ),
                Err(e) => tracing::warn!(
                    date = %date,
                    error = %e,
                    retention_days,
                    "Evicted unreadable partition past retention"
                ),
            }
            evicted.push(date);
        }
        Ok(evicted)
    }

    /// Size and record count of every partition, oldest first.
    pub fn stats(&self) -> Result<Vec<PartitionInfo>> {
        let mut infos = Vec::new();
        for date in self.list_pending_dates()? {
            let path = self.partition_path(date);
            let size_bytes = match std::fs::metadata(&path) {
                Ok(meta) => meta.len(),
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(QueueError::io(path, e)),
            };
            let records = match self.read_all(date)? {
                PartitionRead::Corrupt { .. } => None,
                read => Some(read.len()),
            };
            infos.push(PartitionInfo {
                date,
                size_bytes,
                records,
            });
        }
        Ok(infos)
    }

    /// Writes `records` to a temp file, syncs it, then renames it over the
    /// partition so readers see either the old or the new content.
    fn write_atomic(&self, date: NaiveDate, records: &[Record]) -> Result<()> {
        std::fs::create_dir_all(&self.dir).map_err(|e| QueueError::io(&self.dir, e))?;
        let path = self.partition_path(date);
        let mut tmp = path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        let body = serde_json::to_vec_pretty(records)?;
        let mut file = std::fs::File::create(&tmp).map_err(|e| QueueError::io(&tmp, e))?;
        file.write_all(&body).map_err(|e| QueueError::io(&tmp, e))?;
        file.sync_all().map_err(|e| QueueError::io(&tmp, e))?;
        drop(file);

        std::fs::rename(&tmp, &path).map_err(|e| QueueError::io(&path, e))?;
        Ok(())
    }
}
