use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field that producers stamp with the collection time (RFC 3339, UTC).
pub const TIMESTAMP_FIELD: &str = "timestamp";

/// One snapshot of collected fields.
///
/// A record is an insertion-ordered mapping of field name to a scalar or array
/// value. The delivery path never looks inside it; it is serialized as a plain
/// JSON object.
///
/// # Examples
///
/// ```
/// use fleetpulse_common::types::Record;
///
/// let mut record = Record::new();
/// record.insert("hostname", "web-01");
/// record.insert("cpu_usage_percent", 12.5);
/// assert_eq!(record.len(), 2);
/// assert_eq!(
///     serde_json::to_string(&record).unwrap(),
///     r#"{"hostname":"web-01","cpu_usage_percent":12.5}"#
/// );
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Sets `field`, replacing any previous value but keeping its position.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(field.into(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Field names in insertion order.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// The producer's collection timestamp, if present.
    pub fn timestamp(&self) -> Option<&str> {
        self.0.get(TIMESTAMP_FIELD).and_then(Value::as_str)
    }

    /// Copies every field of `other` into this record, in `other`'s order.
    pub fn extend(&mut self, other: Record) {
        for (k, v) in other.0 {
            self.0.insert(k, v);
        }
    }
}

/// On-disk summary of one queue partition, as printed by
/// `fleetpulse-queue status --json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionInfo {
    pub date: NaiveDate,
    pub size_bytes: u64,
    /// `None` when the partition could not be parsed.
    pub records: Option<usize>,
}
