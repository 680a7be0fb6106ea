use std::path::PathBuf;

/// Errors raised by the on-disk partition queue.
///
/// Corrupt partition content is not an error: it surfaces as
/// [`PartitionRead::Corrupt`](crate::queue::PartitionRead::Corrupt) so callers
/// decide what to do with it.
///
/// # Examples
///
/// ```rust
/// use fleetpulse_agent::error::QueueError;
///
/// let err = QueueError::Io {
///     path: "stored_metrics/metrics_2026-10-18.json".into(),
///     source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
/// };
/// assert!(err.to_string().contains("metrics_2026-10-18.json"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// Filesystem failure while reading, writing or removing a partition.
    #[error("Queue: I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Records could not be serialized for writing.
    #[error("Queue: JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl QueueError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors raised when shipping a batch to the ingestion endpoint.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    /// The endpoint answered with something other than 200 or 201.
    #[error("endpoint rejected batch: status={status}, body={body}")]
    Rejected { status: u16, body: String },

    /// Connection, TLS or timeout failure from `reqwest`.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The batch could not be encoded as JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, QueueError>;
