//! Flush cycle: drain queued partitions to the endpoint, oldest first.

use crate::probe::ConnectivityProbe;
use crate::queue::{DurableQueue, PartitionRead};
use crate::sender::BatchSender;
use chrono::NaiveDate;

/// What happened to one partition during a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// Accepted by the endpoint; the partition was cleared.
    Delivered,
    /// Nothing to send.
    SkippedEmpty,
    /// Unreadable content was moved aside; nothing was sent.
    Quarantined,
    /// Read, send or quarantine failed; the partition is left in place.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryAttempt {
    pub date: NaiveDate,
    pub record_count: usize,
    pub outcome: AttemptOutcome,
}

/// Result of one flush cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The connectivity probe failed; the queue was not touched.
    NotAttempted,
    /// Every eligible date was handled.
    Drained { attempts: Vec<DeliveryAttempt> },
    /// The last attempt failed and later dates were left for the next cycle.
    StoppedEarly { attempts: Vec<DeliveryAttempt> },
    /// The storage directory could not be listed.
    QueueUnavailable(String),
}

impl CycleOutcome {
    /// Records accepted by the endpoint in this cycle.
    pub fn delivered_records(&self) -> usize {
        self.attempts()
            .iter()
            .filter(|a| a.outcome == AttemptOutcome::Delivered)
            .map(|a| a.record_count)
            .sum()
    }

    pub fn attempts(&self) -> &[DeliveryAttempt] {
        match self {
            CycleOutcome::Drained { attempts } | CycleOutcome::StoppedEarly { attempts } => {
                attempts.as_slice()
            }
            CycleOutcome::NotAttempted | CycleOutcome::QueueUnavailable(_) => &[],
        }
    }

    pub fn is_drained(&self) -> bool {
        matches!(self, CycleOutcome::Drained { .. })
    }
}

/// Drains the queue when the network looks up.
///
/// Holds no state between cycles: whatever is still on disk is what gets
/// retried next time, always whole partitions.
pub struct DeliveryEngine {
    probe: Box<dyn ConnectivityProbe>,
    sender: Box<dyn BatchSender>,
}

impl DeliveryEngine {
    pub fn new(probe: Box<dyn ConnectivityProbe>, sender: Box<dyn BatchSender>) -> Self {
        Self { probe, sender }
    }

    /// Runs one flush cycle over every pending date plus `today`.
    ///
    /// Stops at the first failed send so dates are always delivered in
    /// order. A partition is cleared only after its whole batch was accepted.
    pub async fn flush(&self, queue: &DurableQueue, today: NaiveDate) -> CycleOutcome {
        if !self.probe.is_reachable().await {
            tracing::info!("No network connectivity, skipping flush");
            return CycleOutcome::NotAttempted;
        }

        let mut dates = match queue.list_pending_dates() {
            Ok(dates) => dates,
            Err(e) => {
                tracing::error!(error = %e, "Failed to list pending partitions");
                return CycleOutcome::QueueUnavailable(e.to_string());
            }
        };
        // Today's partition is still being appended to. Sending it anyway
        // can resend records in a later cycle, never lose them.
        dates.push(today);
        dates.sort();
        dates.dedup();

        let mut attempts = Vec::with_capacity(dates.len());
        for date in dates {
            let attempt = self.deliver_partition(queue, date).await;
            let failed = matches!(attempt.outcome, AttemptOutcome::Failed(_));
            attempts.push(attempt);
            if failed {
                return CycleOutcome::StoppedEarly { attempts };
            }
        }
        CycleOutcome::Drained { attempts }
    }

    async fn deliver_partition(&self, queue: &DurableQueue, date: NaiveDate) -> DeliveryAttempt {
        let records = match queue.read_all(date) {
            Ok(PartitionRead::Records(records)) => records,
            Ok(PartitionRead::Empty) => {
                // Drop a leftover empty file so listing stays truthful.
                if let Err(e) = queue.clear(date) {
                    tracing::warn!(date = %date, error = %e, "Failed to remove empty partition");
                }
                return DeliveryAttempt {
                    date,
                    record_count: 0,
                    outcome: AttemptOutcome::SkippedEmpty,
                };
            }
            Ok(PartitionRead::Corrupt { reason }) => {
                tracing::error!(date = %date, reason = %reason, "Corrupt partition, not sending");
                let outcome = match queue.quarantine(date) {
                    Ok(_) => AttemptOutcome::Quarantined,
                    Err(e) => AttemptOutcome::Failed(e.to_string()),
                };
                return DeliveryAttempt {
                    date,
                    record_count: 0,
                    outcome,
                };
            }
            Err(e) => {
                tracing::error!(date = %date, error = %e, "Failed to read partition");
                return DeliveryAttempt {
                    date,
                    record_count: 0,
                    outcome: AttemptOutcome::Failed(e.to_string()),
                };
            }
        };

        let record_count = records.len();
        match self.sender.send(&records).await {
            Ok(()) => {
                if let Err(e) = queue.clear(date) {
                    // Sent but still on disk: it will be resent next cycle.
                    tracing::error!(date = %date, error = %e, "Delivered partition could not be cleared");
                } else {
                    tracing::info!(date = %date, records = record_count, "Sent and cleared partition");
                }
                DeliveryAttempt {
                    date,
                    record_count,
                    outcome: AttemptOutcome::Delivered,
                }
            }
            Err(e) => {
                tracing::warn!(
                    date = %date,
                    records = record_count,
                    error = %e,
                    "Failed to send partition, retained for retry"
                );
                DeliveryAttempt {
                    date,
                    record_count,
                    outcome: AttemptOutcome::Failed(e.to_string()),
                }
            }
        }
    }
}
