//! Single control loop driving collection and flush on independent timers.

use crate::config::AgentConfig;
use crate::delivery::{CycleOutcome, DeliveryEngine};
use crate::probe::TcpProbe;
use crate::queue::DurableQueue;
use crate::sender::HttpSender;
use anyhow::Context;
use chrono::{Local, NaiveDate};
use fleetpulse_collector::{RecordProducer, SystemMetrics};
use tokio::sync::watch;
use tokio::time::{interval, Instant, MissedTickBehavior};

/// Everything the loop needs, passed explicitly instead of held in globals.
pub struct AgentContext {
    pub config: AgentConfig,
    pub queue: DurableQueue,
    pub engine: DeliveryEngine,
    pub producer: Box<dyn RecordProducer>,
}

impl AgentContext {
    /// Wires the production probe, HTTP sender and host collectors.
    pub fn from_config(config: AgentConfig) -> anyhow::Result<Self> {
        let queue = DurableQueue::open(&config.storage_dir).with_context(|| {
            format!("Failed to open storage dir {}", config.storage_dir.display())
        })?;
        let probe = TcpProbe::new(&config.probe_host, config.probe_port, config.probe_timeout());
        let sender = HttpSender::new(&config.ingest_url, config.send_timeout())?;
        Ok(Self {
            engine: DeliveryEngine::new(Box::new(probe), Box::new(sender)),
            producer: Box::new(SystemMetrics::new()),
            queue,
            config,
        })
    }
}

/// What one loop iteration did.
#[derive(Debug)]
pub struct TickReport {
    /// Set when the flush timer was due this iteration.
    pub flush: Option<CycleOutcome>,
    /// Record count of today's partition after the append, `None` if the
    /// record could not be stored.
    pub queued: Option<usize>,
}

type Calendar = Box<dyn Fn() -> NaiveDate + Send + Sync>;

pub struct Scheduler {
    ctx: AgentContext,
    last_flush: Option<Instant>,
    today: Calendar,
}

impl Scheduler {
    pub fn new(ctx: AgentContext) -> Self {
        Self::with_calendar(ctx, Box::new(|| Local::now().date_naive()))
    }

    /// Uses `today` instead of the local calendar to pick partitions.
    pub fn with_calendar(ctx: AgentContext, today: Calendar) -> Self {
        Self {
            ctx,
            last_flush: None,
            today,
        }
    }

    pub fn context(&self) -> &AgentContext {
        &self.ctx
    }

    fn flush_due(&self, now: Instant) -> bool {
        match self.last_flush {
            None => true,
            Some(last) => now.duration_since(last) >= self.ctx.config.flush_interval(),
        }
    }

    /// One iteration: flush if the flush timer is due, then collect and
    /// queue one record. The flush timer restarts whatever the outcome, so a
    /// dead network is never retried faster than the flush interval.
    pub async fn tick(&mut self) -> TickReport {
        let now = Instant::now();
        let flush = if self.flush_due(now) {
            let outcome = self.flush().await;
            self.last_flush = Some(now);
            Some(outcome)
        } else {
            None
        };
        let queued = self.collect();
        TickReport { flush, queued }
    }

    /// Collects one record and flushes immediately, ignoring the timer.
    pub async fn run_once(&mut self) -> TickReport {
        let queued = self.collect();
        let outcome = self.flush().await;
        self.last_flush = Some(Instant::now());
        TickReport {
            flush: Some(outcome),
            queued,
        }
    }

    /// Ticks every collection interval until `shutdown` flips or its sender
    /// is dropped. Shutdown is only observed between iterations, so an
    /// in-flight append always completes.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.ctx.config.collection_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            collection_interval_secs = self.ctx.config.collection_interval_secs,
            flush_interval_secs = self.ctx.config.flush_interval_secs,
            storage_dir = %self.ctx.queue.dir().display(),
            endpoint = %self.ctx.config.ingest_url,
            "Starting collection loop"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await;
                }
                _ = shutdown.changed() => {
                    break;
                }
            }
        }

        tracing::info!("Collection loop stopped");
    }

    async fn flush(&self) -> CycleOutcome {
        let today = (self.today)();
        if let Err(e) = self
            .ctx
            .queue
            .evict_older_than(today, self.ctx.config.retention_days)
        {
            tracing::warn!(error = %e, "Retention sweep failed");
        }

        let outcome = self.ctx.engine.flush(&self.ctx.queue, today).await;
        match &outcome {
            CycleOutcome::NotAttempted => {}
            CycleOutcome::Drained { .. } => tracing::info!(
                records = outcome.delivered_records(),
                "Successfully sent all stored metrics"
            ),
            CycleOutcome::StoppedEarly { attempts } => tracing::warn!(
                records = outcome.delivered_records(),
                stopped_at = ?attempts.last().map(|a| a.date),
                "Flush stopped early, remaining partitions retried next cycle"
            ),
            CycleOutcome::QueueUnavailable(reason) => {
                tracing::error!(reason = %reason, "Flush skipped, queue unavailable")
            }
        }
        outcome
    }

    fn collect(&mut self) -> Option<usize> {
        let record = self.ctx.producer.produce();
        let today = (self.today)();
        match self.ctx.queue.append(today, &record) {
            Ok(count) => {
                tracing::debug!(date = %today, records = count, "Stored record");
                Some(count)
            }
            Err(e) => {
                tracing::error!(date = %today, error = %e, "Failed to store record, dropping it");
                None
            }
        }
    }
}
