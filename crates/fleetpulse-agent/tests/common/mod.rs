#![allow(dead_code)]

use async_trait::async_trait;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use chrono::NaiveDate;
use fleetpulse_agent::config::AgentConfig;
use fleetpulse_agent::delivery::DeliveryEngine;
use fleetpulse_agent::error::SendError;
use fleetpulse_agent::probe::ConnectivityProbe;
use fleetpulse_agent::queue::DurableQueue;
use fleetpulse_agent::scheduler::{AgentContext, Scheduler};
use fleetpulse_agent::sender::BatchSender;
use fleetpulse_collector::RecordProducer;
use fleetpulse_common::types::Record;
use serde_json::Value;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("valid test date")
}

pub fn record(seq: usize) -> Record {
    let mut record = Record::new();
    record.insert("hostname", "lab-07");
    record.insert("seq", seq);
    record
}

pub fn fill(queue: &DurableQueue, day: NaiveDate, count: usize) {
    for seq in 0..count {
        queue.append(day, &record(seq)).expect("append");
    }
}

/// Network and endpoint state shared between a test and its fakes.
#[derive(Clone, Default)]
pub struct FakeNetwork {
    pub probe_up: Arc<AtomicBool>,
    pub endpoint_up: Arc<AtomicBool>,
    pub probes: Arc<AtomicUsize>,
    pub batches: Arc<Mutex<Vec<Vec<Record>>>>,
}

impl FakeNetwork {
    pub fn online() -> Self {
        let net = Self::default();
        net.set_probe(true);
        net.set_endpoint(true);
        net
    }

    pub fn set_probe(&self, up: bool) {
        self.probe_up.store(up, Ordering::SeqCst);
    }

    pub fn set_endpoint(&self, up: bool) {
        self.endpoint_up.store(up, Ordering::SeqCst);
    }

    /// Sizes of every batch the endpoint saw, accepted or not.
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches.lock().unwrap().iter().map(Vec::len).collect()
    }

    pub fn engine(&self) -> DeliveryEngine {
        DeliveryEngine::new(Box::new(FakeProbe(self.clone())), Box::new(FakeSender(self.clone())))
    }
}

pub struct FakeProbe(pub FakeNetwork);

#[async_trait]
impl ConnectivityProbe for FakeProbe {
    async fn is_reachable(&self) -> bool {
        self.0.probes.fetch_add(1, Ordering::SeqCst);
        self.0.probe_up.load(Ordering::SeqCst)
    }
}

pub struct FakeSender(pub FakeNetwork);

#[async_trait]
impl BatchSender for FakeSender {
    async fn send(&self, batch: &[Record]) -> Result<(), SendError> {
        self.0.batches.lock().unwrap().push(batch.to_vec());
        if self.0.endpoint_up.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(SendError::Rejected {
                status: 504,
                body: "gateway timeout".to_string(),
            })
        }
    }
}

/// Emits records numbered from zero.
pub struct SeqProducer(pub Arc<AtomicUsize>);

impl RecordProducer for SeqProducer {
    fn produce(&mut self) -> Record {
        record(self.0.fetch_add(1, Ordering::SeqCst))
    }
}

pub fn build_scheduler(
    storage: &Path,
    net: &FakeNetwork,
    collection_secs: u64,
    flush_secs: u64,
    today: NaiveDate,
) -> Scheduler {
    let config = AgentConfig {
        storage_dir: storage.to_path_buf(),
        collection_interval_secs: collection_secs,
        flush_interval_secs: flush_secs,
        ..AgentConfig::default()
    };
    let ctx = AgentContext {
        queue: DurableQueue::open(&config.storage_dir).expect("open queue"),
        engine: net.engine(),
        producer: Box::new(SeqProducer(Arc::new(AtomicUsize::new(0)))),
        config,
    };
    Scheduler::with_calendar(ctx, Box::new(move || today))
}

/// A local ingestion endpoint answering every POST with `status`, optionally
/// after `delay_ms`.
#[derive(Clone)]
pub struct IngestEndpoint {
    pub url: String,
    pub port: u16,
    pub status: Arc<AtomicU16>,
    pub delay_ms: Arc<AtomicUsize>,
    pub received: Arc<Mutex<Vec<Value>>>,
}

impl IngestEndpoint {
    pub fn set_status(&self, status: u16) {
        self.status.store(status, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms
            .store(delay.as_millis() as usize, Ordering::SeqCst);
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.received
            .lock()
            .unwrap()
            .iter()
            .map(|body| body.as_array().map(Vec::len).unwrap_or(0))
            .collect()
    }
}

async fn ingest(State(endpoint): State<IngestEndpoint>, Json(body): Json<Value>) -> StatusCode {
    let delay = endpoint.delay_ms.load(Ordering::SeqCst) as u64;
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
    endpoint.received.lock().unwrap().push(body);
    StatusCode::from_u16(endpoint.status.load(Ordering::SeqCst))
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

pub async fn spawn_ingest_endpoint() -> IngestEndpoint {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let endpoint = IngestEndpoint {
        url: format!("http://{addr}/asset-metrics"),
        port: addr.port(),
        status: Arc::new(AtomicU16::new(201)),
        delay_ms: Arc::new(AtomicUsize::new(0)),
        received: Arc::new(Mutex::new(Vec::new())),
    };
    let app = Router::new()
        .route("/asset-metrics", post(ingest))
        .with_state(endpoint.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    endpoint
}
