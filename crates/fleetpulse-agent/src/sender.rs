use crate::error::SendError;
use anyhow::Context;
use async_trait::async_trait;
use fleetpulse_common::types::Record;
use reqwest::{Client, StatusCode};
use std::time::Duration;

/// Maximum number of response body characters kept in a rejection error.
const MAX_BODY_CHARS: usize = 200;

/// Ships one batch of records to the ingestion endpoint.
#[async_trait]
pub trait BatchSender: Send + Sync {
    /// Sends `batch` as a single request. `Ok` means the endpoint accepted
    /// every record in it.
    async fn send(&self, batch: &[Record]) -> Result<(), SendError>;
}

/// `POST`s batches as a JSON array over HTTP(S).
pub struct HttpSender {
    url: String,
    client: Client,
}

impl HttpSender {
    /// Builds a sender whose every request is bounded by `timeout`.
    pub fn new(url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .use_rustls_tls()
            .timeout(timeout)
            .connect_timeout(timeout)
            .user_agent(concat!("fleetpulse-agent/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            url: url.to_string(),
            client,
        })
    }
}

/// The endpoint signals acceptance with 200 or 201 only.
fn is_accepted(status: StatusCode) -> bool {
    status == StatusCode::OK || status == StatusCode::CREATED
}

fn truncate_body(body: &str, max: usize) -> String {
    match body.char_indices().nth(max) {
        Some((end, _)) => format!("{}...", &body[..end]),
        None => body.to_string(),
    }
}

#[async_trait]
impl BatchSender for HttpSender {
    async fn send(&self, batch: &[Record]) -> Result<(), SendError> {
        let body = serde_json::to_vec(batch)?;
        let resp = self
            .client
            .post(self.url.as_str())
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        let status = resp.status();
        if is_accepted(status) {
            tracing::debug!(status = status.as_u16(), records = batch.len(), "Batch accepted");
            return Ok(());
        }

        let body = match resp.text().await {
            Ok(text) => truncate_body(&text, MAX_BODY_CHARS),
            Err(e) => format!("[Failed to read response body: {e}]"),
        };
        Err(SendError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}
