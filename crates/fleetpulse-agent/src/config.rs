use anyhow::{bail, Context};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Ingestion endpoint receiving `POST`ed JSON record arrays.
    #[serde(default = "default_ingest_url")]
    pub ingest_url: String,
    /// Directory holding one `metrics_<YYYY-MM-DD>.json` partition per day.
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,
    #[serde(default = "default_collection_interval")]
    pub collection_interval_secs: u64,
    #[serde(default = "default_flush_interval")]
    pub flush_interval_secs: u64,
    /// Host probed before each flush; only its TCP reachability matters.
    #[serde(default = "default_probe_host")]
    pub probe_host: String,
    #[serde(default = "default_probe_port")]
    pub probe_port: u16,
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,
    #[serde(default = "default_send_timeout")]
    pub send_timeout_secs: u64,
    /// Partitions older than this many days are evicted undelivered.
    /// `0` keeps everything.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

fn default_ingest_url() -> String {
    "http://127.0.0.1:8000/asset-metrics".to_string()
}

fn default_storage_dir() -> PathBuf {
    PathBuf::from("stored_metrics")
}

fn default_collection_interval() -> u64 {
    300
}

fn default_flush_interval() -> u64 {
    300
}

fn default_probe_host() -> String {
    "8.8.8.8".to_string()
}

fn default_probe_port() -> u16 {
    53
}

fn default_probe_timeout() -> u64 {
    3
}

fn default_send_timeout() -> u64 {
    10
}

fn default_retention_days() -> u32 {
    30
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            ingest_url: default_ingest_url(),
            storage_dir: default_storage_dir(),
            collection_interval_secs: default_collection_interval(),
            flush_interval_secs: default_flush_interval(),
            probe_host: default_probe_host(),
            probe_port: default_probe_port(),
            probe_timeout_secs: default_probe_timeout(),
            send_timeout_secs: default_send_timeout(),
            retention_days: default_retention_days(),
        }
    }
}

impl AgentConfig {
    /// Loads `path` if it exists, falls back to defaults otherwise, then
    /// applies `FLEETPULSE_*` environment overrides and validates.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            Self::from_toml(&content)
                .with_context(|| format!("Invalid config {}", path.display()))?
        } else {
            tracing::info!(path = %path.display(), "Config file not found, using defaults");
            Self::default()
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Applies overrides from `lookup` (the process environment in production).
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("FLEETPULSE_INGEST_URL") {
            self.ingest_url = url;
        }
        if let Some(dir) = lookup("FLEETPULSE_STORAGE_DIR") {
            self.storage_dir = PathBuf::from(dir);
        }
        if let Some(v) = lookup("FLEETPULSE_COLLECTION_INTERVAL_SECS") {
            self.collection_interval_secs = v
                .parse()
                .with_context(|| format!("invalid FLEETPULSE_COLLECTION_INTERVAL_SECS: {v}"))?;
        }
        if let Some(v) = lookup("FLEETPULSE_FLUSH_INTERVAL_SECS") {
            self.flush_interval_secs = v
                .parse()
                .with_context(|| format!("invalid FLEETPULSE_FLUSH_INTERVAL_SECS: {v}"))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.ingest_url.trim().is_empty() {
            bail!("ingest_url must not be empty");
        }
        for (name, value) in [
            ("collection_interval_secs", self.collection_interval_secs),
            ("flush_interval_secs", self.flush_interval_secs),
            ("probe_timeout_secs", self.probe_timeout_secs),
            ("send_timeout_secs", self.send_timeout_secs),
        ] {
            if value == 0 {
                bail!("{name} must be greater than 0");
            }
        }
        Ok(())
    }

    pub fn collection_interval(&self) -> Duration {
        Duration::from_secs(self.collection_interval_secs)
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.send_timeout_secs)
    }
}
