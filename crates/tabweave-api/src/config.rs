//! Server configuration loaded from the environment.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use tabweave_core::{defaults, Error, Result};
use tabweave_inference::InferenceConfig;
use tabweave_jobs::{PipelineConfig, WorkerConfig};

use crate::engine::EngineConfig;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind: SocketAddr,
    /// Directory for the file-backed store. `None` keeps everything in memory.
    pub data_dir: Option<PathBuf>,
    pub maintenance_interval: Duration,
    pub engine: EngineConfig,
    pub inference: InferenceConfig,
    pub worker: WorkerConfig,
}

impl AppConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `TABWEAVE_BIND` | `127.0.0.1:7878` | HTTP listen address |
    /// | `TABWEAVE_DATA_DIR` | unset | File-backed store directory; unset runs in memory |
    /// | `TABWEAVE_CACHE_TTL_SECS` | `30` | Suggestion cache lifetime |
    /// | `TABWEAVE_MAINTENANCE_INTERVAL_SECS` | `86400` | Decay + workflow mining interval |
    /// | `TABWEAVE_SEMANTIC_PACING_MS` | `500` | Delay between semantic-similarity calls |
    ///
    /// Pipeline, worker and inference variables are read by their own
    /// config types.
    pub fn from_env() -> Result<Self> {
        let bind_raw =
            std::env::var("TABWEAVE_BIND").unwrap_or_else(|_| defaults::SERVER_BIND.to_string());
        let bind = bind_raw
            .parse::<SocketAddr>()
            .map_err(|e| Error::Config(format!("invalid TABWEAVE_BIND '{}': {}", bind_raw, e)))?;

        let data_dir = std::env::var("TABWEAVE_DATA_DIR")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        let cache_ttl_secs = env_u64("TABWEAVE_CACHE_TTL_SECS", defaults::SUGGESTION_CACHE_TTL_SECS);
        let maintenance_secs = env_u64(
            "TABWEAVE_MAINTENANCE_INTERVAL_SECS",
            defaults::MAINTENANCE_INTERVAL_SECS,
        )
        .max(1);
        let pacing_ms = env_u64("TABWEAVE_SEMANTIC_PACING_MS", defaults::SEMANTIC_PACING_MS);

        let mut engine = EngineConfig::default()
            .with_cache_ttl(Duration::from_secs(cache_ttl_secs))
            .with_pipeline(PipelineConfig::from_env());
        engine.graph = engine.graph.with_pacing(Duration::from_millis(pacing_ms));

        Ok(Self {
            bind,
            data_dir,
            maintenance_interval: Duration::from_secs(maintenance_secs),
            engine,
            inference: InferenceConfig::from_env()?,
            worker: WorkerConfig::from_env(),
        })
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}
