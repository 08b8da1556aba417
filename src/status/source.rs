//! Status source client.
//!
//! Fetches one JSON resource per source and memoizes the outcome by source id.
//! The cache is owned by the client, and a client is owned by one dashboard
//! view, so "fetch once" holds for exactly the lifetime of that view.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::OnceCell;

use crate::config::schema::{SourceConfig, SourceKind};
use crate::observability::metrics;
use crate::status::tree::TreeManagerTable;

/// Why a source could not be loaded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("request timed out")]
    Timeout,

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("malformed payload: {0}")]
    Malformed(String),
}

/// A successfully loaded source payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SourcePayload {
    Json(serde_json::Value),
    TreeManager(TreeManagerTable),
}

pub type SourceOutcome = Result<SourcePayload, SourceError>;

/// Memoizing fetcher for status sources.
pub struct StatusSourceClient {
    http: reqwest::Client,
    api_key: Option<String>,
    cache: DashMap<String, Arc<OnceCell<SourceOutcome>>>,
    network_calls: AtomicUsize,
}

impl StatusSourceClient {
    pub fn new(http: reqwest::Client, api_key: Option<String>) -> Self {
        Self {
            http,
            api_key,
            cache: DashMap::new(),
            network_calls: AtomicUsize::new(0),
        }
    }

    /// Outcome for `source`, loading it on first use.
    ///
    /// Concurrent callers for the same id share one in-flight request.
    /// Failures are returned as values, never retried.
    pub async fn fetch(&self, source: &SourceConfig) -> SourceOutcome {
        // Clone the cell out so no map shard lock is held across the await.
        let cell = self.cache.entry(source.id.clone()).or_default().clone();
        cell.get_or_init(|| self.load(source)).await.clone()
    }

    /// Number of network requests issued by this client.
    pub fn network_calls(&self) -> usize {
        self.network_calls.load(Ordering::Relaxed)
    }

    async fn load(&self, source: &SourceConfig) -> SourceOutcome {
        self.network_calls.fetch_add(1, Ordering::Relaxed);
        let started = Instant::now();

        let outcome = self.request(source).await;
        match &outcome {
            Ok(_) => tracing::debug!(
                source = %source.id,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Status source loaded"
            ),
            Err(e) => tracing::warn!(source = %source.id, url = %source.url, error = %e, "Status source failed"),
        }
        metrics::record_source_fetch(&source.id, outcome.is_ok(), started);
        outcome
    }

    async fn request(&self, source: &SourceConfig) -> SourceOutcome {
        let mut request = self.http.get(&source.url);
        if let Some(key) = &self.api_key {
            request = request.header("X-API-Key", key);
        }

        let response = request.send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status(status.as_u16()));
        }

        let bytes = response.bytes().await.map_err(map_reqwest_error)?;
        let value: serde_json::Value =
            serde_json::from_slice(&bytes).map_err(|e| SourceError::Malformed(e.to_string()))?;

        match source.kind {
            SourceKind::Json => Ok(SourcePayload::Json(value)),
            SourceKind::TreeManager => TreeManagerTable::from_value(value)
                .map(SourcePayload::TreeManager)
                .map_err(SourceError::Malformed),
        }
    }
}

fn map_reqwest_error(e: reqwest::Error) -> SourceError {
    if e.is_timeout() {
        SourceError::Timeout
    } else {
        SourceError::Request(e.to_string())
    }
}
