//! Aggregated dashboard view.
//!
//! Each configured source is an independent state machine
//! (`Pending → Success | Error`) stored under its own key. Settling a key is
//! the only transition and it touches nothing but that key.

use std::sync::Arc;

use dashmap::DashMap;
use futures_util::stream::{FuturesUnordered, Stream, StreamExt};
use serde::Serialize;

use crate::config::schema::SourceConfig;
use crate::status::source::{SourceOutcome, SourcePayload, StatusSourceClient};

/// State of one source within a view.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SourceState {
    Pending,
    Success { data: SourcePayload },
    Error { detail: String },
}

impl SourceState {
    pub fn is_pending(&self) -> bool {
        matches!(self, SourceState::Pending)
    }
}

impl From<SourceOutcome> for SourceState {
    fn from(outcome: SourceOutcome) -> Self {
        match outcome {
            Ok(data) => SourceState::Success { data },
            Err(e) => SourceState::Error {
                detail: e.to_string(),
            },
        }
    }
}

/// Keyed source states in configuration order.
#[derive(Debug)]
pub struct DashboardState {
    order: Vec<String>,
    states: DashMap<String, SourceState>,
}

impl DashboardState {
    /// All keys start `Pending`.
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let order: Vec<String> = ids.into_iter().map(Into::into).collect();
        let states = order
            .iter()
            .map(|id| (id.clone(), SourceState::Pending))
            .collect();
        Self { order, states }
    }

    /// Settle `id` with `outcome`. Returns false if the key is unknown or
    /// already settled; settled states never change.
    pub fn settle(&self, id: &str, outcome: SourceOutcome) -> bool {
        match self.states.get_mut(id) {
            Some(mut state) if state.is_pending() => {
                *state = SourceState::from(outcome);
                true
            }
            _ => false,
        }
    }

    pub fn get(&self, id: &str) -> Option<SourceState> {
        self.states.get(id).map(|s| s.value().clone())
    }

    /// `(id, state)` pairs in configuration order.
    pub fn snapshot(&self) -> Vec<(String, SourceState)> {
        self.order
            .iter()
            .filter_map(|id| self.get(id).map(|state| (id.clone(), state)))
            .collect()
    }

    pub fn is_settled(&self) -> bool {
        self.states.iter().all(|s| !s.value().is_pending())
    }
}

/// One rendered dashboard panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Panel {
    pub id: String,
    pub title: String,
    #[serde(flatten)]
    pub state: SourceState,
}

/// A dashboard over the configured sources. One instance per render.
pub struct DashboardView {
    sources: Vec<SourceConfig>,
    client: StatusSourceClient,
    state: DashboardState,
}

impl DashboardView {
    pub fn new(sources: Vec<SourceConfig>, client: StatusSourceClient) -> Self {
        let state = DashboardState::new(sources.iter().map(|s| s.id.clone()));
        Self {
            sources,
            client,
            state,
        }
    }

    pub fn client(&self) -> &StatusSourceClient {
        &self.client
    }

    pub fn state(&self) -> &DashboardState {
        &self.state
    }

    /// Current panels in configuration order; unresolved sources are pending.
    pub fn panels(&self) -> Vec<Panel> {
        self.sources.iter().map(|s| self.panel(s)).collect()
    }

    fn panel(&self, source: &SourceConfig) -> Panel {
        Panel {
            id: source.id.clone(),
            title: source_title(source),
            state: self.state.get(&source.id).unwrap_or(SourceState::Pending),
        }
    }

    /// Fetch every source concurrently, yielding each panel as soon as its
    /// own source settles, in resolution order.
    pub fn resolve(self: &Arc<Self>) -> impl Stream<Item = Panel> + Send + 'static {
        self.sources
            .iter()
            .cloned()
            .map(|source| {
                let view = Arc::clone(self);
                async move {
                    let outcome = view.client.fetch(&source).await;
                    view.state.settle(&source.id, outcome);
                    view.panel(&source)
                }
            })
            .collect::<FuturesUnordered<_>>()
    }

    /// Resolve every source and return the final panels in configuration order.
    pub async fn load(self: &Arc<Self>) -> Vec<Panel> {
        self.resolve().for_each(|_| async {}).await;
        self.panels()
    }
}

/// Panel heading: configured title, else the source URL's path.
pub fn source_title(source: &SourceConfig) -> String {
    source.title.clone().unwrap_or_else(|| {
        url::Url::parse(&source.url)
            .map(|u| u.path().to_string())
            .unwrap_or_else(|_| source.url.clone())
    })
}
