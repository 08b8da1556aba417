use std::convert::Infallible;

use axum::{
    body::Body,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use futures_util::stream::{self, StreamExt};
use serde::Serialize;

use crate::http::server::AppState;
use crate::status::Panel;

#[derive(Serialize)]
pub struct DashboardSnapshot {
    pub version: &'static str,
    pub panels: Vec<Panel>,
}

/// One line of the NDJSON dashboard stream.
#[derive(Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DashboardEvent {
    /// Every panel, sent first; unresolved ones are pending.
    Snapshot { panels: Vec<Panel> },
    /// A single panel whose source just settled.
    Resolved { panel: Panel },
}

fn ndjson_line(event: &DashboardEvent) -> Bytes {
    let mut line = serde_json::to_vec(event).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to encode dashboard event");
        br#"{"event":"error"}"#.to_vec()
    });
    line.push(b'\n');
    Bytes::from(line)
}

/// Resolve every source, then return all panels.
pub async fn get_status(State(state): State<AppState>) -> Json<DashboardSnapshot> {
    let view = state.dashboard_view();
    let panels = view.load().await;
    Json(DashboardSnapshot {
        version: env!("CARGO_PKG_VERSION"),
        panels,
    })
}

/// Stream the dashboard: a pending snapshot, then each panel as it resolves.
pub async fn stream_status(State(state): State<AppState>) -> Response {
    let view = state.dashboard_view();
    let initial = DashboardEvent::Snapshot {
        panels: view.panels(),
    };

    let lines = stream::once(async move { ndjson_line(&initial) })
        .chain(view.resolve().map(|panel| ndjson_line(&DashboardEvent::Resolved { panel })))
        .map(Ok::<_, Infallible>);

    (
        [(header::CONTENT_TYPE, "application/x-ndjson")],
        Body::from_stream(lines),
    )
        .into_response()
}
