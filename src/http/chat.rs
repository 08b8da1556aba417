//! Message-send relay endpoint.
//!
//! `POST /api/chat/message` with `{ "id": <conversation>, "message": <payload> }`.
//! The caller's claim is checked before the body is even read; only an
//! admitted request reaches the relay, and it reaches it exactly once.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, FromRequest, State},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;

use crate::auth::{guard, IdentityClaim};
use crate::error::GatewayError;
use crate::http::request::request_id_of;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::relay::{is_valid_conversation_id, StreamEnd};

/// Inbound message-send payload.
#[derive(Debug, Deserialize)]
pub struct SendMessage {
    pub id: String,
    pub message: serde_json::Value,
}

/// Lifecycle of one relayed exchange.
///
/// ```text
/// Received → Authorized → Relaying → Completed
/// Received → Denied → Completed
/// ```
///
/// A relayed exchange completes when its response body drains, fails or is
/// dropped, which `relay::RelayBody` reports through its end hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Received,
    Authorized,
    Denied,
    Relaying,
    Completed,
}

impl Phase {
    /// Whether `self → next` is a legal transition.
    pub fn permits(self, next: Phase) -> bool {
        matches!(
            (self, next),
            (Phase::Received, Phase::Authorized)
                | (Phase::Received, Phase::Denied)
                | (Phase::Authorized, Phase::Relaying)
                | (Phase::Authorized, Phase::Completed)
                | (Phase::Relaying, Phase::Completed)
                | (Phase::Denied, Phase::Completed)
        )
    }
}

/// Phase tracker shared between the handler and the relayed body.
#[derive(Clone)]
struct Exchange {
    request_id: Arc<str>,
    phase: Arc<Mutex<Phase>>,
}

impl Exchange {
    fn new(request_id: &str) -> Self {
        Self {
            request_id: Arc::from(request_id),
            phase: Arc::new(Mutex::new(Phase::Received)),
        }
    }

    fn phase(&self) -> Phase {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn advance(&self, next: Phase) {
        let mut phase = self.phase.lock().unwrap_or_else(PoisonError::into_inner);
        if !phase.permits(next) {
            tracing::error!(
                request_id = %self.request_id,
                from = ?*phase,
                to = ?next,
                "Illegal exchange transition ignored"
            );
            return;
        }
        tracing::trace!(request_id = %self.request_id, from = ?*phase, to = ?next, "Exchange transition");
        *phase = next;
    }

    /// Called by the relayed body once it ends.
    fn stream_ended(&self, end: StreamEnd) {
        tracing::debug!(request_id = %self.request_id, end = ?end, "Relayed exchange finished");
        self.advance(Phase::Completed);
    }

    /// Settle the handler's outcome. Errors complete the exchange here; a
    /// relayed response stays `Relaying` until its body ends.
    fn settle(&self, result: Result<Response, GatewayError>) -> Response {
        match result {
            Ok(response) => response,
            Err(err) => {
                if self.phase() == Phase::Received {
                    self.advance(Phase::Denied);
                }
                self.advance(Phase::Completed);
                err.into_response()
            }
        }
    }
}

fn reject_payload(rejection: JsonRejection, limit: usize) -> GatewayError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        GatewayError::PayloadTooLarge(limit)
    } else {
        GatewayError::InvalidRequest(rejection.body_text())
    }
}

/// Gateway handler: authorize, then relay the message to the inference service.
pub async fn send_message(State(state): State<AppState>, request: Request<Body>) -> Response {
    let started = Instant::now();
    let request_id = request_id_of(request.headers());
    let claim = request.extensions().get::<IdentityClaim>().cloned();
    let policy = state.chat_policy.clone();
    let body_limit = state.max_body_bytes;

    let exchange = Exchange::new(&request_id);
    let tracker = exchange.clone();

    let result = guard(claim.as_ref(), &policy, move || async move {
        tracker.advance(Phase::Authorized);

        let Json(payload) = Json::<SendMessage>::from_request(request, &state)
            .await
            .map_err(|rejection| reject_payload(rejection, body_limit))?;
        if !is_valid_conversation_id(&payload.id) {
            return Err(GatewayError::InvalidRequest(format!(
                "id '{}' is not a valid conversation id",
                payload.id
            )));
        }

        let stream_tracker = tracker.clone();
        let relay_request = state
            .relay
            .chat_message(&payload.id, &payload.message, request_id.as_str())?
            .on_stream_end(move |end| stream_tracker.stream_ended(end));

        tracker.advance(Phase::Relaying);
        tracing::info!(
            request_id = %request_id,
            conversation = %payload.id,
            "Relaying message to inference service"
        );
        Ok(state.relay.forward(relay_request).await?)
    })
    .await;

    let response = exchange.settle(result);

    metrics::record_request("chat", response.status().as_u16(), started);
    response
}
