//! Upstream forwarding.
//!
//! # Responsibilities
//! - Build the upstream request from an authorized inbound request
//! - Open exactly one upstream exchange per inbound request
//! - Bound connect, response-head and total stream time
//! - Hand the upstream status, headers and body back unchanged

use std::time::{Duration, Instant};

use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, Response, Uri},
};
use bytes::Bytes;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use serde_json::json;
use url::Url;

use crate::config::schema::UpstreamConfig;
use crate::http::request::X_REQUEST_ID;
use crate::observability::metrics;
use crate::relay::body::{RelayBody, StreamEnd, StreamEndHook};
use crate::relay::error::{RelayError, TimeoutPhase};

/// Headers that describe a single connection and must not be forwarded.
const HOP_BY_HOP: [&str; 7] = [
    "connection",
    "keep-alive",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Whether `id` can be carried as one upstream path segment.
///
/// Empty ids and the dot-segments `.` and `..` cannot: URL normalization
/// would drop them and the request would reach a different route.
pub fn is_valid_conversation_id(id: &str) -> bool {
    !id.trim().is_empty() && id != "." && id != ".."
}

/// A request ready to be relayed. Consumed by [`Relay::forward`].
pub struct RelayRequest {
    target: Url,
    body: Bytes,
    request_id: String,
    on_stream_end: Option<StreamEndHook>,
}

impl std::fmt::Debug for RelayRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayRequest")
            .field("target", &self.target.as_str())
            .field("body_len", &self.body.len())
            .field("request_id", &self.request_id)
            .finish()
    }
}

impl RelayRequest {
    /// Run `hook` once when the relayed response body ends. Never runs if
    /// no upstream response head arrives.
    pub fn on_stream_end(mut self, hook: impl FnOnce(StreamEnd) + Send + 'static) -> Self {
        self.on_stream_end = Some(Box::new(hook));
        self
    }

    pub fn target(&self) -> &Url {
        &self.target
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }
}

/// Relay to the upstream inference service.
pub struct Relay {
    client: Client<HttpConnector, Body>,
    base_url: Url,
    response_timeout: Duration,
    stream_timeout: Duration,
}

impl Relay {
    /// Create a relay for the configured upstream.
    pub fn new(config: &UpstreamConfig) -> Result<Self, RelayError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| RelayError::InvalidTarget(format!("{}: {}", config.base_url, e)))?;

        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_millis(config.connect_timeout_ms)));
        connector.set_nodelay(true);

        let client = Client::builder(TokioExecutor::new()).build(connector);

        Ok(Self {
            client,
            base_url,
            response_timeout: Duration::from_secs(config.response_timeout_secs),
            stream_timeout: Duration::from_secs(config.stream_timeout_secs),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build `POST <base>/chat/{id}/message` carrying `{"message": ...}`.
    ///
    /// `id` is encoded as a single path segment.
    pub fn chat_message(
        &self,
        id: &str,
        message: &serde_json::Value,
        request_id: impl Into<String>,
    ) -> Result<RelayRequest, RelayError> {
        if !is_valid_conversation_id(id) {
            return Err(RelayError::InvalidTarget(format!(
                "conversation id '{id}' is not a path segment"
            )));
        }

        let mut target = self.base_url.clone();
        {
            let mut segments = target.path_segments_mut().map_err(|_| {
                RelayError::InvalidTarget(format!("{} cannot carry a path", self.base_url))
            })?;
            segments.pop_if_empty().extend(["chat", id, "message"]);
        }

        let body = serde_json::to_vec(&json!({ "message": message }))
            .map_err(|e| RelayError::InvalidTarget(e.to_string()))?;

        Ok(RelayRequest {
            target,
            body: Bytes::from(body),
            request_id: request_id.into(),
            on_stream_end: None,
        })
    }

    /// Forward `request` and return the upstream response with a streaming body.
    ///
    /// Errors are only returned while no upstream status exists. Once the head
    /// arrived, the status is forwarded as-is and later failures surface
    /// through the body.
    pub async fn forward(&self, request: RelayRequest) -> Result<Response<Body>, RelayError> {
        let RelayRequest {
            target,
            body,
            request_id,
            on_stream_end,
        } = request;

        let started = Instant::now();
        let deadline = tokio::time::Instant::now() + self.stream_timeout;
        let head_deadline = (tokio::time::Instant::now() + self.response_timeout).min(deadline);

        let uri: Uri = target
            .as_str()
            .parse()
            .map_err(|e: axum::http::uri::InvalidUri| RelayError::InvalidTarget(e.to_string()))?;

        let upstream_req = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .header(X_REQUEST_ID, request_id.as_str())
            .body(Body::from(body))
            .map_err(|e| RelayError::InvalidTarget(e.to_string()))?;

        tracing::debug!(
            request_id = %request_id,
            target = %target,
            "Forwarding to upstream"
        );

        let response =
            match tokio::time::timeout_at(head_deadline, self.client.request(upstream_req)).await {
                Ok(Ok(response)) => response,
                Ok(Err(e)) => {
                    let err = classify_failure(e.is_connect(), &e);
                    tracing::error!(request_id = %request_id, error = %err, "Upstream request failed");
                    metrics::record_relay(err.kind(), err.status_code().as_u16(), started);
                    return Err(err);
                }
                Err(_) => {
                    let err = RelayError::Timeout(TimeoutPhase::ResponseHead);
                    tracing::error!(request_id = %request_id, error = %err, "Upstream request timed out");
                    metrics::record_relay(err.kind(), err.status_code().as_u16(), started);
                    return Err(err);
                }
            };

        let status = response.status();
        if status.is_success() {
            metrics::record_relay("streaming", status.as_u16(), started);
        } else {
            tracing::warn!(
                request_id = %request_id,
                status = %status,
                "Upstream returned non-success status, forwarding as-is"
            );
            metrics::record_relay("upstream_bad_status", status.as_u16(), started);
        }

        let (mut parts, incoming): (_, hyper::body::Incoming) = response.into_parts();
        strip_hop_by_hop(&mut parts.headers);

        let mut body = RelayBody::new(incoming, deadline, request_id);
        if let Some(hook) = on_stream_end {
            body = body.on_end(hook);
        }
        Ok(Response::from_parts(parts, Body::new(body)))
    }
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

/// Map a client failure that happened before any response head.
///
/// A connect failure whose chain holds an `io::ErrorKind::TimedOut` is the
/// connector's timeout; everything else means the upstream is unreachable.
fn classify_failure(is_connect: bool, err: &(dyn std::error::Error + 'static)) -> RelayError {
    let mut detail = err.to_string();
    let mut timed_out = false;
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(io) = e.downcast_ref::<std::io::Error>() {
            timed_out |= io.kind() == std::io::ErrorKind::TimedOut;
        }
        current = e.source();
        if let Some(next) = current {
            detail.push_str(": ");
            detail.push_str(&next.to_string());
        }
    }

    if is_connect && timed_out {
        RelayError::Timeout(TimeoutPhase::Connect)
    } else {
        RelayError::Unreachable(detail)
    }
}
