//! Relay failure kinds.

use std::fmt;

use axum::http::StatusCode;

/// Which relay deadline expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutPhase {
    /// TCP connection to the upstream could not be established in time.
    Connect,
    /// Upstream accepted the request but sent no response head in time.
    ResponseHead,
    /// The whole exchange exceeded the total stream duration.
    Stream,
}

impl fmt::Display for TimeoutPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phase = match self {
            TimeoutPhase::Connect => "connect",
            TimeoutPhase::ResponseHead => "response head",
            TimeoutPhase::Stream => "stream",
        };
        f.write_str(phase)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// No upstream status was ever received.
    #[error("upstream unreachable: {0}")]
    Unreachable(String),

    #[error("upstream {0} timeout")]
    Timeout(TimeoutPhase),

    /// Upstream connection failed after streaming began.
    #[error("upstream stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("invalid upstream target: {0}")]
    InvalidTarget(String),
}

impl RelayError {
    pub fn kind(&self) -> &'static str {
        match self {
            RelayError::Unreachable(_) => "upstream_unreachable",
            RelayError::Timeout(_) => "upstream_timeout",
            RelayError::StreamInterrupted(_) => "upstream_stream_interrupted",
            RelayError::InvalidTarget(_) => "invalid_upstream_target",
        }
    }

    /// Status used when the failure happens before any response head was sent.
    pub fn status_code(&self) -> StatusCode {
        match self {
            RelayError::Unreachable(_) | RelayError::StreamInterrupted(_) => {
                StatusCode::BAD_GATEWAY
            }
            RelayError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            RelayError::InvalidTarget(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
