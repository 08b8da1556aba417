//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check URLs parse and use plain HTTP
//! - Validate value ranges (timeouts > 0, limits > 0)
//! - Detect duplicate dashboard source ids
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use url::Url;

use crate::auth::AccessPolicy;
use crate::config::schema::GatewayConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

fn check_http_url(field: &str, value: &str, errors: &mut Vec<ValidationError>) {
    match Url::parse(value) {
        Ok(url) if url.scheme() == "http" && url.has_host() => {}
        Ok(_) => errors.push(ValidationError::new(field, format!("'{value}' must be an http:// URL"))),
        Err(e) => errors.push(ValidationError::new(field, format!("'{value}': {e}"))),
    }
}

fn check_positive(field: &str, value: u64, errors: &mut Vec<ValidationError>) {
    if value == 0 {
        errors.push(ValidationError::new(field, "must be greater than zero"));
    }
}

fn check_policy(field: &str, policy: &AccessPolicy, errors: &mut Vec<ValidationError>) {
    if let AccessPolicy::Allow(roles) = policy {
        if roles.is_empty() {
            errors.push(ValidationError::new(field, "allow-list admits nobody"));
        }
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    let upstream = &config.upstream;
    // Only plain HTTP upstreams; TLS is not part of this gateway.
    check_http_url("upstream.base_url", &upstream.base_url, &mut errors);
    check_positive("upstream.connect_timeout_ms", upstream.connect_timeout_ms, &mut errors);
    check_positive("upstream.response_timeout_secs", upstream.response_timeout_secs, &mut errors);
    check_positive("upstream.stream_timeout_secs", upstream.stream_timeout_secs, &mut errors);
    check_positive("upstream.max_body_bytes", upstream.max_body_bytes as u64, &mut errors);

    if config.identity.subject_header.is_empty() || config.identity.role_header.is_empty() {
        errors.push(ValidationError::new("identity", "header names must not be empty"));
    }

    check_policy("routes.chat", &config.routes.chat, &mut errors);
    check_policy("routes.dashboard", &config.routes.dashboard, &mut errors);

    check_positive("status.fetch_timeout_secs", config.status.fetch_timeout_secs, &mut errors);
    let mut ids = HashSet::new();
    for (i, source) in config.status.sources.iter().enumerate() {
        let field = format!("status.sources[{i}]");
        if source.id.is_empty() {
            errors.push(ValidationError::new(&field, "id must not be empty"));
        } else if !ids.insert(source.id.as_str()) {
            errors.push(ValidationError::new(&field, format!("duplicate id '{}'", source.id)));
        }
        check_http_url(&format!("{field}.url"), &source.url, &mut errors);
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{SourceConfig, SourceKind};

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(validate_config(&GatewayConfig::default()), Ok(()));
    }

    #[test]
    fn test_duplicate_source_ids() {
        let mut config = GatewayConfig::default();
        config.status.sources = vec![
            SourceConfig::new("stats", "http://backend/a", SourceKind::Json),
            SourceConfig::new("stats", "http://backend/b", SourceKind::Json),
        ];

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "status.sources[1]");
    }

    #[test]
    fn test_empty_allow_list() {
        let mut config = GatewayConfig::default();
        config.routes.dashboard = AccessPolicy::allow([]);

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "routes.dashboard");
    }

    #[test]
    fn test_https_upstream_rejected() {
        let mut config = GatewayConfig::default();
        config.upstream.base_url = "https://inference:8443".into();
        assert!(validate_config(&config).is_err());
    }
}
