//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate the backend origin and derived rewrite domain
//! - Validate value ranges (timeouts > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use axum::http::{HeaderName, HeaderValue, Method};
use url::Url;

use crate::config::schema::ProxyConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("invalid bind address '{0}'")]
    BindAddress(String),
    #[error("backend origin '{origin}' is invalid: {reason}")]
    BackendOrigin { origin: String, reason: String },
    #[error("no root domain could be derived from the backend origin")]
    RootDomain,
    #[error("invalid forwarded header name '{0}'")]
    ForwardHeader(String),
    #[error("frontend origin '{0}' is not a valid header value")]
    FrontendOrigin(String),
    #[error("invalid CORS header '{0}'")]
    CorsHeader(String),
    #[error("invalid CORS method '{0}'")]
    CorsMethod(String),
    #[error("timeout '{0}' must be greater than zero")]
    ZeroTimeout(&'static str),
    #[error("rewrite.max_html_bytes must be greater than zero")]
    ZeroHtmlLimit,
    #[error("invalid metrics address '{0}'")]
    MetricsAddress(String),
}

/// Check every semantic constraint, collecting all failures.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }

    if let Err(reason) = check_origin(&config.backend.origin) {
        errors.push(ValidationError::BackendOrigin {
            origin: config.backend.origin.clone(),
            reason,
        });
    }

    match config.backend.effective_root_domain() {
        Some(root) if !root.is_empty() => {}
        _ => errors.push(ValidationError::RootDomain),
    }

    for name in &config.backend.forward_request_headers {
        if HeaderName::from_bytes(name.as_bytes()).is_err() {
            errors.push(ValidationError::ForwardHeader(name.clone()));
        }
    }

    for origin in config.cors.allowed_origins() {
        if HeaderValue::from_str(&origin).is_err() {
            errors.push(ValidationError::FrontendOrigin(origin));
        }
    }
    for name in &config.cors.allowed_headers {
        if HeaderName::from_bytes(name.as_bytes()).is_err() {
            errors.push(ValidationError::CorsHeader(name.clone()));
        }
    }
    for method in &config.cors.allowed_methods {
        if Method::from_bytes(method.as_bytes()).is_err() {
            errors.push(ValidationError::CorsMethod(method.clone()));
        }
    }

    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("connect_secs"));
    }
    if config.timeouts.response_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("response_secs"));
    }

    if config.rewrite.max_html_bytes == 0 {
        errors.push(ValidationError::ZeroHtmlLimit);
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_origin(origin: &str) -> Result<(), String> {
    let url = Url::parse(origin).map_err(|e| e.to_string())?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(format!("unsupported scheme '{}'", other)),
    }
    if url.host().is_none() {
        return Err("missing host".into());
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err("origin must not carry a query or fragment".into());
    }
    Ok(())
}
