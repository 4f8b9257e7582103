//! Per-request proxy failures and their caller-visible status codes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A failure while forwarding one request or relaying its response.
///
/// None of these are retried: the request body has already been consumed and
/// the proxied method may not be idempotent.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// The backend could not be reached.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(#[source] BoxError),

    /// The backend did not answer within the configured deadline.
    #[error("upstream did not respond within {0}s")]
    UpstreamTimeout(u64),

    /// The backend answered with something that is not valid HTTP.
    #[error("upstream protocol error: {0}")]
    UpstreamProtocolError(#[source] BoxError),

    /// Reading the backend body failed part way.
    #[error("body stream error: {0}")]
    BodyStream(#[source] BoxError),

    /// An HTML body exceeded the rewrite buffer.
    #[error("HTML body larger than {limit} bytes")]
    HtmlTooLarge { limit: usize },

    /// Backend origin plus request path did not form a URI.
    #[error("invalid upstream target '{0}'")]
    InvalidTarget(String),
}

impl ProxyError {
    /// Status code sent to the caller.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::BAD_GATEWAY,
        }
    }

    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ProxyError::UpstreamUnavailable(_) => "upstream_unavailable",
            ProxyError::UpstreamTimeout(_) => "upstream_timeout",
            ProxyError::UpstreamProtocolError(_) => "upstream_protocol",
            ProxyError::BodyStream(_) => "body_stream",
            ProxyError::HtmlTooLarge { .. } => "html_too_large",
            ProxyError::InvalidTarget(_) => "invalid_target",
        }
    }

    fn message(&self) -> &'static str {
        match self {
            ProxyError::UpstreamUnavailable(_) => "Upstream unavailable",
            ProxyError::UpstreamTimeout(_) => "Upstream timed out",
            ProxyError::UpstreamProtocolError(_) => "Upstream sent an invalid response",
            ProxyError::BodyStream(_) => "Upstream response interrupted",
            ProxyError::HtmlTooLarge { .. } => "Upstream document too large",
            ProxyError::InvalidTarget(_) => "Upstream request failed",
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        (self.status_code(), self.message()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_maps_to_gateway_timeout() {
        assert_eq!(ProxyError::UpstreamTimeout(30).status_code(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn other_failures_map_to_bad_gateway() {
        let io = || -> BoxError { Box::new(std::io::Error::other("boom")) };
        for err in [
            ProxyError::UpstreamUnavailable(io()),
            ProxyError::UpstreamProtocolError(io()),
            ProxyError::BodyStream(io()),
            ProxyError::HtmlTooLarge { limit: 1 },
            ProxyError::InvalidTarget("x".into()),
        ] {
            assert_eq!(err.into_response().status(), StatusCode::BAD_GATEWAY);
        }
    }
}
