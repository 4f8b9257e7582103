//! Response body classification.

use axum::http::{header, HeaderMap, HeaderValue};

const HTML_PREFIX: &[u8] = b"text/html";

/// How a backend response body is relayed to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyTreatment {
    /// Buffer the whole body and strip backend domains from it.
    Rewrite,
    /// Stream the body through untouched.
    Passthrough,
}

impl BodyTreatment {
    /// Decide from the backend's declared `Content-Type`.
    ///
    /// Only a case-sensitive `text/html` prefix selects [`BodyTreatment::Rewrite`];
    /// a missing header means passthrough.
    pub fn classify(content_type: Option<&HeaderValue>) -> Self {
        match content_type {
            Some(value) if value.as_bytes().starts_with(HTML_PREFIX) => BodyTreatment::Rewrite,
            _ => BodyTreatment::Passthrough,
        }
    }

    /// Decide from the backend's response headers.
    ///
    /// HTML carrying a `Content-Encoding` other than `identity` cannot be read
    /// as text, so it is streamed through as-is.
    pub fn for_response(headers: &HeaderMap) -> Self {
        match Self::classify(headers.get(header::CONTENT_TYPE)) {
            BodyTreatment::Rewrite if is_encoded(headers) => {
                tracing::debug!(
                    content_encoding = ?headers.get(header::CONTENT_ENCODING),
                    "Encoded HTML is not rewritten"
                );
                BodyTreatment::Passthrough
            }
            treatment => treatment,
        }
    }

    /// Label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            BodyTreatment::Rewrite => "rewrite",
            BodyTreatment::Passthrough => "passthrough",
        }
    }
}

fn is_encoded(headers: &HeaderMap) -> bool {
    headers
        .get_all(header::CONTENT_ENCODING)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .any(|coding| !coding.is_empty() && !coding.eq_ignore_ascii_case("identity"))
}
