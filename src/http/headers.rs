//! Header propagation in both directions.
//!
//! # Responsibilities
//! - Pick the inbound headers that accompany the forwarded request
//! - Relay backend response headers, rewriting `Location`
//! - Drop `Content-Type`/`Content-Length` (recomputed by the relay)
//! - Drop hop-by-hop headers
//! - Never forward `Accept-Encoding`
//!
//! # Design Decisions
//! - `HeaderName` comparisons are already case-insensitive
//! - Multi-valued headers keep every value and their order

use std::sync::Arc;

use axum::http::{header, HeaderMap, HeaderName, HeaderValue};

use crate::rewrite::DomainRewriter;

/// Headers describing a single connection, never relayed across the hop.
const HOP_BY_HOP: &[HeaderName] = &[
    header::CONNECTION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(name) || name == "keep-alive" || name == "proxy-connection"
}

/// Computes the outbound header set for requests and responses.
#[derive(Debug, Clone)]
pub struct HeaderPropagator {
    rewriter: Arc<DomainRewriter>,
    forwarded: Vec<HeaderName>,
}

impl HeaderPropagator {
    /// `forwarded` lists inbound headers sent along with `Content-Type`.
    pub fn new(rewriter: Arc<DomainRewriter>, forwarded: Vec<HeaderName>) -> Self {
        Self { rewriter, forwarded }
    }

    /// Headers for the request sent to the backend.
    pub fn request_headers(&self, inbound: &HeaderMap) -> HeaderMap {
        let mut out = HeaderMap::new();

        if let Some(content_type) = inbound.get(header::CONTENT_TYPE) {
            out.insert(header::CONTENT_TYPE, content_type.clone());
        }

        // The backend must answer with identity-encoded HTML for rewriting.
        for name in &self.forwarded {
            if *name == header::CONTENT_TYPE
                || *name == header::ACCEPT_ENCODING
                || is_hop_by_hop(name)
            {
                continue;
            }
            for value in inbound.get_all(name) {
                out.append(name.clone(), value.clone());
            }
        }

        out
    }

    /// Headers relayed to the caller, minus `Content-Type` and `Content-Length`.
    pub fn response_headers(&self, backend: &HeaderMap) -> HeaderMap {
        let mut out = HeaderMap::with_capacity(backend.len());

        for (name, value) in backend {
            if *name == header::CONTENT_TYPE
                || *name == header::CONTENT_LENGTH
                || is_hop_by_hop(name)
            {
                continue;
            }

            if *name == header::LOCATION {
                out.append(header::LOCATION, self.rewrite_location(value));
            } else {
                out.append(name.clone(), value.clone());
            }
        }

        out
    }

    fn rewrite_location(&self, value: &HeaderValue) -> HeaderValue {
        let Ok(location) = value.to_str() else {
            tracing::debug!("Location header is not visible ASCII, relaying unchanged");
            return value.clone();
        };

        let stripped = self.rewriter.strip(location);
        HeaderValue::from_str(&stripped).unwrap_or_else(|_| value.clone())
    }
}
