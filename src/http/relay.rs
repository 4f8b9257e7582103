//! Relaying the backend response to the caller.
//!
//! # States
//! ```text
//! Received → Classified → Rewriting → Sent      (text/html)
//!                       → Streaming → Sent      (everything else)
//! ```
//!
//! # Design Decisions
//! - HTML is buffered because rewriting changes its length
//! - Every other body is streamed frame by frame; hyper only polls the
//!   backend when the caller connection can take more bytes
//! - `Content-Type` and `Content-Length` are always set explicitly

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, Response, StatusCode};
use axum::response::IntoResponse;
use bytes::Bytes;
use http_body_util::{BodyExt, LengthLimitError, Limited};

use crate::http::error::ProxyError;
use crate::http::headers::HeaderPropagator;
use crate::observability::metrics;
use crate::rewrite::{decode_text, BodyTreatment, DomainRewriter};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Content type of every rewritten HTML document.
pub const HTML_UTF8: &str = "text/html; charset=utf-8";

/// Body of the response sent to the caller.
pub enum OutgoingBody {
    /// Fully materialized, rewritten HTML.
    Rewritten(String),
    /// The backend body, forwarded as it arrives.
    Stream(Body),
}

/// The response handed back to the HTTP server.
pub struct OutgoingResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub content_type: Option<HeaderValue>,
    pub content_length: Option<u64>,
    pub body: OutgoingBody,
}

impl OutgoingResponse {
    pub fn treatment(&self) -> BodyTreatment {
        match self.body {
            OutgoingBody::Rewritten(_) => BodyTreatment::Rewrite,
            OutgoingBody::Stream(_) => BodyTreatment::Passthrough,
        }
    }
}

impl IntoResponse for OutgoingResponse {
    fn into_response(self) -> axum::response::Response {
        let body = match self.body {
            OutgoingBody::Rewritten(text) => Body::from(text),
            OutgoingBody::Stream(body) => body,
        };

        let mut response = Response::new(body);
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;

        let headers = response.headers_mut();
        if let Some(content_type) = self.content_type {
            headers.insert(header::CONTENT_TYPE, content_type);
        }
        if let Some(length) = self.content_length {
            headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
        }

        response
    }
}

/// Turns a backend response into the caller response.
#[derive(Debug, Clone)]
pub struct ResponseRelay {
    rewriter: Arc<DomainRewriter>,
    propagator: Arc<HeaderPropagator>,
    max_html_bytes: usize,
}

impl ResponseRelay {
    pub fn new(
        rewriter: Arc<DomainRewriter>,
        propagator: Arc<HeaderPropagator>,
        max_html_bytes: usize,
    ) -> Self {
        Self {
            rewriter,
            propagator,
            max_html_bytes,
        }
    }

    /// Classify the backend response and either rewrite or stream it.
    pub async fn relay<B>(&self, response: Response<B>) -> Result<OutgoingResponse, ProxyError>
    where
        B: hyper::body::Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let (parts, body) = response.into_parts();
        let content_type = parts.headers.get(header::CONTENT_TYPE);
        let headers = self.propagator.response_headers(&parts.headers);

        let treatment = BodyTreatment::for_response(&parts.headers);
        tracing::debug!(
            status = %parts.status,
            content_type = ?content_type,
            treatment = treatment.as_str(),
            "Backend response classified"
        );

        match treatment {
            BodyTreatment::Rewrite => {
                let bytes = Limited::new(body, self.max_html_bytes)
                    .collect()
                    .await
                    .map_err(|e| {
                        if e.downcast_ref::<LengthLimitError>().is_some() {
                            ProxyError::HtmlTooLarge {
                                limit: self.max_html_bytes,
                            }
                        } else {
                            ProxyError::BodyStream(e)
                        }
                    })?
                    .to_bytes();

                let text = decode_text(&bytes, content_type);
                let rewritten = self.rewriter.strip(&text).into_owned();
                metrics::record_html_rewrite(bytes.len(), rewritten.len());

                Ok(OutgoingResponse {
                    status: parts.status,
                    headers,
                    content_type: Some(HeaderValue::from_static(HTML_UTF8)),
                    content_length: Some(rewritten.len() as u64),
                    body: OutgoingBody::Rewritten(rewritten),
                })
            }
            BodyTreatment::Passthrough => {
                let content_length = parts
                    .headers
                    .get(header::CONTENT_LENGTH)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.trim().parse::<u64>().ok());

                let content_type = content_type.filter(|v| is_valid_mime(v)).cloned();

                Ok(OutgoingResponse {
                    status: parts.status,
                    headers,
                    content_type,
                    content_length,
                    body: OutgoingBody::Stream(Body::new(body)),
                })
            }
        }
    }
}

fn is_valid_mime(value: &HeaderValue) -> bool {
    let valid = value
        .to_str()
        .ok()
        .is_some_and(|v| v.parse::<mime::Mime>().is_ok());
    if !valid {
        tracing::debug!(content_type = ?value, "Dropping unparseable Content-Type");
    }
    valid
}
