//! Forwarding the inbound request to the backend.
//!
//! # Responsibilities
//! - Build the backend target as `<origin><path+query>`
//! - Carry the method, propagated headers and the streaming body
//! - Map client failures onto [`ProxyError`]
//!
//! # Design Decisions
//! - Exactly one backend request per inbound request, never retried
//! - The request body is streamed, never buffered
//! - Connect timeout lives in the connector, response timeout wraps the call

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response, Uri};
use hyper::body::Incoming;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

use crate::http::error::ProxyError;
use crate::http::headers::HeaderPropagator;

/// HTTP client used for the single forwarding hop.
pub type BackendClient = Client<HttpsConnector<HttpConnector>, Body>;

/// Build the backend client with the given connect timeout.
///
/// Both `http://` and `https://` origins are served; TLS uses the bundled
/// webpki roots.
pub fn build_client(connect_timeout: Duration) -> BackendClient {
    let mut connector = HttpConnector::new();
    connector.set_connect_timeout(Some(connect_timeout));
    connector.set_nodelay(true);
    connector.enforce_http(false);

    let https = HttpsConnectorBuilder::new()
        .with_webpki_roots()
        .https_or_http()
        .enable_http1()
        .wrap_connector(connector);

    Client::builder(TokioExecutor::new()).build(https)
}

/// Issues the outbound request for one inbound request.
#[derive(Clone)]
pub struct Forwarder {
    client: BackendClient,
    origin: Arc<str>,
    propagator: Arc<HeaderPropagator>,
    response_timeout: Duration,
}

impl Forwarder {
    /// `origin` is used verbatim as the target prefix, minus a trailing slash.
    pub fn new(
        client: BackendClient,
        origin: &str,
        propagator: Arc<HeaderPropagator>,
        response_timeout: Duration,
    ) -> Self {
        Self {
            client,
            origin: Arc::from(origin.trim_end_matches('/')),
            propagator,
            response_timeout,
        }
    }

    /// Backend URI for an inbound request target.
    pub fn target_uri(&self, inbound: &Uri) -> Result<Uri, ProxyError> {
        let path_and_query = inbound.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
        let target = format!("{}{}", self.origin, path_and_query);

        target
            .parse::<Uri>()
            .map_err(|_| ProxyError::InvalidTarget(target))
    }

    /// Turn the inbound request into the backend request, moving its body.
    pub fn outbound_request(&self, request: Request<Body>) -> Result<Request<Body>, ProxyError> {
        let (parts, body) = request.into_parts();
        let uri = self.target_uri(&parts.uri)?;

        let mut outbound = Request::new(body);
        *outbound.method_mut() = parts.method;
        *outbound.uri_mut() = uri;
        *outbound.headers_mut() = self.propagator.request_headers(&parts.headers);

        Ok(outbound)
    }

    /// Send the request and wait for the backend's response head.
    pub async fn forward(&self, request: Request<Body>) -> Result<Response<Incoming>, ProxyError> {
        let outbound = self.outbound_request(request)?;

        tracing::trace!(
            method = %outbound.method(),
            target = %outbound.uri(),
            "Forwarding to backend"
        );

        match tokio::time::timeout(self.response_timeout, self.client.request(outbound)).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) if e.is_connect() => Err(ProxyError::UpstreamUnavailable(Box::new(e))),
            Ok(Err(e)) => Err(ProxyError::UpstreamProtocolError(Box::new(e))),
            Err(_) => Err(ProxyError::UpstreamTimeout(self.response_timeout.as_secs())),
        }
    }
}
