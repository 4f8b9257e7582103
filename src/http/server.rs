//! HTTP server setup and the proxy handler.
//!
//! # Responsibilities
//! - Create the Axum Router with a single catch-all handler
//! - Wire up middleware (CORS, request ID, tracing)
//! - Forward every request to the backend and relay the response
//! - Serve until a shutdown signal arrives

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderName, Request},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::ProxyConfig;
use crate::http::cors::cors_layer;
use crate::http::forwarder::{build_client, Forwarder};
use crate::http::headers::HeaderPropagator;
use crate::http::relay::ResponseRelay;
use crate::http::request::{request_id_of, UuidRequestId, X_REQUEST_ID};
use crate::lifecycle::signals::shutdown_signal;
use crate::observability::metrics;
use crate::rewrite::DomainRewriter;

/// Error building the server from configuration.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("no root domain could be derived from backend origin '{0}'")]
    RootDomain(String),
    #[error("invalid rewrite pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Application state injected into the handler.
#[derive(Clone)]
pub struct AppState {
    pub forwarder: Forwarder,
    pub relay: ResponseRelay,
}

/// HTTP server for the proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ProxyConfig) -> Result<Self, ServerError> {
        let root_domain = config
            .backend
            .effective_root_domain()
            .filter(|root| !root.is_empty())
            .ok_or_else(|| ServerError::RootDomain(config.backend.origin.clone()))?;
        let rewriter = Arc::new(DomainRewriter::new(&root_domain)?);

        let forwarded = config
            .backend
            .forward_request_headers
            .iter()
            .filter_map(|name| HeaderName::from_bytes(name.as_bytes()).ok())
            .collect();
        let propagator = Arc::new(HeaderPropagator::new(rewriter.clone(), forwarded));

        let client = build_client(Duration::from_secs(config.timeouts.connect_secs));
        let forwarder = Forwarder::new(
            client,
            config.backend.origin_prefix(),
            propagator.clone(),
            Duration::from_secs(config.timeouts.response_secs),
        );
        let relay = ResponseRelay::new(rewriter, propagator, config.rewrite.max_html_bytes);

        tracing::info!(
            backend = %config.backend.origin,
            root_domain = %root_domain,
            "Proxy pipeline ready"
        );

        let router = Self::build_router(&config, AppState { forwarder, relay });
        Ok(Self { router, config })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        let router = Router::new()
            .route("/", any(proxy_handler))
            .route("/{*path}", any(proxy_handler))
            .with_state(state);

        let router = match cors_layer(&config.cors) {
            Some(cors) => router.layer(cors),
            None => router,
        };

        router.layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(X_REQUEST_ID, UuidRequestId))
                .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                    tracing::info_span!(
                        "request",
                        request_id = %request_id_of(request),
                        method = %request.method(),
                        uri = %request.uri(),
                    )
                }))
                .layer(PropagateRequestIdLayer::new(X_REQUEST_ID)),
        )
    }

    /// The router, for embedding or driving without a socket.
    pub fn into_router(self) -> Router {
        self.router
    }

    /// Run the server until `shutdown` fires or the process is signalled.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            backend = %self.config.backend.origin,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                tokio::select! {
                    _ = shutdown.recv() => tracing::info!("Shutdown requested"),
                    _ = shutdown_signal() => {}
                }
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }
}

/// Logs when the caller goes away before the response head is ready.
///
/// Axum drops the handler future on disconnect, which also drops the backend
/// request or response body and closes that connection.
struct InFlight {
    request_id: String,
    done: bool,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if !self.done {
            tracing::debug!(request_id = %self.request_id, "Caller disconnected, backend exchange dropped");
        }
    }
}

/// Forwards the request and relays whatever the backend answers.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start_time = Instant::now();
    let request_id = request_id_of(&request).to_string();
    let method = request.method().clone();
    let mut in_flight = InFlight {
        request_id: request_id.clone(),
        done: false,
    };

    tracing::debug!(
        request_id = %request_id,
        uri = %request.uri(),
        method = %method,
        content_type = ?request.headers().get(header::CONTENT_TYPE),
        "Proxying request"
    );

    let backend_response = match state.forwarder.forward(request).await {
        Ok(response) => response,
        Err(e) => {
            in_flight.done = true;
            tracing::warn!(request_id = %request_id, error = %e, "Upstream request failed");
            metrics::record_upstream_error(e.kind());
            metrics::record_request(method.as_str(), e.status_code().as_u16(), "none", start_time);
            return e.into_response();
        }
    };

    let relayed = state.relay.relay(backend_response).await;
    in_flight.done = true;

    match relayed {
        Ok(outgoing) => {
            metrics::record_request(
                method.as_str(),
                outgoing.status.as_u16(),
                outgoing.treatment().as_str(),
                start_time,
            );
            outgoing.into_response()
        }
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "Relaying backend response failed");
            metrics::record_upstream_error(e.kind());
            metrics::record_request(method.as_str(), e.status_code().as_u16(), "rewrite", start_time);
            e.into_response()
        }
    }
}
