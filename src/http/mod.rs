//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request
//!     → server.rs (Axum router, CORS, request ID, tracing)
//!     → forwarder.rs (one request to <origin><path+query>)
//!         → headers.rs (Content-Type + configured request headers)
//!     → relay.rs (classify, then rewrite HTML or stream)
//!         → headers.rs (Location rewrite, drop content/hop-by-hop headers)
//!     → Send to caller
//! ```

pub mod cors;
pub mod error;
pub mod forwarder;
pub mod headers;
pub mod relay;
pub mod request;
pub mod server;

pub use error::ProxyError;
pub use forwarder::Forwarder;
pub use headers::HeaderPropagator;
pub use relay::{OutgoingBody, OutgoingResponse, ResponseRelay};
pub use request::X_REQUEST_ID;
pub use server::{HttpServer, ServerError};
