//! Response rewriting subsystem.
//!
//! # Data Flow
//! ```text
//! Backend Content-Type and Content-Encoding
//!     → classify.rs (Rewrite | Passthrough)
//!
//! Rewrite path:
//!     buffered body → charset.rs (bytes → text)
//!     → domain.rs (strip backend domain references)
//! ```
//!
//! # Design Decisions
//! - One compiled pattern per process, shared read-only
//! - Only `text/html` is rewritten; every other type is streamed untouched

pub mod charset;
pub mod classify;
pub mod domain;

pub use charset::decode_text;
pub use classify::BodyTreatment;
pub use domain::DomainRewriter;
