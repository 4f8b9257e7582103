//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use url::{Host, Url};

/// Root configuration for the proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// The single upstream the proxy forwards to.
    pub backend: BackendConfig,

    /// CORS policy for the frontend origin.
    pub cors: CorsConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// HTML rewriting limits.
    pub rewrite: RewriteConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Backend origin (e.g., "http://backend.internal:3000"). Request paths are
    /// appended verbatim.
    pub origin: String,

    /// Root domain stripped from redirects and HTML. Derived from `origin`
    /// when unset.
    pub root_domain: Option<String>,

    /// Inbound headers forwarded in addition to `Content-Type`.
    pub forward_request_headers: Vec<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            origin: "http://127.0.0.1:3000".to_string(),
            root_domain: None,
            forward_request_headers: Vec::new(),
        }
    }
}

impl BackendConfig {
    /// Origin without a trailing slash, ready for path concatenation.
    pub fn origin_prefix(&self) -> &str {
        self.origin.trim_end_matches('/')
    }

    /// The root domain used to build the rewrite pattern.
    ///
    /// An explicit `root_domain` wins. Otherwise the origin host is used with
    /// its leftmost label removed when it has at least three labels, so
    /// `api.backend.example.com` yields `backend.example.com`. IP literals and
    /// two-label hosts are used as-is.
    pub fn effective_root_domain(&self) -> Option<String> {
        if let Some(root) = &self.root_domain {
            return Some(root.trim().trim_matches('.').to_string());
        }

        let url = Url::parse(&self.origin).ok()?;
        match url.host()? {
            Host::Domain(domain) => {
                let labels: Vec<&str> = domain.split('.').collect();
                if labels.len() > 2 {
                    Some(labels[1..].join("."))
                } else {
                    Some(domain.to_string())
                }
            }
            Host::Ipv4(addr) => Some(addr.to_string()),
            Host::Ipv6(addr) => Some(format!("[{}]", addr)),
        }
    }
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Frontend origin allowed to call the proxy. CORS is disabled when unset.
    ///
    /// A bare host (no scheme) allows both `http://` and `https://`.
    pub frontend_domain: Option<String>,

    /// Request headers the frontend may send.
    pub allowed_headers: Vec<String>,

    /// Methods the frontend may use.
    pub allowed_methods: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            frontend_domain: None,
            allowed_headers: vec!["content-type".to_string(), "accept".to_string()],
            allowed_methods: vec!["GET".to_string(), "POST".to_string(), "DELETE".to_string()],
        }
    }
}

impl CorsConfig {
    /// Expand `frontend_domain` into the full origins it permits.
    pub fn allowed_origins(&self) -> Vec<String> {
        match self.frontend_domain.as_deref().map(str::trim) {
            None | Some("") => Vec::new(),
            Some(domain) if domain.contains("://") => {
                vec![domain.trim_end_matches('/').to_string()]
            }
            Some(host) => {
                let host = host.trim_end_matches('/');
                vec![format!("http://{}", host), format!("https://{}", host)]
            }
        }
    }
}

/// Timeout configuration for backend calls.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Maximum wait for backend response headers in seconds.
    pub response_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            response_secs: 30,
        }
    }
}

/// HTML rewrite configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RewriteConfig {
    /// Largest HTML body buffered for rewriting, in bytes.
    pub max_html_bytes: usize,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            max_html_bytes: 16 * 1024 * 1024,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
