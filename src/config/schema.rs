//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, mount path, TLS).
    pub listener: ListenerConfig,

    /// Route definitions, in match-priority order.
    pub routes: Vec<RouteConfig>,

    /// Backend service definitions.
    pub backends: Vec<BackendConfig>,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Per-user session settings.
    pub session: SessionConfig,

    /// CAS integration settings.
    pub cas: CasConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl ProxyConfig {
    pub fn backend(&self, name: &str) -> Option<&BackendConfig> {
        self.backends.iter().find(|b| b.name == name)
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Path under which proxied resources are served.
    pub mount_path: String,

    /// Path of the logout endpoint.
    pub logout_path: String,

    /// Maximum accepted request body in bytes.
    pub max_body_bytes: usize,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            mount_path: "/proxy-resource".to_string(),
            logout_path: "/logout".to_string(),
            max_body_bytes: 10 * 1024 * 1024,
            tls: None,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Route configuration mapping a path prefix to a backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Path prefix to match (`/users` or `/users/*`).
    pub prefix: String,

    /// Name of the backend to forward to.
    pub backend: String,

    /// Prefix substituted for the matched one. Defaults to stripping it.
    #[serde(default)]
    pub replacement: Option<String>,
}

/// Backend service configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    /// Unique backend identifier referenced by routes.
    pub name: String,

    /// Base URL of the service (e.g., "https://host/eureka-services").
    pub base_url: String,
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Backend connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Backend request timeout (total time for request/response) in seconds.
    pub request_secs: u64,

    /// Idle pooled connection timeout in seconds.
    pub pool_idle_secs: u64,

    /// Deadline for a whole inbound request in seconds.
    pub edge_request_secs: u64,
}

impl TimeoutConfig {
    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }

    pub fn request(&self) -> Duration {
        Duration::from_secs(self.request_secs)
    }

    pub fn pool_idle(&self) -> Duration {
        Duration::from_secs(self.pool_idle_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 30,
            pool_idle_secs: 90,
            edge_request_secs: 60,
        }
    }
}

/// Session configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Name of the cookie carrying the proxy session id.
    pub cookie_name: String,

    /// Sessions idle for longer than this are ended.
    pub idle_timeout_secs: u64,

    /// How often idle sessions are reaped.
    pub reap_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "EUREKA_PROXY_SESSION".to_string(),
            idle_timeout_secs: 30 * 60,
            reap_interval_secs: 60,
        }
    }
}

/// CAS configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CasConfig {
    /// Attach proxy tickets to backend calls.
    pub enabled: bool,

    /// CAS server base URL (e.g., "https://cas.example.org/cas-server").
    pub server_url: String,

    /// Header carrying the user authenticated by the CAS validation layer.
    pub user_header: String,

    /// Header carrying that user's proxy-granting ticket.
    pub pgt_header: String,

    /// Backend session cookie that makes a proxy ticket unnecessary.
    pub authenticating_cookie: String,

    /// Logout URL; defaults to `<server_url>/logout`.
    pub logout_url: Option<String>,
}

impl CasConfig {
    pub fn logout_url(&self) -> String {
        match &self.logout_url {
            Some(url) => url.clone(),
            None => format!("{}/logout", self.server_url.trim_end_matches('/')),
        }
    }
}

impl Default for CasConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            server_url: "https://localhost:8443/cas-server".to_string(),
            user_header: "X-Remote-User".to_string(),
            pgt_header: "X-Proxy-Granting-Ticket".to_string(),
            authenticating_cookie: "JSESSIONID".to_string(),
            logout_url: None,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
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
