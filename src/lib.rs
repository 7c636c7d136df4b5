//! Eureka! Clinical proxy library.
//!
//! Forwards calls from a webapp's `/proxy-resource` mount to backend
//! services on behalf of the logged-in user, attaching CAS proxy tickets
//! where the backend has not already authenticated the session.

// Core subsystems
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod net;
pub mod proxy;
pub mod routing;
pub mod session;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use client::BackendClient;
pub use config::schema::ProxyConfig;
pub use error::{Error, Result};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use proxy::{ProxiedResponse, ProxyingClient};
