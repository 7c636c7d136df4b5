//! Network layer.
//!
//! Plain TCP listeners are bound by the caller and handed to the HTTP
//! server; TLS termination, when configured, happens in `axum-server`
//! with the certificates loaded here.

pub mod tls;

pub use tls::load_tls_config;
