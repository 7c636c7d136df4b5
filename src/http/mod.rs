//! HTTP edge subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, middleware)
//!     → request.rs (request id, span)
//!     → proxy.rs (session, headers.rs, ProxyingClient)
//!     → response.rs (backend response or error → HTTP response)
//!     → Send to client
//! ```

pub mod cookie;
pub mod headers;
pub mod logout;
pub mod proxy;
pub mod request;
pub mod response;
pub mod server;

pub use request::X_REQUEST_ID;
pub use server::{AppState, HttpServer};
