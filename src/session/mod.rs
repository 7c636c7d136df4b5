//! Per-user sessions.
//!
//! # Data Flow
//! ```text
//! inbound request
//!     → principal.rs (who is calling: user + ticket source, or nobody)
//!     → registry.rs (session cookie → Session with one BackendClient per backend)
//!     → reaper.rs (idle sessions ended, their clients closed)
//! ```
//!
//! # Design Decisions
//! - A session's clients never outlive it; ending a session closes them
//! - A request whose principal differs from its session's gets a new session

pub mod principal;
pub mod reaper;
pub mod registry;

pub use principal::{Anonymous, CasHeaderPrincipalResolver, PrincipalResolver};
pub use reaper::SessionReaper;
pub use registry::{parse_session_id, Session, SessionId, SessionRegistry};
