//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route Compilation (at startup):
//!     RouteConfig[]
//!     → table.rs (validate, compile prefix matchers)
//!     → RouteEntry[] (immutable, shared)
//!
//! Per session:
//!     RouteEntry[] + session clients
//!     → router.rs (bind entries to clients)
//!
//! Per request:
//!     path → router.rs (ordered scan) → matcher.rs (prefix match/replace)
//!     → Return: (rewritten path, client) or NoMatch
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same input always matches same route
//! - First match wins (table order is priority)

pub mod matcher;
pub mod router;
pub mod table;

pub use matcher::PrefixMatcher;
pub use router::{ReplacementPathAndClient, Route, Router};
pub use table::{ConfigRouteTable, RouteEntry, RouteTable, RouterTableLoadError};
