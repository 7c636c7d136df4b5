//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Store compiled routes bound to client handles
//! - Look up the route for a request path
//! - Return the rewritten path and client, or an explicit no-match
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) prefix scan in table order; the first match wins, so specific
//!   routes must be listed before general ones
//! - Generic over the client handle so one table can be bound to each
//!   session's clients

use crate::error::{Error, Result};
use crate::routing::matcher::PrefixMatcher;
use crate::routing::table::RouteEntry;

/// A prefix rule bound to a client.
#[derive(Debug, Clone)]
pub struct Route<C> {
    matcher: PrefixMatcher,
    client: C,
}

impl<C> Route<C> {
    pub fn new(matcher: PrefixMatcher, client: C) -> Self {
        Self { matcher, client }
    }

    pub fn prefix(&self) -> &str {
        self.matcher.prefix()
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn replace(&self, path: &str) -> Option<String> {
        self.matcher.replace(path)
    }
}

/// Result of a successful lookup.
#[derive(Debug, Clone)]
pub struct ReplacementPathAndClient<'a, C> {
    pub path: String,
    pub client: &'a C,
    pub route_prefix: &'a str,
}

#[derive(Debug, Clone)]
pub struct Router<C> {
    routes: Vec<Route<C>>,
}

impl<C> Router<C> {
    pub fn new(routes: Vec<Route<C>>) -> Self {
        Self { routes }
    }

    /// Bind table entries to clients. Fails if `resolve` knows no client
    /// for an entry's backend.
    pub fn bind(entries: &[RouteEntry], mut resolve: impl FnMut(&str) -> Option<C>) -> Result<Self> {
        let routes = entries
            .iter()
            .map(|entry| {
                let client = resolve(&entry.backend).ok_or_else(|| {
                    Error::InvalidArgument(format!("no client for backend {}", entry.backend))
                })?;
                Ok(Route::new(entry.matcher.clone(), client))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(routes))
    }

    pub fn routes(&self) -> &[Route<C>] {
        &self.routes
    }

    /// First route, in table order, whose prefix matches `path`.
    pub fn lookup(&self, path: &str) -> Result<Option<ReplacementPathAndClient<'_, C>>> {
        if path.is_empty() {
            return Err(Error::InvalidArgument("path cannot be empty".into()));
        }
        Ok(self.routes.iter().find_map(|route| {
            route.replace(path).map(|replacement| ReplacementPathAndClient {
                path: replacement,
                client: route.client(),
                route_prefix: route.prefix(),
            })
        }))
    }
}
