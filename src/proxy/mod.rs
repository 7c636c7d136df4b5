//! One proxied call, end to end.
//!
//! # Data Flow
//! ```text
//! inbound path, query, filtered headers, body
//!     → Router (path → rewritten path + session's BackendClient)
//!     → BackendClient proxy variant (ticket rewriting, raw response)
//!     → ProxiedResponse (response + resolved route)
//! ```
//!
//! # Design Decisions
//! - An unmatched path is `Error::Routing`, never a panic
//! - Backend statuses are passed through untouched; only transport and
//!   routing failures become errors here
//! - The inbound query string is forwarded as received, never re-encoded

use std::sync::Arc;

use bytes::Bytes;
use reqwest::header::HeaderMap;

use crate::client::{BackendClient, ProxyResponse};
use crate::error::{Error, Result};
use crate::routing::Router;

/// Backend response plus the route that produced it.
#[derive(Debug, Clone)]
pub struct ProxiedResponse {
    pub response: ProxyResponse,
    /// Prefix of the matched route, as configured.
    pub route_prefix: String,
    /// Path sent to the backend.
    pub backend_path: String,
    pub backend: String,
}

pub struct ProxyingClient {
    router: Router<Arc<BackendClient>>,
}

struct Resolved<'a> {
    path: String,
    client: &'a BackendClient,
    route_prefix: String,
}

impl<'a> Resolved<'a> {
    /// Backend path with the inbound query appended verbatim.
    fn target(&self, query: Option<&str>) -> String {
        match query {
            Some(query) if !query.is_empty() => format!("{}?{}", self.path, query),
            _ => self.path.clone(),
        }
    }

    fn into_proxied(self, response: ProxyResponse) -> ProxiedResponse {
        ProxiedResponse {
            response,
            route_prefix: self.route_prefix,
            backend_path: self.path,
            backend: self.client.name().to_string(),
        }
    }
}

impl ProxyingClient {
    pub fn new(router: Router<Arc<BackendClient>>) -> Self {
        Self { router }
    }

    pub fn router(&self) -> &Router<Arc<BackendClient>> {
        &self.router
    }

    fn resolve(&self, path: &str) -> Result<Resolved<'_>> {
        let hit = self.router.lookup(path)?.ok_or_else(|| {
            tracing::debug!(path = %path, "No route matched");
            Error::Routing {
                path: path.to_string(),
            }
        })?;
        tracing::debug!(
            path = %path,
            route = %hit.route_prefix,
            backend = %hit.client.name(),
            backend_path = %hit.path,
            "Route resolved"
        );
        Ok(Resolved {
            path: hit.path,
            client: hit.client.as_ref(),
            route_prefix: hit.route_prefix.to_string(),
        })
    }

    pub async fn proxy_get(
        &self,
        path: &str,
        query: Option<&str>,
        headers: HeaderMap,
    ) -> Result<ProxiedResponse> {
        let resolved = self.resolve(path)?;
        let response = resolved
            .client
            .get_for_proxy(&resolved.target(query), &[], headers)
            .await?;
        Ok(resolved.into_proxied(response))
    }

    pub async fn proxy_post(
        &self,
        path: &str,
        query: Option<&str>,
        headers: HeaderMap,
        body: Bytes,
    ) -> Result<ProxiedResponse> {
        let resolved = self.resolve(path)?;
        let response = resolved
            .client
            .post_for_proxy(&resolved.target(query), &[], headers, body)
            .await?;
        Ok(resolved.into_proxied(response))
    }

    pub async fn proxy_put(
        &self,
        path: &str,
        query: Option<&str>,
        headers: HeaderMap,
        body: Bytes,
    ) -> Result<ProxiedResponse> {
        let resolved = self.resolve(path)?;
        let response = resolved
            .client
            .put_for_proxy(&resolved.target(query), &[], headers, body)
            .await?;
        Ok(resolved.into_proxied(response))
    }

    pub async fn proxy_delete(
        &self,
        path: &str,
        query: Option<&str>,
        headers: HeaderMap,
    ) -> Result<ProxiedResponse> {
        let resolved = self.resolve(path)?;
        let response = resolved
            .client
            .delete_for_proxy(&resolved.target(query), &[], headers)
            .await?;
        Ok(resolved.into_proxied(response))
    }
}
