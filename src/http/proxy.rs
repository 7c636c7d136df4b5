//! The proxy edge handler.
//!
//! # Data Flow
//! ```text
//! inbound request under the mount path
//!     → session cookie + principal → Session (opened on demand)
//!     → headers.rs (hop-by-hop filter, X-Forwarded-*)
//!     → ProxyingClient (route, ticket, backend call)
//!     → response.rs (status, headers, body or error mapping)
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::client::ticket::Principal;
use crate::error::Result;
use crate::http::headers::outbound_headers;
use crate::http::request::request_id;
use crate::http::response::proxied_response;
use crate::http::server::AppState;
use crate::http::cookie;
use crate::observability::metrics;
use crate::session::Session;

pub async fn proxy_handler(
    State(state): State<AppState>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let start = Instant::now();
    let (parts, body) = request.into_parts();
    let method = parts.method.clone();
    let request_id = request_id(&parts.headers).to_string();
    let path = path_info(parts.uri.path(), &state.config.listener.mount_path);

    let (session, issued) = match state.session_for(&parts.headers).await {
        Ok(found) => found,
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Failed to open session");
            metrics::record_request(method.as_str(), e.edge_status().as_u16(), NO_ROUTE, start);
            return e.into_response();
        }
    };

    let headers = outbound_headers(
        &parts.headers,
        state.resolver.private_headers(),
        remote,
        state.scheme,
    );

    let forwarded = forward(&state, &session, &method, &path, parts.uri.query(), headers, body).await;
    let (mut response, route) = match forwarded {
        Ok(forwarded) => forwarded,
        Err(e) => {
            tracing::warn!(
                request_id = %request_id,
                method = %method,
                path = %path,
                error = %e,
                "Proxy call failed"
            );
            (e.into_response(), NO_ROUTE.to_string())
        }
    };
    metrics::record_request(method.as_str(), response.status().as_u16(), &route, start);

    if issued {
        if let Some(value) = cookie::issue(&state.config.session.cookie_name, session.id()) {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }
    response
}

const NO_ROUTE: &str = "none";

/// The edge response and the route label it is recorded under.
async fn forward(
    state: &AppState,
    session: &Session,
    method: &Method,
    path: &str,
    query: Option<&str>,
    headers: HeaderMap,
    body: Body,
) -> Result<(Response, String)> {
    let proxying = session.proxying_client(&state.routes)?;

    let proxied = match *method {
        Method::GET => proxying.proxy_get(path, query, headers).await?,
        Method::DELETE => proxying.proxy_delete(path, query, headers).await?,
        Method::POST | Method::PUT => {
            let limit = state.config.listener.max_body_bytes;
            let Ok(body) = axum::body::to_bytes(body, limit).await else {
                let response = (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response();
                return Ok((response, NO_ROUTE.to_string()));
            };
            if *method == Method::POST {
                proxying.proxy_post(path, query, headers, body).await?
            } else {
                proxying.proxy_put(path, query, headers, body).await?
            }
        }
        _ => {
            let response = (
                StatusCode::METHOD_NOT_ALLOWED,
                [(header::ALLOW, "GET, PUT, POST, DELETE")],
            )
                .into_response();
            return Ok((response, NO_ROUTE.to_string()));
        }
    };

    tracing::debug!(
        method = %method,
        path = %path,
        backend = %proxied.backend,
        backend_path = %proxied.backend_path,
        status = proxied.response.status.as_u16(),
        "Proxied"
    );
    let route = match proxied.route_prefix.as_str() {
        "" => "/".to_string(),
        prefix => prefix.to_string(),
    };
    Ok((proxied_response(method, proxied), route))
}

impl AppState {
    /// The caller's session, opening one if the cookie is missing, stale, or
    /// belongs to a different principal or proxy-granting ticket. The flag is true for a new session.
    pub(crate) async fn session_for(&self, headers: &HeaderMap) -> Result<(Arc<Session>, bool)> {
        let principal = self.resolver.resolve(headers);
        let cookie_name = &self.config.session.cookie_name;

        if let Some(id) = cookie::session_id(headers, cookie_name) {
            if let Some(session) = self.sessions.get(&id) {
                if same_principal(session.principal(), principal.as_ref()) {
                    return Ok((session, false));
                }
                tracing::info!(
                    session = %id,
                    previous = session.principal_name().unwrap_or("-"),
                    current = principal.as_ref().map(Principal::name).unwrap_or("-"),
                    "Principal or granting ticket changed, replacing session"
                );
                self.sessions.end(&id).await;
            }
        }

        Ok((self.sessions.open(principal)?, true))
    }
}

fn same_principal(a: Option<&Principal>, b: Option<&Principal>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.same_as(b),
        (None, None) => true,
        _ => false,
    }
}

/// Path below the mount point; the mount point itself maps to `/`.
pub(crate) fn path_info(path: &str, mount_path: &str) -> String {
    let mount = mount_path.trim_end_matches('/');
    let rest = path.strip_prefix(mount).unwrap_or(path);
    if rest.is_empty() {
        "/".to_string()
    } else {
        rest.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_info() {
        assert_eq!(path_info("/proxy-resource/users/42", "/proxy-resource"), "/users/42");
        assert_eq!(path_info("/proxy-resource", "/proxy-resource"), "/");
        assert_eq!(path_info("/proxy-resource/", "/proxy-resource/"), "/");
        assert_eq!(path_info("/api/x", "/"), "/api/x");
    }
}
