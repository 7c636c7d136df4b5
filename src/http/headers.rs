//! Header translation between the edge and backends.
//!
//! # Responsibilities
//! - Drop hop-by-hop and connection-scoped headers before forwarding
//! - Record the caller in `X-Forwarded-For` and the scheme in `X-Forwarded-Proto`
//! - Drop hop-by-hop headers from backend responses
//!
//! # Design Decisions
//! - `Host` is dropped; the backend client sets it for the backend URL
//! - `Cookie` is dropped; each session's client has its own backend cookie jar
//! - Backend `Set-Cookie` stays in that jar and never reaches the browser

use std::net::SocketAddr;

use axum::http::{header, HeaderMap, HeaderName, HeaderValue};

pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
pub const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");

/// Never forwarded to a backend.
pub const REQUEST_EXCLUDED: [HeaderName; 11] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    HeaderName::from_static("trailers"),
    header::TRANSFER_ENCODING,
    header::UPGRADE,
    header::CONTENT_LENGTH,
    header::COOKIE,
    header::HOST,
];

/// Never copied from a backend response.
pub const RESPONSE_EXCLUDED: [HeaderName; 9] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::TE,
    HeaderName::from_static("trailers"),
    header::TRANSFER_ENCODING,
    header::UPGRADE,
    header::CONTENT_LENGTH,
    header::SET_COOKIE,
];

/// Headers to send to the backend for an inbound request.
///
/// `private` lists additional headers consumed at the edge (e.g. a
/// proxy-granting ticket) that must not leave it.
pub fn outbound_headers(
    inbound: &HeaderMap,
    private: &[HeaderName],
    remote: SocketAddr,
    scheme: &str,
) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(inbound.len() + 2);
    for (name, value) in inbound {
        if REQUEST_EXCLUDED.contains(name) || private.contains(name) {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    add_forwarded(&mut headers, remote, scheme);
    headers
}

fn add_forwarded(headers: &mut HeaderMap, remote: SocketAddr, scheme: &str) {
    let caller = remote.ip().to_string();
    let existing: Vec<&str> = headers
        .get_all(&X_FORWARDED_FOR)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect();
    let forwarded_for = if existing.is_empty() {
        caller
    } else {
        format!("{}, {caller}", existing.join(", "))
    };
    if let Ok(value) = HeaderValue::from_str(&forwarded_for) {
        headers.insert(X_FORWARDED_FOR, value);
    }
    if let Ok(value) = HeaderValue::from_str(scheme) {
        headers.insert(X_FORWARDED_PROTO, value);
    }
}

/// Backend response headers safe to return to the caller.
pub fn inbound_response_headers(backend: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(backend.len());
    for (name, value) in backend {
        if !RESPONSE_EXCLUDED.contains(name) {
            headers.append(name.clone(), value.clone());
        }
    }
    headers
}
