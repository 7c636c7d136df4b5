//! The proxy's own session cookie.

use axum::http::{header, HeaderMap, HeaderValue};

use crate::session::{parse_session_id, SessionId};

/// Session id from the request's `Cookie` headers, if present and well formed.
pub fn session_id(headers: &HeaderMap, cookie_name: &str) -> Option<SessionId> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == cookie_name)
        .and_then(|(_, value)| parse_session_id(value.trim_matches('"')).ok())
}

pub fn issue(cookie_name: &str, id: SessionId) -> Option<HeaderValue> {
    HeaderValue::from_str(&format!("{cookie_name}={id}; Path=/; HttpOnly")).ok()
}

pub fn expire(cookie_name: &str) -> Option<HeaderValue> {
    HeaderValue::from_str(&format!("{cookie_name}=; Path=/; Max-Age=0; HttpOnly")).ok()
}
