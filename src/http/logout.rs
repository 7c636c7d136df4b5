//! Logout: end the caller's session, then send them to the CAS logout page.

use axum::extract::{RawQuery, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::http::cookie;
use crate::http::server::AppState;

/// Flags passed through to the CAS logout page.
const FORWARDED_FLAGS: [&str; 2] = ["awaitingActivation", "notRegistered"];

pub async fn logout_handler(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> Response {
    let cookie_name = &state.config.session.cookie_name;
    if let Some(id) = cookie::session_id(&headers, cookie_name) {
        state.sessions.end(&id).await;
    }

    let Some(location) = logout_location(&state.config.cas.logout_url(), query.as_deref()) else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    tracing::debug!(location = %location, "Redirecting to CAS logout");

    let Ok(location) = HeaderValue::from_str(&location) else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    let mut response = (StatusCode::FOUND, [(header::LOCATION, location)]).into_response();
    if let Some(expired) = cookie::expire(cookie_name) {
        response.headers_mut().append(header::SET_COOKIE, expired);
    }
    response
}

/// The CAS logout URL with recognized flags appended as given.
/// `None` if a flag is present but not a boolean.
pub(crate) fn logout_location(logout_url: &str, query: Option<&str>) -> Option<String> {
    let params: Vec<(String, String)> = query
        .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default();

    let mut forwarded = Vec::new();
    for flag in FORWARDED_FLAGS {
        let value = params
            .iter()
            .find(|(name, _)| name == flag)
            .map(|(_, value)| value.as_str())
            .filter(|value| !value.is_empty());
        if let Some(value) = value {
            parse_flag(value)?;
            forwarded.push(format!("{flag}={value}"));
        }
    }

    if forwarded.is_empty() {
        Some(logout_url.to_string())
    } else {
        Some(format!("{logout_url}?{}", forwarded.join("&")))
    }
}

/// Lenient boolean: `true/on/y/t/yes` and `false/off/n/f/no`, any case.
pub(crate) fn parse_flag(value: &str) -> Option<bool> {
    const TRUTHY: [&str; 5] = ["true", "on", "y", "t", "yes"];
    const FALSY: [&str; 5] = ["false", "off", "n", "f", "no"];
    if TRUTHY.iter().any(|t| value.eq_ignore_ascii_case(t)) {
        Some(true)
    } else if FALSY.iter().any(|f| value.eq_ignore_ascii_case(f)) {
        Some(false)
    } else {
        None
    }
}
