//! Header defaults for backend calls.
//!
//! `HeaderMap` keys are lowercase-normalized and multi-valued, so lookups
//! here are case-insensitive whatever the caller's spelling was.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};

use crate::error::{Error, Result};

pub const APPLICATION_JSON: &str = "application/json";
pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";
pub const TEXT_PLAIN: &str = "text/plain";

/// Case-insensitive presence check.
pub fn has_header(headers: &HeaderMap, name: &str) -> bool {
    headers.contains_key(name.to_ascii_lowercase().as_str())
}

/// Copy `supplied` and add the defaults it lacks. Supplied values are never
/// replaced. A `None` content type leaves `Content-Type` to the body encoder
/// (multipart boundaries are chosen by the encoder).
pub fn with_defaults(
    supplied: Option<&HeaderMap>,
    content_type: Option<&'static str>,
    accept: &'static str,
) -> HeaderMap {
    let mut headers = supplied.cloned().unwrap_or_default();
    if let Some(content_type) = content_type {
        if !headers.contains_key(CONTENT_TYPE) {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        }
    }
    if !headers.contains_key(ACCEPT) {
        headers.insert(ACCEPT, HeaderValue::from_static(accept));
    }
    headers
}

/// Headers carrying `Authorization: Bearer <token>`.
pub fn bearer(token: &str) -> Result<HeaderMap> {
    let value = HeaderValue::from_str(&format!("Bearer {token}"))
        .map_err(|_| Error::InvalidArgument("bearer token is not a valid header value".into()))?;
    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, value);
    Ok(headers)
}

/// Build a header map from string pairs, keeping repeated names.
pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    for (name, value) in pairs {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| Error::InvalidArgument(format!("invalid header name {name}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| Error::InvalidArgument(format!("invalid value for header {name}")))?;
        headers.append(name, value);
    }
    Ok(headers)
}
