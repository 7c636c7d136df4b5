//! Raw backend responses.

use bytes::Bytes;
use reqwest::header::{HeaderMap, LOCATION};
use reqwest::StatusCode;
use url::Url;

use crate::error::{Error, Result};

/// A fully-read backend response: status, headers and body.
#[derive(Debug, Clone)]
pub struct ProxyResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ProxyResponse {
    /// Body decoded as UTF-8, lossily.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn location(&self) -> Option<&str> {
        self.headers.get(LOCATION).and_then(|v| v.to_str().ok())
    }

    /// Fail with `Error::Client` unless the status is in `allowed`.
    pub(crate) fn expect_status(self, allowed: &[StatusCode]) -> Result<Self> {
        if allowed.contains(&self.status) {
            Ok(self)
        } else {
            Err(Error::client(self.status, self.text()))
        }
    }
}

/// The identifier a create call's `Location` ends with.
///
/// `http://host/api/users/57` yields `57`.
pub fn extract_id(location: &Url) -> Result<i64> {
    let text = location.as_str().trim_end_matches('/');
    let (_, last) = text
        .rsplit_once('/')
        .ok_or_else(|| Error::InvalidLocation(location.to_string()))?;
    last.parse()
        .map_err(|_| Error::InvalidLocation(location.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16, body: &'static str) -> ProxyResponse {
        ProxyResponse {
            status: StatusCode::from_u16(status).unwrap(),
            headers: HeaderMap::new(),
            body: Bytes::from_static(body.as_bytes()),
        }
    }

    #[test]
    fn test_extract_id() {
        let url = Url::parse("http://host/api/users/57").unwrap();
        assert_eq!(extract_id(&url).unwrap(), 57);

        let url = Url::parse("http://host/api/users/").unwrap();
        assert!(matches!(extract_id(&url), Err(Error::InvalidLocation(_))));
    }

    #[test]
    fn test_expect_status() {
        assert!(response(204, "").expect_status(&[StatusCode::OK, StatusCode::NO_CONTENT]).is_ok());

        match response(409, "already exists").expect_status(&[StatusCode::OK]) {
            Err(Error::Client { status, message }) => {
                assert_eq!(status, StatusCode::CONFLICT);
                assert_eq!(message, "already exists");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
