//! Translation of proxied results into edge responses.
//!
//! | outcome                       | edge response                  |
//! |-------------------------------|--------------------------------|
//! | backend response              | status, filtered headers, body |
//! | POST, 200/201 with `Location` | 201 with that `Location`       |
//! | `Error::Client`               | its status, message as body    |
//! | `Error::Routing`              | 404                            |
//! | transport failure or closed   | 502                            |
//! | `Error::InvalidArgument`      | 400                            |
//! | anything else                 | 500                            |

use axum::body::Body;
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::error::Error;
use crate::http::headers::inbound_response_headers;
use crate::proxy::ProxiedResponse;

pub fn proxied_response(method: &Method, proxied: ProxiedResponse) -> Response {
    let backend = proxied.response;
    let created = matches!(backend.status, StatusCode::OK | StatusCode::CREATED);
    let status = if *method == Method::POST && created && backend.location().is_some() {
        StatusCode::CREATED
    } else {
        backend.status
    };

    let mut response = Response::new(Body::from(backend.body));
    *response.status_mut() = status;
    *response.headers_mut() = inbound_response_headers(&backend.headers);
    response
}

impl Error {
    /// Status the edge answers with for this failure.
    pub fn edge_status(&self) -> StatusCode {
        match self {
            Error::Client { status, .. } => *status,
            Error::Routing { .. } => StatusCode::NOT_FOUND,
            Error::Transport(_) | Error::Closed => StatusCode::BAD_GATEWAY,
            Error::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.edge_status();
        let body = match self {
            Error::Client { message, .. } => message,
            Error::Routing { path } => format!("No route for {path}"),
            Error::Transport(_) | Error::Closed => "Backend request failed".to_string(),
            other => other.to_string(),
        };
        let mut response = (status, body).into_response();
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ProxyResponse;
    use axum::http::HeaderMap;
    use bytes::Bytes;

    fn proxied(status: StatusCode, location: Option<&'static str>) -> ProxiedResponse {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(location) = location {
            headers.insert(header::LOCATION, HeaderValue::from_static(location));
        }
        ProxiedResponse {
            response: ProxyResponse {
                status,
                headers,
                body: Bytes::from_static(b"{}"),
            },
            route_prefix: "/users".into(),
            backend_path: "/".into(),
            backend: "services".into(),
        }
    }

    #[test]
    fn test_post_with_location_is_created() {
        let response = proxied_response(
            &Method::POST,
            proxied(StatusCode::OK, Some("http://svc/api/users/57")),
        );
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()[header::LOCATION], "http://svc/api/users/57");
    }

    #[test]
    fn test_failed_post_with_location_keeps_status() {
        let response = proxied_response(
            &Method::POST,
            proxied(StatusCode::INTERNAL_SERVER_ERROR, Some("http://svc/api/users/9")),
        );
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.headers()[header::LOCATION], "http://svc/api/users/9");

        let response = proxied_response(
            &Method::POST,
            proxied(StatusCode::SEE_OTHER, Some("http://svc/elsewhere")),
        );
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
    }

    #[test]
    fn test_status_passthrough() {
        let response = proxied_response(&Method::GET, proxied(StatusCode::NOT_FOUND, None));
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");

        let response = proxied_response(&Method::POST, proxied(StatusCode::NO_CONTENT, None));
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[test]
    fn test_error_statuses() {
        assert_eq!(
            Error::client(StatusCode::CONFLICT, "exists").edge_status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            Error::Routing { path: "/x".into() }.edge_status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(Error::Closed.edge_status(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            Error::InvalidArgument("empty".into()).edge_status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Error::MissingLocation.edge_status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_client_error_body_is_message() {
        let response = Error::client(StatusCode::FORBIDDEN, "not yours").into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"not yours");
    }
}
