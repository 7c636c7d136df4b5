//! REST client for sibling backend services.
//!
//! # Data Flow
//! ```text
//! operation (get/put/post/delete/...)
//!     → headers.rs (supplement Content-Type / Accept defaults)
//!     → ticket.rs (attach CAS proxy ticket unless a cookie authenticates)
//!     → reqwest (pooled connection, per-client cookie jar)
//!     → response.rs (read body fully, validate status)
//! ```
//!
//! # Design Decisions
//! - One `BackendClient` per backend per user session; the pool and cookie
//!   jar are never shared between users
//! - Every call holds the read side of a lock for its whole duration;
//!   `close()` takes the write side, so it waits for in-flight calls and no
//!   call starts once it is queued
//! - Bodies are read completely before returning, releasing the pooled
//!   connection on success and failure alike
//! - Proxy variants return the raw response and never check its status

pub mod auth;
pub mod cas;
pub mod headers;
pub mod response;
pub mod ticket;

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use reqwest::cookie::Jar;
use reqwest::header::HeaderMap;
use reqwest::multipart::{Form, Part};
use reqwest::redirect::Policy;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::RwLock;
use url::Url;

use crate::config::TimeoutConfig;
use crate::error::{Error, Result};
use crate::observability::metrics;

use self::headers::{with_defaults, APPLICATION_JSON, FORM_URLENCODED, TEXT_PLAIN};
pub use self::response::{extract_id, ProxyResponse};
use self::ticket::{AuthenticatingCookie, JarCookieProbe, Principal, TicketRewriter};

/// Ordered, multi-valued query parameters.
pub type QueryParams = Vec<(String, String)>;

const GET_OK: &[StatusCode] = &[StatusCode::OK];
const PUT_OK: &[StatusCode] = &[StatusCode::OK, StatusCode::CREATED, StatusCode::NO_CONTENT];
const POST_OK: &[StatusCode] = &[StatusCode::OK, StatusCode::NO_CONTENT];
const POST_FOR_OK: &[StatusCode] = &[StatusCode::OK];
const CREATE_OK: &[StatusCode] = &[StatusCode::OK, StatusCode::CREATED];
const DELETE_OK: &[StatusCode] = &[StatusCode::OK, StatusCode::ACCEPTED, StatusCode::NO_CONTENT];

enum Payload {
    Empty,
    Bytes(Bytes),
    Multipart(Form),
}

/// Builder for [`BackendClient`].
pub struct BackendClientBuilder {
    name: String,
    base_url: String,
    principal: Option<Principal>,
    cookie_name: String,
    cookie_probe: Option<Arc<dyn AuthenticatingCookie>>,
    timeouts: TimeoutConfig,
}

impl BackendClientBuilder {
    /// The user on whose behalf calls are made. Without one, no proxy
    /// tickets are attached.
    pub fn principal(mut self, principal: Option<Principal>) -> Self {
        self.principal = principal;
        self
    }

    /// Name of the backend session cookie that makes tickets unnecessary.
    pub fn authenticating_cookie(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = name.into();
        self
    }

    /// Replace the cookie-jar inspection used to skip tickets.
    pub fn cookie_probe(mut self, probe: Arc<dyn AuthenticatingCookie>) -> Self {
        self.cookie_probe = Some(probe);
        self
    }

    pub fn timeouts(mut self, timeouts: &TimeoutConfig) -> Self {
        self.timeouts = timeouts.clone();
        self
    }

    pub fn build(self) -> Result<BackendClient> {
        let base_url = Url::parse(&self.base_url)?;
        let jar = Arc::new(Jar::default());
        let http = Client::builder()
            .cookie_provider(jar.clone())
            .redirect(Policy::none())
            .connect_timeout(self.timeouts.connect())
            .timeout(self.timeouts.request())
            .pool_idle_timeout(self.timeouts.pool_idle())
            .build()?;
        let cookies = self
            .cookie_probe
            .unwrap_or_else(|| Arc::new(JarCookieProbe::new(jar, self.cookie_name)));

        tracing::debug!(backend = %self.name, base_url = %base_url, "Backend client opened");

        Ok(BackendClient {
            tickets: TicketRewriter::new(base_url.clone(), self.principal, cookies),
            name: self.name,
            base_url,
            http: RwLock::new(Some(http)),
        })
    }
}

/// HTTP client bound to one backend base URL.
pub struct BackendClient {
    name: String,
    base_url: Url,
    tickets: TicketRewriter,
    http: RwLock<Option<Client>>,
}

impl std::fmt::Debug for BackendClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendClient")
            .field("name", &self.name)
            .field("base_url", &self.base_url.as_str())
            .field("principal", &self.tickets.principal())
            .finish()
    }
}

impl BackendClient {
    pub fn builder(name: impl Into<String>, base_url: impl Into<String>) -> BackendClientBuilder {
        BackendClientBuilder {
            name: name.into(),
            base_url: base_url.into(),
            principal: None,
            cookie_name: "JSESSIONID".to_string(),
            cookie_probe: None,
            timeouts: TimeoutConfig::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.tickets.principal()
    }

    // --- Lifecycle ---

    /// Release the connection pool. Waits for in-flight calls; later calls
    /// fail with `Error::Closed`. Closing twice is a no-op.
    pub async fn close(&self) {
        let mut http = self.http.write().await;
        if http.take().is_some() {
            tracing::debug!(backend = %self.name, "Backend client closed");
        }
    }

    pub async fn is_closed(&self) -> bool {
        self.http.read().await.is_none()
    }

    // --- GET ---

    pub async fn get(&self, path: &str) -> Result<String> {
        self.get_with(path, &[], None).await
    }

    pub async fn get_with(
        &self,
        path: &str,
        query: &[(String, String)],
        headers: Option<&HeaderMap>,
    ) -> Result<String> {
        Ok(self.get_response(path, query, headers).await?.text())
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.get_json_with(path, &[], None).await
    }

    pub async fn get_json_with<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(String, String)],
        headers: Option<&HeaderMap>,
    ) -> Result<T> {
        let response = self.get_response(path, query, headers).await?;
        Ok(serde_json::from_slice(&response.body)?)
    }

    /// GET returning the whole response once its status is 200.
    pub async fn get_response(
        &self,
        path: &str,
        query: &[(String, String)],
        headers: Option<&HeaderMap>,
    ) -> Result<ProxyResponse> {
        let headers = with_defaults(headers, None, APPLICATION_JSON);
        self.exchange(Method::GET, path, query, headers, Payload::Empty)
            .await?
            .expect_status(GET_OK)
    }

    // --- PUT ---

    pub async fn put(&self, path: &str, headers: Option<&HeaderMap>) -> Result<()> {
        let headers = with_defaults(headers, Some(APPLICATION_JSON), APPLICATION_JSON);
        self.exchange(Method::PUT, path, &[], headers, Payload::Empty)
            .await?
            .expect_status(PUT_OK)?;
        Ok(())
    }

    pub async fn put_json<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        headers: Option<&HeaderMap>,
    ) -> Result<()> {
        let headers = with_defaults(headers, Some(APPLICATION_JSON), APPLICATION_JSON);
        self.exchange(Method::PUT, path, &[], headers, json(body)?)
            .await?
            .expect_status(PUT_OK)?;
        Ok(())
    }

    // --- POST ---

    pub async fn post(&self, path: &str, headers: Option<&HeaderMap>) -> Result<()> {
        let headers = with_defaults(headers, Some(APPLICATION_JSON), APPLICATION_JSON);
        self.exchange(Method::POST, path, &[], headers, Payload::Empty)
            .await?
            .expect_status(POST_OK)?;
        Ok(())
    }

    pub async fn post_json<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        headers: Option<&HeaderMap>,
    ) -> Result<()> {
        let headers = with_defaults(headers, Some(APPLICATION_JSON), APPLICATION_JSON);
        self.exchange(Method::POST, path, &[], headers, json(body)?)
            .await?
            .expect_status(POST_OK)?;
        Ok(())
    }

    /// POST a JSON body and decode the JSON answer; requires 200.
    pub async fn post_for<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        headers: Option<&HeaderMap>,
    ) -> Result<T> {
        let headers = with_defaults(headers, Some(APPLICATION_JSON), APPLICATION_JSON);
        let response = self
            .exchange(Method::POST, path, &[], headers, json(body)?)
            .await?
            .expect_status(POST_FOR_OK)?;
        Ok(serde_json::from_slice(&response.body)?)
    }

    /// POST url-encoded form parameters and decode the JSON answer; requires 200.
    pub async fn post_form<T: DeserializeOwned>(
        &self,
        path: &str,
        form: &[(String, String)],
        headers: Option<&HeaderMap>,
    ) -> Result<T> {
        let headers = with_defaults(headers, Some(FORM_URLENCODED), APPLICATION_JSON);
        let encoded = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(form.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .finish();
        let response = self
            .exchange(Method::POST, path, &[], headers, Payload::Bytes(encoded.into()))
            .await?
            .expect_status(POST_FOR_OK)?;
        Ok(serde_json::from_slice(&response.body)?)
    }

    /// POST a JSON body that creates a resource; returns its `Location`.
    pub async fn post_create<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        headers: Option<&HeaderMap>,
    ) -> Result<Url> {
        let headers = with_defaults(headers, Some(APPLICATION_JSON), TEXT_PLAIN);
        let response = self
            .exchange(Method::POST, path, &[], headers, json(body)?)
            .await?
            .expect_status(CREATE_OK)?;
        self.location_of(path, &response)
    }

    /// Upload one file as the `file` part of a multipart form.
    pub async fn post_multipart(
        &self,
        path: &str,
        filename: &str,
        content: impl Into<reqwest::Body>,
        headers: Option<&HeaderMap>,
    ) -> Result<()> {
        let headers = with_defaults(headers, None, APPLICATION_JSON);
        self.exchange(Method::POST, path, &[], headers, multipart(filename, content)?)
            .await?
            .expect_status(POST_OK)?;
        Ok(())
    }

    /// Multipart upload that creates a resource; returns its `Location`.
    pub async fn post_multipart_create(
        &self,
        path: &str,
        filename: &str,
        content: impl Into<reqwest::Body>,
        headers: Option<&HeaderMap>,
    ) -> Result<Url> {
        let headers = with_defaults(headers, None, TEXT_PLAIN);
        let response = self
            .exchange(Method::POST, path, &[], headers, multipart(filename, content)?)
            .await?
            .expect_status(CREATE_OK)?;
        self.location_of(path, &response)
    }

    // --- DELETE ---

    pub async fn delete(&self, path: &str, headers: Option<&HeaderMap>) -> Result<()> {
        let headers = with_defaults(headers, Some(APPLICATION_JSON), APPLICATION_JSON);
        self.exchange(Method::DELETE, path, &[], headers, Payload::Empty)
            .await?
            .expect_status(DELETE_OK)?;
        Ok(())
    }

    pub async fn delete_json<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        headers: Option<&HeaderMap>,
    ) -> Result<()> {
        let headers = with_defaults(headers, Some(APPLICATION_JSON), APPLICATION_JSON);
        self.exchange(Method::DELETE, path, &[], headers, json(body)?)
            .await?
            .expect_status(DELETE_OK)?;
        Ok(())
    }

    // --- Proxy variants: headers verbatim, raw response, no status check ---

    pub async fn get_for_proxy(
        &self,
        path: &str,
        query: &[(String, String)],
        headers: HeaderMap,
    ) -> Result<ProxyResponse> {
        self.exchange(Method::GET, path, query, headers, Payload::Empty).await
    }

    pub async fn post_for_proxy(
        &self,
        path: &str,
        query: &[(String, String)],
        headers: HeaderMap,
        body: Bytes,
    ) -> Result<ProxyResponse> {
        self.exchange(Method::POST, path, query, headers, Payload::Bytes(body)).await
    }

    pub async fn put_for_proxy(
        &self,
        path: &str,
        query: &[(String, String)],
        headers: HeaderMap,
        body: Bytes,
    ) -> Result<ProxyResponse> {
        self.exchange(Method::PUT, path, query, headers, Payload::Bytes(body)).await
    }

    pub async fn delete_for_proxy(
        &self,
        path: &str,
        query: &[(String, String)],
        headers: HeaderMap,
    ) -> Result<ProxyResponse> {
        self.exchange(Method::DELETE, path, query, headers, Payload::Empty).await
    }

    // --- Internals ---

    /// Append `path` (and any `?query` it carries) to the base URL, then `query`.
    pub fn url_for(&self, path: &str, query: &[(String, String)]) -> Url {
        let (path, inline_query) = match path.split_once('?') {
            Some((path, q)) => (path, Some(q)),
            None => (path, None),
        };
        let mut url = self.base_url.clone();
        let joined = format!(
            "{}/{}",
            url.path().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        url.set_path(&joined);
        url.set_query(inline_query);
        if !query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(query.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }
        url
    }

    fn location_of(&self, path: &str, response: &ProxyResponse) -> Result<Url> {
        let location = response.location().ok_or(Error::MissingLocation)?;
        Ok(self.url_for(path, &[]).join(location)?)
    }

    async fn exchange(
        &self,
        method: Method,
        path: &str,
        query: &[(String, String)],
        headers: HeaderMap,
        payload: Payload,
    ) -> Result<ProxyResponse> {
        let guard = self.http.read().await;
        let http = guard.as_ref().ok_or(Error::Closed)?;

        let url = self.tickets.rewrite(self.url_for(path, query)).await?;
        let mut request = http.request(method.clone(), url);
        request = match payload {
            Payload::Empty => request,
            Payload::Bytes(body) => request.body(body),
            Payload::Multipart(form) => request.multipart(form),
        };
        // Applied last so supplied headers win over encoder defaults.
        request = request.headers(headers);

        let start = Instant::now();
        let result = async {
            let response = request.send().await?;
            let status = response.status();
            let headers = response.headers().clone();
            let body = response.bytes().await?;
            Ok::<_, reqwest::Error>(ProxyResponse { status, headers, body })
        }
        .await;

        match result {
            Ok(response) => {
                tracing::debug!(
                    backend = %self.name,
                    method = %method,
                    path = %path,
                    status = response.status.as_u16(),
                    latency_ms = start.elapsed().as_millis() as u64,
                    "Backend call completed"
                );
                metrics::record_backend_call(&self.name, response.status.as_u16(), start);
                Ok(response)
            }
            Err(e) => {
                tracing::warn!(
                    backend = %self.name,
                    method = %method,
                    path = %path,
                    error = %e,
                    "Backend call failed"
                );
                metrics::record_backend_failure(&self.name);
                Err(Error::Transport(e))
            }
        }
    }
}

fn json<B: Serialize + ?Sized>(body: &B) -> Result<Payload> {
    Ok(Payload::Bytes(serde_json::to_vec(body)?.into()))
}

fn multipart(filename: &str, content: impl Into<reqwest::Body>) -> Result<Payload> {
    let part = Part::stream(content)
        .file_name(filename.to_string())
        .mime_str("application/octet-stream")?;
    Ok(Payload::Multipart(Form::new().part("file", part)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> BackendClient {
        BackendClient::builder("users", base).build().unwrap()
    }

    #[test]
    fn test_url_for_appends_to_base_path() {
        let bare = client("http://localhost:8081/eureka-services");
        assert_eq!(
            bare.url_for("/api/users/42", &[]).as_str(),
            "http://localhost:8081/eureka-services/api/users/42"
        );

        let slashed = client("http://localhost:8081/eureka-services/");
        assert_eq!(
            slashed.url_for("api/users", &[]).as_str(),
            "http://localhost:8081/eureka-services/api/users"
        );
    }

    #[test]
    fn test_url_for_query_params_keep_order_and_duplicates() {
        let client = client("http://localhost:8081/svc");
        let query = vec![
            ("b".to_string(), "2".to_string()),
            ("a".to_string(), "1".to_string()),
            ("b".to_string(), "3 4".to_string()),
        ];
        assert_eq!(
            client.url_for("/items?sort=asc", &query).as_str(),
            "http://localhost:8081/svc/items?sort=asc&b=2&a=1&b=3+4"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let err = BackendClient::builder("x", "not a url").build().unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_final() {
        let client = client("http://localhost:8081/svc");
        assert!(!client.is_closed().await);
        client.close().await;
        client.close().await;
        assert!(client.is_closed().await);
        assert!(matches!(client.get("/anything").await, Err(Error::Closed)));
    }
}
