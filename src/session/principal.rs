//! Principal resolution for inbound requests.
//!
//! CAS ticket validation happens upstream of the proxy; that layer hands
//! over the authenticated user and the user's proxy-granting ticket in
//! request headers. This module turns them into a [`Principal`].

use std::sync::Arc;

use axum::http::{HeaderMap, HeaderName};
use futures_util::future::BoxFuture;
use url::Url;

use crate::client::cas::CasProxyTicketSource;
use crate::client::ticket::{Principal, ProxyTicketSource, TicketError};
use crate::config::CasConfig;
use crate::error::{Error, Result};

/// Decides who an inbound request is made by.
pub trait PrincipalResolver: Send + Sync {
    fn resolve(&self, headers: &HeaderMap) -> Option<Principal>;

    /// Headers consumed by the resolver that must not reach backends.
    fn private_headers(&self) -> &[HeaderName] {
        &[]
    }
}

/// Every request is unauthenticated; no tickets are ever attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct Anonymous;

impl PrincipalResolver for Anonymous {
    fn resolve(&self, _: &HeaderMap) -> Option<Principal> {
        None
    }
}

/// Reads the user and proxy-granting ticket set by the CAS validation layer.
pub struct CasHeaderPrincipalResolver {
    http: reqwest::Client,
    server_url: Url,
    user_header: HeaderName,
    private: Vec<HeaderName>,
}

impl CasHeaderPrincipalResolver {
    pub fn from_config(config: &CasConfig) -> Result<Self> {
        let user_header = header_name(&config.user_header)?;
        let pgt_header = header_name(&config.pgt_header)?;
        Ok(Self {
            http: reqwest::Client::new(),
            server_url: Url::parse(&config.server_url)?,
            user_header,
            private: vec![pgt_header],
        })
    }

    fn pgt_header(&self) -> &HeaderName {
        &self.private[0]
    }
}

impl PrincipalResolver for CasHeaderPrincipalResolver {
    fn resolve(&self, headers: &HeaderMap) -> Option<Principal> {
        let user = headers
            .get(&self.user_header)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())?;

        let pgt = headers
            .get(self.pgt_header())
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty());

        match pgt {
            Some(pgt) => {
                let tickets = CasProxyTicketSource::new(self.http.clone(), self.server_url.clone(), pgt);
                Some(Principal::new(user, Arc::new(tickets)).with_grant(pgt))
            }
            None => {
                tracing::warn!(user = %user, "Authenticated user has no proxy-granting ticket");
                Some(Principal::new(user, Arc::new(NoGrantingTicket)))
            }
        }
    }

    fn private_headers(&self) -> &[HeaderName] {
        &self.private
    }
}

/// Ticket source for a user CAS issued no proxy-granting ticket to.
struct NoGrantingTicket;

impl ProxyTicketSource for NoGrantingTicket {
    fn proxy_ticket_for<'a>(&'a self, _: &'a Url) -> BoxFuture<'a, Result<String, TicketError>> {
        Box::pin(async { Err(TicketError::Rejected("no proxy-granting ticket".into())) })
    }
}

fn header_name(name: &str) -> Result<HeaderName> {
    HeaderName::from_bytes(name.as_bytes())
        .map_err(|_| Error::InvalidArgument(format!("invalid header name {name}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn resolver() -> CasHeaderPrincipalResolver {
        CasHeaderPrincipalResolver::from_config(&CasConfig {
            enabled: true,
            server_url: "https://cas.example.org/cas-server".into(),
            ..CasConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_no_user_header_is_anonymous() {
        assert!(resolver().resolve(&HeaderMap::new()).is_none());
        assert!(Anonymous.resolve(&HeaderMap::new()).is_none());
    }

    #[test]
    fn test_user_header_yields_principal() {
        let mut headers = HeaderMap::new();
        headers.insert("x-remote-user", HeaderValue::from_static("alice"));
        headers.insert("x-proxy-granting-ticket", HeaderValue::from_static("PGT-1"));
        let principal = resolver().resolve(&headers).unwrap();
        assert_eq!(principal.name(), "alice");
        assert_eq!(principal.grant(), Some("PGT-1"));
    }

    #[test]
    fn test_new_granting_ticket_is_a_different_principal() {
        let resolver = resolver();
        let mut headers = HeaderMap::new();
        headers.insert("x-remote-user", HeaderValue::from_static("alice"));
        headers.insert("x-proxy-granting-ticket", HeaderValue::from_static("PGT-1"));
        let first = resolver.resolve(&headers).unwrap();
        assert!(first.same_as(&resolver.resolve(&headers).unwrap()));

        headers.insert("x-proxy-granting-ticket", HeaderValue::from_static("PGT-2"));
        let second = resolver.resolve(&headers).unwrap();
        assert!(!first.same_as(&second));
    }

    #[tokio::test]
    async fn test_missing_pgt_fails_ticket_requests() {
        let mut headers = HeaderMap::new();
        headers.insert("x-remote-user", HeaderValue::from_static("alice"));
        let principal = resolver().resolve(&headers).unwrap();

        let rewriter = crate::client::ticket::TicketRewriter::new(
            Url::parse("http://svc/").unwrap(),
            Some(principal),
            Arc::new(NeverCookie),
        );
        let err = rewriter.rewrite(Url::parse("http://svc/api").unwrap()).await.unwrap_err();
        assert_eq!(err.status(), Some(reqwest::StatusCode::BAD_REQUEST));
    }

    #[test]
    fn test_pgt_header_is_private() {
        let resolver = resolver();
        assert_eq!(resolver.private_headers(), &[HeaderName::from_static("x-proxy-granting-ticket")]);
    }

    struct NeverCookie;

    impl crate::client::ticket::AuthenticatingCookie for NeverCookie {
        fn has_authenticating_cookie(&self, _: &Url) -> bool {
            false
        }
    }
}
