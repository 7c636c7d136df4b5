//! Proxy-ticket rewriting of outbound backend URLs.
//!
//! # Responsibilities
//! - Decide per call whether a CAS proxy ticket must be attached
//! - Skip the ticket when a backend session cookie already authenticates
//! - Attach the ticket as the `ticket` query parameter
//!
//! # Design Decisions
//! - Cookie inspection sits behind `AuthenticatingCookie` so it can be
//!   swapped without touching the transport
//! - Tickets are requested for the exact target URL and never cached

use std::fmt;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::StatusCode;
use url::Url;

use crate::error::{Error, Result};

/// Query parameter carrying a proxy ticket.
pub const TICKET_PARAM: &str = "ticket";

/// Answers whether calls to a service are already authenticated by a cookie.
pub trait AuthenticatingCookie: Send + Sync {
    fn has_authenticating_cookie(&self, service_url: &Url) -> bool;
}

/// Looks for a named session cookie in a client's cookie jar.
///
/// The jar only yields cookies whose domain and path match the URL and
/// which have not expired.
pub struct JarCookieProbe {
    jar: Arc<Jar>,
    cookie_name: String,
}

impl JarCookieProbe {
    pub fn new(jar: Arc<Jar>, cookie_name: impl Into<String>) -> Self {
        Self {
            jar,
            cookie_name: cookie_name.into(),
        }
    }
}

impl AuthenticatingCookie for JarCookieProbe {
    fn has_authenticating_cookie(&self, service_url: &Url) -> bool {
        let mut url = service_url.clone();
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        let Some(header) = self.jar.cookies(&url) else {
            return false;
        };
        let Ok(header) = header.to_str() else {
            return false;
        };
        header
            .split(';')
            .filter_map(|pair| pair.trim().split_once('='))
            .any(|(name, value)| name == self.cookie_name && !value.is_empty())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TicketError {
    #[error("CAS refused proxy ticket: {0}")]
    Rejected(String),

    #[error("CAS request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected CAS response: {0}")]
    Malformed(String),
}

/// Mints single-use proxy tickets for the authenticated user.
pub trait ProxyTicketSource: Send + Sync {
    fn proxy_ticket_for<'a>(&'a self, target: &'a Url) -> BoxFuture<'a, Result<String, TicketError>>;
}

/// The authenticated user on whose behalf backend calls are made.
#[derive(Clone)]
pub struct Principal {
    name: String,
    grant: Option<String>,
    tickets: Arc<dyn ProxyTicketSource>,
}

impl Principal {
    pub fn new(name: impl Into<String>, tickets: Arc<dyn ProxyTicketSource>) -> Self {
        Self {
            name: name.into(),
            grant: None,
            tickets,
        }
    }

    /// Record the credential the ticket source draws on, so a session can
    /// tell when the user has logged in again.
    pub fn with_grant(mut self, grant: impl Into<String>) -> Self {
        self.grant = Some(grant.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn grant(&self) -> Option<&str> {
        self.grant.as_deref()
    }

    /// Same user holding the same credential.
    pub fn same_as(&self, other: &Principal) -> bool {
        self.name == other.name && self.grant == other.grant
    }
}

impl fmt::Debug for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Principal").field("name", &self.name).finish()
    }
}

/// Applies the ticket policy for one backend.
pub struct TicketRewriter {
    service_root: Url,
    principal: Option<Principal>,
    cookies: Arc<dyn AuthenticatingCookie>,
}

impl TicketRewriter {
    pub fn new(
        service_root: Url,
        principal: Option<Principal>,
        cookies: Arc<dyn AuthenticatingCookie>,
    ) -> Self {
        Self {
            service_root,
            principal,
            cookies,
        }
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    /// Return `target`, with a fresh `ticket` parameter when one is needed.
    pub async fn rewrite(&self, mut target: Url) -> Result<Url> {
        if self.cookies.has_authenticating_cookie(&self.service_root) {
            tracing::trace!(url = %target, "Session cookie present, no proxy ticket needed");
            return Ok(target);
        }
        let Some(principal) = &self.principal else {
            return Ok(target);
        };

        match principal.tickets.proxy_ticket_for(&target).await {
            Ok(ticket) => {
                tracing::debug!(user = %principal.name, url = %target, "Attached proxy ticket");
                target.query_pairs_mut().append_pair(TICKET_PARAM, &ticket);
                Ok(target)
            }
            Err(e) => {
                tracing::warn!(user = %principal.name, url = %target, error = %e, "Proxy ticket acquisition failed");
                Err(Error::client(
                    StatusCode::BAD_REQUEST,
                    format!("Could not get proxy ticket for service call {target}"),
                ))
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Issues `PT-1`, `PT-2`, ... and records the URLs asked for.
    #[derive(Default)]
    pub(crate) struct CountingTickets {
        pub issued: AtomicUsize,
        pub targets: Mutex<Vec<String>>,
        pub refuse: bool,
    }

    impl ProxyTicketSource for CountingTickets {
        fn proxy_ticket_for<'a>(&'a self, target: &'a Url) -> BoxFuture<'a, Result<String, TicketError>> {
            Box::pin(async move {
                if self.refuse {
                    return Err(TicketError::Rejected("INVALID_TICKET".into()));
                }
                self.targets.lock().unwrap().push(target.to_string());
                let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
                Ok(format!("PT-{n}"))
            })
        }
    }

    struct FixedCookie(bool);

    impl AuthenticatingCookie for FixedCookie {
        fn has_authenticating_cookie(&self, _: &Url) -> bool {
            self.0
        }
    }

    fn rewriter(cookie: bool, tickets: Option<Arc<CountingTickets>>) -> TicketRewriter {
        let principal = tickets.map(|t| Principal::new("alice", t as Arc<dyn ProxyTicketSource>));
        TicketRewriter::new(
            Url::parse("https://svc.example.org/eureka-services").unwrap(),
            principal,
            Arc::new(FixedCookie(cookie)),
        )
    }

    #[tokio::test]
    async fn test_ticket_appended_without_cookie() {
        let tickets = Arc::new(CountingTickets::default());
        let rewriter = rewriter(false, Some(tickets.clone()));
        let target = Url::parse("https://svc.example.org/eureka-services/api/users?x=1").unwrap();

        let url = rewriter.rewrite(target.clone()).await.unwrap();
        assert_eq!(url.as_str(), "https://svc.example.org/eureka-services/api/users?x=1&ticket=PT-1");
        assert_eq!(*tickets.targets.lock().unwrap(), vec![target.to_string()]);

        let url = rewriter.rewrite(target).await.unwrap();
        assert!(url.as_str().ends_with("ticket=PT-2"));
    }

    #[tokio::test]
    async fn test_cookie_skips_ticket() {
        let tickets = Arc::new(CountingTickets::default());
        let rewriter = rewriter(true, Some(tickets.clone()));
        let target = Url::parse("https://svc.example.org/eureka-services/api/users").unwrap();

        let url = rewriter.rewrite(target.clone()).await.unwrap();
        assert_eq!(url, target);
        assert_eq!(tickets.issued.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_no_principal_no_ticket() {
        let rewriter = rewriter(false, None);
        let target = Url::parse("https://svc.example.org/eureka-services/api/users").unwrap();
        assert_eq!(rewriter.rewrite(target.clone()).await.unwrap(), target);
    }

    #[tokio::test]
    async fn test_refused_ticket_is_bad_request() {
        let tickets = Arc::new(CountingTickets {
            refuse: true,
            ..Default::default()
        });
        let rewriter = rewriter(false, Some(tickets));
        let target = Url::parse("https://svc.example.org/eureka-services/api/users").unwrap();

        match rewriter.rewrite(target).await.unwrap_err() {
            Error::Client { status, message } => {
                assert_eq!(status, StatusCode::BAD_REQUEST);
                assert_eq!(
                    message,
                    "Could not get proxy ticket for service call https://svc.example.org/eureka-services/api/users"
                );
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_jar_probe_matches_name_and_path() {
        let jar = Arc::new(Jar::default());
        let service = Url::parse("http://localhost:8080/eureka-services").unwrap();
        jar.add_cookie_str(
            "JSESSIONID=abc123; Path=/eureka-services/",
            &Url::parse("http://localhost:8080/eureka-services/api/users").unwrap(),
        );

        assert!(JarCookieProbe::new(jar.clone(), "JSESSIONID").has_authenticating_cookie(&service));
        assert!(!JarCookieProbe::new(jar.clone(), "OTHER").has_authenticating_cookie(&service));

        let elsewhere = Url::parse("http://localhost:8080/eureka-registry").unwrap();
        assert!(!JarCookieProbe::new(jar, "JSESSIONID").has_authenticating_cookie(&elsewhere));
    }

    #[test]
    fn test_jar_probe_ignores_expired_cookie() {
        let jar = Arc::new(Jar::default());
        let service = Url::parse("http://localhost:8080/eureka-services/").unwrap();
        jar.add_cookie_str(
            "JSESSIONID=stale; Path=/eureka-services/; Expires=Thu, 01 Jan 1970 00:00:00 GMT",
            &service,
        );
        assert!(!JarCookieProbe::new(jar, "JSESSIONID").has_authenticating_cookie(&service));
    }
}
