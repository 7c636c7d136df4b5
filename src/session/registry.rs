//! Per-user session registry.
//!
//! # Responsibilities
//! - Map session ids to their owned backend clients
//! - Create one client per configured backend when a session opens
//! - Close every client of a session exactly once when it ends
//!
//! # Design Decisions
//! - `DashMap` for concurrent lookups without a global lock
//! - Removal from the map is the single point that decides who closes a
//!   session's clients, so concurrent `end` calls cannot double-close

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use uuid::Uuid;

use crate::client::ticket::Principal;
use crate::client::BackendClient;
use crate::config::ProxyConfig;
use crate::error::{Error, Result};
use crate::observability::metrics;
use crate::proxy::ProxyingClient;
use crate::routing::{RouteEntry, Router};

pub type SessionId = Uuid;

/// One user's session and the backend clients it owns.
pub struct Session {
    id: SessionId,
    principal: Option<Principal>,
    clients: HashMap<String, Arc<BackendClient>>,
    last_seen: Mutex<Instant>,
}

impl Session {
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    pub fn principal_name(&self) -> Option<&str> {
        self.principal.as_ref().map(Principal::name)
    }

    pub fn client(&self, backend: &str) -> Option<&Arc<BackendClient>> {
        self.clients.get(backend)
    }

    /// A proxying client routing over this session's backend clients.
    pub fn proxying_client(&self, routes: &[RouteEntry]) -> Result<ProxyingClient> {
        let router = Router::bind(routes, |backend| self.clients.get(backend).cloned())?;
        Ok(ProxyingClient::new(router))
    }

    fn touch(&self) {
        if let Ok(mut last_seen) = self.last_seen.lock() {
            *last_seen = Instant::now();
        }
    }

    fn idle_for(&self) -> Duration {
        self.last_seen
            .lock()
            .map(|last_seen| last_seen.elapsed())
            .unwrap_or_default()
    }

    async fn close(&self) {
        for client in self.clients.values() {
            client.close().await;
        }
    }
}

pub struct SessionRegistry {
    sessions: DashMap<SessionId, Arc<Session>>,
    config: Arc<ProxyConfig>,
    idle_timeout: Duration,
}

impl SessionRegistry {
    pub fn new(config: Arc<ProxyConfig>) -> Self {
        let idle_timeout = Duration::from_secs(config.session.idle_timeout_secs);
        Self {
            sessions: DashMap::new(),
            config,
            idle_timeout,
        }
    }

    /// Start a session for `principal` with fresh clients for every backend.
    pub fn open(&self, principal: Option<Principal>) -> Result<Arc<Session>> {
        let mut clients = HashMap::new();
        for backend in &self.config.backends {
            let client = BackendClient::builder(&backend.name, &backend.base_url)
                .principal(principal.clone())
                .authenticating_cookie(&self.config.cas.authenticating_cookie)
                .timeouts(&self.config.timeouts)
                .build()?;
            clients.insert(backend.name.clone(), Arc::new(client));
        }

        let session = Arc::new(Session {
            id: Uuid::new_v4(),
            principal,
            clients,
            last_seen: Mutex::new(Instant::now()),
        });
        self.sessions.insert(session.id, session.clone());

        tracing::info!(
            session = %session.id,
            user = session.principal_name().unwrap_or("-"),
            backends = session.clients.len(),
            "Session created"
        );
        metrics::set_active_sessions(self.sessions.len());
        Ok(session)
    }

    /// Look up a live session and mark it used.
    pub fn get(&self, id: &SessionId) -> Option<Arc<Session>> {
        let session = self.sessions.get(id)?.value().clone();
        session.touch();
        Some(session)
    }

    /// End a session, closing its clients. Returns false if it was unknown
    /// or already ended.
    pub async fn end(&self, id: &SessionId) -> bool {
        let Some((_, session)) = self.sessions.remove(id) else {
            return false;
        };
        tracing::info!(
            session = %id,
            user = session.principal_name().unwrap_or("-"),
            "Destroying session"
        );
        session.close().await;
        metrics::set_active_sessions(self.sessions.len());
        true
    }

    /// End sessions idle for longer than the configured timeout.
    pub async fn reap_idle(&self) -> usize {
        let idle: Vec<SessionId> = self
            .sessions
            .iter()
            .filter(|entry| entry.value().idle_for() > self.idle_timeout)
            .map(|entry| *entry.key())
            .collect();

        let mut ended = 0;
        for id in idle {
            if self.end(&id).await {
                ended += 1;
            }
        }
        if ended > 0 {
            tracing::info!(ended, "Reaped idle sessions");
        }
        ended
    }

    /// End every session; used at shutdown.
    pub async fn end_all(&self) {
        let ids: Vec<SessionId> = self.sessions.iter().map(|entry| *entry.key()).collect();
        for id in ids {
            self.end(&id).await;
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// Parse a session id from a cookie value.
pub fn parse_session_id(value: &str) -> Result<SessionId> {
    Uuid::parse_str(value).map_err(|_| Error::InvalidArgument("malformed session id".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BackendConfig, RouteConfig};
    use crate::routing::{ConfigRouteTable, RouteTable};

    fn config(idle_timeout_secs: u64) -> Arc<ProxyConfig> {
        let mut config = ProxyConfig::default();
        config.session.idle_timeout_secs = idle_timeout_secs;
        for (name, url) in [
            ("services", "http://127.0.0.1:9/eureka-services"),
            ("registry", "http://127.0.0.1:9/eureka-registry"),
        ] {
            config.backends.push(BackendConfig {
                name: name.into(),
                base_url: url.into(),
            });
        }
        config.routes.push(RouteConfig {
            prefix: "/users".into(),
            backend: "services".into(),
            replacement: None,
        });
        Arc::new(config)
    }

    #[tokio::test]
    async fn test_open_creates_client_per_backend() {
        let config = config(60);
        let registry = SessionRegistry::new(config.clone());
        let session = registry.open(None).unwrap();

        assert_eq!(registry.len(), 1);
        assert!(session.client("services").is_some());
        assert!(session.client("registry").is_some());
        assert!(registry.get(&session.id()).is_some());

        let routes = ConfigRouteTable::new(&config).load().unwrap();
        let proxying = session.proxying_client(&routes).unwrap();
        assert_eq!(proxying.router().routes().len(), 1);
    }

    #[tokio::test]
    async fn test_end_closes_clients_once() {
        let registry = SessionRegistry::new(config(60));
        let session = registry.open(None).unwrap();
        let client = session.client("services").unwrap().clone();

        assert!(registry.end(&session.id()).await);
        assert!(!registry.end(&session.id()).await);
        assert!(client.is_closed().await);
        assert!(registry.get(&session.id()).is_none());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_reap_idle() {
        let registry = SessionRegistry::new(config(0));
        registry.open(None).unwrap();
        registry.open(None).unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        assert_eq!(registry.reap_idle().await, 2);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_active_sessions_survive_reaping() {
        let registry = SessionRegistry::new(config(3600));
        let session = registry.open(None).unwrap();
        assert_eq!(registry.reap_idle().await, 0);
        assert!(registry.get(&session.id()).is_some());
    }

    #[test]
    fn test_parse_session_id() {
        let id = Uuid::new_v4();
        assert_eq!(parse_session_id(&id.to_string()).unwrap(), id);
        assert!(parse_session_id("not-a-uuid").is_err());
    }
}
