//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router: proxy mount and logout endpoint
//! - Wire up middleware (request id, tracing, timeout, body limit)
//! - Serve plain or TLS connections until shutdown
//! - End every session once the server has drained

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::{any, get};
use axum::Router;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

use crate::config::ProxyConfig;
use crate::http::logout::logout_handler;
use crate::http::proxy::proxy_handler;
use crate::http::request::{propagate_request_id_layer, set_request_id_layer, trace_layer};
use crate::lifecycle::Shutdown;
use crate::net::load_tls_config;
use crate::routing::RouteEntry;
use crate::session::{PrincipalResolver, SessionReaper, SessionRegistry};

/// Grace period for in-flight TLS connections after shutdown is signalled.
const TLS_DRAIN: Duration = Duration::from_secs(30);

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ProxyConfig>,
    pub routes: Arc<Vec<RouteEntry>>,
    pub sessions: Arc<SessionRegistry>,
    pub resolver: Arc<dyn PrincipalResolver>,
    /// Scheme reported to backends in `X-Forwarded-Proto`.
    pub scheme: &'static str,
}

/// HTTP server for the proxy.
pub struct HttpServer {
    router: Router,
    config: Arc<ProxyConfig>,
    sessions: Arc<SessionRegistry>,
}

impl HttpServer {
    /// Create a server over a validated configuration and loaded routes.
    pub fn new(
        config: ProxyConfig,
        routes: Vec<RouteEntry>,
        resolver: Arc<dyn PrincipalResolver>,
    ) -> Self {
        let config = Arc::new(config);
        let sessions = Arc::new(SessionRegistry::new(config.clone()));
        let scheme = if config.listener.tls.is_some() { "https" } else { "http" };

        let state = AppState {
            config: config.clone(),
            routes: Arc::new(routes),
            sessions: sessions.clone(),
            resolver,
            scheme,
        };

        let router = Self::build_router(&config, state);
        Self {
            router,
            config,
            sessions,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        let mount = config.listener.mount_path.trim_end_matches('/');
        let mount_root = if mount.is_empty() { "/" } else { mount };

        Router::new()
            .route(&format!("{mount}/{{*path}}"), any(proxy_handler))
            .route(mount_root, any(proxy_handler))
            .route(&config.listener.logout_path, get(logout_handler))
            .with_state(state)
            .layer(
                // Outermost first: the request id must exist before the span opens.
                // The timeout sits inside the body limit; it needs a `Default` body.
                ServiceBuilder::new()
                    .layer(set_request_id_layer())
                    .layer(trace_layer())
                    .layer(propagate_request_id_layer())
                    .layer(RequestBodyLimitLayer::new(config.listener.max_body_bytes))
                    .layer(TimeoutLayer::new(Duration::from_secs(
                        config.timeouts.edge_request_secs,
                    ))),
            )
    }

    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Serve on `listener` until `shutdown` fires, then end all sessions.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            mount_path = %self.config.listener.mount_path,
            tls = self.config.listener.tls.is_some(),
            "HTTP server starting"
        );

        let rustls = match &self.config.listener.tls {
            Some(tls) => Some(load_tls_config(tls).await?),
            None => None,
        };

        let reaper = SessionReaper::new(
            self.sessions.clone(),
            Duration::from_secs(self.config.session.reap_interval_secs),
        );
        let reaper = tokio::spawn(reaper.run(shutdown.subscribe()));

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();
        let mut stop = shutdown.subscribe();

        let served = match rustls {
            None => {
                axum::serve(listener, app)
                    .with_graceful_shutdown(async move {
                        let _ = stop.recv().await;
                    })
                    .await
            }
            Some(rustls) => {
                let handle = axum_server::Handle::new();
                let drain = handle.clone();
                tokio::spawn(async move {
                    let _ = stop.recv().await;
                    drain.graceful_shutdown(Some(TLS_DRAIN));
                });
                axum_server::from_tcp_rustls(listener.into_std()?, rustls)
                    .handle(handle)
                    .serve(app)
                    .await
            }
        };

        let _ = reaper.await;
        self.sessions.end_all().await;
        tracing::info!("HTTP server stopped");
        served
    }
}
