//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use eureka_proxy::config::{BackendConfig, ProxyConfig, RouteConfig};
use eureka_proxy::lifecycle::Shutdown;
use eureka_proxy::routing::{ConfigRouteTable, RouteTable};
use eureka_proxy::session::{Anonymous, PrincipalResolver, SessionRegistry};
use eureka_proxy::HttpServer;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Start a raw TCP backend. `f` gets the request head and returns status
/// and body; it may sleep to simulate a slow backend.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let f = f.clone();
            tokio::spawn(async move {
                let head = read_head(&mut socket).await;
                let (status, body) = f(head).await;
                let reason = match status {
                    200 => "OK",
                    201 => "Created",
                    204 => "No Content",
                    404 => "Not Found",
                    500 => "Internal Server Error",
                    503 => "Service Unavailable",
                    _ => "Status",
                };
                let response = format!(
                    "HTTP/1.1 {status} {reason}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    addr
}

async fn read_head(socket: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// Config with the given `(name, base_url)` backends and `(prefix, backend)` routes.
pub fn proxy_config(backends: &[(&str, String)], routes: &[(&str, &str)]) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    for (name, base_url) in backends {
        config.backends.push(BackendConfig {
            name: name.to_string(),
            base_url: base_url.clone(),
        });
    }
    for (prefix, backend) in routes {
        config.routes.push(RouteConfig {
            prefix: prefix.to_string(),
            backend: backend.to_string(),
            replacement: None,
        });
    }
    config
}

pub struct RunningProxy {
    pub addr: SocketAddr,
    pub sessions: Arc<SessionRegistry>,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<std::io::Result<()>>,
}

impl RunningProxy {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn stop(self) -> Arc<SessionRegistry> {
        self.shutdown.trigger();
        self.handle.await.unwrap().unwrap();
        self.sessions
    }
}

pub async fn start_proxy(config: ProxyConfig) -> RunningProxy {
    start_proxy_with(config, Arc::new(Anonymous)).await
}

pub async fn start_proxy_with(
    config: ProxyConfig,
    resolver: Arc<dyn PrincipalResolver>,
) -> RunningProxy {
    let routes = ConfigRouteTable::new(&config).load().unwrap();
    let listener = TcpListener::bind(&config.listener.bind_address).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = HttpServer::new(config, routes, resolver);
    let sessions = server.sessions().clone();
    let shutdown = Shutdown::new();
    let handle = tokio::spawn(server.run(listener, shutdown.clone()));

    RunningProxy {
        addr,
        sessions,
        shutdown,
        handle,
    }
}

/// Inbound client: no system proxy, no redirects, cookies kept.
pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .cookie_store(true)
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}
