//! Route table loading.
//!
//! # Responsibilities
//! - Supply the ordered `(prefix, backend)` list the router is built from
//! - Reject tables that reference backends nobody configured
//!
//! # Design Decisions
//! - Loaded once at startup; a load failure is fatal
//! - Entry order is match order

use crate::config::ProxyConfig;
use crate::routing::matcher::PrefixMatcher;

/// One configured route, not yet bound to a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteEntry {
    pub matcher: PrefixMatcher,
    pub backend: String,
}

impl RouteEntry {
    pub fn new(prefix: &str, replacement: Option<&str>, backend: impl Into<String>) -> Self {
        Self {
            matcher: PrefixMatcher::new(prefix, replacement),
            backend: backend.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RouterTableLoadError {
    #[error("route '{prefix}' references unknown backend '{backend}'")]
    UnknownBackend { prefix: String, backend: String },

    #[error("route prefix '{0}' must start with '/'")]
    InvalidPrefix(String),

    #[error("failed to load route table: {0}")]
    Source(String),
}

/// A source of routes.
pub trait RouteTable {
    fn load(&self) -> Result<Vec<RouteEntry>, RouterTableLoadError>;
}

/// Routes taken from the `[[routes]]` section of the configuration.
pub struct ConfigRouteTable<'a> {
    config: &'a ProxyConfig,
}

impl<'a> ConfigRouteTable<'a> {
    pub fn new(config: &'a ProxyConfig) -> Self {
        Self { config }
    }
}

impl RouteTable for ConfigRouteTable<'_> {
    fn load(&self) -> Result<Vec<RouteEntry>, RouterTableLoadError> {
        self.config
            .routes
            .iter()
            .map(|route| {
                if !route.prefix.starts_with('/') {
                    return Err(RouterTableLoadError::InvalidPrefix(route.prefix.clone()));
                }
                if self.config.backend(&route.backend).is_none() {
                    return Err(RouterTableLoadError::UnknownBackend {
                        prefix: route.prefix.clone(),
                        backend: route.backend.clone(),
                    });
                }
                Ok(RouteEntry::new(
                    &route.prefix,
                    route.replacement.as_deref(),
                    route.backend.clone(),
                ))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BackendConfig, RouteConfig};

    fn config(routes: &[(&str, &str)]) -> ProxyConfig {
        let mut config = ProxyConfig::default();
        config.backends.push(BackendConfig {
            name: "services".into(),
            base_url: "http://localhost:8081/eureka-services".into(),
        });
        for (prefix, backend) in routes {
            config.routes.push(RouteConfig {
                prefix: prefix.to_string(),
                backend: backend.to_string(),
                replacement: None,
            });
        }
        config
    }

    #[test]
    fn test_load_keeps_order() {
        let config = config(&[("/users", "services"), ("/", "services")]);
        let entries = ConfigRouteTable::new(&config).load().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].matcher.prefix(), "/users");
        assert_eq!(entries[1].matcher.prefix(), "");
    }

    #[test]
    fn test_unknown_backend_is_fatal() {
        let config = config(&[("/users", "services"), ("/roles", "registry")]);
        let err = ConfigRouteTable::new(&config).load().unwrap_err();
        assert!(matches!(err, RouterTableLoadError::UnknownBackend { .. }));
    }
}
