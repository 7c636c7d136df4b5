//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (routes reference existing backends)
//! - Validate value ranges (timeouts > 0, URLs parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use url::Url;

use crate::config::schema::ProxyConfig;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("duplicate backend name '{0}'")]
    DuplicateBackend(String),

    #[error("backend '{name}' has invalid base_url '{url}'")]
    InvalidBaseUrl { name: String, url: String },

    #[error("route prefix '{0}' must start with '/'")]
    InvalidPrefix(String),

    #[error("route '{prefix}' references unknown backend '{backend}'")]
    UnknownBackend { prefix: String, backend: String },

    #[error("{0} must start with '/' and not end with '/'")]
    InvalidMountPath(&'static str),

    #[error("{0} must be greater than zero")]
    ZeroValue(&'static str),

    #[error("cas.server_url '{0}' is not a valid URL")]
    InvalidCasUrl(String),
}

/// Check a parsed configuration, collecting every problem found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let mut names = HashSet::new();
    for backend in &config.backends {
        if !names.insert(backend.name.as_str()) {
            errors.push(ValidationError::DuplicateBackend(backend.name.clone()));
        }
        let valid = Url::parse(&backend.base_url)
            .map(|u| matches!(u.scheme(), "http" | "https") && u.has_host())
            .unwrap_or(false);
        if !valid {
            errors.push(ValidationError::InvalidBaseUrl {
                name: backend.name.clone(),
                url: backend.base_url.clone(),
            });
        }
    }

    for route in &config.routes {
        if !route.prefix.starts_with('/') {
            errors.push(ValidationError::InvalidPrefix(route.prefix.clone()));
        }
        if !names.contains(route.backend.as_str()) {
            errors.push(ValidationError::UnknownBackend {
                prefix: route.prefix.clone(),
                backend: route.backend.clone(),
            });
        }
    }

    if !is_mount_path(&config.listener.mount_path) {
        errors.push(ValidationError::InvalidMountPath("listener.mount_path"));
    }
    if !is_mount_path(&config.listener.logout_path) {
        errors.push(ValidationError::InvalidMountPath("listener.logout_path"));
    }

    let positive = [
        ("timeouts.connect_secs", config.timeouts.connect_secs),
        ("timeouts.request_secs", config.timeouts.request_secs),
        ("timeouts.edge_request_secs", config.timeouts.edge_request_secs),
        ("session.idle_timeout_secs", config.session.idle_timeout_secs),
        ("session.reap_interval_secs", config.session.reap_interval_secs),
        ("listener.max_body_bytes", config.listener.max_body_bytes as u64),
    ];
    for (field, value) in positive {
        if value == 0 {
            errors.push(ValidationError::ZeroValue(field));
        }
    }

    if config.cas.enabled && Url::parse(&config.cas.server_url).is_err() {
        errors.push(ValidationError::InvalidCasUrl(config.cas.server_url.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn is_mount_path(path: &str) -> bool {
    path.len() > 1 && path.starts_with('/') && !path.ends_with('/')
}
