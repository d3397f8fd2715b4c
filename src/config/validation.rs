//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check every backend address parses into a node
//! - Validate value ranges (interval > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::load_balancer::{LbError, Node};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("at least one backend is required")]
    NoBackends,

    #[error("{0}")]
    InvalidBackend(LbError),

    #[error("backend '{0}' is listed more than once")]
    DuplicateBackend(String),

    #[error("{field} '{value}' is not a valid socket address")]
    InvalidSocketAddress { field: &'static str, value: String },

    #[error("health_check.interval_secs must be greater than zero")]
    ZeroProbeInterval,

    #[error("timeouts.{0} must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error("admin.api_key must be set when the admin API is enabled")]
    MissingAdminKey,
}

/// Validate a configuration, collecting every error found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.backends.is_empty() {
        errors.push(ValidationError::NoBackends);
    }

    let mut seen = HashSet::new();
    for (index, raw) in config.backends.iter().enumerate() {
        match Node::new(index, raw) {
            Ok(node) => {
                if !seen.insert(node.address().to_string()) {
                    errors.push(ValidationError::DuplicateBackend(node.address().to_string()));
                }
            }
            Err(e) => errors.push(ValidationError::InvalidBackend(e)),
        }
    }

    check_socket_address(&mut errors, "listener.bind_address", &config.listener.bind_address);

    if config.health_check.enabled && config.health_check.interval_secs == 0 {
        errors.push(ValidationError::ZeroProbeInterval);
    }
    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("connect_secs"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("request_secs"));
    }

    if config.observability.metrics_enabled {
        check_socket_address(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    if config.admin.enabled {
        check_socket_address(&mut errors, "admin.bind_address", &config.admin.bind_address);
        if config.admin.api_key.trim().is_empty() {
            errors.push(ValidationError::MissingAdminKey);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_socket_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidSocketAddress {
            field,
            value: value.to_string(),
        });
    }
}
