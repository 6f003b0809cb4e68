//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ConfigIssue>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::ServiceConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    /// Dotted path of the offending setting, e.g. `fetch.timeout_secs`.
    pub field: &'static str,
    pub message: String,
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ConfigIssue>> {
    let mut issues = Vec::new();

    let mut check = |ok: bool, field: &'static str, message: &str| {
        if !ok {
            issues.push(ConfigIssue {
                field,
                message: message.to_string(),
            });
        }
    };

    check(
        config.listener.bind_address.parse::<SocketAddr>().is_ok(),
        "listener.bind_address",
        "must be a socket address such as 0.0.0.0:8080",
    );
    check(config.timeouts.request_secs > 0, "timeouts.request_secs", "must be greater than 0");
    check(
        config.fetch.connect_timeout_secs > 0,
        "fetch.connect_timeout_secs",
        "must be greater than 0",
    );
    check(config.fetch.timeout_secs > 0, "fetch.timeout_secs", "must be greater than 0");
    check(config.fetch.max_source_bytes > 0, "fetch.max_source_bytes", "must be greater than 0");
    check(config.fetch.channel_depth > 0, "fetch.channel_depth", "must be greater than 0");
    check(config.transform.deadline_secs > 0, "transform.deadline_secs", "must be greater than 0");
    check(
        config.transform.max_input_pixels > 0,
        "transform.max_input_pixels",
        "must be greater than 0",
    );
    check(
        config.transform.max_output_dimension > 0,
        "transform.max_output_dimension",
        "must be greater than 0",
    );
    check(config.security.max_body_size > 0, "security.max_body_size", "must be greater than 0");
    check(
        !config.observability.metrics_enabled
            || config.observability.metrics_address.parse::<SocketAddr>().is_ok(),
        "observability.metrics_address",
        "must be a socket address when metrics are enabled",
    );

    if issues.is_empty() {
        Ok(())
    } else {
        Err(issues)
    }
}
