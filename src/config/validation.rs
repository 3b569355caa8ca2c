//! Configuration validation.
//!
//! Semantic checks only; serde handles the syntactic ones. Every problem is
//! reported, not just the first.

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::AppConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("server.bind_address '{0}' is not a socket address")]
    BindAddress(String),

    #[error("limits.{0} must be greater than zero")]
    ZeroLimit(&'static str),

    #[error("observability.metrics_path '{0}' must start with '/'")]
    MetricsPath(String),

    #[error("observability.apm_enabled requires observability.endpoint")]
    MissingApmEndpoint,

    #[error("routes.spec_path must not be empty")]
    EmptySpecPath,
}

/// Validate a parsed configuration.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.server.bind_address.clone()));
    }

    let limits = [
        ("json_bytes", config.limits.json_bytes),
        ("urlencoded_bytes", config.limits.urlencoded_bytes),
        ("multipart_bytes", config.limits.multipart_bytes),
    ];
    for (name, value) in limits {
        if value == 0 {
            errors.push(ValidationError::ZeroLimit(name));
        }
    }

    if !config.observability.metrics_path.starts_with('/') {
        errors.push(ValidationError::MetricsPath(
            config.observability.metrics_path.clone(),
        ));
    }

    if config.observability.apm_enabled && config.observability.endpoint.is_none() {
        errors.push(ValidationError::MissingApmEndpoint);
    }

    if config.routes.spec_path.trim().is_empty() {
        errors.push(ValidationError::EmptySpecPath);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(validate_config(&AppConfig::default()), Ok(()));
    }

    #[test]
    fn reports_every_problem() {
        let mut config = AppConfig::default();
        config.server.bind_address = "not-an-address".into();
        config.limits.json_bytes = 0;
        config.observability.metrics_path = "metrics".into();
        config.observability.apm_enabled = true;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::BindAddress("not-an-address".into()),
                ValidationError::ZeroLimit("json_bytes"),
                ValidationError::MetricsPath("metrics".into()),
                ValidationError::MissingApmEndpoint,
            ]
        );
    }
}
