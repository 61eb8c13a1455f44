//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges and addresses.
//! Validation is a pure function that reports every problem, not just the first.

use std::net::SocketAddr;

use crate::config::schema::GatewayConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Validate a parsed configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError {
            field: "listener.bind_address",
            message: format!("'{}' is not a socket address", config.listener.bind_address),
        });
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError {
            field: "timeouts.request_secs",
            message: "must be greater than zero".to_string(),
        });
    }

    if config.outbound.connect_timeout_secs == 0 {
        errors.push(ValidationError {
            field: "outbound.connect_timeout_secs",
            message: "must be greater than zero".to_string(),
        });
    }

    if config.outbound.request_timeout_secs == 0 {
        errors.push(ValidationError {
            field: "outbound.request_timeout_secs",
            message: "must be greater than zero".to_string(),
        });
    }

    // The inbound deadline has to leave room for the outbound one, otherwise
    // callers see a bare timeout instead of a network failure envelope.
    if config.outbound.request_timeout_secs >= config.timeouts.request_secs
        && config.timeouts.request_secs > 0
    {
        errors.push(ValidationError {
            field: "outbound.request_timeout_secs",
            message: format!(
                "must be shorter than timeouts.request_secs ({})",
                config.timeouts.request_secs
            ),
        });
    }

    if config.outbound.max_response_bytes == 0 {
        errors.push(ValidationError {
            field: "outbound.max_response_bytes",
            message: "must be greater than zero".to_string(),
        });
    }

    if config.security.max_body_size == 0 {
        errors.push(ValidationError {
            field: "security.max_body_size",
            message: "must be greater than zero".to_string(),
        });
    }

    if !LOG_LEVELS.contains(&config.observability.log_level.to_ascii_lowercase().as_str()) {
        errors.push(ValidationError {
            field: "observability.log_level",
            message: format!("unknown level '{}'", config.observability.log_level),
        });
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError {
            field: "observability.metrics_address",
            message: format!(
                "'{}' is not a socket address",
                config.observability.metrics_address
            ),
        });
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
    fn test_default_config_is_valid() {
        assert!(validate_config(&GatewayConfig::default()).is_ok());
    }

    #[test]
    fn test_reports_every_error() {
        let mut config = GatewayConfig::default();
        config.listener.bind_address = "not-an-address".to_string();
        config.outbound.max_response_bytes = 0;
        config.observability.log_level = "loud".to_string();

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                "listener.bind_address",
                "outbound.max_response_bytes",
                "observability.log_level"
            ]
        );
    }

    #[test]
    fn test_outbound_timeout_must_fit_inside_inbound() {
        let mut config = GatewayConfig::default();
        config.timeouts.request_secs = 10;
        config.outbound.request_timeout_secs = 10;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("shorter than timeouts.request_secs"));
    }
}
