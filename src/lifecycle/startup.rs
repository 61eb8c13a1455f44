//! Startup orchestration.
//!
//! Subsystems come up in order and any failure is fatal: logging first so
//! later steps can report, then the metrics exporter, then the listener.

use tokio::net::TcpListener;

use crate::config::GatewayConfig;
use crate::observability::{init_logging, metrics};

/// Install logging and, if enabled, the metrics exporter.
pub fn init_observability(config: &GatewayConfig) {
    init_logging(&config.observability);

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }
}

/// Bind the inbound listener.
pub async fn bind_listener(config: &GatewayConfig) -> std::io::Result<TcpListener> {
    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");
    Ok(listener)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bind_ephemeral_port() {
        let mut config = GatewayConfig::default();
        config.listener.bind_address = "127.0.0.1:0".to_string();
        let listener = bind_listener(&config).await.unwrap();
        assert_ne!(listener.local_addr().unwrap().port(), 0);
    }

    #[tokio::test]
    async fn test_bind_invalid_address_fails() {
        let mut config = GatewayConfig::default();
        config.listener.bind_address = "not-an-address".to_string();
        assert!(bind_listener(&config).await.is_err());
    }
}
