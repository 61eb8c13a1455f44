//! Gateway error taxonomy.
//!
//! Every failure a request can hit maps onto exactly one variant, and every
//! variant maps onto exactly one outward status.

use axum::http::StatusCode;
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

/// What the upstream sent back when it answered with a non-success status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamDetails {
    pub original_status: u16,
    pub original_status_text: String,
    pub original_body: String,
}

impl UpstreamDetails {
    pub fn new(status: StatusCode, body: String) -> Self {
        Self {
            original_status: status.as_u16(),
            original_status_text: status.canonical_reason().unwrap_or_default().to_string(),
            original_body: body,
        }
    }
}

/// A response body that did not parse as the declared format.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseFailure {
    pub message: String,
    pub diagnostic: Value,
}

impl ParseFailure {
    pub fn new(message: impl Into<String>, diagnostic: Value) -> Self {
        Self {
            message: message.into(),
            diagnostic,
        }
    }
}

/// Errors that end a gateway request.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The inbound envelope is malformed or incomplete.
    #[error("{message}")]
    InputValidation {
        message: String,
        details: Option<Value>,
    },

    /// The authentication block cannot be turned into headers.
    #[error("{0}")]
    AuthConfiguration(String),

    /// The gateway itself cannot serve requests as deployed.
    #[error("Gateway misconfigured: {0}")]
    ServerMisconfiguration(String),

    /// The outbound call never produced a response.
    #[error("Network error while calling external API")]
    NetworkFailure(String),

    /// The upstream rejected our credentials (401/403).
    #[error("Authentication failed with external API")]
    UpstreamAuthFailure {
        status: StatusCode,
        details: UpstreamDetails,
    },

    /// Any other non-success upstream status.
    #[error("External API request failed with status {}", .details.original_status)]
    UpstreamFailure { details: UpstreamDetails },

    /// The upstream body is not valid for the declared format.
    #[error("{}", .0.message)]
    Parse(ParseFailure),

    /// Reading the upstream body failed.
    #[error("Failed to read response from external API")]
    InternalIo(String),
}

impl GatewayError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InputValidation {
            message: message.into(),
            details: None,
        }
    }

    pub fn invalid_with(message: impl Into<String>, details: impl Into<Value>) -> Self {
        Self::InputValidation {
            message: message.into(),
            details: Some(details.into()),
        }
    }

    /// Outward HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::InputValidation { .. } => StatusCode::BAD_REQUEST,
            GatewayError::AuthConfiguration(_) => StatusCode::BAD_REQUEST,
            GatewayError::ServerMisconfiguration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::NetworkFailure(_) => StatusCode::BAD_GATEWAY,
            GatewayError::UpstreamAuthFailure { status, .. } => *status,
            GatewayError::UpstreamFailure { .. } => StatusCode::BAD_GATEWAY,
            GatewayError::Parse(_) => StatusCode::UNPROCESSABLE_ENTITY,
            GatewayError::InternalIo(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::InputValidation { .. } => "input_validation",
            GatewayError::AuthConfiguration(_) => "auth_configuration",
            GatewayError::ServerMisconfiguration(_) => "server_misconfiguration",
            GatewayError::NetworkFailure(_) => "network_failure",
            GatewayError::UpstreamAuthFailure { .. } => "upstream_auth_failure",
            GatewayError::UpstreamFailure { .. } => "upstream_failure",
            GatewayError::Parse(_) => "parse_failure",
            GatewayError::InternalIo(_) => "internal_io",
        }
    }

    /// The `details` member of the outward envelope.
    pub fn details(&self) -> Option<Value> {
        match self {
            GatewayError::InputValidation { details, .. } => details.clone(),
            GatewayError::AuthConfiguration(_) => None,
            GatewayError::ServerMisconfiguration(_) => None,
            GatewayError::NetworkFailure(message) => Some(json!(message)),
            GatewayError::UpstreamAuthFailure { details, .. }
            | GatewayError::UpstreamFailure { details } => serde_json::to_value(details).ok(),
            GatewayError::Parse(failure) => Some(failure.diagnostic.clone()),
            GatewayError::InternalIo(message) => Some(json!(message)),
        }
    }
}

impl From<ParseFailure> for GatewayError {
    fn from(failure: ParseFailure) -> Self {
        GatewayError::Parse(failure)
    }
}

/// Result type for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;
