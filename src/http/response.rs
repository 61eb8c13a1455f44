//! Outward response envelope.
//!
//! # Responsibilities
//! - Track which pipeline stage a request reached
//! - Wrap parsed payloads and errors into the uniform envelope
//! - Choose the outward status code
//! - Record request metrics and the final log line
//!
//! # Design Decisions
//! - This is the only place that turns pipeline results into HTTP responses
//! - A request ends exactly once, either with a payload or with one error

use std::fmt;
use std::time::Instant;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::Value;

use crate::envelope::DataFormat;
use crate::error::GatewayError;
use crate::observability::metrics;
use crate::observability::RequestLogger;
use crate::parsers::ParsedPayload;

/// How far a request got through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Validating,
    Authenticating,
    Dispatching,
    Parsing,
    Done,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Validating => "validating",
            PipelineStage::Authenticating => "authenticating",
            PipelineStage::Dispatching => "dispatching",
            PipelineStage::Parsing => "parsing",
            PipelineStage::Done => "done",
        };
        f.write_str(name)
    }
}

/// The uniform body returned by every entry point.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResponseEnvelope {
    Success {
        success: bool,
        data: ParsedPayload,
    },
    Failure {
        success: bool,
        error: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        details: Option<Value>,
    },
}

/// Drives one request from validation to its outward response.
#[derive(Debug)]
pub struct ResponseEnvelopeBuilder {
    stage: PipelineStage,
    format: DataFormat,
    started: Instant,
    logger: RequestLogger,
}

impl ResponseEnvelopeBuilder {
    pub fn new(format: DataFormat, logger: RequestLogger) -> Self {
        Self {
            stage: PipelineStage::Validating,
            format,
            started: Instant::now(),
            logger,
        }
    }

    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    /// Move forward. Stages never go backwards and nothing follows `Done`.
    pub fn advance(&mut self, next: PipelineStage) {
        debug_assert!(self.stage != PipelineStage::Done, "request already finished");
        self.logger.debug(format_args!("Stage {} -> {}", self.stage, next));
        self.stage = next;
    }

    /// Finish with a parsed payload.
    pub fn success(mut self, payload: ParsedPayload) -> (StatusCode, ResponseEnvelope) {
        let status = StatusCode::OK;
        self.finish(status, true);
        (
            status,
            ResponseEnvelope::Success {
                success: true,
                data: payload,
            },
        )
    }

    /// Finish with an error raised at the current stage.
    pub fn failure(mut self, error: GatewayError) -> (StatusCode, ResponseEnvelope) {
        let status = error.status();
        metrics::record_failure(self.format.as_str(), error.kind());
        self.logger.warn(format_args!(
            "{} failed while {}: {}",
            error.kind(),
            self.stage,
            error
        ));
        self.finish(status, false);
        (
            status,
            ResponseEnvelope::Failure {
                success: false,
                error: error.to_string(),
                details: error.details(),
            },
        )
    }

    /// Convenience for handlers: finish and render.
    pub fn respond(self, outcome: Result<ParsedPayload, GatewayError>) -> Response {
        let (status, envelope) = match outcome {
            Ok(payload) => self.success(payload),
            Err(error) => self.failure(error),
        };
        (status, Json(envelope)).into_response()
    }

    fn finish(&mut self, status: StatusCode, success: bool) {
        let failed_at = self.stage;
        self.stage = PipelineStage::Done;
        metrics::record_request(self.format.as_str(), status.as_u16(), success, self.started);
        self.logger.info(format_args!(
            "Request finished: status={} stage={} elapsed_ms={}",
            status.as_u16(),
            failed_at,
            self.started.elapsed().as_millis()
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ParseFailure, UpstreamDetails};
    use serde_json::json;

    fn builder() -> ResponseEnvelopeBuilder {
        ResponseEnvelopeBuilder::new(DataFormat::Json, RequestLogger::capturing())
    }

    #[test]
    fn test_success_envelope() {
        let (status, envelope) =
            builder().success(ParsedPayload::Structured(json!({"message": "Success!"})));
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            serde_json::to_value(envelope).unwrap(),
            json!({"success": true, "data": {"message": "Success!"}})
        );
    }

    #[test]
    fn test_validation_failure_omits_details() {
        let (status, envelope) =
            builder().failure(GatewayError::invalid("Missing required field: apiUrl"));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            serde_json::to_value(envelope).unwrap(),
            json!({"success": false, "error": "Missing required field: apiUrl"})
        );
    }

    #[test]
    fn test_upstream_auth_failure_passes_status_through() {
        let mut b = builder();
        b.advance(PipelineStage::Authenticating);
        b.advance(PipelineStage::Dispatching);
        let error = GatewayError::UpstreamAuthFailure {
            status: StatusCode::UNAUTHORIZED,
            details: UpstreamDetails::new(StatusCode::UNAUTHORIZED, "denied".into()),
        };
        let (status, envelope) = b.failure(error);

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let value = serde_json::to_value(envelope).unwrap();
        assert_eq!(value["error"], "Authentication failed with external API");
        assert_eq!(value["details"]["originalBody"], "denied");
    }

    #[test]
    fn test_parse_failure_is_unprocessable() {
        let mut b = builder();
        b.advance(PipelineStage::Parsing);
        let failure = ParseFailure::new("Failed to parse JSON response", json!({"line": 1}));
        let (status, envelope) = b.failure(failure.into());
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(serde_json::to_value(envelope).unwrap()["details"]["line"], 1);
    }

    #[test]
    fn test_final_log_line_names_stage() {
        let logger = RequestLogger::capturing();
        let mut b = ResponseEnvelopeBuilder::new(DataFormat::Rdf, logger.clone());
        b.advance(PipelineStage::Authenticating);
        assert_eq!(b.stage(), PipelineStage::Authenticating);
        let _ = b.failure(GatewayError::AuthConfiguration("bad".into()));

        let records = logger.records();
        let last = records.last().unwrap();
        assert!(last.message.contains("status=400"));
        assert!(last.message.contains("stage=authenticating"));
    }
}
