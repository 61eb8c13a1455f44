//! Structured-data parser.

use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::HeaderMap;
use serde_json::{json, Value};

use crate::envelope::DataFormat;
use crate::error::ParseFailure;
use crate::observability::RequestLogger;
use crate::parsers::{ContentParser, ParsedPayload};

#[derive(Debug, Default, Clone, Copy)]
pub struct JsonContentParser;

#[async_trait]
impl ContentParser for JsonContentParser {
    const FORMAT: DataFormat = DataFormat::Json;
    type Options = ();

    async fn parse(
        &self,
        body: Bytes,
        _headers: &HeaderMap,
        _options: &(),
        logger: &RequestLogger,
    ) -> Result<ParsedPayload, ParseFailure> {
        match serde_json::from_slice::<Value>(&body) {
            Ok(value) => Ok(ParsedPayload::Structured(value)),
            Err(e) => {
                logger.debug(format_args!("JSON parse failed: {}", e));
                Err(ParseFailure::new(
                    "Failed to parse JSON response",
                    json!({
                        "message": e.to_string(),
                        "line": e.line(),
                        "column": e.column(),
                    }),
                ))
            }
        }
    }
}
