//! Content parsers, one per entry point.
//!
//! # Data Flow
//! ```text
//! upstream body bytes + headers + format options
//!     → json.rs  (single JSON value)
//!     → xml.rs   (well-formedness check, then nested object)
//!     → rdf.rs   (content-type resolution, streamed quads)
//!     → ParsedPayload | ParseFailure
//! ```
//!
//! # Design Decisions
//! - The handler is generic over the parser, so the implementation is picked
//!   at compile time from the route, never by inspecting the payload
//! - A parser either returns everything or fails; there is no partial result

pub mod json;
pub mod rdf;
pub mod xml;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::HeaderMap;
use serde::Serialize;
use serde_json::Value;

use crate::envelope::{DataFormat, FormatOptions};
use crate::error::ParseFailure;
use crate::observability::RequestLogger;

pub use json::JsonContentParser;
pub use rdf::{QuadRecord, RdfContentParser, RdfOptions, RdfTerm, TermType};
pub use xml::{XmlContentParser, XmlParserOptions};

/// Normalized upstream payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParsedPayload {
    /// JSON, or XML converted to a nested object.
    Structured(Value),
    /// Linked-data records in document order.
    Quads(Vec<QuadRecord>),
}

/// Converts an upstream body into a [`ParsedPayload`].
#[async_trait]
pub trait ContentParser: Default + Send + Sync + 'static {
    /// The `dataType` this parser serves.
    const FORMAT: DataFormat;

    /// Envelope options specific to this format.
    type Options: FormatOptions;

    async fn parse(
        &self,
        body: Bytes,
        headers: &HeaderMap,
        options: &Self::Options,
        logger: &RequestLogger,
    ) -> Result<ParsedPayload, ParseFailure>;
}
