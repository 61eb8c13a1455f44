//! Linked-data parser.
//!
//! # Content-type resolution
//! 1. `rdf.contentType` from the envelope
//! 2. the upstream `Content-Type` header
//! 3. sniffing the body (logged as a warning)
//!
//! # Streaming
//! A blocking producer task walks the document and pushes quads into a
//! bounded channel; a parse error goes out on a separate one-shot channel.
//! The consumer polls the error channel first and checks it once more after
//! the record channel closes, so an error always beats completion and a
//! truncated sequence is never returned.

use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::header::{HeaderMap, CONTENT_TYPE};
use oxrdf::{GraphName, Quad, Subject, Term};
use oxrdfio::{RdfFormat, RdfParser};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::{mpsc, oneshot};
use url::Url;

use crate::envelope::{DataFormat, FormatOptions};
use crate::error::ParseFailure;
use crate::observability::RequestLogger;
use crate::parsers::{ContentParser, ParsedPayload};

const CHANNEL_CAPACITY: usize = 256;
const SNIFF_WINDOW: usize = 4096;

/// The `rdf` envelope member.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RdfOptions {
    /// Media type overriding whatever the upstream declares.
    pub content_type: Option<String>,
    /// Base against which relative IRIs are resolved.
    #[serde(rename = "baseIRI", alias = "baseIri")]
    pub base_iri: Option<String>,
}

impl FormatOptions for RdfOptions {
    const FIELD: Option<&'static str> = Some("rdf");

    fn check(&self) -> Result<(), String> {
        if let Some(content_type) = &self.content_type {
            if format_for_media_type(content_type).is_none() {
                return Err(format!("Unsupported rdf.contentType: {}", content_type));
            }
        }
        if let Some(base) = &self.base_iri {
            if Url::parse(base).is_err() {
                return Err(format!("rdf.baseIRI must be an absolute IRI: {}", base));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TermType {
    NamedNode,
    BlankNode,
    Literal,
    DefaultGraph,
    Quad,
}

/// One RDF term in the outward payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RdfTerm {
    pub term_type: TermType,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datatype: Option<String>,
}

impl RdfTerm {
    fn plain(term_type: TermType, value: impl Into<String>) -> Self {
        Self {
            term_type,
            value: value.into(),
            language: None,
            datatype: None,
        }
    }
}

/// Subject, predicate, object and graph of one statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuadRecord {
    pub subject: RdfTerm,
    pub predicate: RdfTerm,
    pub object: RdfTerm,
    pub graph: RdfTerm,
}

impl From<Quad> for QuadRecord {
    fn from(quad: Quad) -> Self {
        #[allow(unreachable_patterns)]
        let subject = match quad.subject {
            Subject::NamedNode(node) => RdfTerm::plain(TermType::NamedNode, node.into_string()),
            Subject::BlankNode(node) => RdfTerm::plain(TermType::BlankNode, node.into_string()),
            other => RdfTerm::plain(TermType::Quad, other.to_string()),
        };

        #[allow(unreachable_patterns)]
        let object = match quad.object {
            Term::NamedNode(node) => RdfTerm::plain(TermType::NamedNode, node.into_string()),
            Term::BlankNode(node) => RdfTerm::plain(TermType::BlankNode, node.into_string()),
            Term::Literal(literal) => RdfTerm {
                term_type: TermType::Literal,
                value: literal.value().to_string(),
                language: literal.language().map(str::to_string),
                datatype: Some(literal.datatype().as_str().to_string()),
            },
            other => RdfTerm::plain(TermType::Quad, other.to_string()),
        };

        let graph = match quad.graph_name {
            GraphName::NamedNode(node) => RdfTerm::plain(TermType::NamedNode, node.into_string()),
            GraphName::BlankNode(node) => RdfTerm::plain(TermType::BlankNode, node.into_string()),
            GraphName::DefaultGraph => RdfTerm::plain(TermType::DefaultGraph, ""),
        };

        Self {
            subject,
            predicate: RdfTerm::plain(TermType::NamedNode, quad.predicate.into_string()),
            object,
            graph,
        }
    }
}

/// Where the parse format came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatSource {
    Override,
    UpstreamHeader,
    Detected,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RdfContentParser;

#[async_trait]
impl ContentParser for RdfContentParser {
    const FORMAT: DataFormat = DataFormat::Rdf;
    type Options = RdfOptions;

    async fn parse(
        &self,
        body: Bytes,
        headers: &HeaderMap,
        options: &RdfOptions,
        logger: &RequestLogger,
    ) -> Result<ParsedPayload, ParseFailure> {
        let (format, source) = resolve_format(options, headers, &body, logger)?;
        logger.debug(format_args!(
            "Parsing linked data as {} ({:?})",
            format.name(),
            source
        ));

        let mut parser = RdfParser::from_format(format);
        if let Some(base) = &options.base_iri {
            parser = parser.with_base_iri(base.clone()).map_err(|e| {
                ParseFailure::new(
                    "Failed to parse RDF response",
                    json!({ "message": format!("Invalid base IRI: {}", e), "trace": [] }),
                )
            })?;
        }

        let records = stream_quads(parser, format, body, logger).await?;
        logger.debug(format_args!("Parsed {} quads", records.len()));
        Ok(ParsedPayload::Quads(records))
    }
}

/// Pick the format per the override → header → sniffing precedence.
pub fn resolve_format(
    options: &RdfOptions,
    headers: &HeaderMap,
    body: &[u8],
    logger: &RequestLogger,
) -> Result<(RdfFormat, FormatSource), ParseFailure> {
    if let Some(content_type) = &options.content_type {
        return format_for_media_type(content_type)
            .map(|format| (format, FormatSource::Override))
            .ok_or_else(|| {
                ParseFailure::new(
                    "Failed to parse RDF response",
                    json!({ "message": format!("Unsupported RDF content type: {}", content_type) }),
                )
            });
    }

    match headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()) {
        Some(declared) => {
            if let Some(format) = format_for_media_type(declared) {
                return Ok((format, FormatSource::UpstreamHeader));
            }
            logger.warn(format_args!(
                "Upstream content type '{}' is not a linked-data format; auto-detecting format from body",
                declared
            ));
        }
        None => {
            logger.warn("No RDF content type provided; auto-detecting format from body");
        }
    }

    Ok((detect_format(body), FormatSource::Detected))
}

/// Map a media type (parameters allowed) onto a supported format.
pub fn format_for_media_type(media_type: &str) -> Option<RdfFormat> {
    let essence = media_type.split(';').next().unwrap_or_default().trim();
    RdfFormat::from_media_type(&essence.to_ascii_lowercase())
}

/// Guess the serialization from the start of the body.
pub fn detect_format(body: &[u8]) -> RdfFormat {
    let window = &body[..body.len().min(SNIFF_WINDOW)];
    let text = String::from_utf8_lossy(window);
    let head = text.trim_start_matches('\u{feff}').trim_start();

    if head.starts_with("<?xml") || head.starts_with("<rdf:RDF") {
        return RdfFormat::RdfXml;
    }

    let mut lines: Vec<&str> = head
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .collect();
    // The last line may be cut by the window.
    if body.len() > SNIFF_WINDOW {
        lines.pop();
    }

    let line_oriented = !lines.is_empty()
        && lines.iter().all(|line| {
            (line.starts_with('<') || line.starts_with("_:"))
                && line.ends_with('.')
                && !line.contains(" ;")
                && !line.contains(" ,")
        });
    if line_oriented {
        // N-Quads is a superset of N-Triples.
        RdfFormat::NQuads
    } else {
        // TriG is a superset of Turtle.
        RdfFormat::TriG
    }
}

#[derive(Debug)]
struct StreamError {
    message: String,
    trace: Vec<String>,
}

impl StreamError {
    fn from_error(error: &(dyn std::error::Error + 'static)) -> Self {
        let mut trace = Vec::new();
        let mut source = error.source();
        while let Some(cause) = source {
            trace.push(cause.to_string());
            source = cause.source();
        }
        Self {
            message: error.to_string(),
            trace,
        }
    }
}

async fn stream_quads(
    parser: RdfParser,
    format: RdfFormat,
    body: Bytes,
    logger: &RequestLogger,
) -> Result<Vec<QuadRecord>, ParseFailure> {
    let (record_tx, mut record_rx) = mpsc::channel::<QuadRecord>(CHANNEL_CAPACITY);
    let (error_tx, mut error_rx) = oneshot::channel::<StreamError>();

    let producer = tokio::task::spawn_blocking(move || {
        for result in parser.for_reader(body.as_ref()) {
            match result {
                Ok(quad) => {
                    if record_tx.blocking_send(QuadRecord::from(quad)).is_err() {
                        return;
                    }
                }
                Err(e) => {
                    let _ = error_tx.send(StreamError::from_error(&e));
                    return;
                }
            }
        }
        // Dropping `error_tx` unsent tells the consumer the document was clean.
    });

    let mut records = Vec::new();
    let mut error_open = true;
    let mut failure = None;

    loop {
        tokio::select! {
            biased;

            error = &mut error_rx, if error_open => match error {
                Ok(error) => {
                    failure = Some(error);
                    break;
                }
                Err(_) => error_open = false,
            },

            record = record_rx.recv() => match record {
                Some(record) => records.push(record),
                None => break,
            },
        }
    }

    // The producer sends its error before the record channel closes.
    if failure.is_none() && error_open {
        failure = error_rx.try_recv().ok();
    }
    if failure.is_some() {
        while let Ok(record) = record_rx.try_recv() {
            records.push(record);
        }
    }
    drop(record_rx);

    if let Err(e) = producer.await {
        logger.error(format_args!("RDF producer task failed: {}", e));
        return Err(ParseFailure::new(
            "Failed to parse RDF response",
            json!({ "message": format!("Parser task failed: {}", e), "trace": [] }),
        ));
    }

    match failure {
        Some(error) => {
            logger.warn(format_args!(
                "RDF stream error after {} records: {}",
                records.len(),
                error.message
            ));
            Err(ParseFailure::new(
                "Failed to parse RDF response",
                json!({
                    "message": error.message,
                    "trace": error.trace,
                    "format": format.name(),
                    "recordsBeforeError": records.len(),
                }),
            ))
        }
        None => Ok(records),
    }
}
