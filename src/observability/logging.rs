//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber once at startup
//! - Provide the per-request logger handed to every pipeline component
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - JSON format for production, pretty format for development
//! - Log level configurable via config and environment (`RUST_LOG` wins)
//! - Pipeline components never reach for a global logger; they log through
//!   the `RequestLogger` they are given, so tests can capture what they emit

use std::fmt::Display;
use std::sync::{Arc, Mutex};

use tracing::{Level, Span};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, ObservabilityConfig};

/// Install the global subscriber.
pub fn init_logging(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "fetch_gateway={level},tower_http={level}",
            level = config.log_level.to_ascii_lowercase()
        )
        .into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

/// A log line kept by a capturing logger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub level: Level,
    pub message: String,
}

/// Logger scoped to one inbound request.
///
/// Every event is emitted under the request span (request id, format). A logger
/// built with [`RequestLogger::capturing`] also keeps the events in memory.
#[derive(Debug, Clone)]
pub struct RequestLogger {
    span: Span,
    capture: Option<Arc<Mutex<Vec<LogRecord>>>>,
}

impl RequestLogger {
    /// Wrap an existing span.
    pub fn new(span: Span) -> Self {
        Self {
            span,
            capture: None,
        }
    }

    /// Create the span for one inbound request.
    pub fn for_request(request_id: &str, format: impl Display) -> Self {
        Self::new(tracing::info_span!(
            "fetch",
            request_id = %request_id,
            format = %format
        ))
    }

    /// A logger that records events in memory as well as emitting them.
    pub fn capturing() -> Self {
        Self {
            span: Span::none(),
            capture: Some(Arc::new(Mutex::new(Vec::new()))),
        }
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn debug(&self, message: impl Display) {
        tracing::debug!(parent: &self.span, "{}", message);
        self.keep(Level::DEBUG, message);
    }

    pub fn info(&self, message: impl Display) {
        tracing::info!(parent: &self.span, "{}", message);
        self.keep(Level::INFO, message);
    }

    pub fn warn(&self, message: impl Display) {
        tracing::warn!(parent: &self.span, "{}", message);
        self.keep(Level::WARN, message);
    }

    pub fn error(&self, message: impl Display) {
        tracing::error!(parent: &self.span, "{}", message);
        self.keep(Level::ERROR, message);
    }

    /// Events recorded so far (empty unless capturing).
    pub fn records(&self) -> Vec<LogRecord> {
        self.capture
            .as_ref()
            .and_then(|c| c.lock().ok().map(|records| records.clone()))
            .unwrap_or_default()
    }

    /// Recorded warnings, oldest first.
    pub fn warnings(&self) -> Vec<String> {
        self.records()
            .into_iter()
            .filter(|r| r.level == Level::WARN)
            .map(|r| r.message)
            .collect()
    }

    fn keep(&self, level: Level, message: impl Display) {
        if let Some(capture) = &self.capture {
            if let Ok(mut records) = capture.lock() {
                records.push(LogRecord {
                    level,
                    message: message.to_string(),
                });
            }
        }
    }
}
