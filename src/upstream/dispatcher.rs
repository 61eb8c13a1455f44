//! Issues the outbound HTTP call.

use std::error::Error as StdError;
use std::time::{Duration, Instant};

use axum::body::Bytes;
use axum::http::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use axum::http::{Method, StatusCode};
use url::Url;

use crate::config::OutboundConfig;
use crate::envelope::{DataFormat, OutboundBody, RequestEnvelope};
use crate::error::{GatewayError, GatewayResult, UpstreamDetails};
use crate::observability::metrics;
use crate::observability::RequestLogger;

/// A fully assembled outbound call.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub url: Url,
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<String>,
    pub format: DataFormat,
}

impl OutboundRequest {
    /// Merge headers and pick the body for the envelope.
    ///
    /// Header precedence, lowest first: default JSON content type, caller
    /// headers, authentication headers.
    pub fn assemble<O>(
        envelope: &RequestEnvelope<O>,
        auth_headers: HeaderMap,
        logger: &RequestLogger,
    ) -> GatewayResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        for (name, value) in &envelope.outbound_headers {
            headers.insert(name.clone(), value.clone());
        }
        for (name, value) in auth_headers {
            if let Some(name) = name {
                headers.insert(name, value);
            }
        }

        let body = match &envelope.outbound_body {
            None => None,
            Some(_) if !carries_body(&envelope.method) => {
                logger.debug(format_args!(
                    "Ignoring request body for {} request",
                    envelope.method
                ));
                None
            }
            Some(OutboundBody::Text(text)) => Some(text.clone()),
            Some(OutboundBody::Structured(value)) => {
                let content_type = headers
                    .get(CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_ascii_lowercase();
                if !content_type.contains("json") {
                    return Err(GatewayError::invalid(format!(
                        "Structured body is ambiguous for content type '{}'; send it as a string",
                        content_type
                    )));
                }
                Some(value.to_string())
            }
        };

        Ok(Self {
            url: envelope.target_url.clone(),
            method: envelope.method.clone(),
            headers,
            body,
            format: envelope.format,
        })
    }
}

fn carries_body(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH)
}

/// What a successful upstream call returned.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Sends [`OutboundRequest`]s with the configured limits.
#[derive(Debug, Clone)]
pub struct OutboundDispatcher {
    config: OutboundConfig,
}

impl OutboundDispatcher {
    pub fn new(config: OutboundConfig) -> Self {
        Self { config }
    }

    fn client(&self) -> GatewayResult<reqwest::Client> {
        reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(self.config.connect_timeout_secs))
            .timeout(Duration::from_secs(self.config.request_timeout_secs))
            .user_agent(self.config.user_agent.as_str())
            .build()
            .map_err(|e| {
                GatewayError::ServerMisconfiguration(format!("Cannot build HTTP client: {}", e))
            })
    }

    pub async fn dispatch(
        &self,
        request: OutboundRequest,
        logger: &RequestLogger,
    ) -> GatewayResult<UpstreamResponse> {
        let client = self.client()?;
        let format = request.format.as_str();

        logger.info(format_args!("Calling {} {}", request.method, request.url));

        let mut builder = client
            .request(request.method, request.url)
            .headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let start = Instant::now();
        let response = builder.send().await;
        metrics::record_upstream_latency(format, start);

        let mut response = match response {
            Ok(response) => response,
            Err(e) => {
                let message = error_chain(&e);
                logger.error(format_args!("Outbound call failed: {}", message));
                return Err(GatewayError::NetworkFailure(message));
            }
        };

        let status = response.status();
        let headers = std::mem::take(response.headers_mut());

        if status.is_success() {
            let body = self.read_body(response).await?;
            logger.debug(format_args!(
                "Upstream answered {} with {} bytes",
                status,
                body.len()
            ));
            return Ok(UpstreamResponse {
                status,
                headers,
                body,
            });
        }

        let body = self.read_error_body(response, logger).await;
        let details = UpstreamDetails::new(status, String::from_utf8_lossy(&body).into_owned());
        logger.warn(format_args!("Upstream returned non-success status {}", status));
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(GatewayError::UpstreamAuthFailure { status, details })
            }
            _ => Err(GatewayError::UpstreamFailure { details }),
        }
    }

    async fn read_body(&self, mut response: reqwest::Response) -> GatewayResult<Bytes> {
        let limit = self.config.max_response_bytes;
        if let Some(length) = response.content_length() {
            if length > limit as u64 {
                return Err(GatewayError::InternalIo(format!(
                    "Response of {} bytes exceeds limit of {} bytes",
                    length, limit
                )));
            }
        }

        let mut buffer = Vec::new();
        loop {
            match response.chunk().await {
                Ok(Some(chunk)) => {
                    if buffer.len() + chunk.len() > limit {
                        return Err(GatewayError::InternalIo(format!(
                            "Response exceeds limit of {} bytes",
                            limit
                        )));
                    }
                    buffer.extend_from_slice(&chunk);
                }
                Ok(None) => break,
                Err(e) => return Err(GatewayError::InternalIo(error_chain(&e))),
            }
        }
        Ok(Bytes::from(buffer))
    }

    /// Body of a non-success response, cut at `max_response_bytes`.
    ///
    /// Only echoed back as `originalBody`, so it never fails the request.
    async fn read_error_body(
        &self,
        mut response: reqwest::Response,
        logger: &RequestLogger,
    ) -> Bytes {
        let limit = self.config.max_response_bytes;
        let mut buffer = Vec::new();
        loop {
            match response.chunk().await {
                Ok(Some(chunk)) => {
                    let room = limit - buffer.len();
                    if chunk.len() >= room {
                        buffer.extend_from_slice(&chunk[..room]);
                        logger.debug(format_args!("Error body truncated at {} bytes", limit));
                        break;
                    }
                    buffer.extend_from_slice(&chunk);
                }
                Ok(None) => break,
                Err(e) => {
                    logger.debug(format_args!("Error body cut short: {}", error_chain(&e)));
                    break;
                }
            }
        }
        Bytes::from(buffer)
    }
}

/// Error message followed by every source, joined with ": ".
fn error_chain(error: &(dyn StdError + 'static)) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
