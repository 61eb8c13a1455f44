//! Entry point handlers.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::Instrument;

use crate::auth;
use crate::envelope;
use crate::error::GatewayResult;
use crate::http::request::request_id;
use crate::http::response::{PipelineStage, ResponseEnvelopeBuilder};
use crate::http::server::AppState;
use crate::observability::RequestLogger;
use crate::parsers::{ContentParser, ParsedPayload};
use crate::upstream::OutboundRequest;

/// Shared handler behind `/api/json`, `/api/xml` and `/api/rdf`.
///
/// The parser is fixed by the route, so each entry point is its own
/// monomorphized handler.
pub async fn fetch<P: ContentParser>(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let logger = RequestLogger::for_request(&request_id(&headers), P::FORMAT);
    let mut builder = ResponseEnvelopeBuilder::new(P::FORMAT, logger.clone());

    let span = logger.span().clone();
    let outcome = run_pipeline::<P>(&state, &body, &mut builder, &logger)
        .instrument(span)
        .await;

    builder.respond(outcome)
}

async fn run_pipeline<P: ContentParser>(
    state: &AppState,
    body: &[u8],
    builder: &mut ResponseEnvelopeBuilder,
    logger: &RequestLogger,
) -> GatewayResult<ParsedPayload> {
    let envelope = envelope::validate::<P::Options>(body, P::FORMAT, logger)?;

    builder.advance(PipelineStage::Authenticating);
    let auth_headers = match &envelope.authentication {
        Some(spec) => auth::resolve(spec, logger)?,
        None => HeaderMap::new(),
    };

    builder.advance(PipelineStage::Dispatching);
    let request = OutboundRequest::assemble(&envelope, auth_headers, logger)?;
    let response = state.dispatcher.dispatch(request, logger).await?;

    builder.advance(PipelineStage::Parsing);
    let payload = P::default()
        .parse(response.body, &response.headers, &envelope.options, logger)
        .await?;
    Ok(payload)
}

/// Liveness probe.
pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
