//! Outbound call subsystem.
//!
//! # Data Flow
//! ```text
//! RequestEnvelope + resolved auth headers
//!     → OutboundRequest::assemble (header merge, body selection)
//!     → OutboundDispatcher::dispatch (reqwest, bounded by outbound timeouts)
//!     → UpstreamResponse | GatewayError
//! ```
//!
//! # Design Decisions
//! - A client is built per call, so no connection state outlives a request
//! - Nothing is retried
//! - The response body is buffered up to `outbound.max_response_bytes`

pub mod dispatcher;

pub use dispatcher::{OutboundDispatcher, OutboundRequest, UpstreamResponse};
