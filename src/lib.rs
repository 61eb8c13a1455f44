//! Fetch gateway library.
//!
//! Accepts a JSON envelope describing an outbound HTTP call, performs it with
//! optional authentication, and returns the upstream body parsed as JSON,
//! XML or RDF inside a uniform success/error envelope.

pub mod auth;
pub mod config;
pub mod envelope;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod parsers;
pub mod upstream;

pub use config::GatewayConfig;
pub use error::{GatewayError, GatewayResult};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
