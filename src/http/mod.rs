//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, request ID)
//!     → handlers.rs (validate → authenticate → dispatch → parse)
//!     → response.rs (stage tracking, envelope, status code)
//!     → Send to client
//! ```

pub mod handlers;
pub mod request;
pub mod response;
pub mod server;

pub use request::X_REQUEST_ID;
pub use response::{PipelineStage, ResponseEnvelope, ResponseEnvelopeBuilder};
pub use server::{AppState, HttpServer};
