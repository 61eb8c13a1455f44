//! Inbound request envelope.
//!
//! # Data Flow
//! ```text
//! raw POST body
//!     → validator.rs (ordered field checks, auth decoding)
//!     → RequestEnvelope<Options> (typed, per entry point)
//! ```

pub mod request;
pub mod validator;

pub use request::{DataFormat, FormatOptions, OutboundBody, RequestEnvelope};
pub use validator::validate;
