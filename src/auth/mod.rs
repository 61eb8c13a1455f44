//! Outbound authentication.
//!
//! # Data Flow
//! ```text
//! envelope "authentication" block
//!     → envelope::validator (decode into AuthenticationSpec)
//!     → resolver.rs (spec → headers)
//!     → upstream::dispatcher (merged last into the outbound request)
//! ```

pub mod resolver;
pub mod types;

pub use resolver::resolve;
pub use types::{AuthKind, AuthenticationSpec};
