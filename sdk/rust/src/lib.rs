//! Typed client for the fetch gateway.

pub mod client;

pub use client::{Authentication, FetchRequest, FetchResponse, GatewayClient};
