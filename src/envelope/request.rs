//! Request envelope types.

use std::fmt;
use std::str::FromStr;

use axum::http::{HeaderMap, Method};
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::auth::AuthenticationSpec;

/// The three content types the gateway can fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataFormat {
    Json,
    Xml,
    Rdf,
}

impl DataFormat {
    /// Wire name used in `dataType`.
    pub fn as_str(&self) -> &'static str {
        match self {
            DataFormat::Json => "json",
            DataFormat::Xml => "xml",
            DataFormat::Rdf => "rdf",
        }
    }
}

impl fmt::Display for DataFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(DataFormat::Json),
            "xml" => Ok(DataFormat::Xml),
            "rdf" => Ok(DataFormat::Rdf),
            _ => Err(()),
        }
    }
}

/// Outbound body as the caller supplied it.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundBody {
    /// Sent verbatim.
    Text(String),
    /// Serialized by the dispatcher when the content type is JSON.
    Structured(Value),
}

/// Format-specific options carried in the envelope.
pub trait FormatOptions: DeserializeOwned + Default + Send + Sync + 'static {
    /// Envelope member holding the options, if the format has any.
    const FIELD: Option<&'static str>;

    /// Semantic checks after deserialization.
    fn check(&self) -> Result<(), String> {
        Ok(())
    }
}

impl FormatOptions for () {
    const FIELD: Option<&'static str> = None;
}

/// A validated inbound request.
#[derive(Debug, Clone)]
pub struct RequestEnvelope<O> {
    pub target_url: Url,
    pub format: DataFormat,
    pub method: Method,
    pub outbound_headers: HeaderMap,
    pub outbound_body: Option<OutboundBody>,
    pub authentication: Option<AuthenticationSpec>,
    pub options: O,
}
