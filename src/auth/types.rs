//! Authentication kinds and their credentials.

use std::fmt;
use std::str::FromStr;

/// Credentials for one outbound call.
///
/// Closed set: adding a kind forces every `match` over it to be revisited.
#[derive(Clone, PartialEq, Eq)]
pub enum AuthenticationSpec {
    /// `headers[header_name] = prefix + key`.
    ApiKey {
        key: String,
        header_name: String,
        prefix: String,
    },
    /// `Authorization: Bearer <token>`.
    BearerToken { token: String },
    /// `Authorization: Basic base64(username:password)`.
    BasicAuth { username: String, password: String },
}

impl AuthenticationSpec {
    pub fn kind(&self) -> AuthKind {
        match self {
            AuthenticationSpec::ApiKey { .. } => AuthKind::ApiKey,
            AuthenticationSpec::BearerToken { .. } => AuthKind::BearerToken,
            AuthenticationSpec::BasicAuth { .. } => AuthKind::BasicAuth,
        }
    }
}

// Secrets stay out of Debug output, which ends up in logs.
impl fmt::Debug for AuthenticationSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthenticationSpec::ApiKey {
                header_name, prefix, ..
            } => f
                .debug_struct("ApiKey")
                .field("header_name", header_name)
                .field("prefix", prefix)
                .field("key", &"<redacted>")
                .finish(),
            AuthenticationSpec::BearerToken { .. } => f
                .debug_struct("BearerToken")
                .field("token", &"<redacted>")
                .finish(),
            AuthenticationSpec::BasicAuth { username, .. } => f
                .debug_struct("BasicAuth")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
        }
    }
}

/// Wire name of an authentication kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthKind {
    ApiKey,
    BearerToken,
    BasicAuth,
}

impl AuthKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthKind::ApiKey => "apiKey",
            AuthKind::BearerToken => "bearerToken",
            AuthKind::BasicAuth => "basicAuth",
        }
    }
}

impl fmt::Display for AuthKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "apiKey" => Ok(AuthKind::ApiKey),
            "bearerToken" => Ok(AuthKind::BearerToken),
            "basicAuth" => Ok(AuthKind::BasicAuth),
            other => Err(format!("Unsupported authentication type: {}", other)),
        }
    }
}
