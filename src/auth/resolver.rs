//! Turns an [`AuthenticationSpec`] into outbound headers.

use axum::http::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::auth::types::AuthenticationSpec;
use crate::error::{GatewayError, GatewayResult};
use crate::observability::RequestLogger;

/// Compute the headers to merge into the outbound request.
///
/// Failures are configuration errors on the caller's side, never upstream errors.
pub fn resolve(spec: &AuthenticationSpec, logger: &RequestLogger) -> GatewayResult<HeaderMap> {
    let mut headers = HeaderMap::new();

    match spec {
        AuthenticationSpec::ApiKey {
            key,
            header_name,
            prefix,
        } => {
            let name = HeaderName::from_bytes(header_name.as_bytes()).map_err(|_| {
                GatewayError::AuthConfiguration(format!(
                    "Invalid API key header name: {}",
                    header_name
                ))
            })?;
            let value = sensitive_value(&format!("{}{}", prefix, key), "API key")?;
            headers.insert(name, value);
        }
        AuthenticationSpec::BearerToken { token } => {
            let value = sensitive_value(&format!("Bearer {}", token), "bearer token")?;
            headers.insert(AUTHORIZATION, value);
        }
        AuthenticationSpec::BasicAuth { username, password } => {
            let encoded = STANDARD.encode(format!("{}:{}", username, password));
            let value = sensitive_value(&format!("Basic {}", encoded), "basic credentials")?;
            headers.insert(AUTHORIZATION, value);
        }
    }

    logger.debug(format_args!(
        "Resolved {} authentication into {} header(s)",
        spec.kind(),
        headers.len()
    ));
    Ok(headers)
}

fn sensitive_value(raw: &str, what: &str) -> GatewayResult<HeaderValue> {
    let mut value = HeaderValue::from_str(raw).map_err(|_| {
        GatewayError::AuthConfiguration(format!(
            "The {} contains characters not allowed in an HTTP header",
            what
        ))
    })?;
    value.set_sensitive(true);
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn logger() -> RequestLogger {
        RequestLogger::capturing()
    }

    #[test]
    fn test_api_key_without_prefix() {
        let spec = AuthenticationSpec::ApiKey {
            key: "abc123".into(),
            header_name: "X-API-Key".into(),
            prefix: String::new(),
        };
        let headers = resolve(&spec, &logger()).unwrap();
        assert_eq!(headers.get("x-api-key").unwrap(), "abc123");
        assert_eq!(headers.len(), 1);
    }

    #[test]
    fn test_api_key_prefix_is_concatenated_verbatim() {
        let spec = AuthenticationSpec::ApiKey {
            key: "abc123".into(),
            header_name: "Authorization".into(),
            prefix: "Token ".into(),
        };
        let headers = resolve(&spec, &logger()).unwrap();
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Token abc123");

        let spec = AuthenticationSpec::ApiKey {
            key: "abc123".into(),
            header_name: "X-Key".into(),
            prefix: "key=".into(),
        };
        let headers = resolve(&spec, &logger()).unwrap();
        assert_eq!(headers.get("x-key").unwrap(), "key=abc123");
    }

    #[test]
    fn test_bearer_token() {
        let spec = AuthenticationSpec::BearerToken {
            token: "tok-1".into(),
        };
        let headers = resolve(&spec, &logger()).unwrap();
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer tok-1");
        assert!(headers.get(AUTHORIZATION).unwrap().is_sensitive());
    }

    #[test]
    fn test_basic_auth_encoding() {
        let spec = AuthenticationSpec::BasicAuth {
            username: "Aladdin".into(),
            password: "open sesame".into(),
        };
        let headers = resolve(&spec, &logger()).unwrap();
        assert_eq!(
            headers.get(AUTHORIZATION).unwrap(),
            "Basic QWxhZGRpbjpvcGVuIHNlc2FtZQ=="
        );
    }

    #[test]
    fn test_basic_auth_empty_password() {
        let spec = AuthenticationSpec::BasicAuth {
            username: "user".into(),
            password: String::new(),
        };
        let headers = resolve(&spec, &logger()).unwrap();
        // base64("user:")
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Basic dXNlcjo=");
    }

    #[test]
    fn test_invalid_header_name_is_auth_configuration_error() {
        let spec = AuthenticationSpec::ApiKey {
            key: "k".into(),
            header_name: "bad header".into(),
            prefix: String::new(),
        };
        let err = resolve(&spec, &logger()).unwrap_err();
        assert!(matches!(err, GatewayError::AuthConfiguration(_)));
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_newline_in_token_is_rejected() {
        let spec = AuthenticationSpec::BearerToken {
            token: "tok\nInjected: yes".into(),
        };
        assert!(matches!(
            resolve(&spec, &logger()),
            Err(GatewayError::AuthConfiguration(_))
        ));
    }

    #[test]
    fn test_secrets_never_logged() {
        let logger = logger();
        let spec = AuthenticationSpec::BearerToken {
            token: "super-secret".into(),
        };
        resolve(&spec, &logger).unwrap();
        assert!(logger
            .records()
            .iter()
            .all(|r| !r.message.contains("super-secret")));
    }
}
