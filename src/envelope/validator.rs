//! Inbound envelope validation.
//!
//! Checks run in a fixed order and the first violation wins:
//! malformed JSON → `apiUrl` → `dataType` → format mismatch → authentication
//! block → kind-specific credentials → URL, method, headers, options.

use axum::http::header::{HeaderMap, HeaderName, HeaderValue};
use axum::http::Method;
use serde_json::{json, Map, Value};
use url::Url;

use crate::auth::{AuthKind, AuthenticationSpec};
use crate::envelope::request::{DataFormat, FormatOptions, OutboundBody, RequestEnvelope};
use crate::error::{GatewayError, GatewayResult};
use crate::observability::RequestLogger;

/// Validate the raw inbound body for an entry point serving `expected`.
pub fn validate<O: FormatOptions>(
    raw: &[u8],
    expected: DataFormat,
    logger: &RequestLogger,
) -> GatewayResult<RequestEnvelope<O>> {
    let root: Value = serde_json::from_slice(raw)
        .map_err(|e| GatewayError::invalid_with("Invalid JSON in request body", e.to_string()))?;
    let obj = root
        .as_object()
        .ok_or_else(|| GatewayError::invalid("Request body must be a JSON object"))?;

    let api_url = non_empty_str(obj, "apiUrl")
        .ok_or_else(|| GatewayError::invalid("Missing required field: apiUrl"))?;

    let format = check_format(obj, expected)?;

    let authentication = match obj.get("authentication") {
        None | Some(Value::Null) => None,
        Some(block) => Some(decode_authentication(block)?),
    };

    let target_url = parse_target_url(api_url)?;
    let method = parse_method(obj.get("method"))?;
    let outbound_headers = parse_headers(obj.get("headers"))?;

    let outbound_body = match obj.get("body") {
        None | Some(Value::Null) => None,
        Some(Value::String(text)) => Some(OutboundBody::Text(text.clone())),
        Some(other) => Some(OutboundBody::Structured(other.clone())),
    };

    let options = parse_options::<O>(obj)?;

    logger.debug(format_args!(
        "Validated {} envelope: {} {}",
        format,
        method,
        target_url.host_str().unwrap_or("-")
    ));

    Ok(RequestEnvelope {
        target_url,
        format,
        method,
        outbound_headers,
        outbound_body,
        authentication,
        options,
    })
}

fn non_empty_str<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    obj.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

fn check_format(obj: &Map<String, Value>, expected: DataFormat) -> GatewayResult<DataFormat> {
    let received = match obj.get("dataType") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.is_empty() => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => Some(other.to_string()),
    }
    .ok_or_else(|| GatewayError::invalid("Missing required field: dataType"))?;

    match received.parse::<DataFormat>() {
        Ok(format) if format == expected => Ok(format),
        _ => Err(GatewayError::invalid_with(
            format!(
                "Invalid dataType: expected '{}', received '{}'",
                expected, received
            ),
            json!({ "expected": expected.as_str(), "received": received }),
        )),
    }
}

fn decode_authentication(block: &Value) -> GatewayResult<AuthenticationSpec> {
    let obj = block
        .as_object()
        .ok_or_else(|| GatewayError::invalid("authentication must be an object"))?;

    let kind = non_empty_str(obj, "type").or_else(|| non_empty_str(obj, "kind"));
    let credentials = obj.get("credentials").and_then(Value::as_object);
    let (kind, credentials) = match (kind, credentials) {
        (Some(kind), Some(credentials)) => (kind, credentials),
        _ => {
            return Err(GatewayError::invalid(
                "Authentication requires both type and credentials",
            ))
        }
    };

    let kind: AuthKind = kind.parse().map_err(GatewayError::AuthConfiguration)?;

    match kind {
        AuthKind::ApiKey => {
            let key = non_empty_str(credentials, "key").or_else(|| non_empty_str(credentials, "apiKey"));
            let header_name = non_empty_str(credentials, "headerName");
            match (key, header_name) {
                (Some(key), Some(header_name)) => Ok(AuthenticationSpec::ApiKey {
                    key: key.to_string(),
                    header_name: header_name.to_string(),
                    prefix: credentials
                        .get("prefix")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                }),
                _ => Err(GatewayError::invalid(
                    "apiKey authentication requires key and headerName",
                )),
            }
        }
        AuthKind::BearerToken => non_empty_str(credentials, "token")
            .map(|token| AuthenticationSpec::BearerToken {
                token: token.to_string(),
            })
            .ok_or_else(|| GatewayError::invalid("bearerToken authentication requires token")),
        AuthKind::BasicAuth => {
            let username = non_empty_str(credentials, "username");
            // Presence only: an empty password is a valid credential.
            let password = credentials.get("password").and_then(Value::as_str);
            match (username, password) {
                (Some(username), Some(password)) => Ok(AuthenticationSpec::BasicAuth {
                    username: username.to_string(),
                    password: password.to_string(),
                }),
                _ => Err(GatewayError::invalid(
                    "basicAuth authentication requires username and password",
                )),
            }
        }
    }
}

fn parse_target_url(raw: &str) -> GatewayResult<Url> {
    let url = Url::parse(raw)
        .map_err(|e| GatewayError::invalid_with("Invalid apiUrl", e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(GatewayError::invalid(format!(
            "Unsupported apiUrl scheme: {}",
            other
        ))),
    }
}

fn parse_method(raw: Option<&Value>) -> GatewayResult<Method> {
    match raw {
        None | Some(Value::Null) => Ok(Method::GET),
        Some(Value::String(s)) => Method::from_bytes(s.to_ascii_uppercase().as_bytes())
            .map_err(|_| GatewayError::invalid(format!("Invalid method: {}", s))),
        Some(_) => Err(GatewayError::invalid("method must be a string")),
    }
}

fn parse_headers(raw: Option<&Value>) -> GatewayResult<HeaderMap> {
    let mut headers = HeaderMap::new();
    let entries = match raw {
        None | Some(Value::Null) => return Ok(headers),
        Some(Value::Object(entries)) => entries,
        Some(_) => return Err(GatewayError::invalid("headers must be an object")),
    };

    for (name, value) in entries {
        let value = value.as_str().ok_or_else(|| {
            GatewayError::invalid(format!("Header '{}' must have a string value", name))
        })?;
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| GatewayError::invalid(format!("Invalid header name: {}", name)))?;
        let header_value = HeaderValue::from_str(value)
            .map_err(|_| GatewayError::invalid(format!("Invalid value for header: {}", name)))?;
        headers.insert(header_name, header_value);
    }
    Ok(headers)
}

fn parse_options<O: FormatOptions>(obj: &Map<String, Value>) -> GatewayResult<O> {
    let options = match O::FIELD.and_then(|field| obj.get(field).map(|v| (field, v))) {
        None | Some((_, Value::Null)) => O::default(),
        Some((field, value)) => serde_json::from_value(value.clone()).map_err(|e| {
            GatewayError::invalid_with(format!("Invalid {}", field), e.to_string())
        })?,
    };
    options.check().map_err(GatewayError::invalid)?;
    Ok(options)
}
