use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Credentials the gateway attaches to the outbound call.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "credentials", rename_all = "camelCase")]
pub enum Authentication {
    #[serde(rename_all = "camelCase")]
    ApiKey {
        key: String,
        header_name: String,
        #[serde(skip_serializing_if = "String::is_empty")]
        prefix: String,
    },
    BearerToken { token: String },
    BasicAuth { username: String, password: String },
}

impl Authentication {
    pub fn api_key(key: &str, header_name: &str) -> Self {
        Self::ApiKey {
            key: key.to_string(),
            header_name: header_name.to_string(),
            prefix: String::new(),
        }
    }

    pub fn bearer(token: &str) -> Self {
        Self::BearerToken {
            token: token.to_string(),
        }
    }

    pub fn basic(username: &str, password: &str) -> Self {
        Self::BasicAuth {
            username: username.to_string(),
            password: password.to_string(),
        }
    }
}

/// One outbound call described for the gateway.
///
/// `dataType` is filled in by the [`GatewayClient`] method used to send it.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchRequest {
    api_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    method: Option<String>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    headers: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    authentication: Option<Authentication>,
    #[serde(skip_serializing_if = "Option::is_none")]
    xml_parser_options: Option<Value>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    rdf: Map<String, Value>,
}

impl FetchRequest {
    pub fn new(api_url: &str) -> Self {
        Self {
            api_url: api_url.to_string(),
            ..Self::default()
        }
    }

    pub fn method(mut self, method: &str) -> Self {
        self.method = Some(method.to_string());
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .insert(name.to_string(), Value::String(value.to_string()));
        self
    }

    /// Body sent verbatim.
    pub fn text_body(mut self, body: &str) -> Self {
        self.body = Some(Value::String(body.to_string()));
        self
    }

    /// Body serialized as JSON by the gateway.
    pub fn json_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn authentication(mut self, auth: Authentication) -> Self {
        self.authentication = Some(auth);
        self
    }

    pub fn xml_parser_options(mut self, options: Value) -> Self {
        self.xml_parser_options = Some(options);
        self
    }

    pub fn rdf_content_type(mut self, content_type: &str) -> Self {
        self.rdf
            .insert("contentType".into(), Value::String(content_type.to_string()));
        self
    }

    pub fn rdf_base_iri(mut self, base_iri: &str) -> Self {
        self.rdf
            .insert("baseIRI".into(), Value::String(base_iri.to_string()));
        self
    }
}

/// The gateway's response envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct FetchResponse {
    #[serde(skip)]
    pub status: u16,
    pub success: bool,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub details: Option<Value>,
}

pub struct GatewayClient {
    client: Client,
    gateway_url: String,
}

impl GatewayClient {
    pub fn new(gateway_url: &str) -> Self {
        Self {
            client: Client::new(),
            gateway_url: gateway_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn fetch_json(&self, req: FetchRequest) -> Result<FetchResponse, reqwest::Error> {
        self.send("json", req).await
    }

    pub async fn fetch_xml(&self, req: FetchRequest) -> Result<FetchResponse, reqwest::Error> {
        self.send("xml", req).await
    }

    pub async fn fetch_rdf(&self, req: FetchRequest) -> Result<FetchResponse, reqwest::Error> {
        self.send("rdf", req).await
    }

    /// Failures reported by the gateway come back as an envelope with
    /// `success: false`; only transport and decoding problems are errors.
    async fn send(&self, data_type: &str, req: FetchRequest) -> Result<FetchResponse, reqwest::Error> {
        let mut envelope = match serde_json::to_value(&req) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        envelope.insert("dataType".into(), Value::String(data_type.to_string()));

        let resp = self
            .client
            .post(format!("{}/api/{}", self.gateway_url, data_type))
            .json(&envelope)
            .send()
            .await?;

        let status: StatusCode = resp.status();
        let mut body: FetchResponse = resp.json().await?;
        body.status = status.as_u16();
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_serialization() {
        let req = FetchRequest::new("https://api.example.com/data")
            .method("POST")
            .header("Accept", "application/json")
            .json_body(json!({"q": 1}))
            .authentication(Authentication::api_key("secret", "X-API-Key"));

        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({
                "apiUrl": "https://api.example.com/data",
                "method": "POST",
                "headers": {"Accept": "application/json"},
                "body": {"q": 1},
                "authentication": {
                    "type": "apiKey",
                    "credentials": {"key": "secret", "headerName": "X-API-Key"}
                }
            })
        );
    }

    #[test]
    fn test_rdf_options_serialization() {
        let req = FetchRequest::new("https://data.example.org/graph")
            .rdf_content_type("text/turtle")
            .rdf_base_iri("https://data.example.org/");
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["rdf"]["contentType"], "text/turtle");
        assert_eq!(value["rdf"]["baseIRI"], "https://data.example.org/");
    }

    #[test]
    fn test_basic_auth_serialization() {
        let value = serde_json::to_value(Authentication::basic("Aladdin", "open sesame")).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "basicAuth",
                "credentials": {"username": "Aladdin", "password": "open sesame"}
            })
        );
    }
}
