use clap::{Args, Parser, Subcommand};
use serde_json::{json, Map, Value};

#[derive(Parser)]
#[command(name = "fetch-cli")]
#[command(about = "Command-line client for the fetch gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    gateway: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch a JSON document
    Json(FetchArgs),
    /// Fetch an XML document
    Xml {
        #[command(flatten)]
        fetch: FetchArgs,
        /// Keep attributes in the converted tree
        #[arg(long)]
        attributes: bool,
    },
    /// Fetch linked data and print its quads
    Rdf {
        #[command(flatten)]
        fetch: FetchArgs,
        /// Media type to parse the body as, regardless of what the upstream says
        #[arg(long)]
        content_type: Option<String>,
        /// Base IRI for relative identifiers
        #[arg(long)]
        base_iri: Option<String>,
    },
}

#[derive(Args)]
struct FetchArgs {
    /// External URL to fetch
    api_url: String,

    #[arg(short = 'X', long, default_value = "GET")]
    method: String,

    /// Outbound header as `name:value`, repeatable
    #[arg(short = 'H', long = "header")]
    headers: Vec<String>,

    /// Outbound body, sent verbatim
    #[arg(short, long)]
    body: Option<String>,

    #[arg(long, conflicts_with_all = ["api_key", "basic_user"])]
    bearer: Option<String>,

    #[arg(long, requires = "api_key_header", conflicts_with = "basic_user")]
    api_key: Option<String>,

    #[arg(long)]
    api_key_header: Option<String>,

    #[arg(long, default_value = "")]
    api_key_prefix: String,

    #[arg(long, requires = "basic_password")]
    basic_user: Option<String>,

    #[arg(long)]
    basic_password: Option<String>,
}

impl FetchArgs {
    fn envelope(&self, data_type: &str) -> Result<Map<String, Value>, Box<dyn std::error::Error>> {
        let mut envelope = Map::new();
        envelope.insert("apiUrl".into(), json!(self.api_url));
        envelope.insert("dataType".into(), json!(data_type));
        envelope.insert("method".into(), json!(self.method));

        if !self.headers.is_empty() {
            let mut headers = Map::new();
            for raw in &self.headers {
                let (name, value) = raw
                    .split_once(':')
                    .ok_or_else(|| format!("Header must be name:value, got '{}'", raw))?;
                headers.insert(name.trim().to_string(), json!(value.trim()));
            }
            envelope.insert("headers".into(), Value::Object(headers));
        }

        if let Some(body) = &self.body {
            envelope.insert("body".into(), json!(body));
        }

        let auth = if let Some(token) = &self.bearer {
            Some(json!({ "type": "bearerToken", "credentials": { "token": token } }))
        } else if let (Some(key), Some(header)) = (&self.api_key, &self.api_key_header) {
            Some(json!({
                "type": "apiKey",
                "credentials": { "key": key, "headerName": header, "prefix": self.api_key_prefix }
            }))
        } else if let (Some(user), Some(password)) = (&self.basic_user, &self.basic_password) {
            Some(json!({
                "type": "basicAuth",
                "credentials": { "username": user, "password": password }
            }))
        } else {
            None
        };
        if let Some(auth) = auth {
            envelope.insert("authentication".into(), auth);
        }

        Ok(envelope)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let (path, envelope) = match &cli.command {
        Commands::Json(fetch) => ("/api/json", fetch.envelope("json")?),
        Commands::Xml { fetch, attributes } => {
            let mut envelope = fetch.envelope("xml")?;
            if *attributes {
                envelope.insert(
                    "xmlParserOptions".into(),
                    json!({ "ignoreAttributes": false }),
                );
            }
            ("/api/xml", envelope)
        }
        Commands::Rdf {
            fetch,
            content_type,
            base_iri,
        } => {
            let mut envelope = fetch.envelope("rdf")?;
            let mut rdf = Map::new();
            if let Some(content_type) = content_type {
                rdf.insert("contentType".into(), json!(content_type));
            }
            if let Some(base_iri) = base_iri {
                rdf.insert("baseIRI".into(), json!(base_iri));
            }
            if !rdf.is_empty() {
                envelope.insert("rdf".into(), Value::Object(rdf));
            }
            ("/api/rdf", envelope)
        }
    };

    let res = client
        .post(format!("{}{}", cli.gateway.trim_end_matches('/'), path))
        .json(&envelope)
        .send()
        .await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;

    match serde_json::from_str::<Value>(&text) {
        Ok(json) => {
            if !status.is_success() {
                eprintln!("Error: gateway returned status {}", status);
            }
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        Err(_) => {
            eprintln!("Error: gateway returned status {}", status);
            eprintln!("Response: {}", text);
        }
    }
    Ok(())
}
