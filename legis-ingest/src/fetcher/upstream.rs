//! Upstream public API client
//!
//! Responses are decoded into one of a small set of known shapes
//! ([`UpstreamPayload`]). A body that matches none of them is an error
//! ([`FetchError::UnrecognizedShape`]), never an empty record list.

use async_trait::async_trait;
use legis_common::config::UpstreamConfig;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Upstream client errors
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limited by upstream (HTTP {0})")]
    RateLimited(u16),

    #[error("Upstream error {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid JSON from upstream: {0}")]
    Decode(String),

    #[error("Unrecognized response shape: {0}")]
    UnrecognizedShape(String),

    #[error("Invalid upstream URL: {0}")]
    InvalidUrl(String),
}

/// Row container used by table-style exports
#[derive(Debug, Clone, Deserialize)]
pub struct TableRows {
    pub rows: Vec<Value>,
}

/// Known upstream response shapes
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum UpstreamPayload {
    /// `[ {...}, ... ]`
    List(Vec<Value>),
    /// `{ "data": [...] }`
    Data { data: Vec<Value> },
    /// `{ "results": [...] }`
    Results { results: Vec<Value> },
    /// `{ "items": [...] }`
    Items { items: Vec<Value> },
    /// `{ "table": { "rows": [...] } }`
    Table { table: TableRows },
}

impl UpstreamPayload {
    /// Name of the matched shape, for logging
    pub fn shape(&self) -> &'static str {
        match self {
            UpstreamPayload::List(_) => "list",
            UpstreamPayload::Data { .. } => "data",
            UpstreamPayload::Results { .. } => "results",
            UpstreamPayload::Items { .. } => "items",
            UpstreamPayload::Table { .. } => "table",
        }
    }

    pub fn into_records(self) -> Vec<Value> {
        match self {
            UpstreamPayload::List(records)
            | UpstreamPayload::Data { data: records }
            | UpstreamPayload::Results { results: records }
            | UpstreamPayload::Items { items: records } => records,
            UpstreamPayload::Table { table } => table.rows,
        }
    }
}

/// Decode a response body into a known shape
pub fn decode_payload(body: &str) -> Result<UpstreamPayload, FetchError> {
    let value: Value = serde_json::from_str(body).map_err(|e| FetchError::Decode(e.to_string()))?;

    UpstreamPayload::deserialize(&value)
        .map_err(|_| FetchError::UnrecognizedShape(describe(&value)))
}

fn describe(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let keys: Vec<&str> = map.keys().map(String::as_str).collect();
            format!("object with keys [{}]", keys.join(", "))
        }
        Value::Array(_) => "array".to_string(),
        Value::String(_) => "string".to_string(),
        Value::Number(_) => "number".to_string(),
        Value::Bool(_) => "boolean".to_string(),
        Value::Null => "null".to_string(),
    }
}

/// Anything that can return the records published under a path
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// One request for the records under `path`, without retry
    async fn fetch_records(&self, path: &str) -> Result<Vec<Value>, FetchError>;
}

/// HTTP client for the upstream API
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl UpstreamClient {
    /// Build the HTTP client
    ///
    /// The base URL is not checked here; a bad one surfaces as
    /// [`FetchError::InvalidUrl`] on the first request.
    pub fn new(config: &UpstreamConfig) -> Result<Self, FetchError> {
        let http_client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout())
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: config.base_url.clone(),
        })
    }

    /// Full URL for a path relative to the base URL
    pub fn url_for(&self, path: &str) -> Result<reqwest::Url, FetchError> {
        let joined = format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        reqwest::Url::parse(&joined)
            .map_err(|e| FetchError::InvalidUrl(format!("{}: {}", joined, e)))
    }
}

/// Error for a non-success response, `None` for 2xx
///
/// 429 and 503 mean the upstream wants us to back off.
fn classify_status(status: reqwest::StatusCode, body: String) -> Option<FetchError> {
    if status.is_success() {
        return None;
    }

    match status.as_u16() {
        code @ (429 | 503) => Some(FetchError::RateLimited(code)),
        code => Some(FetchError::Status { status: code, body }),
    }
}

#[async_trait]
impl RecordSource for UpstreamClient {
    /// GET `path` and decode its records
    async fn fetch_records(&self, path: &str) -> Result<Vec<Value>, FetchError> {
        let url = self.url_for(path)?;
        tracing::debug!(url = %url, "Querying upstream API");

        let response = self
            .http_client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();
        let text = response.text().await;
        if !status.is_success() {
            let body = text.as_deref().unwrap_or_default().to_string();
            if let Some(err) = classify_status(status, body) {
                return Err(err);
            }
        }

        let body = text.map_err(|e| FetchError::Network(e.to_string()))?;
        let payload = decode_payload(&body)?;
        let shape = payload.shape();
        let records = payload.into_records();

        tracing::info!(
            url = %url,
            shape,
            records = records.len(),
            "Retrieved records from upstream"
        );

        Ok(records)
    }
}
