//! Elasticsearch `_bulk` client over HTTP

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, header};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use super::{BulkItem, INDEX_ACTION, IndexClient, IndexTarget};
use crate::errors::{ClientError, ClientResult};
use crate::models::{ID_FIELD, Record};

const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";

/// Authentication material
#[derive(Clone, PartialEq, Eq)]
pub enum Auth {
    Basic { username: String, password: String },
    ApiKey(String),
}

impl std::fmt::Debug for Auth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Auth::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"***")
                .finish(),
            Auth::ApiKey(_) => f.write_str("ApiKey(***)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ElasticsearchClientConfig {
    pub urls: Vec<String>,
    pub auth: Option<Auth>,
    pub timeout: Duration,
    pub accept_invalid_certs: bool,
}

/// Client that round-robins bulk requests over the configured nodes
#[derive(Debug)]
pub struct ElasticsearchClient {
    http: Client,
    urls: Vec<String>,
    auth: Option<Auth>,
    next_node: AtomicUsize,
}

impl ElasticsearchClient {
    pub fn new(config: ElasticsearchClientConfig) -> ClientResult<Self> {
        if config.urls.is_empty() {
            return Err(ClientError::InvalidConfig {
                message: "no urls configured".to_string(),
            });
        }

        let http = Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()?;

        let urls = config
            .urls
            .into_iter()
            .map(|url| url.trim_end_matches('/').to_string())
            .collect();

        Ok(Self {
            http,
            urls,
            auth: config.auth,
            next_node: AtomicUsize::new(0),
        })
    }

    fn node(&self) -> &str {
        let index = self.next_node.fetch_add(1, Ordering::Relaxed) % self.urls.len();
        &self.urls[index]
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.auth {
            Some(Auth::Basic { username, password }) => request.basic_auth(username, Some(password)),
            Some(Auth::ApiKey(key)) => request.header(header::AUTHORIZATION, format!("ApiKey {key}")),
            None => request,
        }
    }
}

#[async_trait]
impl IndexClient for ElasticsearchClient {
    async fn ping(&self) -> ClientResult<()> {
        let mut last_error = String::from("no nodes configured");
        for url in &self.urls {
            match self.authorize(self.http.get(format!("{url}/"))).send().await {
                Ok(response) if response.status().is_success() => {
                    debug!("Index service node {} is reachable", url);
                    return Ok(());
                }
                Ok(response) => {
                    last_error = format!("HTTP {}", response.status());
                    warn!("Index service node {} answered {}", url, response.status());
                }
                Err(e) => {
                    last_error = e.to_string();
                    warn!("Index service node {} unreachable: {}", url, e);
                }
            }
        }

        Err(ClientError::Unreachable {
            url: self.urls.join(","),
            message: last_error,
        })
    }

    async fn bulk(&self, target: &IndexTarget, batch: Vec<Record>) -> ClientResult<Vec<BulkItem>> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }

        let expected = batch.len();
        let body = render_bulk_body(target, batch)?;
        let url = format!("{}/_bulk", self.node());
        debug!("POST {} ({} records, {} bytes)", url, expected, body.len());

        let response = self
            .authorize(self.http.post(&url))
            .header(header::CONTENT_TYPE, NDJSON_CONTENT_TYPE)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(ClientError::BulkRejected {
                status: status.as_u16(),
                message: text,
            });
        }

        parse_bulk_response(&text)
    }
}

/// Render a batch as a `_bulk` NDJSON body: one action line and one source
/// line per record. `_id` moves from the source into the action metadata.
pub fn render_bulk_body(target: &IndexTarget, batch: Vec<Record>) -> Result<String, serde_json::Error> {
    let mut body = String::new();
    for mut record in batch {
        let mut meta = Map::new();
        meta.insert("_index".to_string(), Value::String(target.collection.clone()));
        if !target.doc_type.is_empty() {
            meta.insert("_type".to_string(), Value::String(target.doc_type.clone()));
        }
        if let Some(id) = record.shift_remove(ID_FIELD) {
            meta.insert(ID_FIELD.to_string(), id);
        }

        body.push_str(&serde_json::to_string(&json!({ INDEX_ACTION: meta }))?);
        body.push('\n');
        body.push_str(&serde_json::to_string(&record)?);
        body.push('\n');
    }
    Ok(body)
}

#[derive(Debug, Deserialize)]
struct BulkResponse {
    #[serde(default)]
    errors: bool,
    items: Vec<Map<String, Value>>,
}

/// Map a `_bulk` response body to item results, preserving order
pub fn parse_bulk_response(text: &str) -> ClientResult<Vec<BulkItem>> {
    let response: BulkResponse = serde_json::from_str(text).map_err(|e| ClientError::MalformedResponse {
        message: e.to_string(),
    })?;

    if response.errors {
        debug!("Bulk response reports item errors");
    }

    response
        .items
        .into_iter()
        .map(|item| {
            let (action, body) = item.into_iter().next().ok_or_else(|| ClientError::MalformedResponse {
                message: "empty bulk item".to_string(),
            })?;

            let id = body.get(ID_FIELD).and_then(Value::as_str).map(str::to_string);
            let status = body.get("status").and_then(Value::as_u64).unwrap_or(0);
            let error = body.get("error").cloned();

            let accepted = (200..300).contains(&status) && error.is_none();
            Ok(BulkItem {
                accepted,
                action,
                id,
                detail: if accepted { Value::Null } else { error.unwrap_or(body) },
            })
        })
        .collect()
}
