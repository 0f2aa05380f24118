//! REST persistence backend.
//!
//! | Operation | Request |
//! |-----------|---------|
//! | get | `GET {base}/documents/{type}/{id}` |
//! | save | `PUT {base}/documents/{type}/{id}` |
//! | upload | `POST {base}/uploads` (multipart field `file`) |
//! | related | `GET {base}/collections/{name}` |
//!
//! Response bodies may be the payload itself or wrap it as `{"data": ...}`.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use atelier_core::defaults;
use atelier_core::{
    detect_content_type, ContentRecord, DocumentRef, EntitySource, Error, MediaFile,
    PersistenceAdapter, RelatedEntitySummary, Result, UploadResponse,
};

/// Configuration for the REST backend.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the content API, e.g. `https://cms.example.com/api`.
    pub base_url: String,
    /// Bearer token (optional for local servers).
    pub api_token: Option<String>,
    /// Timeout for document and collection requests.
    pub timeout_secs: u64,
    /// Timeout for uploads.
    pub upload_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::API_URL.to_string(),
            api_token: None,
            timeout_secs: defaults::REQUEST_TIMEOUT_SECS,
            upload_timeout_secs: defaults::UPLOAD_TIMEOUT_SECS,
        }
    }
}

impl ClientConfig {
    /// Read configuration from the environment.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `ATELIER_API_URL` | `http://127.0.0.1:8080/api` |
    /// | `ATELIER_API_TOKEN` | none |
    /// | `ATELIER_TIMEOUT_SECS` | `30` |
    pub fn from_env() -> Self {
        let base_url =
            std::env::var(defaults::ENV_API_URL).unwrap_or_else(|_| defaults::API_URL.to_string());
        let api_token = std::env::var(defaults::ENV_API_TOKEN)
            .ok()
            .filter(|t| !t.trim().is_empty());
        let timeout_secs = std::env::var(defaults::ENV_TIMEOUT_SECS)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults::REQUEST_TIMEOUT_SECS);
        Self {
            base_url,
            api_token,
            timeout_secs,
            ..Self::default()
        }
    }
}

/// [`PersistenceAdapter`] and [`EntitySource`] over a JSON REST API.
pub struct HttpBackend {
    client: Client,
    base: Url,
    config: ClientConfig,
}

impl HttpBackend {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let base = Url::parse(&config.base_url)
            .map_err(|e| Error::Config(format!("Invalid API URL '{}': {}", config.base_url, e)))?;
        if base.cannot_be_a_base() {
            return Err(Error::Config(format!(
                "API URL '{}' cannot carry a path",
                config.base_url
            )));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            base_url = %config.base_url,
            authenticated = config.api_token.is_some(),
            "Initializing HTTP backend"
        );

        Ok(Self {
            client,
            base,
            config,
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(ClientConfig::from_env())
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Base URL joined with percent-encoded path segments.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| Error::Config(format!("API URL '{}' cannot carry a path", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.config.api_token {
            Some(ref token) => req.bearer_auth(token),
            None => req,
        }
    }
}

/// Members an API envelope may carry next to `data`.
const ENVELOPE_MEMBERS: &[&str] = &["meta", "success", "message", "status", "links"];

/// Unwrap a `{"data": ...}` envelope when present.
///
/// A body is an envelope only when every member other than `data` is
/// envelope metadata; a record that merely has a `data` field is returned
/// unchanged.
fn unwrap_data(body: Value) -> Value {
    match body {
        Value::Object(mut map)
            if map
                .get("data")
                .is_some_and(|d| d.is_object() || d.is_array() || d.is_null())
                && map
                    .keys()
                    .all(|k| k == "data" || ENVELOPE_MEMBERS.contains(&k.as_str())) =>
        {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

/// Reason given by the server in a `message` or `error` member.
fn reason_from_body(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["message", "error"].iter().find_map(|key| match value.get(*key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Object(inner) => inner
            .get("message")
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string),
        _ => None,
    })
}

async fn rejection(response: reqwest::Response) -> Error {
    let status = response.status().as_u16();
    let reason = response
        .text()
        .await
        .ok()
        .and_then(|body| reason_from_body(&body));
    warn!(status, reason = ?reason, "Request rejected");
    Error::Rejected { status, reason }
}

fn request_error(op: &str, e: reqwest::Error) -> Error {
    Error::Request(format!("{} failed: {}", op, e))
}

#[async_trait]
impl PersistenceAdapter for HttpBackend {
    #[instrument(
        skip(self),
        fields(subsystem = "client", component = "http", op = "get_document", document = %doc)
    )]
    async fn get_document(&self, doc: &DocumentRef) -> Result<Option<ContentRecord>> {
        let start = Instant::now();
        let url = self.endpoint(&["documents", &doc.doc_type, &doc.id])?;
        let response = self
            .authorize(self.client.get(url))
            .send()
            .await
            .map_err(|e| request_error("GET document", e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!("Document not found");
            return Ok(None);
        }
        if !status.is_success() {
            return Err(rejection(response).await);
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| Error::Serialization(format!("Invalid document body: {}", e)))?;
        let record = match unwrap_data(body) {
            Value::Null => return Ok(None),
            value => ContentRecord::from_value(value)?,
        };
        debug!(
            keys = record.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Document fetched"
        );
        Ok(Some(record))
    }

    #[instrument(
        skip(self, record),
        fields(subsystem = "client", component = "http", op = "save_document", document = %doc)
    )]
    async fn save_document(&self, doc: &DocumentRef, record: &ContentRecord) -> Result<()> {
        let start = Instant::now();
        let url = self.endpoint(&["documents", &doc.doc_type, &doc.id])?;
        let response = self
            .authorize(self.client.put(url))
            .json(record)
            .send()
            .await
            .map_err(|e| request_error("PUT document", e))?;

        if !response.status().is_success() {
            return Err(rejection(response).await);
        }
        info!(
            keys = record.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Document saved"
        );
        Ok(())
    }

    #[instrument(
        skip(self, file),
        fields(
            subsystem = "client",
            component = "http",
            op = "upload_media",
            filename = %file.filename,
            file_size = file.size()
        )
    )]
    async fn upload_media(&self, file: MediaFile) -> Result<UploadResponse> {
        let start = Instant::now();
        let url = self.endpoint(&["uploads"])?;
        let content_type = file
            .content_type
            .clone()
            .unwrap_or_else(|| detect_content_type(&file));

        let part = reqwest::multipart::Part::bytes(file.bytes)
            .file_name(file.filename)
            .mime_str(&content_type)
            .map_err(|e| Error::Internal(format!("Failed to create multipart: {}", e)))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .authorize(self.client.post(url))
            .multipart(form)
            .timeout(Duration::from_secs(self.config.upload_timeout_secs))
            .send()
            .await
            .map_err(|e| request_error("Upload", e))?;

        if !response.status().is_success() {
            return Err(rejection(response).await);
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| Error::Upload(format!("Upload response was not JSON: {}", e)))?;
        debug!(
            duration_ms = start.elapsed().as_millis() as u64,
            "Upload accepted"
        );
        Ok(UploadResponse(body))
    }
}

#[async_trait]
impl EntitySource for HttpBackend {
    #[instrument(
        skip(self),
        fields(subsystem = "client", component = "http", op = "list_entities")
    )]
    async fn list_entities(&self, collection: &str) -> Result<Vec<RelatedEntitySummary>> {
        let url = self.endpoint(&["collections", collection])?;
        let response = self
            .authorize(self.client.get(url))
            .send()
            .await
            .map_err(|e| request_error("GET collection", e))?;

        if !response.status().is_success() {
            return Err(rejection(response).await);
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| Error::Serialization(format!("Invalid collection body: {}", e)))?;
        let summaries: Vec<RelatedEntitySummary> = serde_json::from_value(unwrap_data(body))?;
        debug!(collection, count = summaries.len(), "Collection fetched");
        Ok(summaries)
    }
}
