//! HTTP collaborators: the visualization source seam and the reqwest-backed API.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{header, Client, RequestBuilder};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use url::Url;

use crate::config::Config;
use crate::forms::{FilePreview, FileVerdict, ParameterCheck, Upload};
use crate::images::ImageIndex;
use crate::logging::{log, log_request, obj, ts_epoch_ms, v_str, Domain, Level};

pub mod retry;

use retry::{is_retryable_http_error, is_retryable_network_error, retry_async, RetryConfig};

/// Why a slot's payload could not be retrieved.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchError {
    Network { message: String, transient: bool },
    Status(u16),
    /// Body was not JSON
    Body(String),
    /// Server answered with nothing to draw
    EmptySeries,
}

impl FetchError {
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Network { transient, .. } => *transient,
            FetchError::Status(status) => is_retryable_http_error(*status),
            FetchError::Body(_) | FetchError::EmptySeries => false,
        }
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Network { message, .. } => write!(f, "network error: {}", message),
            FetchError::Status(status) => write!(f, "HTTP error, status {}", status),
            FetchError::Body(message) => write!(f, "malformed response body: {}", message),
            FetchError::EmptySeries => write!(f, "response contains no series"),
        }
    }
}

impl std::error::Error for FetchError {}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        FetchError::Network {
            transient: is_retryable_network_error(&err),
            message: err.to_string(),
        }
    }
}

/// Retrieval of precomputed chart payloads.
#[async_trait]
pub trait VisualizationSource: Send + Sync {
    async fn fetch_visualization(&self, project_id: &str, name: &str) -> Result<Value, FetchError>;
}

pub struct HttpApi {
    client: Client,
    base: Url,
    retry: RetryConfig,
    csrf_token: Option<String>,
    request_seq: AtomicU64,
}

impl HttpApi {
    pub fn new(cfg: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.request_timeout_secs))
            .build()
            .context("building HTTP client")?;
        // a trailing slash keeps any path prefix of the base when joining
        let base = Url::parse(&format!("{}/", cfg.base_url.trim_end_matches('/')))
            .with_context(|| format!("invalid base url {:?}", cfg.base_url))?;
        Ok(Self {
            client,
            base,
            retry: cfg.retry.clone(),
            csrf_token: cfg.csrf_token.clone(),
            request_seq: AtomicU64::new(0),
        })
    }

    /// Absolute URL for path segments; each segment is percent-encoded.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("base url {} cannot carry a path", self.base))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Unique per request, so no intermediary can answer from cache.
    pub fn cache_token(&self) -> String {
        format!("{}-{}", ts_epoch_ms(), self.request_seq.fetch_add(1, Ordering::SeqCst))
    }

    pub fn cache_busted(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.endpoint(segments)?;
        url.query_pairs_mut().append_pair("t", &self.cache_token());
        Ok(url)
    }

    fn no_cache(req: RequestBuilder) -> RequestBuilder {
        req.header(header::CACHE_CONTROL, "no-cache")
    }

    async fn get_json_once(&self, url: &Url, attempt: u32) -> Result<Value, FetchError> {
        log_request("GET", url.as_str(), attempt);
        let resp = Self::no_cache(self.client.get(url.clone())).send().await?;
        let status = resp.status();
        if !status.is_success() {
            log(
                Level::Warn,
                Domain::Fetch,
                "http_status",
                obj(&[("url", v_str(url.as_str())), ("status", serde_json::json!(status.as_u16()))]),
            );
            return Err(FetchError::Status(status.as_u16()));
        }
        let text = resp.text().await?;
        serde_json::from_str(&text).map_err(|e| FetchError::Body(e.to_string()))
    }

    async fn error_for_status(resp: reqwest::Response) -> Result<reqwest::Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(anyhow!("HTTP error, status {}: {}", status.as_u16(), body))
    }

    /// `GET /api/project/{id}/images`
    pub async fn images(&self, project_id: &str) -> Result<ImageIndex> {
        let url = self.cache_busted(&["api", "project", project_id, "images"])?;
        log_request("GET", url.as_str(), 0);
        let resp = Self::error_for_status(Self::no_cache(self.client.get(url)).send().await?).await?;
        Ok(resp.json().await?)
    }

    /// `GET /project/{id}/image/{filename}`
    pub async fn image_bytes(&self, project_id: &str, filename: &str) -> Result<Vec<u8>> {
        let url = self.endpoint(&["project", project_id, "image", filename])?;
        log_request("GET", url.as_str(), 0);
        let resp = Self::error_for_status(self.client.get(url).send().await?).await?;
        Ok(resp.bytes().await?.to_vec())
    }

    /// `POST /api/parameters/check` with a flat name → value mapping
    pub async fn check_parameters(&self, params: &Map<String, Value>) -> Result<ParameterCheck> {
        let url = self.endpoint(&["api", "parameters", "check"])?;
        log_request("POST", url.as_str(), 0);
        let mut req = self.client.post(url).json(params);
        if let Some(token) = &self.csrf_token {
            req = req.header("X-CSRFToken", token);
        }
        // the endpoint answers 400 with a verdict body as well
        let resp = req.send().await?;
        let status = resp.status();
        let body: Value = resp.json().await.context("parameter check response")?;
        let check: ParameterCheck = serde_json::from_value(body)
            .with_context(|| format!("parameter check verdict (status {})", status.as_u16()))?;
        Ok(check)
    }

    fn upload_form(&self, upload: &Upload) -> Result<reqwest::multipart::Form> {
        let part = reqwest::multipart::Part::bytes(upload.bytes.clone()).file_name(upload.file_name.clone());
        let mut form = reqwest::multipart::Form::new().part("file", part);
        if let Some(file_type) = upload.file_type {
            form = form.text("file_type", file_type.as_str());
        }
        let token = self
            .csrf_token
            .clone()
            .ok_or_else(|| anyhow!("file uploads need an anti-forgery token (CSRF_TOKEN)"))?;
        Ok(form.text("csrf_token", token))
    }

    async fn post_upload(&self, path: &[&str], upload: &Upload) -> Result<reqwest::Response> {
        let url = self.endpoint(path)?;
        log_request("POST", url.as_str(), 0);
        let form = self.upload_form(upload)?;
        let mut req = self.client.post(url).multipart(form);
        if let Some(token) = &self.csrf_token {
            req = req.header("X-CSRFToken", token);
        }
        Self::error_for_status(req.send().await?).await
    }

    /// `POST /api/file/preview`
    pub async fn preview_file(&self, upload: &Upload) -> Result<FilePreview> {
        let resp = self.post_upload(&["api", "file", "preview"], upload).await?;
        Ok(resp.json().await?)
    }

    /// `POST /api/file/validate`
    pub async fn validate_file(&self, upload: &Upload) -> Result<FileVerdict> {
        let resp = self.post_upload(&["api", "file", "validate"], upload).await?;
        Ok(resp.json().await?)
    }

    /// `GET /api/rock_presets/{type}`
    pub async fn rock_preset(&self, rock_type: &str) -> Result<Map<String, Value>> {
        let url = self.endpoint(&["api", "rock_presets", rock_type])?;
        log_request("GET", url.as_str(), 0);
        let resp = Self::error_for_status(self.client.get(url).send().await?).await?;
        match resp.json::<Value>().await? {
            Value::Object(map) => Ok(map),
            other => Err(anyhow!("rock preset is not a mapping: {}", other)),
        }
    }
}

#[async_trait]
impl VisualizationSource for HttpApi {
    /// `GET /project/{id}/visualization/{name}`, cache-busted on every attempt
    async fn fetch_visualization(&self, project_id: &str, name: &str) -> Result<Value, FetchError> {
        let mut attempt = 0;
        retry_async(&self.retry, name, FetchError::is_transient, || {
            let url = self.cache_busted(&["project", project_id, "visualization", name]);
            attempt += 1;
            let n = attempt;
            async move {
                let url = url.map_err(|e| FetchError::Network { message: e.to_string(), transient: false })?;
                self.get_json_once(&url, n).await
            }
        })
        .await
    }
}
