//! HTTP request/response surface of the backup server.
//!
//! Everything except the progress stream goes through here: starting a job, the preference
//! blobs (settings, bookmarks, path history) and the backup run history.

use crate::model::{BackupHistory, Bookmarks, JobConfig, PathHistory};
use anyhow::{Context, Result};
use log::debug;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Non-2xx response. `message` is the server's text, `field` names the rejected input.
    #[error("{message}")]
    Rejected {
        status: u16,
        field: Option<String>,
        message: String,
    },
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ApiError {
    /// Build a rejection from a response body that is either JSON `{field?, message|error}` or text.
    pub fn from_response_body(status: u16, body: &str) -> Self {
        let body = body.trim();
        if let Ok(serde_json::Value::Object(obj)) = serde_json::from_str::<serde_json::Value>(body) {
            let field = obj
                .get("field")
                .and_then(|v| v.as_str())
                .filter(|s| !s.is_empty())
                .map(str::to_string);
            let message = obj
                .get("message")
                .or_else(|| obj.get("error"))
                .and_then(|v| v.as_str())
                .map(str::to_string);
            if let Some(message) = message {
                return ApiError::Rejected {
                    status,
                    field,
                    message,
                };
            }
        }
        let message = if body.is_empty() {
            format!("HTTP {status}")
        } else {
            body.to_string()
        };
        ApiError::Rejected {
            status,
            field: None,
            message,
        }
    }

    pub fn field(&self) -> Option<&str> {
        match self {
            ApiError::Rejected { field, .. } => field.as_deref(),
            _ => None,
        }
    }
}

/// Server operations used by the run controller and preference sync.
#[async_trait::async_trait]
pub trait ServerApi: Send + Sync {
    /// `POST /api/run`. Resolves once the server accepted or rejected the job.
    async fn start_job(&self, config: &JobConfig) -> Result<(), ApiError>;
    async fn load_settings(&self) -> Result<JobConfig, ApiError>;
    /// `POST /api/settings`. A rejection may name the offending field.
    async fn save_settings(&self, settings: &JobConfig) -> Result<(), ApiError>;
    async fn load_bookmarks(&self) -> Result<Bookmarks, ApiError>;
    async fn save_bookmarks(&self, bookmarks: &Bookmarks) -> Result<(), ApiError>;
    async fn load_path_history(&self) -> Result<PathHistory, ApiError>;
    async fn save_path_history(&self, history: &PathHistory) -> Result<(), ApiError>;
    /// Newest first, at most `limit` entries.
    async fn load_backup_history(&self, limit: usize) -> Result<BackupHistory, ApiError>;
}

/// reqwest-backed implementation of [`ServerApi`].
pub struct HttpApi {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpApi {
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self> {
        let base_url =
            Url::parse(base_url).with_context(|| format!("invalid base URL: {base_url}"))?;
        let client = reqwest::Client::builder()
            .user_agent(format!("shutterpipe-client/{}", env!("CARGO_PKG_VERSION")))
            .timeout(request_timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url.join(path).map_err(|e| ApiError::Rejected {
            status: 0,
            field: None,
            message: format!("invalid endpoint {path}: {e}"),
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let url = self.endpoint(path)?;
        debug!("GET {url}");
        let resp = self.client.get(url).query(query).send().await?;
        let resp = check_status(resp).await?;
        let bytes = resp.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn post_json<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<(), ApiError> {
        let url = self.endpoint(path)?;
        debug!("POST {url}");
        let resp = self.client.post(url).json(body).send().await?;
        check_status(resp).await?;
        Ok(())
    }
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    debug!("server rejected request: {status} {body}");
    Err(ApiError::from_response_body(status.as_u16(), &body))
}

#[async_trait::async_trait]
impl ServerApi for HttpApi {
    async fn start_job(&self, config: &JobConfig) -> Result<(), ApiError> {
        self.post_json("/api/run", config).await
    }

    async fn load_settings(&self) -> Result<JobConfig, ApiError> {
        self.get_json("/api/settings", &[]).await
    }

    async fn save_settings(&self, settings: &JobConfig) -> Result<(), ApiError> {
        self.post_json("/api/settings", settings).await
    }

    async fn load_bookmarks(&self) -> Result<Bookmarks, ApiError> {
        self.get_json("/api/bookmarks", &[]).await
    }

    async fn save_bookmarks(&self, bookmarks: &Bookmarks) -> Result<(), ApiError> {
        self.post_json("/api/bookmarks", bookmarks).await
    }

    async fn load_path_history(&self) -> Result<PathHistory, ApiError> {
        self.get_json("/api/path-history", &[]).await
    }

    async fn save_path_history(&self, history: &PathHistory) -> Result<(), ApiError> {
        self.post_json("/api/path-history", history).await
    }

    async fn load_backup_history(&self, limit: usize) -> Result<BackupHistory, ApiError> {
        self.get_json("/api/backup-history", &[("limit", limit.to_string())])
            .await
    }
}

/// Derive the progress channel URL (`/api/ws`) from the HTTP base URL.
pub fn channel_url(base_url: &Url) -> Result<Url> {
    let mut url = base_url
        .join("/api/ws")
        .context("failed to build progress channel URL")?;
    let scheme = match url.scheme() {
        "https" => "wss",
        "http" => "ws",
        other => anyhow::bail!("unsupported base URL scheme: {other}"),
    };
    url.set_scheme(scheme)
        .map_err(|_| anyhow::anyhow!("cannot switch {url} to {scheme}"))?;
    Ok(url)
}
