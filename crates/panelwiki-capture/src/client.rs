//! Monitoring server boundary
//!
//! [`MonitoringClient`] is everything the capture pipeline needs from a
//! Grafana-compatible server. [`HttpMonitoringClient`] implements it over the
//! server's HTTP API.

use crate::error::ClientError;
use panelwiki_config::{AuthMode, SourceSpec};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Longest response body excerpt kept in error messages
const ERROR_BODY_LIMIT: usize = 512;

/// One hit of a dashboard search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardHit {
    /// Dashboard uid
    pub uid: String,
    /// Dashboard title
    pub title: String,
    /// Dashboard path, e.g. `/d/{uid}/{slug}`
    pub url: String,
    /// Folder title; absent for the General folder
    #[serde(rename = "folderTitle", default)]
    pub folder_title: Option<String>,
    /// `dash-db` or `dash-folder`
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

/// Image returned by the render endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedImage {
    /// `Content-Type` header value
    pub content_type: Option<String>,
    /// Body
    pub bytes: Vec<u8>,
}

/// Snapshot created on the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotInfo {
    /// Snapshot key
    pub key: String,
    /// Public snapshot URL
    pub url: String,
}

/// Operations the capture pipeline needs from a monitoring server
#[async_trait::async_trait]
pub trait MonitoringClient: Send + Sync {
    /// Search dashboards by title
    async fn search_dashboards(
        &self,
        source: &SourceSpec,
        query: &str,
    ) -> Result<Vec<DashboardHit>, ClientError>;

    /// Fetch the dashboard model (the `dashboard` object) by uid
    async fn dashboard_model(
        &self,
        source: &SourceSpec,
        uid: &str,
    ) -> Result<serde_json::Value, ClientError>;

    /// Render one panel; `path` starts with `/render/`
    async fn render_panel(
        &self,
        source: &SourceSpec,
        path: &str,
        params: &[(String, String)],
    ) -> Result<RenderedImage, ClientError>;

    /// Create a snapshot from a request body
    async fn create_snapshot(
        &self,
        source: &SourceSpec,
        body: &serde_json::Value,
    ) -> Result<SnapshotInfo, ClientError>;

    /// Fetch a snapshot's JSON by key
    async fn snapshot(&self, source: &SourceSpec, key: &str)
        -> Result<serde_json::Value, ClientError>;
}

/// [`MonitoringClient`] over the Grafana HTTP API
#[derive(Debug, Clone)]
pub struct HttpMonitoringClient {
    strict: Client,
    insecure: Client,
}

impl HttpMonitoringClient {
    /// Create a client pair (certificate-verifying and not)
    ///
    /// # Errors
    /// Returns [`ClientError::Transport`] if the TLS backend fails to
    /// initialise.
    pub fn new() -> Result<Self, ClientError> {
        let strict = Client::builder()
            .build()
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        let insecure = Client::builder()
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        Ok(Self { strict, insecure })
    }

    fn request(&self, source: &SourceSpec, method: Method, path: &str) -> RequestBuilder {
        self.request_with_timeout(source, method, path, source.timeout)
    }

    fn request_with_timeout(
        &self,
        source: &SourceSpec,
        method: Method,
        path: &str,
        timeout: Duration,
    ) -> RequestBuilder {
        let client = if source.verify_ssl {
            &self.strict
        } else {
            &self.insecure
        };
        let builder = client
            .request(method, format!("{}{}", source.host, path))
            .timeout(timeout);
        match &source.auth {
            AuthMode::None => builder,
            AuthMode::Basic { login, password } | AuthMode::Domain { login, password } => {
                builder.basic_auth(login, Some(password.expose()))
            }
            AuthMode::Token(token) => builder.bearer_auth(token.expose()),
        }
    }
}

/// Turn a non-success response into [`ClientError::Status`]
pub(crate) async fn check_status(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ClientError::Status {
        status: status.as_u16(),
        message: excerpt(&body),
    })
}

fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(ERROR_BODY_LIMIT) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}

#[async_trait::async_trait]
impl MonitoringClient for HttpMonitoringClient {
    #[tracing::instrument(skip(self, source), fields(source = %source.name), err)]
    async fn search_dashboards(
        &self,
        source: &SourceSpec,
        query: &str,
    ) -> Result<Vec<DashboardHit>, ClientError> {
        let response = self
            .request(source, Method::GET, "/api/search")
            .query(&[("query", query)])
            .send()
            .await?;
        let hits: Vec<DashboardHit> = check_status(response).await?.json().await?;
        tracing::debug!("Search '{}' returned {} hits", query, hits.len());
        Ok(hits)
    }

    #[tracing::instrument(skip(self, source), fields(source = %source.name), err)]
    async fn dashboard_model(
        &self,
        source: &SourceSpec,
        uid: &str,
    ) -> Result<serde_json::Value, ClientError> {
        let response = self
            .request(source, Method::GET, &format!("/api/dashboards/uid/{uid}"))
            .send()
            .await?;
        let mut body: serde_json::Value = check_status(response).await?.json().await?;
        match body.get_mut("dashboard") {
            Some(dashboard) => Ok(dashboard.take()),
            None => Err(ClientError::Decode(format!(
                "dashboard {uid}: response has no 'dashboard' object"
            ))),
        }
    }

    #[tracing::instrument(skip(self, source, params), fields(source = %source.name), err)]
    async fn render_panel(
        &self,
        source: &SourceSpec,
        path: &str,
        params: &[(String, String)],
    ) -> Result<RenderedImage, ClientError> {
        let response = self
            .request(source, Method::GET, path)
            .query(params)
            .send()
            .await?;
        let response = check_status(response).await?;
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await?.to_vec();
        tracing::debug!("Rendered {} bytes from {}", bytes.len(), path);
        Ok(RenderedImage {
            content_type,
            bytes,
        })
    }

    #[tracing::instrument(skip(self, source, body), fields(source = %source.name), err)]
    async fn create_snapshot(
        &self,
        source: &SourceSpec,
        body: &serde_json::Value,
    ) -> Result<SnapshotInfo, ClientError> {
        let response = self
            .request_with_timeout(source, Method::POST, "/api/snapshots", source.snapshot_timeout)
            .json(body)
            .send()
            .await?;
        Ok(check_status(response).await?.json().await?)
    }

    #[tracing::instrument(skip(self, source), fields(source = %source.name), err)]
    async fn snapshot(
        &self,
        source: &SourceSpec,
        key: &str,
    ) -> Result<serde_json::Value, ClientError> {
        let response = self
            .request(source, Method::GET, &format!("/api/snapshots/{key}"))
            .send()
            .await?;
        Ok(check_status(response).await?.json().await?)
    }
}
