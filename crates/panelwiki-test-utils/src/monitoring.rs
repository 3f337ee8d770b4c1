use async_trait::async_trait;
use panelwiki_capture::{ClientError, DashboardHit, MonitoringClient, RenderedImage, SnapshotInfo};
use panelwiki_config::SourceSpec;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::png_bytes;

#[derive(Debug, Clone)]
pub struct FakeDashboard {
    pub hit: DashboardHit,
    pub model: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderCall {
    pub source: String,
    pub path: String,
    pub params: Vec<(String, String)>,
}

impl RenderCall {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Monitoring server keyed by host
#[derive(Debug, Default)]
pub struct FakeMonitoringClient {
    dashboards: HashMap<String, Vec<FakeDashboard>>,
    /// `(host, panel id)` → status returned by the render endpoint
    failing: HashMap<(String, u64), u16>,
    content_type: Option<String>,
    renders: Mutex<Vec<RenderCall>>,
    snapshots: Mutex<Vec<serde_json::Value>>,
}

impl FakeMonitoringClient {
    pub fn new() -> Self {
        Self {
            content_type: Some("image/png".into()),
            ..Self::default()
        }
    }

    /// Serve a dashboard titled `title` with flat panels
    pub fn with_dashboard(mut self, host: &str, uid: &str, title: &str, model: serde_json::Value) -> Self {
        let hit = DashboardHit {
            uid: uid.into(),
            title: title.into(),
            url: format!("/d/{uid}/{}", title.to_lowercase().replace(' ', "-")),
            folder_title: None,
            kind: Some("dash-db".into()),
        };
        self.dashboards
            .entry(host.trim_end_matches('/').to_string())
            .or_default()
            .push(FakeDashboard { hit, model });
        self
    }

    /// Answer renders of `panel_id` on `host` with `status`
    pub fn failing_panel(mut self, host: &str, panel_id: u64, status: u16) -> Self {
        self.failing
            .insert((host.trim_end_matches('/').to_string(), panel_id), status);
        self
    }

    pub fn with_content_type(mut self, content_type: Option<&str>) -> Self {
        self.content_type = content_type.map(str::to_string);
        self
    }

    pub fn renders(&self) -> Vec<RenderCall> {
        self.renders.lock().unwrap().clone()
    }

    pub fn snapshot_requests(&self) -> Vec<serde_json::Value> {
        self.snapshots.lock().unwrap().clone()
    }

    fn dashboards_for(&self, source: &SourceSpec) -> &[FakeDashboard] {
        self.dashboards
            .get(&source.host)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

#[async_trait]
impl MonitoringClient for FakeMonitoringClient {
    async fn search_dashboards(
        &self,
        source: &SourceSpec,
        query: &str,
    ) -> Result<Vec<DashboardHit>, ClientError> {
        Ok(self
            .dashboards_for(source)
            .iter()
            .filter(|d| d.hit.title.contains(query))
            .map(|d| d.hit.clone())
            .collect())
    }

    async fn dashboard_model(
        &self,
        source: &SourceSpec,
        uid: &str,
    ) -> Result<serde_json::Value, ClientError> {
        self.dashboards_for(source)
            .iter()
            .find(|d| d.hit.uid == uid)
            .map(|d| d.model.clone())
            .ok_or_else(|| ClientError::Status {
                status: 404,
                message: format!("dashboard {uid} not found"),
            })
    }

    async fn render_panel(
        &self,
        source: &SourceSpec,
        path: &str,
        params: &[(String, String)],
    ) -> Result<RenderedImage, ClientError> {
        let call = RenderCall {
            source: source.name.clone(),
            path: path.to_string(),
            params: params.to_vec(),
        };
        let panel_id: u64 = call.param("panelId").and_then(|p| p.parse().ok()).unwrap_or(0);
        let label = format!(
            "{}|{}|{}|{}",
            source.name,
            panel_id,
            call.param("from").unwrap_or_default(),
            call.param("to").unwrap_or_default()
        );
        self.renders.lock().unwrap().push(call);

        if let Some(status) = self.failing.get(&(source.host.clone(), panel_id)) {
            return Err(ClientError::Status {
                status: *status,
                message: "rejected".into(),
            });
        }
        Ok(RenderedImage {
            content_type: self.content_type.clone(),
            bytes: png_bytes(&label),
        })
    }

    async fn create_snapshot(
        &self,
        source: &SourceSpec,
        body: &serde_json::Value,
    ) -> Result<SnapshotInfo, ClientError> {
        let mut snapshots = self.snapshots.lock().unwrap();
        snapshots.push(body.clone());
        let key = format!("snap{}", snapshots.len());
        Ok(SnapshotInfo {
            url: format!("{}/dashboard/snapshot/{key}", source.host),
            key,
        })
    }

    async fn snapshot(
        &self,
        _source: &SourceSpec,
        key: &str,
    ) -> Result<serde_json::Value, ClientError> {
        Ok(serde_json::json!({ "meta": { "key": key } }))
    }
}
