//! Panel enumeration
//!
//! Resolves a source's dashboard by title and flattens its panel tree into
//! the ordered list of panels to capture.

use crate::client::{DashboardHit, MonitoringClient};
use crate::error::EnumerationError;
use panelwiki_artifact::StemAllocator;
use panelwiki_config::SourceSpec;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Folder title Grafana reports for dashboards outside any folder
pub const GENERAL_FOLDER: &str = "General";

/// Title of panels that carry none
pub const DEFAULT_PANEL_TITLE: &str = "Row";

/// Search hit type of folders
const FOLDER_HIT: &str = "dash-folder";

/// Identity of the resolved dashboard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardRef {
    /// Dashboard uid
    pub uid: String,
    /// Dashboard path, `/d/{uid}/{slug}`
    pub url: String,
    /// Dashboard title
    pub title: String,
    /// Folder title
    pub folder: String,
}

/// One panel to capture
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelRef {
    /// Panel id within the dashboard
    pub id: u64,
    /// Display title
    pub title: String,
    /// Panel type (`timeseries`, `stat`, ...)
    pub kind: String,
    /// Collision-free file stem
    pub stem: String,
}

/// A dashboard with its panels in declared order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedDashboard {
    /// Dashboard identity
    pub dashboard: DashboardRef,
    /// Panels, depth-first
    pub panels: Vec<PanelRef>,
}

/// Resolve the source's dashboard and list its panels
///
/// # Errors
/// Returns [`EnumerationError::DashboardNotFound`] when no exact title match
/// exists (in the configured folder), [`EnumerationError::AmbiguousDashboard`]
/// when several match and no folder is configured, or
/// [`EnumerationError::Client`] on transport failure.
pub async fn enumerate(
    client: &dyn MonitoringClient,
    source: &SourceSpec,
) -> Result<ResolvedDashboard, EnumerationError> {
    let hits = client.search_dashboards(source, &source.dash_title).await?;
    let hit = select_hit(source, hits)?;
    let dashboard = DashboardRef {
        folder: hit
            .folder_title
            .clone()
            .unwrap_or_else(|| GENERAL_FOLDER.to_string()),
        uid: hit.uid,
        url: hit.url,
        title: hit.title,
    };
    tracing::debug!("Resolved '{}' to uid {}", dashboard.title, dashboard.uid);

    let model = client.dashboard_model(source, &dashboard.uid).await?;
    let panels = flatten_panels(&model).map_err(|message| EnumerationError::MalformedModel {
        title: dashboard.title.clone(),
        message,
    })?;
    tracing::info!(
        "Dashboard '{}' on {}: {} panels",
        dashboard.title,
        source.name,
        panels.len()
    );

    Ok(ResolvedDashboard { dashboard, panels })
}

fn select_hit(source: &SourceSpec, hits: Vec<DashboardHit>) -> Result<DashboardHit, EnumerationError> {
    let mut matches: Vec<DashboardHit> = hits
        .into_iter()
        .filter(|h| h.title == source.dash_title)
        .filter(|h| h.kind.as_deref() != Some(FOLDER_HIT))
        .filter(|h| match &source.folder {
            Some(folder) => h.folder_title.as_deref().unwrap_or(GENERAL_FOLDER) == folder,
            None => true,
        })
        .collect();

    match matches.len() {
        0 => Err(EnumerationError::DashboardNotFound {
            title: source.dash_title.clone(),
            host: source.host.clone(),
        }),
        1 => Ok(matches.remove(0)),
        _ if source.folder.is_some() => {
            tracing::warn!(
                "{} dashboards titled '{}' in one folder; using the first",
                matches.len(),
                source.dash_title
            );
            Ok(matches.remove(0))
        }
        _ => Err(EnumerationError::AmbiguousDashboard {
            title: source.dash_title.clone(),
            folders: matches
                .iter()
                .map(|h| h.folder_title.clone().unwrap_or_else(|| GENERAL_FOLDER.to_string()))
                .collect(),
        }),
    }
}

/// Flatten a dashboard model's panels depth-first
///
/// Containers (anything with a nested `panels` array) contribute their
/// children, never themselves. Stems are allocated in the same order.
///
/// # Errors
/// Returns a message when the model has no `panels` array.
pub fn flatten_panels(model: &Value) -> Result<Vec<PanelRef>, String> {
    let top = model
        .get("panels")
        .and_then(Value::as_array)
        .ok_or_else(|| "missing 'panels' array".to_string())?;

    let mut raw = Vec::new();
    collect(top, &mut raw);

    let mut stems = StemAllocator::new();
    Ok(raw
        .into_iter()
        .filter_map(|panel| {
            let Some(id) = panel.get("id").and_then(Value::as_u64) else {
                tracing::warn!("Skipping panel without numeric id");
                return None;
            };
            let title = panel
                .get("title")
                .and_then(Value::as_str)
                .unwrap_or(DEFAULT_PANEL_TITLE)
                .to_string();
            let kind = panel
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let stem = stems.allocate(&title, id);
            Some(PanelRef {
                id,
                title,
                kind,
                stem,
            })
        })
        .collect())
}

fn collect<'a>(panels: &'a [Value], out: &mut Vec<&'a Value>) {
    for panel in panels {
        match panel.get("panels").and_then(Value::as_array) {
            Some(children) => collect(children, out),
            None => out.push(panel),
        }
    }
}
