//! Dashboard snapshots
//!
//! A snapshot freezes the dashboard for one window on the server. Its JSON
//! is kept next to the captured images as a backup.

use crate::client::{MonitoringClient, SnapshotInfo};
use crate::enumerate::DashboardRef;
use crate::error::ClientError;
use chrono::{DateTime, SecondsFormat};
use panelwiki_config::{SourceSpec, TimeWindow};
use serde_json::{json, Value};

/// A created snapshot and its JSON
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Snapshot key and URL
    pub info: SnapshotInfo,
    /// Snapshot document as returned by the server
    pub json: Value,
}

/// Snapshot name and JSON file stem: `{source}__{tag}`
#[must_use]
pub fn snapshot_name(source: &SourceSpec, window: &TimeWindow) -> String {
    format!("{}__{}", source.name, window.tag)
}

fn iso(ms: i64) -> Result<String, ClientError> {
    DateTime::from_timestamp_millis(ms)
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
        .ok_or_else(|| ClientError::Decode(format!("epoch {ms} out of range")))
}

/// Create a never-expiring snapshot of the dashboard for one window
///
/// # Errors
/// Returns [`ClientError`] if the model cannot be fetched, the snapshot
/// cannot be created, or its JSON cannot be read back.
pub async fn take_snapshot(
    client: &dyn MonitoringClient,
    source: &SourceSpec,
    dashboard: &DashboardRef,
    window: &TimeWindow,
) -> Result<Snapshot, ClientError> {
    let mut model = client.dashboard_model(source, &dashboard.uid).await?;
    if let Some(obj) = model.as_object_mut() {
        obj.insert(
            "time".to_string(),
            json!({"from": iso(window.start_ms)?, "to": iso(window.end_ms)?}),
        );
    }

    let body = json!({
        "dashboard": model,
        "name": snapshot_name(source, window),
        "expires": 0,
    });
    let mut info = client.create_snapshot(source, &body).await?;
    if info.url.is_empty() {
        info.url = format!("{}/dashboard/snapshot/{}", source.host, info.key);
    }
    let json = client.snapshot(source, &info.key).await?;
    tracing::info!("Snapshot of {} for '{}': {}", source.name, window.tag, info.url);
    Ok(Snapshot { info, json })
}
