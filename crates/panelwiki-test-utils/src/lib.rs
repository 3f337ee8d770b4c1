//! Testing utilities for panelwiki workspace
//!
//! In-memory fakes of every boundary trait plus fixture builders.

#![allow(missing_docs)]

mod browser;
mod monitoring;
mod wiki;

pub use browser::{BrowserEvent, FakeBrowser, LoginBehaviour};
pub use monitoring::{FakeDashboard, FakeMonitoringClient, RenderCall};
pub use wiki::RecordingWiki;

use panelwiki_config::{AcquisitionMode, AuthMode, Secret, SourceSpec, TimeWindow};
use std::time::Duration;

/// PNG signature followed by a payload unique to the inputs
pub fn png_bytes(label: &str) -> Vec<u8> {
    let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];
    bytes.extend_from_slice(label.as_bytes());
    bytes
}

/// Render-mode source without auth and with short timeouts
pub fn render_source(name: &str, host: &str, dash_title: &str) -> SourceSpec {
    let mut source = SourceSpec::new(name, dash_title, host);
    source.timeout = Duration::from_millis(500);
    source.driver_preload = Duration::ZERO;
    source
}

/// Screenshot-mode source with basic auth
pub fn screenshot_source(name: &str, host: &str, dash_title: &str) -> SourceSpec {
    let mut source = render_source(name, host, dash_title);
    source.mode = AcquisitionMode::Screenshot;
    source.auth = AuthMode::Basic {
        login: "viewer".into(),
        password: Secret::new("viewer-pw"),
    };
    source
}

/// Window with fixed bounds derived from its position
pub fn window(tag: &str, index: usize) -> TimeWindow {
    let start_ms = 1_700_000_000_000 + i64::try_from(index).unwrap() * 3_600_000;
    TimeWindow {
        tag: tag.to_string(),
        index,
        start_ms,
        end_ms: start_ms + 3_600_000,
        start_human: format!("start-{index}"),
        end_human: format!("end-{index}"),
    }
}

/// Dashboard model with flat panels `(id, title)`
pub fn dashboard_model(panels: &[(u64, &str)]) -> serde_json::Value {
    let panels: Vec<serde_json::Value> = panels
        .iter()
        .map(|(id, title)| serde_json::json!({"id": id, "type": "timeseries", "title": title}))
        .collect();
    serde_json::json!({ "panels": panels })
}
