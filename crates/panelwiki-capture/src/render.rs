//! Render-API strategy

use crate::client::MonitoringClient;
use crate::enumerate::{DashboardRef, PanelRef};
use crate::error::AcquisitionError;
use crate::query::PanelQuery;
use crate::strategy::{CaptureStrategy, StrategyKind};
use panelwiki_config::{SourceSpec, TimeWindow};
use std::sync::Arc;

/// Fetches panels from the server's `/render/d-solo` endpoint
pub struct RenderApiStrategy {
    client: Arc<dyn MonitoringClient>,
}

impl RenderApiStrategy {
    /// Create a strategy over a monitoring client
    #[must_use]
    pub fn new(client: Arc<dyn MonitoringClient>) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl CaptureStrategy for RenderApiStrategy {
    async fn capture(
        &self,
        source: &SourceSpec,
        dashboard: &DashboardRef,
        panel: &PanelRef,
        window: &TimeWindow,
    ) -> Result<Vec<u8>, AcquisitionError> {
        let query = PanelQuery::new(source, dashboard, window);
        let image = self
            .client
            .render_panel(source, &query.render_path(), &query.render_params(panel.id))
            .await?;

        match image.content_type.as_deref() {
            Some(ct) if ct.starts_with("image/") => {}
            Some(ct) => {
                return Err(AcquisitionError::http_status(
                    None,
                    format!("expected an image, got '{ct}'"),
                ))
            }
            None => {
                return Err(AcquisitionError::http_status(
                    None,
                    "response has no content type",
                ))
            }
        }
        if image.bytes.is_empty() {
            return Err(AcquisitionError::http_status(None, "empty image body"));
        }
        Ok(image.bytes)
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::RenderApi
    }
}
