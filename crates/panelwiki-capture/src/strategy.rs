//! Capture strategy trait and selection
//!
//! A [`CaptureStrategy`] turns one `(source, dashboard, panel, window)` into
//! image bytes. The strategy is chosen statically per source; a failed
//! capture is never retried with the other strategy.

use crate::enumerate::{DashboardRef, PanelRef};
use crate::error::AcquisitionError;
use panelwiki_config::{AcquisitionMode, SourceSpec, TimeWindow};
use std::fmt;
use std::sync::Arc;

/// Strategy kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    /// Server-side render endpoint
    RenderApi,
    /// Headless browser element screenshot
    Screenshot,
}

impl StrategyKind {
    /// Kind for an acquisition mode
    #[inline]
    #[must_use]
    pub fn for_mode(mode: AcquisitionMode) -> Self {
        match mode {
            AcquisitionMode::Render => Self::RenderApi,
            AcquisitionMode::Screenshot => Self::Screenshot,
        }
    }

    /// Strategy name (for logs)
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::RenderApi => "render-api",
            Self::Screenshot => "screenshot",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Acquires one panel image
#[async_trait::async_trait]
pub trait CaptureStrategy: Send + Sync {
    /// Capture a panel for a window
    ///
    /// # Errors
    /// Returns [`AcquisitionError`]; the caller records it and continues.
    async fn capture(
        &self,
        source: &SourceSpec,
        dashboard: &DashboardRef,
        panel: &PanelRef,
        window: &TimeWindow,
    ) -> Result<Vec<u8>, AcquisitionError>;

    /// Which strategy this is
    fn kind(&self) -> StrategyKind;

    /// Release held resources (browser sessions); idempotent
    async fn release(&self) {}
}

/// Chooses the strategy for each source
#[derive(Clone)]
pub struct StrategySelector {
    render: Arc<dyn CaptureStrategy>,
    screenshot: Arc<dyn CaptureStrategy>,
}

impl fmt::Debug for StrategySelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrategySelector")
            .field("render", &self.render.kind())
            .field("screenshot", &self.screenshot.kind())
            .finish()
    }
}

impl StrategySelector {
    /// Create a selector from the two implementations
    #[must_use]
    pub fn new(render: Arc<dyn CaptureStrategy>, screenshot: Arc<dyn CaptureStrategy>) -> Self {
        Self { render, screenshot }
    }

    /// Screenshot iff `render: false`, otherwise the render endpoint
    #[must_use]
    pub fn select(&self, source: &SourceSpec) -> &Arc<dyn CaptureStrategy> {
        match StrategyKind::for_mode(source.mode) {
            StrategyKind::RenderApi => &self.render,
            StrategyKind::Screenshot => &self.screenshot,
        }
    }

    /// Release both strategies
    pub async fn release(&self) {
        self.render.release().await;
        self.screenshot.release().await;
    }
}
