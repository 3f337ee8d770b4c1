//! panelwiki capture
//!
//! Resolves dashboards to panels and acquires one image per
//! `(source, window, panel)`.
//!
//! # Core Concepts
//!
//! - [`MonitoringClient`]: boundary to the dashboard server
//! - [`enumerate`]: dashboard title to ordered [`PanelRef`]s
//! - [`CaptureStrategy`]: [`RenderApiStrategy`] or [`ScreenshotStrategy`],
//!   chosen per source by [`StrategySelector`]
//! - [`BrowserDriver`]: boundary to a headless browser
//!
//! Failures are returned as [`AcquisitionError`] and never retried.

#![warn(unreachable_pub)]

mod browser;
mod client;
mod enumerate;
mod error;
mod query;
mod render;
mod screenshot;
mod snapshot;
mod strategy;

pub use browser::{BrowserDriver, BrowserOptions, BrowserSession, ElementId, WebDriverClient};
pub use client::{DashboardHit, HttpMonitoringClient, MonitoringClient, RenderedImage, SnapshotInfo};
pub use enumerate::{
    enumerate, flatten_panels, DashboardRef, PanelRef, ResolvedDashboard, DEFAULT_PANEL_TITLE,
    GENERAL_FOLDER,
};
pub use error::{AcquisitionError, AcquisitionReason, ClientError, EnumerationError};
pub use query::PanelQuery;
pub use render::RenderApiStrategy;
pub use screenshot::{AuthContext, LoginState, ScreenshotStrategy, POLL_INTERVAL};
pub use snapshot::{snapshot_name, take_snapshot, Snapshot};
pub use strategy::{CaptureStrategy, StrategyKind, StrategySelector};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
