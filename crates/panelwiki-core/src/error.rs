//! Error types for the pipeline driver
//!
//! Per-key capture failures and per-source enumeration failures are recorded
//! in the run and never surface here. Everything in [`PipelineError`] stops
//! the run.

use panelwiki_artifact::StoreError;
use panelwiki_config::ConfigError;
use panelwiki_publish::PublishError;
use std::path::PathBuf;

/// Main pipeline error type
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Source configuration is invalid
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Artifact tree could not be read or written
    #[error("artifact store error: {0}")]
    Store(#[from] StoreError),

    /// Publishing to the wiki failed
    #[error("publish failed: {0}")]
    Publish(#[from] PublishError),

    /// `run.yaml` could not be encoded or decoded
    #[error("run record {path}: {source}")]
    Record {
        /// Run folder the record belongs to
        path: PathBuf,
        /// Underlying error
        #[source]
        source: serde_yaml::Error,
    },

    /// Snapshot could not be taken or stored
    #[error("snapshot {name} failed: {message}")]
    Snapshot {
        /// Snapshot name (`{source}__{tag}`)
        name: String,
        /// Failure detail
        message: String,
    },

    /// A publish was requested but no wiki target is configured
    #[error("no wiki target configured")]
    NoWikiTarget,

    /// A publish was requested but the pipeline has no publisher
    #[error("pipeline has no publisher")]
    NoPublisher,
}

impl PipelineError {
    /// Whether the error was raised before any artifact was written
    #[inline]
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Config(_) | Self::NoWikiTarget | Self::NoPublisher)
    }
}
