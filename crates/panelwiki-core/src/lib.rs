//! panelwiki core - the report pipeline
//!
//! Drives a run end to end:
//! - loads the source configuration
//! - captures every `(source, window, panel)` sequentially
//! - records the run in `run.yaml`
//! - composes and publishes the report
//!
//! Earlier runs can be republished or merged through the same pipeline.
//!
//! # Example
//!
//! ```rust,ignore
//! use panelwiki_core::ReportPipeline;
//!
//! # async fn example(params: panelwiki_config::RunParameters) -> Result<(), Box<dyn std::error::Error>> {
//! let pipeline = ReportPipeline::new(monitoring, strategies).with_publisher(publisher);
//! let outcome = pipeline.run(&params, chrono::Local::now()).await?;
//!
//! println!("{} images stored", outcome.run.manifest.len());
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod error;
pub mod pipeline;
pub mod record;
pub mod republish;

pub use error::PipelineError;
pub use pipeline::{CompletedRun, ReportPipeline, RunOutcome, ACQUISITION_PARALLELISM};
pub use record::{FailureRecord, PanelRecord, RunRecord, SourceRecord, RUN_RECORD_FILE};
pub use republish::reopen;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
