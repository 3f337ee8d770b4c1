//! panelwiki document
//!
//! Composes the report tree (source, window, panel) from the run manifest.
//! The tree is independent of any wiki markup; rendering happens in the
//! publisher.

#![warn(unreachable_pub)]

mod compose;
mod node;

pub use compose::{compose, PanelPlan, SourcePlan};
pub use node::{Document, DocumentNode, ENUMERATION_REASON, MISSING_REASON};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
