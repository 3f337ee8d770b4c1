//! panelwiki artifact store
//!
//! Captured panel images live on disk under a run folder, addressed by an
//! [`ArtifactKey`] of `(source, window, panel)`. The store never keeps image
//! bytes in memory beyond a single save or read.
//!
//! # Core Concepts
//!
//! - [`ArtifactKey`]: sanitised `(source, window, panel)` address
//! - [`Artifact`]: reference to one stored image with its [`ContentHash`]
//! - [`Manifest`]: per-run index of stored images and capture failures
//! - [`ArtifactStore`]: filesystem layout, reload and multi-run merge

#![warn(unreachable_pub)]

mod artifact;
mod hash;
mod key;
mod sanitize;
mod store;

pub use artifact::{Artifact, CaptureFailure, Manifest, ManifestEntry};
pub use hash::ContentHash;
pub use key::{ArtifactKey, IMAGE_EXTENSION, KEY_SEPARATOR};
pub use sanitize::{is_safe_component, sanitize_component, StemAllocator, REPLACEMENT};
pub use store::{ArtifactStore, StoreError};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
