//! panelwiki publish
//!
//! Renders a report [`Document`](panelwiki_document::Document) into
//! Confluence storage format and publishes it, with its images, through a
//! [`WikiClient`].

#![warn(unreachable_pub)]

mod client;
mod error;
mod publisher;
mod render;

pub use client::{Attachment, ConfluenceClient, WikiClient, WikiPage};
pub use error::{PublishError, WikiError};
pub use publisher::{PublishReport, Publisher, GRAPHS_MARKER};
pub use render::{escape, StorageRenderer};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
