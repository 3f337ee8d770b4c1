//! Artifact keys
//!
//! An [`ArtifactKey`] addresses one captured image by source, time window
//! and panel stem. Components are canonicalised on construction so a key
//! rebuilt from the directory tree equals the key the image was saved under.

use crate::sanitize::sanitize_component;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::path::PathBuf;

/// File extension of stored panel images
pub const IMAGE_EXTENSION: &str = "png";

/// Joins the components of an attachment name
///
/// Source and window components never contain it, so the name splits back
/// into its key unambiguously.
pub const KEY_SEPARATOR: &str = "__";

/// Key of one artifact: `(source, window, panel)`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ArtifactKey {
    source: String,
    window: String,
    panel: String,
}

impl ArtifactKey {
    /// Create a key, sanitising every component
    #[must_use]
    pub fn new(source: &str, window: &str, panel: &str) -> Self {
        Self {
            source: sanitize_component(source),
            window: sanitize_component(window),
            panel: sanitize_component(panel),
        }
    }

    /// Source component (directory name)
    #[inline]
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Window component (directory name)
    #[inline]
    #[must_use]
    pub fn window(&self) -> &str {
        &self.window
    }

    /// Panel component (file stem)
    #[inline]
    #[must_use]
    pub fn panel(&self) -> &str {
        &self.panel
    }

    /// Path of the image relative to the store root
    #[must_use]
    pub fn relative_path(&self) -> PathBuf {
        PathBuf::from(&self.source)
            .join(&self.window)
            .join(format!("{}.{IMAGE_EXTENSION}", self.panel))
    }

    /// Flat name used when the image is attached to a wiki page
    ///
    /// Attachment names share one namespace per page, so all three
    /// components are folded into the name.
    #[must_use]
    pub fn attachment_name(&self) -> String {
        format!(
            "{}{KEY_SEPARATOR}{}{KEY_SEPARATOR}{}.{IMAGE_EXTENSION}",
            self.source, self.window, self.panel
        )
    }
}

impl Display for ArtifactKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.source, self.window, self.panel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_layout() {
        let key = ArtifactKey::new("prod", "baseline", "CPU");
        assert_eq!(key.relative_path(), PathBuf::from("prod/baseline/CPU.png"));
        assert_eq!(key.attachment_name(), "prod__baseline__CPU.png");
        assert_eq!(key.to_string(), "prod/baseline/CPU");
    }

    #[test]
    fn key_components_are_canonical() {
        let key = ArtifactKey::new("eu/west", "run:1", "rx/tx");
        assert_eq!(key.source(), "eu_west");
        assert_eq!(key.window(), "run_1");
        assert_eq!(key.panel(), "rx_tx");
        assert_eq!(key, ArtifactKey::new("eu_west", "run_1", "rx_tx"));
    }

    #[test]
    fn keys_order_by_source_window_panel() {
        let mut keys = vec![
            ArtifactKey::new("b", "w", "p"),
            ArtifactKey::new("a", "w2", "p"),
            ArtifactKey::new("a", "w1", "z"),
        ];
        keys.sort();
        assert_eq!(keys[0].to_string(), "a/w1/z");
        assert_eq!(keys[2].to_string(), "b/w/p");
    }
}
