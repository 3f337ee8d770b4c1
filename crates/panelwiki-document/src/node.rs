//! Document tree

use panelwiki_artifact::ArtifactKey;
use std::path::PathBuf;

/// Reason recorded when nothing is known about a key
pub const MISSING_REASON: &str = "missing";

/// Reason of a source whose dashboard could not be enumerated
pub const ENUMERATION_REASON: &str = "enumeration";

/// One node of the report
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentNode {
    /// Heading with nested content
    Section {
        /// Heading text
        heading: String,
        /// Secondary line (time range)
        subtitle: Option<String>,
        /// Link attached to the heading
        link: Option<String>,
        /// Nested nodes
        children: Vec<DocumentNode>,
    },
    /// A stored panel image
    Image {
        /// Artifact key
        key: ArtifactKey,
        /// Panel title
        title: String,
        /// Wiki attachment name
        attachment: String,
        /// Image path on disk
        path: PathBuf,
        /// Interactive panel link
        link: Option<String>,
    },
    /// A panel (or source) without an image
    Placeholder {
        /// Key of the missing image; `None` for source-level failures
        key: Option<ArtifactKey>,
        /// Panel or source title
        title: String,
        /// Failure reason (`auth`, `timeout`, `missing`, ...)
        reason: String,
        /// Failure detail
        message: String,
    },
}

impl DocumentNode {
    /// Children of a section; empty for leaves
    #[must_use]
    pub fn children(&self) -> &[DocumentNode] {
        match self {
            Self::Section { children, .. } => children,
            Self::Image { .. } | Self::Placeholder { .. } => &[],
        }
    }
}

/// The composed report
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    /// Top-level nodes, one section per source
    pub nodes: Vec<DocumentNode>,
}

impl Document {
    /// Every node, depth-first in document order
    #[must_use]
    pub fn flatten(&self) -> Vec<&DocumentNode> {
        fn walk<'a>(nodes: &'a [DocumentNode], out: &mut Vec<&'a DocumentNode>) {
            for node in nodes {
                out.push(node);
                walk(node.children(), out);
            }
        }
        let mut out = Vec::new();
        walk(&self.nodes, &mut out);
        out
    }

    /// Image nodes in document order
    pub fn images(&self) -> impl Iterator<Item = &DocumentNode> {
        self.flatten()
            .into_iter()
            .filter(|n| matches!(n, DocumentNode::Image { .. }))
    }
}
