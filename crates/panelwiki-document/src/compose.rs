//! Document composition
//!
//! The tree is a pure function of the declared order (sources, windows,
//! panels) and the manifest. Artifacts are looked up by key, so the order in
//! which captures completed never leaks into the document.

use crate::node::{Document, DocumentNode, ENUMERATION_REASON, MISSING_REASON};
use indexmap::IndexMap;
use panelwiki_artifact::{ArtifactKey, Manifest, ManifestEntry};
use panelwiki_config::TimeWindow;
use std::collections::BTreeMap;

/// One panel as planned for the report
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PanelPlan {
    /// Display title
    pub title: String,
    /// File stem (unique within the source)
    pub stem: String,
    /// View links keyed by window tag
    pub links: BTreeMap<String, String>,
}

/// One source as planned for the report
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourcePlan {
    /// Source name
    pub name: String,
    /// Panels in dashboard order
    pub panels: Vec<PanelPlan>,
    /// Dashboard links keyed by window tag
    pub links: BTreeMap<String, String>,
    /// Enumeration failure, if the dashboard could not be resolved
    pub failure: Option<String>,
}

/// Build the report tree
///
/// Windows sharing a tag share their images on disk; such a tag appears
/// once, at its first position, described by its last window.
#[must_use]
pub fn compose(manifest: &Manifest, sources: &[SourcePlan], windows: &[TimeWindow]) -> Document {
    let mut unique: IndexMap<&str, &TimeWindow> = IndexMap::new();
    for window in windows {
        unique.insert(window.tag.as_str(), window);
    }

    let nodes = sources
        .iter()
        .map(|source| compose_source(manifest, source, unique.values().copied()))
        .collect();
    Document { nodes }
}

fn compose_source<'a>(
    manifest: &Manifest,
    source: &SourcePlan,
    windows: impl Iterator<Item = &'a TimeWindow>,
) -> DocumentNode {
    let children = match &source.failure {
        Some(message) => vec![DocumentNode::Placeholder {
            key: None,
            title: source.name.clone(),
            reason: ENUMERATION_REASON.to_string(),
            message: message.clone(),
        }],
        None => windows
            .map(|window| DocumentNode::Section {
                heading: window.tag.clone(),
                subtitle: (!window.start_human.is_empty()).then(|| window.human_range()),
                link: source.links.get(&window.tag).cloned(),
                children: source
                    .panels
                    .iter()
                    .map(|panel| compose_panel(manifest, &source.name, window, panel))
                    .collect(),
            })
            .collect(),
    };

    DocumentNode::Section {
        heading: source.name.clone(),
        subtitle: None,
        link: None,
        children,
    }
}

fn compose_panel(
    manifest: &Manifest,
    source: &str,
    window: &TimeWindow,
    panel: &PanelPlan,
) -> DocumentNode {
    let key = ArtifactKey::new(source, &window.tag, &panel.stem);
    match manifest.lookup(&key) {
        ManifestEntry::Stored(artifact) => DocumentNode::Image {
            attachment: artifact.attachment_name(),
            path: artifact.path().to_path_buf(),
            key,
            title: panel.title.clone(),
            link: panel.links.get(&window.tag).cloned(),
        },
        ManifestEntry::Failed(failure) => DocumentNode::Placeholder {
            key: Some(key),
            title: panel.title.clone(),
            reason: failure.reason.clone(),
            message: failure.message.clone(),
        },
        ManifestEntry::Missing => {
            tracing::debug!("No record for {}", key);
            DocumentNode::Placeholder {
                key: Some(key),
                title: panel.title.clone(),
                reason: MISSING_REASON.to_string(),
                message: "no image was captured".to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use panelwiki_artifact::{Artifact, CaptureFailure, ContentHash};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use std::path::PathBuf;

    fn window(tag: &str, index: usize) -> TimeWindow {
        TimeWindow {
            tag: tag.into(),
            index,
            start_ms: 1000,
            end_ms: 2000,
            start_human: "a".into(),
            end_human: "b".into(),
        }
    }

    fn panel(stem: &str) -> PanelPlan {
        PanelPlan {
            title: stem.to_uppercase(),
            stem: stem.into(),
            links: BTreeMap::new(),
        }
    }

    fn stored(source: &str, window: &str, stem: &str) -> Artifact {
        let key = ArtifactKey::new(source, window, stem);
        Artifact::new(
            key.clone(),
            PathBuf::from("/run").join(key.relative_path()),
            ContentHash::compute(stem.as_bytes()),
            3,
        )
    }

    fn outline(doc: &Document) -> Vec<String> {
        doc.flatten()
            .into_iter()
            .map(|n| match n {
                DocumentNode::Section { heading, .. } => format!("S:{heading}"),
                DocumentNode::Image { key, .. } => format!("I:{key}"),
                DocumentNode::Placeholder { title, reason, .. } => format!("P:{title}:{reason}"),
            })
            .collect()
    }

    #[test]
    fn missing_artifacts_become_placeholders() {
        let mut manifest = Manifest::new();
        manifest.insert(stored("A", "w1", "p2"));
        manifest.record_failure(
            ArtifactKey::new("A", "w1", "p1"),
            CaptureFailure::new("auth", "HTTP 401"),
        );
        let sources = vec![SourcePlan {
            name: "A".into(),
            panels: vec![panel("p1"), panel("p2"), panel("p3")],
            ..SourcePlan::default()
        }];

        let doc = compose(&manifest, &sources, &[window("w1", 0)]);
        assert_eq!(
            outline(&doc),
            vec!["S:A", "S:w1", "P:P1:auth", "I:A/w1/p2", "P:P3:missing"]
        );
        match &doc.nodes[0].children()[0] {
            DocumentNode::Section { subtitle, .. } => assert_eq!(subtitle.as_deref(), Some("a - b")),
            other => panic!("unexpected node {other:?}"),
        }
    }

    #[test]
    fn enumeration_failure_is_single_placeholder() {
        let sources = vec![SourcePlan {
            name: "B".into(),
            failure: Some("dashboard 'x' not found".into()),
            ..SourcePlan::default()
        }];
        let doc = compose(&Manifest::new(), &sources, &[window("w1", 0), window("w2", 1)]);
        assert_eq!(outline(&doc), vec!["S:B", "P:B:enumeration"]);
    }

    #[test]
    fn duplicate_tags_appear_once() {
        let sources = vec![SourcePlan {
            name: "A".into(),
            panels: vec![panel("p")],
            ..SourcePlan::default()
        }];
        let windows = [window("w", 0), window("x", 1), window("w", 2)];
        let doc = compose(&Manifest::new(), &sources, &windows);
        assert_eq!(
            outline(&doc),
            vec!["S:A", "S:w", "P:P:missing", "S:x", "P:P:missing"]
        );
    }

    proptest! {
        #[test]
        fn insertion_order_does_not_matter(order in Just((0..6usize).collect::<Vec<_>>()).prop_shuffle()) {
            let keys: Vec<(&str, &str, &str)> = vec![
                ("A", "w1", "p1"), ("A", "w1", "p2"), ("A", "w2", "p1"),
                ("A", "w2", "p2"), ("B", "w1", "q"), ("B", "w2", "q"),
            ];
            let mut manifest = Manifest::new();
            for i in order {
                let (s, w, p) = keys[i];
                manifest.insert(stored(s, w, p));
            }
            let sources = vec![
                SourcePlan { name: "A".into(), panels: vec![panel("p1"), panel("p2")], ..SourcePlan::default() },
                SourcePlan { name: "B".into(), panels: vec![panel("q")], ..SourcePlan::default() },
            ];
            let doc = compose(&manifest, &sources, &[window("w1", 0), window("w2", 1)]);
            prop_assert_eq!(outline(&doc), vec![
                "S:A", "S:w1", "I:A/w1/p1", "I:A/w1/p2", "S:w2", "I:A/w2/p1", "I:A/w2/p2",
                "S:B", "S:w1", "I:B/w1/q", "S:w2", "I:B/w2/q",
            ]);
        }
    }
}
