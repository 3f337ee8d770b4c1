//! Run record (`run.yaml`)
//!
//! The record keeps what the directory tree alone cannot: declaration order
//! of sources, windows and panels, display titles, links, snapshot URLs and
//! failure reasons. A run folder without a record can still be republished;
//! [`RunRecord::absorb`] fills the gaps from the tree in lexicographic order.

use panelwiki_artifact::{sanitize_component, ArtifactKey, CaptureFailure, Manifest};
use panelwiki_capture::{DashboardRef, PanelRef};
use panelwiki_config::TimeWindow;
use panelwiki_document::{PanelPlan, SourcePlan};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// File name of the record at the run root
pub const RUN_RECORD_FILE: &str = "run.yaml";

/// Description of one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    /// Run identifier
    #[serde(default)]
    pub test_id: String,
    /// Start time (RFC 3339)
    #[serde(default)]
    pub started: Option<String>,
    /// Sources in configuration order
    #[serde(default)]
    pub sources: Vec<SourceRecord>,
    /// Windows in command line order
    #[serde(default)]
    pub windows: Vec<TimeWindow>,
    /// Failed captures
    #[serde(default)]
    pub failures: Vec<FailureRecord>,
}

/// One source of a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRecord {
    /// Source name
    pub name: String,
    /// Resolved dashboard
    #[serde(default)]
    pub dashboard: Option<DashboardRef>,
    /// Panels in dashboard order
    #[serde(default)]
    pub panels: Vec<PanelRecord>,
    /// Dashboard links keyed by window tag
    #[serde(default)]
    pub links: BTreeMap<String, String>,
    /// Snapshot URLs keyed by window tag
    #[serde(default)]
    pub snapshots: BTreeMap<String, String>,
    /// Enumeration failure
    #[serde(default)]
    pub failure: Option<String>,
}

/// One panel of a source
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelRecord {
    /// Panel id; `None` when recovered from the tree
    #[serde(default)]
    pub id: Option<u64>,
    /// Display title
    pub title: String,
    /// File stem
    pub stem: String,
    /// View links keyed by window tag
    #[serde(default)]
    pub links: BTreeMap<String, String>,
}

/// One failed capture
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    /// Key of the missing image
    pub key: ArtifactKey,
    /// Failure reason
    pub reason: String,
    /// Failure detail
    pub message: String,
}

impl SourceRecord {
    /// Empty record for a source
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    fn panel_mut(&mut self, stem: &str) -> Option<&mut PanelRecord> {
        self.panels.iter_mut().find(|p| p.stem == stem)
    }
}

impl From<&PanelRef> for PanelRecord {
    fn from(panel: &PanelRef) -> Self {
        Self {
            id: Some(panel.id),
            title: panel.title.clone(),
            stem: panel.stem.clone(),
            links: BTreeMap::new(),
        }
    }
}

impl RunRecord {
    /// Empty record for a run
    #[must_use]
    pub fn new(test_id: impl Into<String>, started: Option<String>) -> Self {
        Self {
            test_id: test_id.into(),
            started,
            ..Self::default()
        }
    }

    /// Decode a record
    ///
    /// # Errors
    /// Returns the YAML error for malformed input.
    pub fn from_yaml(raw: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(raw)
    }

    /// Encode the record
    ///
    /// # Errors
    /// Returns the YAML error if encoding fails.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    /// Record every failure of `manifest`, replacing earlier entries
    pub fn record_failures(&mut self, manifest: &Manifest) {
        self.failures = manifest
            .failures()
            .map(|(key, failure)| FailureRecord {
                key: key.clone(),
                reason: failure.reason.clone(),
                message: failure.message.clone(),
            })
            .collect();
    }

    /// Restore recorded failures into a manifest rebuilt from disk
    ///
    /// Keys that have an image on disk keep the image.
    pub fn restore_failures(&self, manifest: &mut Manifest) {
        for failure in &self.failures {
            if manifest.get(&failure.key).is_none() {
                manifest.record_failure(
                    failure.key.clone(),
                    CaptureFailure::new(failure.reason.clone(), failure.message.clone()),
                );
            }
        }
    }

    /// Add sources, windows and panels present in `manifest` but unknown to
    /// the record
    ///
    /// Additions are appended in lexicographic order, so a record built from
    /// nothing lists everything lexicographically.
    pub fn absorb(&mut self, manifest: &Manifest) {
        let tags: BTreeSet<&str> = manifest.artifacts().map(|a| a.key().window()).collect();
        for tag in tags {
            if self.windows.iter().any(|w| sanitize_component(&w.tag) == tag) {
                continue;
            }
            self.windows.push(TimeWindow {
                tag: tag.to_string(),
                index: self.windows.len(),
                start_ms: 0,
                end_ms: 0,
                start_human: String::new(),
                end_human: String::new(),
            });
        }

        let panels: BTreeSet<(&str, &str)> = manifest
            .artifacts()
            .map(|a| (a.key().source(), a.key().panel()))
            .collect();
        for (name, stem) in panels {
            let source = match self
                .sources
                .iter()
                .position(|s| sanitize_component(&s.name) == name)
            {
                Some(i) => &mut self.sources[i],
                None => {
                    self.sources.push(SourceRecord::new(name));
                    let last = self.sources.len() - 1;
                    &mut self.sources[last]
                }
            };
            if source.panel_mut(stem).is_none() {
                source.panels.push(PanelRecord {
                    id: None,
                    title: stem.to_string(),
                    stem: stem.to_string(),
                    links: BTreeMap::new(),
                });
            }
        }
    }

    /// Merge a later run into this one
    ///
    /// Sources keep their first-seen position. Within a source, later
    /// panels, links and snapshots are added or replace earlier ones; an
    /// enumeration failure survives only if no run resolved the source.
    /// Windows are keyed by tag and later windows replace earlier bounds.
    pub fn merge(&mut self, later: RunRecord) {
        for incoming in later.sources {
            let Some(existing) = self.sources.iter_mut().find(|s| s.name == incoming.name) else {
                self.sources.push(incoming);
                continue;
            };
            match incoming.failure {
                None => existing.failure = None,
                Some(message) if existing.failure.is_some() => existing.failure = Some(message),
                Some(_) => {}
            }
            if incoming.dashboard.is_some() {
                existing.dashboard = incoming.dashboard;
            }
            for panel in incoming.panels {
                match existing.panel_mut(&panel.stem) {
                    Some(current) => {
                        current.id = panel.id.or(current.id);
                        current.title = panel.title;
                        current.links.extend(panel.links);
                    }
                    None => existing.panels.push(panel),
                }
            }
            existing.links.extend(incoming.links);
            existing.snapshots.extend(incoming.snapshots);
        }

        for window in later.windows {
            match self.windows.iter_mut().find(|w| w.tag == window.tag) {
                Some(current) => {
                    let index = current.index;
                    *current = TimeWindow { index, ..window };
                }
                None => {
                    let index = self.windows.len();
                    self.windows.push(TimeWindow { index, ..window });
                }
            }
        }

        for failure in later.failures {
            self.failures.retain(|f| f.key != failure.key);
            self.failures.push(failure);
        }
    }

    /// Plans for the document composer, in record order
    #[must_use]
    pub fn source_plans(&self) -> Vec<SourcePlan> {
        self.sources
            .iter()
            .map(|source| SourcePlan {
                name: source.name.clone(),
                panels: source
                    .panels
                    .iter()
                    .map(|panel| PanelPlan {
                        title: panel.title.clone(),
                        stem: panel.stem.clone(),
                        links: panel.links.clone(),
                    })
                    .collect(),
                links: source.links.clone(),
                failure: source.failure.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use panelwiki_artifact::{Artifact, ContentHash};
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    fn stored(source: &str, window: &str, stem: &str) -> Artifact {
        let key = ArtifactKey::new(source, window, stem);
        Artifact::new(
            key.clone(),
            PathBuf::from("/run").join(key.relative_path()),
            ContentHash::compute(stem.as_bytes()),
            1,
        )
    }

    fn window(tag: &str, index: usize, start_ms: i64) -> TimeWindow {
        TimeWindow {
            tag: tag.into(),
            index,
            start_ms,
            end_ms: start_ms + 1000,
            start_human: "s".into(),
            end_human: "e".into(),
        }
    }

    fn panel(stem: &str) -> PanelRecord {
        PanelRecord {
            id: Some(1),
            title: stem.to_uppercase(),
            stem: stem.into(),
            links: BTreeMap::new(),
        }
    }

    #[test]
    fn yaml_round_trip() {
        let mut record = RunRecord::new("42", Some("2024-01-01T00:00:00+00:00".into()));
        let mut source = SourceRecord::new("prod");
        source.panels.push(panel("cpu"));
        source.links.insert("w1".into(), "http://g/d/x?from=1".into());
        record.sources.push(source);
        record.windows.push(window("w1", 0, 1000));
        record.failures.push(FailureRecord {
            key: ArtifactKey::new("prod", "w1", "cpu"),
            reason: "auth".into(),
            message: "HTTP 401".into(),
        });

        let yaml = record.to_yaml().unwrap();
        assert_eq!(RunRecord::from_yaml(&yaml).unwrap(), record);
    }

    #[test]
    fn absorb_builds_lexicographic_record() {
        let mut manifest = Manifest::new();
        manifest.insert(stored("b", "w2", "y"));
        manifest.insert(stored("a", "w2", "x"));
        manifest.insert(stored("a", "w1", "z"));

        let mut record = RunRecord::default();
        record.absorb(&manifest);

        let names: Vec<_> = record.sources.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        let tags: Vec<_> = record.windows.iter().map(|w| w.tag.as_str()).collect();
        assert_eq!(tags, vec!["w1", "w2"]);
        let stems: Vec<_> = record.sources[0].panels.iter().map(|p| p.stem.as_str()).collect();
        assert_eq!(stems, vec!["x", "z"]);
        assert!(record.windows[0].start_human.is_empty());
    }

    #[test]
    fn absorb_keeps_recorded_order() {
        let mut record = RunRecord::default();
        let mut source = SourceRecord::new("a/b");
        source.panels.push(panel("z"));
        record.sources.push(source);
        record.windows.push(window("late", 0, 5000));

        let mut manifest = Manifest::new();
        manifest.insert(stored("a/b", "late", "z"));
        manifest.insert(stored("a/b", "late", "m"));
        record.absorb(&manifest);

        assert_eq!(record.sources.len(), 1);
        assert_eq!(record.windows.len(), 1);
        let stems: Vec<_> = record.sources[0].panels.iter().map(|p| p.stem.as_str()).collect();
        assert_eq!(stems, vec!["z", "m"]);
    }

    #[test]
    fn failures_do_not_shadow_images() {
        let mut record = RunRecord::default();
        record.failures.push(FailureRecord {
            key: ArtifactKey::new("a", "w", "p1"),
            reason: "timeout".into(),
            message: "slow".into(),
        });
        record.failures.push(FailureRecord {
            key: ArtifactKey::new("a", "w", "p2"),
            reason: "auth".into(),
            message: "401".into(),
        });
        let mut manifest = Manifest::new();
        manifest.insert(stored("a", "w", "p1"));

        record.restore_failures(&mut manifest);
        assert!(manifest.get(&ArtifactKey::new("a", "w", "p1")).is_some());
        assert_eq!(
            manifest.failure(&ArtifactKey::new("a", "w", "p2")).unwrap().reason,
            "auth"
        );
    }

    #[test]
    fn merge_keeps_first_positions() {
        let mut first = RunRecord::default();
        let mut a = SourceRecord::new("a");
        a.panels.push(panel("p"));
        first.sources.push(a);
        let mut b = SourceRecord::new("b");
        b.failure = Some("not found".into());
        first.sources.push(b);
        first.windows.push(window("w1", 0, 1000));
        first.windows.push(window("w2", 1, 2000));

        let mut second = RunRecord::default();
        let mut b = SourceRecord::new("b");
        b.panels.push(panel("q"));
        second.sources.push(b);
        let mut c = SourceRecord::new("c");
        c.panels.push(panel("r"));
        second.sources.push(c);
        second.windows.push(window("w2", 0, 9000));
        second.windows.push(window("w3", 1, 3000));

        first.merge(second);

        let names: Vec<_> = first.sources.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(first.sources[1].failure, None);
        assert_eq!(first.sources[1].panels[0].stem, "q");

        let tags: Vec<_> = first.windows.iter().map(|w| (w.tag.as_str(), w.index, w.start_ms)).collect();
        assert_eq!(tags, vec![("w1", 0, 1000), ("w2", 1, 9000), ("w3", 2, 3000)]);
    }

    #[test]
    fn plans_follow_record() {
        let mut record = RunRecord::default();
        let mut source = SourceRecord::new("prod");
        let mut cpu = panel("cpu");
        cpu.links.insert("w".into(), "http://g/view".into());
        source.panels.push(cpu);
        record.sources.push(source);

        let plans = record.source_plans();
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].panels[0].title, "CPU");
        assert_eq!(plans[0].panels[0].links.get("w").map(String::as_str), Some("http://g/view"));
    }
}
