//! Report pipeline
//!
//! Sources → enumerate → windows → panels → strategy → store, strictly
//! sequential, then (unless `only_graphs`) compose and publish.
//!
//! # Workflow
//! 1. Load the source configuration
//! 2. Capture every `(source, window, panel)` into the run folder, recording
//!    failures instead of stopping
//! 3. Write `run.yaml`
//! 4. Compose the document from the manifest and publish it

use crate::error::PipelineError;
use crate::record::{PanelRecord, RunRecord, SourceRecord, RUN_RECORD_FILE};
use crate::republish;
use chrono::{DateTime, Local};
use indexmap::IndexMap;
use panelwiki_artifact::{sanitize_component, ArtifactKey, ArtifactStore, CaptureFailure, Manifest};
use panelwiki_capture::{
    enumerate, snapshot_name, take_snapshot, MonitoringClient, PanelQuery, ResolvedDashboard,
    StrategySelector,
};
use panelwiki_config::{RunMode, RunParameters, SourceSpec, TimeWindow};
use panelwiki_document::{compose, Document};
use panelwiki_publish::{PublishReport, Publisher};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Number of captures in flight at once
///
/// Parallel capture proved unreliable against real servers and browsers and
/// is disabled; `threads` settings are reported but never spawn workers.
pub const ACQUISITION_PARALLELISM: usize = 1;

/// A run folder with its manifest and record
#[derive(Debug, Clone)]
pub struct CompletedRun {
    /// Store rooted at the run folder
    pub store: ArtifactStore,
    /// Stored images and failures
    pub manifest: Manifest,
    /// Declaration order, links and failure reasons
    pub record: RunRecord,
}

impl CompletedRun {
    /// Compose the report tree
    #[must_use]
    pub fn document(&self) -> Document {
        compose(
            &self.manifest,
            &self.record.source_plans(),
            &self.record.windows,
        )
    }

    /// Persist the record as `run.yaml`
    ///
    /// # Errors
    /// Returns [`PipelineError::Record`] or [`PipelineError::Store`].
    pub async fn write_record(&self) -> Result<(), PipelineError> {
        let yaml = self.record.to_yaml().map_err(|source| PipelineError::Record {
            path: self.store.root().to_path_buf(),
            source,
        })?;
        self.store.write_file(RUN_RECORD_FILE, yaml.as_bytes()).await?;
        Ok(())
    }
}

/// What a run did
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// The run folder
    pub run: CompletedRun,
    /// Publish result; `None` with `only_graphs`
    pub published: Option<PublishReport>,
}

/// Drives capture and publication
pub struct ReportPipeline {
    monitoring: Arc<dyn MonitoringClient>,
    strategies: StrategySelector,
    publisher: Option<Publisher>,
}

impl fmt::Debug for ReportPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReportPipeline")
            .field("strategies", &self.strategies)
            .field("publisher", &self.publisher.is_some())
            .finish_non_exhaustive()
    }
}

impl ReportPipeline {
    /// Create a capture-only pipeline
    #[must_use]
    pub fn new(monitoring: Arc<dyn MonitoringClient>, strategies: StrategySelector) -> Self {
        Self {
            monitoring,
            strategies,
            publisher: None,
        }
    }

    /// Attach a publisher
    #[must_use]
    pub fn with_publisher(mut self, publisher: Publisher) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// Execute a validated run
    ///
    /// # Errors
    /// Returns [`PipelineError`] on invalid configuration, store failure or
    /// publish failure. Capture failures are recorded, not returned.
    pub async fn run(
        &self,
        params: &RunParameters,
        started: DateTime<Local>,
    ) -> Result<RunOutcome, PipelineError> {
        if params.threads > ACQUISITION_PARALLELISM {
            tracing::warn!(
                "{} threads requested; captures run with parallelism {}",
                params.threads,
                ACQUISITION_PARALLELISM
            );
        }

        let run = match &params.mode {
            RunMode::Capture { config, windows } => {
                let sources = panelwiki_config::load(config, params.credentials.as_ref())?;
                let store = ArtifactStore::create(params.run_folder(started)).await?;
                let record = RunRecord::new(params.test_id.clone(), Some(started.to_rfc3339()));
                self.capture(&sources, windows, store, record).await?
            }
            RunMode::Republish { folders } => {
                republish::reopen(folders, &params.run_folder(started)).await?
            }
        };

        if params.only_graphs {
            tracing::info!(
                "Graphs stored in {}; skipping publication",
                run.store.root().display()
            );
            return Ok(RunOutcome {
                run,
                published: None,
            });
        }

        let wiki = params.wiki.as_ref().ok_or(PipelineError::NoWikiTarget)?;
        let report = self.publish(&wiki.page_id, &run).await?;
        Ok(RunOutcome {
            run,
            published: Some(report),
        })
    }

    /// Capture every source into `store` and write the run record
    ///
    /// Strategies are released on every exit path.
    ///
    /// # Errors
    /// Returns [`PipelineError::Store`] or [`PipelineError::Record`]; capture
    /// and enumeration failures are recorded in the returned run.
    pub async fn capture(
        &self,
        sources: &IndexMap<String, SourceSpec>,
        windows: &[TimeWindow],
        store: ArtifactStore,
        mut record: RunRecord,
    ) -> Result<CompletedRun, PipelineError> {
        record.windows = windows.to_vec();
        let mut manifest = Manifest::new();

        let result = self
            .capture_sources(sources, windows, &store, &mut record, &mut manifest)
            .await;
        self.strategies.release().await;
        if let Err(e) = result {
            tracing::error!("Capture aborted: {}", e);
            return Err(e);
        }

        record.record_failures(&manifest);
        let run = CompletedRun {
            store,
            manifest,
            record,
        };
        run.write_record().await?;
        tracing::info!(
            "Captured {} images ({} failed) into {}",
            run.manifest.len(),
            run.manifest.failure_count(),
            run.store.root().display()
        );
        Ok(run)
    }

    /// Compose and publish a run
    ///
    /// # Errors
    /// Returns [`PipelineError::NoPublisher`] without a publisher, or the
    /// publish failure.
    pub async fn publish(
        &self,
        page_id: &str,
        run: &CompletedRun,
    ) -> Result<PublishReport, PipelineError> {
        let publisher = self.publisher.as_ref().ok_or(PipelineError::NoPublisher)?;
        let document = run.document();
        let extra_files = run.store.run_files("json").await?;
        Ok(publisher.publish(page_id, &document, &extra_files).await?)
    }

    async fn capture_sources(
        &self,
        sources: &IndexMap<String, SourceSpec>,
        windows: &[TimeWindow],
        store: &ArtifactStore,
        record: &mut RunRecord,
        manifest: &mut Manifest,
    ) -> Result<(), PipelineError> {
        for source in sources.values() {
            tracing::info!(
                "Source {}: dashboard '{}' on {}",
                source.name,
                source.dash_title,
                source.host
            );
            let mut entry = SourceRecord::new(source.name.clone());

            match enumerate(self.monitoring.as_ref(), source).await {
                Ok(resolved) => {
                    self.capture_source(source, &resolved, windows, store, &mut entry, manifest)
                        .await?;
                    if source.snapshot {
                        self.snapshot_source(source, &resolved, windows, store, &mut entry)
                            .await?;
                    }
                    entry.dashboard = Some(resolved.dashboard);
                }
                Err(e) => {
                    tracing::warn!("Skipping source {}: {}", source.name, e);
                    entry.failure = Some(e.to_string());
                }
            }
            record.sources.push(entry);
        }
        Ok(())
    }

    async fn capture_source(
        &self,
        source: &SourceSpec,
        resolved: &ResolvedDashboard,
        windows: &[TimeWindow],
        store: &ArtifactStore,
        entry: &mut SourceRecord,
        manifest: &mut Manifest,
    ) -> Result<(), PipelineError> {
        let strategy = self.strategies.select(source);
        entry.panels = resolved.panels.iter().map(PanelRecord::from).collect();

        for window in windows {
            tracing::info!(
                "{} / {}: {} panels via {}",
                source.name,
                window.tag,
                resolved.panels.len(),
                strategy.kind()
            );
            let query = PanelQuery::new(source, &resolved.dashboard, window);
            entry
                .links
                .insert(window.tag.clone(), query.dashboard_link());

            for (panel, panel_record) in resolved.panels.iter().zip(entry.panels.iter_mut()) {
                panel_record
                    .links
                    .insert(window.tag.clone(), query.view_link(panel.id));
                let key = ArtifactKey::new(&source.name, &window.tag, &panel.stem);

                match strategy
                    .capture(source, &resolved.dashboard, panel, window)
                    .await
                {
                    Ok(bytes) => manifest.insert(store.save(&key, &bytes).await?),
                    Err(e) => {
                        tracing::warn!("Capture of {} failed: {}", key, e);
                        manifest.record_failure(key, CaptureFailure::new(e.reason.as_str(), e.to_string()));
                    }
                }
            }
        }
        Ok(())
    }

    /// Snapshot each distinct window
    ///
    /// Server-side failures are logged and skipped; a store failure is fatal
    /// like it is for panel images.
    async fn snapshot_source(
        &self,
        source: &SourceSpec,
        resolved: &ResolvedDashboard,
        windows: &[TimeWindow],
        store: &ArtifactStore,
        entry: &mut SourceRecord,
    ) -> Result<(), PipelineError> {
        let mut seen = HashSet::new();
        for window in windows.iter().rev() {
            if !seen.insert(window.tag.as_str()) {
                continue;
            }
            match self.snapshot_window(source, resolved, window, store).await {
                Ok(url) => {
                    entry.snapshots.insert(window.tag.clone(), url);
                }
                Err(e @ PipelineError::Store(_)) => return Err(e),
                Err(e) => tracing::warn!("{}", e),
            }
        }
        Ok(())
    }

    async fn snapshot_window(
        &self,
        source: &SourceSpec,
        resolved: &ResolvedDashboard,
        window: &TimeWindow,
        store: &ArtifactStore,
    ) -> Result<String, PipelineError> {
        let name = snapshot_name(source, window);
        let failed = |message: String| PipelineError::Snapshot {
            name: name.clone(),
            message,
        };

        let snapshot = tokio::time::timeout(
            source.snapshot_timeout,
            take_snapshot(self.monitoring.as_ref(), source, &resolved.dashboard, window),
        )
        .await
        .map_err(|_| failed(format!("timed out after {:?}", source.snapshot_timeout)))?
        .map_err(|e| failed(e.to_string()))?;

        let json = serde_json::to_vec_pretty(&snapshot.json).map_err(|e| failed(e.to_string()))?;
        store
            .write_file(&format!("{}.json", sanitize_component(&name)), &json)
            .await?;
        Ok(snapshot.info.url)
    }
}
