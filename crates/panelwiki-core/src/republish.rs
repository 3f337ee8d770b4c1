//! Republishing earlier runs
//!
//! A single folder is reopened in place. Several folders are merged into a
//! fresh run folder first; later folders win on conflicting keys.

use crate::error::PipelineError;
use crate::pipeline::CompletedRun;
use crate::record::{RunRecord, RUN_RECORD_FILE};
use panelwiki_artifact::ArtifactStore;
use std::path::{Path, PathBuf};

/// Reopen `folders` as one run
///
/// `dest` is only used (and created) when more than one folder is given.
///
/// # Errors
/// Returns [`PipelineError::Store`] if a folder is missing or unreadable and
/// [`PipelineError::Record`] if a `run.yaml` is malformed.
pub async fn reopen(folders: &[PathBuf], dest: &Path) -> Result<CompletedRun, PipelineError> {
    if let [folder] = folders {
        let (store, mut manifest) = ArtifactStore::load_existing(folder.clone()).await?;
        let mut record = read_record(&store).await?.unwrap_or_default();
        record.absorb(&manifest);
        record.restore_failures(&mut manifest);
        tracing::info!("Republishing {}", folder.display());
        return Ok(CompletedRun {
            store,
            manifest,
            record,
        });
    }

    let mut record = RunRecord::default();
    for folder in folders {
        let store = ArtifactStore::load_existing(folder.clone()).await?.0;
        match read_record(&store).await? {
            Some(earlier) => {
                if record.test_id.is_empty() {
                    record.test_id = earlier.test_id.clone();
                }
                record.merge(earlier);
            }
            None => tracing::warn!("{} has no {}", folder.display(), RUN_RECORD_FILE),
        }
    }

    let (store, mut manifest) = ArtifactStore::merge_runs(folders, dest.to_path_buf()).await?;
    record.absorb(&manifest);
    record.restore_failures(&mut manifest);

    let run = CompletedRun {
        store,
        manifest,
        record,
    };
    run.write_record().await?;
    tracing::info!(
        "Merged {} folders into {}",
        folders.len(),
        run.store.root().display()
    );
    Ok(run)
}

async fn read_record(store: &ArtifactStore) -> Result<Option<RunRecord>, PipelineError> {
    let Some(bytes) = store.read_file(RUN_RECORD_FILE).await? else {
        return Ok(None);
    };
    let raw = String::from_utf8_lossy(&bytes);
    RunRecord::from_yaml(&raw)
        .map(Some)
        .map_err(|source| PipelineError::Record {
            path: store.root().to_path_buf(),
            source,
        })
}
