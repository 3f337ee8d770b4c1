//! Filesystem artifact store
//!
//! Layout under the run root:
//!
//! ```text
//! <root>/<source>/<window>/<panel>.png
//! <root>/<other run-level files>
//! ```
//!
//! Saving the same key twice overwrites the earlier image. Images are
//! written to a sibling temporary file first and renamed into place so a
//! reader never observes a truncated file.

use crate::artifact::{Artifact, Manifest};
use crate::hash::ContentHash;
use crate::key::{ArtifactKey, IMAGE_EXTENSION};
use crate::sanitize::{is_safe_component, sanitize_component};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

/// Suffix of in-flight writes
const PARTIAL_SUFFIX: &str = "part";

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem failure on a specific path
    #[error("I/O error on {path}: {source}")]
    Io {
        /// Path being accessed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Root directory does not exist
    #[error("artifact root not found: {0}")]
    RootNotFound(PathBuf),

    /// Run-level file name is not a single path component
    #[error("invalid file name: {0:?}")]
    InvalidName(String),
}

impl StoreError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Artifact store rooted at one run folder
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Open a store, creating the root directory if needed
    ///
    /// # Errors
    /// Returns [`StoreError::Io`] if the directory cannot be created.
    pub async fn create(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)
            .await
            .map_err(|e| StoreError::io(&root, e))?;
        Ok(Self { root })
    }

    /// Root directory of the run
    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of the image for `key`
    #[inline]
    #[must_use]
    pub fn path_for(&self, key: &ArtifactKey) -> PathBuf {
        self.root.join(key.relative_path())
    }

    /// Persist an image, overwriting any earlier image under the same key
    ///
    /// # Errors
    /// Returns [`StoreError::Io`] on filesystem failure.
    pub async fn save(&self, key: &ArtifactKey, bytes: &[u8]) -> Result<Artifact, StoreError> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::io(parent, e))?;
        }
        write_atomic(&path, bytes).await?;

        let artifact = Artifact::new(
            key.clone(),
            path,
            ContentHash::compute(bytes),
            bytes.len() as u64,
        );
        tracing::debug!(
            "Stored {} ({} bytes, {})",
            key,
            artifact.size(),
            artifact.hash().short()
        );
        Ok(artifact)
    }

    /// Read an image back
    ///
    /// # Errors
    /// Returns [`StoreError::Io`] if the file cannot be read.
    pub async fn read(&self, artifact: &Artifact) -> Result<Vec<u8>, StoreError> {
        fs::read(artifact.path())
            .await
            .map_err(|e| StoreError::io(artifact.path(), e))
    }

    /// Write a run-level file (`run.yaml`, snapshot JSON, ...) at the root
    ///
    /// # Errors
    /// Returns [`StoreError::InvalidName`] unless `name` is a safe single
    /// component, or [`StoreError::Io`] on write failure.
    pub async fn write_file(&self, name: &str, bytes: &[u8]) -> Result<PathBuf, StoreError> {
        if !is_safe_component(name) {
            return Err(StoreError::InvalidName(name.to_string()));
        }
        let path = self.root.join(name);
        write_atomic(&path, bytes).await?;
        Ok(path)
    }

    /// Read a run-level file; `None` when it does not exist
    ///
    /// # Errors
    /// Returns [`StoreError::InvalidName`] or [`StoreError::Io`].
    pub async fn read_file(&self, name: &str) -> Result<Option<Vec<u8>>, StoreError> {
        if !is_safe_component(name) {
            return Err(StoreError::InvalidName(name.to_string()));
        }
        let path = self.root.join(name);
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io(&path, e)),
        }
    }

    /// Run-level files at the root with the given extension, sorted by name
    ///
    /// # Errors
    /// Returns [`StoreError::Io`] if the root cannot be listed.
    pub async fn run_files(&self, extension: &str) -> Result<Vec<PathBuf>, StoreError> {
        Ok(run_files(&self.root, extension)
            .await?
            .into_iter()
            .map(|(_, path)| path)
            .collect())
    }

    /// Reopen a previous run folder and index its images
    ///
    /// Only `<source>/<window>/<panel>.png` entries are indexed; files at
    /// other depths or with other extensions are ignored.
    ///
    /// # Errors
    /// Returns [`StoreError::RootNotFound`] if `root` is not a directory.
    pub async fn load_existing(root: impl Into<PathBuf>) -> Result<(Self, Manifest), StoreError> {
        let root = root.into();
        if !fs::metadata(&root).await.is_ok_and(|m| m.is_dir()) {
            return Err(StoreError::RootNotFound(root));
        }

        let mut manifest = Manifest::new();
        for (source, source_dir) in subdirectories(&root).await? {
            for (window, window_dir) in subdirectories(&source_dir).await? {
                for (stem, path) in images(&window_dir).await? {
                    let bytes = fs::read(&path)
                        .await
                        .map_err(|e| StoreError::io(&path, e))?;
                    let key = ArtifactKey::new(&source, &window, &stem);
                    manifest.insert(Artifact::new(
                        key,
                        path,
                        ContentHash::compute(&bytes),
                        bytes.len() as u64,
                    ));
                }
            }
        }

        tracing::info!(
            "Loaded {} artifacts from {}",
            manifest.len(),
            root.display()
        );
        Ok((Self { root }, manifest))
    }

    /// Merge several run folders into a fresh folder at `dest`
    ///
    /// Folders are applied in order; a key present in several folders keeps
    /// the image from the last one. Run-level `*.json` files are copied too.
    ///
    /// # Errors
    /// Returns [`StoreError`] if any folder cannot be read or `dest` written.
    pub async fn merge_runs(
        folders: &[PathBuf],
        dest: impl Into<PathBuf>,
    ) -> Result<(Self, Manifest), StoreError> {
        let store = Self::create(dest).await?;
        let mut manifest = Manifest::new();

        for folder in folders {
            let (source_store, source_manifest) = Self::load_existing(folder.clone()).await?;
            for artifact in source_manifest.artifacts() {
                let bytes = source_store.read(artifact).await?;
                manifest.insert(store.save(artifact.key(), &bytes).await?);
            }
            for (name, path) in run_files(folder, "json").await? {
                let bytes = fs::read(&path)
                    .await
                    .map_err(|e| StoreError::io(&path, e))?;
                store.write_file(&name, &bytes).await?;
            }
            tracing::info!(
                "Merged {} artifacts from {}",
                source_manifest.len(),
                folder.display()
            );
        }

        Ok((store, manifest))
    }
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let mut partial = path.as_os_str().to_owned();
    partial.push(".");
    partial.push(PARTIAL_SUFFIX);
    let partial = PathBuf::from(partial);

    fs::write(&partial, bytes)
        .await
        .map_err(|e| StoreError::io(&partial, e))?;
    fs::rename(&partial, path)
        .await
        .map_err(|e| StoreError::io(path, e))
}

/// Directory entries whose names are valid UTF-8 and already canonical
async fn entries(dir: &Path) -> Result<Vec<(String, PathBuf, std::fs::FileType)>, StoreError> {
    let mut reader = fs::read_dir(dir)
        .await
        .map_err(|e| StoreError::io(dir, e))?;
    let mut out = Vec::new();
    while let Some(entry) = reader
        .next_entry()
        .await
        .map_err(|e| StoreError::io(dir, e))?
    {
        let path = entry.path();
        let Ok(name) = entry.file_name().into_string() else {
            tracing::warn!("Skipping non UTF-8 entry {}", path.display());
            continue;
        };
        let file_type = entry
            .file_type()
            .await
            .map_err(|e| StoreError::io(&path, e))?;
        out.push((name, path, file_type));
    }
    out.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(out)
}

async fn subdirectories(dir: &Path) -> Result<Vec<(String, PathBuf)>, StoreError> {
    Ok(entries(dir)
        .await?
        .into_iter()
        .filter(|(_, _, ty)| ty.is_dir())
        .map(|(name, path, _)| (name, path))
        .collect())
}

async fn images(dir: &Path) -> Result<Vec<(String, PathBuf)>, StoreError> {
    let mut out = Vec::new();
    for (name, path, ty) in entries(dir).await? {
        if !ty.is_file() {
            continue;
        }
        let Some(stem) = name.strip_suffix(&format!(".{IMAGE_EXTENSION}")) else {
            continue;
        };
        if sanitize_component(stem) != stem {
            tracing::warn!("Skipping non-canonical image name {}", path.display());
            continue;
        }
        out.push((stem.to_string(), path));
    }
    Ok(out)
}

async fn run_files(dir: &Path, extension: &str) -> Result<Vec<(String, PathBuf)>, StoreError> {
    let suffix = format!(".{extension}");
    Ok(entries(dir)
        .await?
        .into_iter()
        .filter(|(name, _, ty)| ty.is_file() && name.ends_with(&suffix))
        .map(|(name, path, _)| (name, path))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn png(seed: u8) -> Vec<u8> {
        let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];
        bytes.extend(std::iter::repeat(seed).take(64));
        bytes
    }

    #[tokio::test]
    async fn save_then_read_is_byte_identical() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::create(dir.path()).await.unwrap();
        let key = ArtifactKey::new("prod", "baseline", "CPU");

        let artifact = store.save(&key, &png(1)).await.unwrap();
        assert_eq!(artifact.path(), dir.path().join("prod/baseline/CPU.png"));
        assert_eq!(store.read(&artifact).await.unwrap(), png(1));
        assert_eq!(artifact.hash(), &ContentHash::compute(&png(1)));
    }

    #[tokio::test]
    async fn save_overwrites_and_leaves_no_partial() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::create(dir.path()).await.unwrap();
        let key = ArtifactKey::new("s", "w", "p");

        store.save(&key, &png(1)).await.unwrap();
        let second = store.save(&key, &png(2)).await.unwrap();
        assert_eq!(store.read(&second).await.unwrap(), png(2));

        let names: Vec<_> = std::fs::read_dir(dir.path().join("s/w"))
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["p.png".to_string()]);
    }

    #[tokio::test]
    async fn load_existing_indexes_three_levels_only() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::create(dir.path()).await.unwrap();
        store
            .save(&ArtifactKey::new("a", "w1", "p1"), &png(1))
            .await
            .unwrap();
        store
            .save(&ArtifactKey::new("b", "w1", "p2"), &png(2))
            .await
            .unwrap();
        store.write_file("run.yaml", b"x: 1").await.unwrap();
        std::fs::write(dir.path().join("a/w1/notes.txt"), "ignored").unwrap();
        std::fs::write(dir.path().join("a/stray.png"), png(9)).unwrap();

        let (_, manifest) = ArtifactStore::load_existing(dir.path()).await.unwrap();
        let keys: Vec<String> = manifest.artifacts().map(|a| a.key().to_string()).collect();
        assert_eq!(keys, vec!["a/w1/p1".to_string(), "b/w1/p2".to_string()]);
    }

    #[tokio::test]
    async fn load_existing_requires_directory() {
        let dir = TempDir::new().unwrap();
        let err = ArtifactStore::load_existing(dir.path().join("absent"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::RootNotFound(_)));
    }

    #[tokio::test]
    async fn run_files_must_be_single_component() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::create(dir.path()).await.unwrap();
        assert!(matches!(
            store.write_file("../escape.json", b"{}").await,
            Err(StoreError::InvalidName(_))
        ));
        assert_eq!(store.read_file("absent.json").await.unwrap(), None);
    }

    #[tokio::test]
    async fn run_files_filter_by_extension() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::create(dir.path()).await.unwrap();
        store.write_file("b__w.json", b"{}").await.unwrap();
        store.write_file("a__w.json", b"{}").await.unwrap();
        store.write_file("run.yaml", b"x: 1").await.unwrap();

        let files = store.run_files("json").await.unwrap();
        assert_eq!(
            files,
            vec![dir.path().join("a__w.json"), dir.path().join("b__w.json")]
        );
    }

    #[tokio::test]
    async fn merge_runs_last_folder_wins() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();

        let a = ArtifactStore::create(first.path()).await.unwrap();
        a.save(&ArtifactKey::new("s", "w1", "p"), &png(1))
            .await
            .unwrap();
        a.save(&ArtifactKey::new("s", "shared", "p"), &png(1))
            .await
            .unwrap();
        a.write_file("s__w1.json", b"{\"a\":1}").await.unwrap();

        let b = ArtifactStore::create(second.path()).await.unwrap();
        b.save(&ArtifactKey::new("s", "w2", "p"), &png(2))
            .await
            .unwrap();
        b.save(&ArtifactKey::new("s", "shared", "p"), &png(2))
            .await
            .unwrap();

        let (store, manifest) = ArtifactStore::merge_runs(
            &[first.path().to_path_buf(), second.path().to_path_buf()],
            dest.path().join("merged"),
        )
        .await
        .unwrap();

        assert_eq!(manifest.len(), 3);
        let shared = manifest
            .get(&ArtifactKey::new("s", "shared", "p"))
            .unwrap();
        assert_eq!(store.read(shared).await.unwrap(), png(2));
        assert!(store.read_file("s__w1.json").await.unwrap().is_some());
    }
}
