//! Stored artifacts and the run manifest
//!
//! An [`Artifact`] is a reference to one image on disk; it never holds the
//! image bytes. The [`Manifest`] maps keys to either a stored artifact or a
//! recorded capture failure.

use crate::hash::ContentHash;
use crate::key::ArtifactKey;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// One captured image on disk
///
/// # Invariants
/// - `hash` is the Blake3 digest of the file content at `path`
/// - Immutable after construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    key: ArtifactKey,
    path: PathBuf,
    hash: ContentHash,
    size: u64,
}

impl Artifact {
    /// Create an artifact reference
    #[inline]
    #[must_use]
    pub fn new(key: ArtifactKey, path: PathBuf, hash: ContentHash, size: u64) -> Self {
        Self {
            key,
            path,
            hash,
            size,
        }
    }

    /// Artifact key
    #[inline]
    #[must_use]
    pub fn key(&self) -> &ArtifactKey {
        &self.key
    }

    /// Absolute (or store-root relative) path of the image
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Content hash of the image
    #[inline]
    #[must_use]
    pub fn hash(&self) -> &ContentHash {
        &self.hash
    }

    /// Image size in bytes
    #[inline]
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Wiki attachment name
    #[inline]
    #[must_use]
    pub fn attachment_name(&self) -> String {
        self.key.attachment_name()
    }
}

/// A capture attempt that produced no image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureFailure {
    /// Machine-readable reason (`timeout`, `auth`, `http_status`, `driver`, ...)
    pub reason: String,
    /// Human-readable detail
    pub message: String,
}

impl CaptureFailure {
    /// Create a failure record
    #[inline]
    #[must_use]
    pub fn new(reason: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            message: message.into(),
        }
    }
}

/// What the manifest knows about a key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestEntry<'a> {
    /// Image stored
    Stored(&'a Artifact),
    /// Capture attempted and failed
    Failed(&'a CaptureFailure),
    /// Nothing recorded
    Missing,
}

/// Index of a run's artifacts and capture failures
///
/// A key is either stored or failed, never both: the latest record wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    artifacts: BTreeMap<ArtifactKey, Artifact>,
    failures: BTreeMap<ArtifactKey, CaptureFailure>,
}

impl Manifest {
    /// Create an empty manifest
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a stored artifact, replacing any earlier record for its key
    pub fn insert(&mut self, artifact: Artifact) {
        self.failures.remove(artifact.key());
        self.artifacts.insert(artifact.key().clone(), artifact);
    }

    /// Record a failed capture, replacing any earlier record for the key
    pub fn record_failure(&mut self, key: ArtifactKey, failure: CaptureFailure) {
        self.artifacts.remove(&key);
        self.failures.insert(key, failure);
    }

    /// Look up a key
    #[must_use]
    pub fn lookup(&self, key: &ArtifactKey) -> ManifestEntry<'_> {
        if let Some(artifact) = self.artifacts.get(key) {
            ManifestEntry::Stored(artifact)
        } else if let Some(failure) = self.failures.get(key) {
            ManifestEntry::Failed(failure)
        } else {
            ManifestEntry::Missing
        }
    }

    /// Stored artifact for a key
    #[inline]
    #[must_use]
    pub fn get(&self, key: &ArtifactKey) -> Option<&Artifact> {
        self.artifacts.get(key)
    }

    /// Recorded failure for a key
    #[inline]
    #[must_use]
    pub fn failure(&self, key: &ArtifactKey) -> Option<&CaptureFailure> {
        self.failures.get(key)
    }

    /// Stored artifacts in key order
    pub fn artifacts(&self) -> impl Iterator<Item = &Artifact> {
        self.artifacts.values()
    }

    /// Recorded failures in key order
    pub fn failures(&self) -> impl Iterator<Item = (&ArtifactKey, &CaptureFailure)> {
        self.failures.iter()
    }

    /// Number of stored artifacts
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    /// True when no artifact is stored
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    /// Number of recorded failures
    #[inline]
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }
}
