//! Conversion manifest for incremental builds.
//!
//! Decoding and re-encoding every image on every build is the slow part of
//! the site build. The manifest records, per source image, what was last
//! converted, so unchanged images are skipped entirely.
//!
//! # Format
//!
//! One flat JSON object: a `_version` tag plus one entry per source path
//! (relative to the source directory, `/`-separated):
//!
//! ```json
//! {
//!   "_version": 1,
//!   "posts/images/foo.jpg": {
//!     "contentHash": "9f86d0…",
//!     "paramsHash": "5e2b1c…",
//!     "outputFileName": "posts/images/foo.webp",
//!     "originalWidth": 1200,
//!     "originalHeight": 800,
//!     "maxWidthApplied": 800,
//!     "convertedAt": "2026-03-02T10:15:00Z"
//!   }
//! }
//! ```
//!
//! # Cache hits
//!
//! The cache is **content-addressed** on the source side: `contentHash` is
//! SHA-256 of the file bytes, so `git checkout` (which resets mtimes) does
//! not trigger reconversion. `paramsHash` fingerprints the settings the
//! derivative was encoded with (format, quality, width ceiling, output
//! name), so editing the config reconverts exactly the affected images.
//! A hit requires:
//! 1. An entry for the source path with a matching content hash
//! 2. A matching params hash
//! 3. The derivative named by the entry still exists on disk
//!
//! The last rule makes the cache self-healing: deleting an output file by
//! hand forces that one image to be rebuilt.
//!
//! # Versioning
//!
//! [`PROCESSING_VERSION`] is bumped whenever the encoder itself or the
//! manifest layout changes in a way that should invalidate existing
//! derivatives. A manifest stored under
//! another version loads as empty, so every image is reconverted.

use crate::imaging::{OutputFormat, Quality};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Version of the conversion settings. Bump to force a full rebuild.
pub const PROCESSING_VERSION: u32 = 2;

/// Default manifest file name inside the cache directory.
pub const MANIFEST_FILENAME: &str = "manifest.json";

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("IO error writing manifest {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Metadata about the last successful conversion of one source image.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    pub content_hash: String,
    /// Fingerprint of the encoding settings, see [`hash_conversion_params`].
    pub params_hash: String,
    /// Derivative path relative to the cache directory.
    pub output_file_name: String,
    pub original_width: u32,
    pub original_height: u32,
    pub max_width_applied: u32,
    pub converted_at: DateTime<Utc>,
}

/// In-memory manifest: processing version plus entries keyed by source path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Manifest {
    #[serde(rename = "_version")]
    pub version: u32,
    #[serde(flatten)]
    pub entries: BTreeMap<String, ManifestEntry>,
}

impl Manifest {
    /// Create an empty manifest tagged with `version`.
    pub fn empty(version: u32) -> Self {
        Self {
            version,
            entries: BTreeMap::new(),
        }
    }

    pub fn get(&self, source_path: &str) -> Option<&ManifestEntry> {
        self.entries.get(source_path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `source_path` can be skipped: same content hash and same
    /// encoding settings as last time, **and** the recorded derivative is
    /// still present under `cache_dir`.
    pub fn is_fresh(
        &self,
        source_path: &str,
        content_hash: &str,
        params_hash: &str,
        cache_dir: &Path,
    ) -> bool {
        self.entries.get(source_path).is_some_and(|entry| {
            entry.content_hash == content_hash
                && entry.params_hash == params_hash
                && cache_dir.join(&entry.output_file_name).is_file()
        })
    }

    /// Record a successful conversion, replacing any previous entry.
    pub fn record(&mut self, source_path: String, entry: ManifestEntry) {
        self.entries.insert(source_path, entry);
    }

    /// Remove the entry for `source_path`, if any.
    pub fn forget(&mut self, source_path: &str) -> Option<ManifestEntry> {
        self.entries.remove(source_path)
    }

    /// Drop entries whose source path is not in `live`. Returns how many went.
    pub fn retain_sources(&mut self, live: &HashSet<&str>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|path, _| live.contains(path.as_str()));
        before - self.entries.len()
    }
}

/// Where the manifest lives and which processing version it must carry.
#[derive(Debug, Clone)]
pub struct ManifestStore {
    path: PathBuf,
    version: u32,
}

impl ManifestStore {
    /// Store at `path` expecting the current [`PROCESSING_VERSION`].
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_version(path, PROCESSING_VERSION)
    }

    pub fn with_version(path: impl Into<PathBuf>, version: u32) -> Self {
        Self {
            path: path.into(),
            version,
        }
    }

    /// Store at the default location inside a cache directory.
    pub fn in_cache_dir(cache_dir: &Path) -> Self {
        Self::new(cache_dir.join(MANIFEST_FILENAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// An empty manifest for this store's version (first build or `--no-cache`).
    pub fn fresh(&self) -> Manifest {
        Manifest::empty(self.version)
    }

    /// Load the manifest. Never fails: a missing, unreadable, or corrupt file
    /// and a version mismatch all yield an empty manifest.
    pub fn load(&self) -> Manifest {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return self.fresh(),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "manifest unreadable, starting fresh");
                return self.fresh();
            }
        };
        let manifest: Manifest = match serde_json::from_str(&content) {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "manifest corrupt, starting fresh");
                return self.fresh();
            }
        };
        if manifest.version != self.version {
            tracing::info!(
                stored = manifest.version,
                expected = self.version,
                "processing version changed, cache reset"
            );
            return self.fresh();
        }
        manifest
    }

    /// Stamp the store's version onto `manifest` and write it atomically,
    /// creating parent directories as needed.
    pub fn save(&self, manifest: &mut Manifest) -> Result<(), ManifestError> {
        manifest.version = self.version;
        let json = serde_json::to_string_pretty(manifest)?;

        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let io_err = |source: io::Error| ManifestError::Io {
            path: self.path.clone(),
            source,
        };
        std::fs::create_dir_all(parent).map_err(io_err)?;

        let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(io_err)?;
        tmp.write_all(json.as_bytes()).map_err(io_err)?;
        tmp.write_all(b"\n").map_err(io_err)?;
        tmp.persist(&self.path).map_err(|e| io_err(e.error))?;
        Ok(())
    }
}

/// SHA-256 hash of a file's contents, returned as a hex string.
pub fn hash_file(path: &Path) -> io::Result<String> {
    let bytes = std::fs::read(path)?;
    let digest = Sha256::digest(&bytes);
    Ok(format!("{:x}", digest))
}

/// SHA-256 of the settings a derivative is encoded with.
///
/// Inputs: output format, quality, the width ceiling that applied, and the
/// derivative's relative path. If any of these change, the previously
/// converted output is stale.
pub fn hash_conversion_params(
    format: OutputFormat,
    quality: Quality,
    max_width: u32,
    output_name: &str,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"convert\0");
    hasher.update(format.extension().as_bytes());
    hasher.update(b"\0");
    hasher.update(quality.value().to_le_bytes());
    hasher.update(max_width.to_le_bytes());
    hasher.update(output_name.as_bytes());
    format!("{:x}", hasher.finalize())
}
