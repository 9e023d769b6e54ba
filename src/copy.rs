//! Post-build copy of derivatives into the publish directory.
//!
//! Plain file copy: no hashing, no skip logic. Only files with an output
//! extension (`.webp`, `.avif`) are copied, so the manifest and any stray
//! files in the cache directory never reach the published site. Relative
//! paths are preserved.

use crate::imaging::OutputFormat;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum CopyError {
    #[error("Cannot create publish directory {path}: {source}")]
    PublishDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Summary of a copy run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CopyStats {
    pub copied: u32,
    pub failed: u32,
}

impl fmt::Display for CopyStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.failed > 0 {
            write!(f, "{} copied, {} failed", self.copied, self.failed)
        } else {
            write!(f, "{} copied", self.copied)
        }
    }
}

fn is_derivative(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            OutputFormat::ALL
                .iter()
                .any(|f| f.extension().eq_ignore_ascii_case(ext))
        })
}

/// Copy every derivative under `cache_dir` into `publish_dir`.
///
/// The publish directory is created if needed; failing to create it is the
/// only fatal error. A missing cache directory copies nothing. Individual
/// copy failures are logged and counted.
pub fn copy_outputs(cache_dir: &Path, publish_dir: &Path) -> Result<CopyStats, CopyError> {
    std::fs::create_dir_all(publish_dir).map_err(|source| CopyError::PublishDir {
        path: publish_dir.to_path_buf(),
        source,
    })?;

    let mut stats = CopyStats::default();
    if !cache_dir.is_dir() {
        tracing::warn!(cache = %cache_dir.display(), "cache directory not found, nothing to copy");
        return Ok(stats);
    }

    for entry in WalkDir::new(cache_dir) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::error!(error = %e, "cannot read cache entry");
                stats.failed += 1;
                continue;
            }
        };
        if !entry.file_type().is_file() || !is_derivative(entry.path()) {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(cache_dir) else {
            continue;
        };
        let target = publish_dir.join(relative);

        let result = target
            .parent()
            .map_or(Ok(()), std::fs::create_dir_all)
            .and_then(|()| std::fs::copy(entry.path(), &target));
        match result {
            Ok(_) => stats.copied += 1,
            Err(e) => {
                tracing::error!(file = %relative.display(), error = %e, "copy failed");
                stats.failed += 1;
            }
        }
    }

    tracing::info!(copied = stats.copied, failed = stats.failed, publish = %publish_dir.display(), "copied derivatives");
    Ok(stats)
}
