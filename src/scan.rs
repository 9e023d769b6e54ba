//! Source image discovery.
//!
//! Walks the source directory recursively and returns every PNG/JPEG file,
//! keyed by its path relative to the source root. That relative path is the
//! stable identity of a source image in the [manifest](crate::manifest).
//!
//! ```text
//! public/images/                  # Source root
//! ├── cover-acme.png              # → "cover-acme.png"   (cover)
//! ├── logo.jpg                    # → "logo.jpg"         (inline)
//! ├── notes.txt                   # ignored
//! └── posts/
//!     └── images/
//!         └── foo.JPEG            # → "posts/images/foo.JPEG"
//! ```
//!
//! Results are sorted by relative path so runs are reproducible, even though
//! the conversion pool visits them in no particular order.
//!
//! Symlinks are followed. A link that points back at one of its ancestors,
//! or at nothing, is logged and skipped rather than failing the scan.

use crate::imaging::supported_input_extensions;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Failed to walk source directory: {0}")]
    Walk(#[from] walkdir::Error),
}

/// A discovered source image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceImage {
    /// Absolute (or caller-relative) path on disk.
    pub path: PathBuf,
    /// Path relative to the source root, `/`-separated. Manifest key.
    pub relative: String,
    /// Base file name, used for cover/inline classification.
    pub file_name: String,
}

/// Whether the extension marks a raster source we convert.
pub fn is_source_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            supported_input_extensions()
                .iter()
                .any(|s| s.eq_ignore_ascii_case(ext))
        })
}

/// Join the components of a relative path with `/` on every platform.
fn relative_key(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Symlink loops and dangling links below the root.
fn is_skippable_link(error: &walkdir::Error) -> bool {
    if error.loop_ancestor().is_some() {
        return true;
    }
    error.depth() > 0
        && error
            .io_error()
            .is_some_and(|e| e.kind() == std::io::ErrorKind::NotFound)
}

/// Discover all source images under `source_dir`.
///
/// Callers check that the directory exists first; a missing root surfaces
/// here as a walk error.
pub fn discover(source_dir: &Path) -> Result<Vec<SourceImage>, ScanError> {
    let mut images = Vec::new();

    for entry in WalkDir::new(source_dir).follow_links(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if is_skippable_link(&e) => {
                tracing::warn!(error = %e, "skipping unusable symlink");
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        if !entry.file_type().is_file() || !is_source_image(entry.path()) {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(source_dir) else {
            continue;
        };
        images.push(SourceImage {
            path: entry.path().to_path_buf(),
            relative: relative_key(relative),
            file_name: entry.file_name().to_string_lossy().to_string(),
        });
    }

    images.sort_by(|a, b| a.relative.cmp(&b.relative));
    Ok(images)
}
