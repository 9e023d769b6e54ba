//! Filename conventions for source images and their derivatives.
//!
//! Two classes of asset are distinguished purely by file name:
//! - `cover-acme.png` → **cover** (hero images, larger resize ceiling)
//! - `logo.jpg`, `screenshot-2.png` → **inline** (everything else)
//!
//! The prefix test runs on the base file name only, so
//! `posts/cover-images/shot.png` is still inline. It is case-sensitive:
//! `Cover-acme.png` is inline.
//!
//! Derivatives keep the source's relative directory and base name and swap
//! the extension: `posts/images/foo.jpg` → `posts/images/foo.webp`.

use crate::imaging::OutputFormat;

/// Class of a source asset, deciding which resize ceiling applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetClass {
    Cover,
    Inline,
}

/// Classify a file by name. `file_name` may be a bare name or a relative path.
pub fn classify(file_name: &str, cover_prefix: &str) -> AssetClass {
    let base = file_name.rsplit('/').next().unwrap_or(file_name);
    if base.starts_with(cover_prefix) {
        AssetClass::Cover
    } else {
        AssetClass::Inline
    }
}

/// Maximum output width per asset class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizeCeilings {
    pub cover: u32,
    pub inline: u32,
}

impl ResizeCeilings {
    pub fn max_width(&self, class: AssetClass) -> u32 {
        match class {
            AssetClass::Cover => self.cover,
            AssetClass::Inline => self.inline,
        }
    }
}

impl Default for ResizeCeilings {
    fn default() -> Self {
        Self {
            cover: 1600,
            inline: 800,
        }
    }
}

/// Relative path of the derivative for a `/`-separated source path.
///
/// Only the final extension is replaced: `hero.v2.png` → `hero.v2.webp`.
/// Names without an extension get one appended.
pub fn output_relative_path(source_relative: &str, format: OutputFormat) -> String {
    let (dir, base) = match source_relative.rfind('/') {
        Some(pos) => source_relative.split_at(pos + 1),
        None => ("", source_relative),
    };
    let stem = match base.rfind('.') {
        Some(pos) if pos > 0 => &base[..pos],
        _ => base,
    };
    format!("{}{}.{}", dir, stem, format.extension())
}
