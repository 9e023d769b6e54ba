//! High-level image operations.
//!
//! These functions combine calculations with backend execution.
//! They take configuration, compute parameters, and call the backend.

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::calculations::fit_to_width;
use super::params::{ConvertParams, OutputFormat, Quality};
use std::path::Path;

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Outcome of a single conversion: source size and written size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvertedImage {
    pub original: Dimensions,
    pub output: Dimensions,
}

impl ConvertedImage {
    pub fn was_resized(&self) -> bool {
        self.original != self.output
    }
}

/// Convert one source image into a size-capped derivative.
///
/// Reads the natural size, caps the width at `max_width` (never upscaling),
/// creates the output's parent directory, and encodes.
pub fn convert_image(
    backend: &impl ImageBackend,
    source: &Path,
    output: &Path,
    max_width: u32,
    quality: Quality,
    format: OutputFormat,
) -> Result<ConvertedImage> {
    let original = backend.identify(source)?;
    let (width, height) = fit_to_width((original.width, original.height), max_width);

    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }

    backend.convert(&ConvertParams {
        source: source.to_path_buf(),
        output: output.to_path_buf(),
        width,
        height,
        quality,
        format,
    })?;

    Ok(ConvertedImage {
        original,
        output: Dimensions { width, height },
    })
}
