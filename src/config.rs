//! Pipeline configuration.
//!
//! Conversion parameters live in an optional TOML file (`images.toml` by
//! default). Paths are not configured here; they come from CLI flags.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [images]
//! quality = 80              # Encoding quality (1-100)
//! format = "webp"           # "webp" or "avif"
//!
//! [resize]
//! cover_max_width = 1600    # Ceiling for cover-* images
//! inline_max_width = 800    # Ceiling for everything else
//! cover_prefix = "cover-"   # File name prefix marking a cover image
//!
//! [processing]
//! max_processes = 4         # Max parallel conversions (omit for auto = CPU cores)
//! prune_orphans = false     # Drop manifest entries for deleted sources
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse; override just the values you want:
//!
//! ```toml
//! [resize]
//! cover_max_width = 1920
//! ```
//!
//! Unknown keys are rejected to catch typos early.
//!
//! Changing `quality`, `format`, the ceilings, or `cover_prefix` reconverts
//! exactly the images whose encoding settings changed; see
//! [`hash_conversion_params`](crate::manifest::hash_conversion_params).

use crate::imaging::{OutputFormat, Quality};
use crate::naming::ResizeCeilings;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Pipeline configuration loaded from the config file.
///
/// All fields have defaults. Config files need only specify the values they
/// want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Encoding settings (quality, output format).
    pub images: ImagesConfig,
    /// Resize ceilings and the cover naming convention.
    pub resize: ResizeConfig,
    /// Parallelism and manifest housekeeping.
    pub processing: ProcessingConfig,
}

impl PipelineConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.images.quality) {
            return Err(ConfigError::Validation(
                "images.quality must be 1-100".into(),
            ));
        }
        if self.resize.cover_max_width == 0 || self.resize.inline_max_width == 0 {
            return Err(ConfigError::Validation(
                "resize.cover_max_width and resize.inline_max_width must be non-zero".into(),
            ));
        }
        if self.resize.cover_prefix.is_empty() {
            return Err(ConfigError::Validation(
                "resize.cover_prefix must not be empty".into(),
            ));
        }
        if self.processing.max_processes == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_processes must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn quality(&self) -> Quality {
        Quality::new(self.images.quality)
    }

    pub fn ceilings(&self) -> ResizeCeilings {
        ResizeCeilings {
            cover: self.resize.cover_max_width,
            inline: self.resize.inline_max_width,
        }
    }
}

/// Encoding settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImagesConfig {
    /// Encoding quality (1 = worst, 100 = best).
    pub quality: u32,
    /// Output container for derivatives.
    pub format: OutputFormat,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            quality: Quality::default().value(),
            format: OutputFormat::default(),
        }
    }
}

/// Resize ceilings per asset class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResizeConfig {
    /// Maximum output width for cover images.
    pub cover_max_width: u32,
    /// Maximum output width for inline images.
    pub inline_max_width: u32,
    /// Base-name prefix identifying cover images.
    pub cover_prefix: String,
}

impl Default for ResizeConfig {
    fn default() -> Self {
        let ceilings = ResizeCeilings::default();
        Self {
            cover_max_width: ceilings.cover,
            inline_max_width: ceilings.inline,
            cover_prefix: "cover-".to_string(),
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of conversions in flight at once.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
    /// Remove manifest entries whose source image no longer exists.
    pub prune_orphans: bool,
}

/// Resolve the effective worker count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.min(cores))
        .unwrap_or(cores)
        .max(1)
}

/// Load config from a TOML file.
///
/// A missing file yields the defaults. Sparse files are merged over the
/// defaults field by field; the result is validated.
pub fn load_config(path: &Path) -> Result<PipelineConfig, ConfigError> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        return Ok(PipelineConfig::default());
    }
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse and validate config from TOML text.
pub fn parse_config(content: &str) -> Result<PipelineConfig, ConfigError> {
    let config: PipelineConfig = toml::from_str(content)?;
    config.validate()?;
    Ok(config)
}

/// Returns a fully-commented stock config file with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# logiciel-images configuration
# =============================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys will cause an error.
#
# Editing a value reconverts the images it affects on the next run.

# ---------------------------------------------------------------------------
# Encoding
# ---------------------------------------------------------------------------
[images]
# Encoding quality (1 = worst, 100 = best) for lossy WebP and AVIF.
# Changing it reconverts every image on the next run.
quality = 80

# Output format: "webp" or "avif".
format = "webp"

# ---------------------------------------------------------------------------
# Resizing
# ---------------------------------------------------------------------------
[resize]
# Images wider than their ceiling are scaled down to it (aspect ratio kept).
# Narrower images are never upscaled.
cover_max_width = 1600
inline_max_width = 800

# Files whose name starts with this prefix use the cover ceiling.
cover_prefix = "cover-"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel conversions.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4

# Remove manifest entries for source images that no longer exist.
prune_orphans = false
"##
}
