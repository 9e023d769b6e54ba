//! Incremental image conversion.
//!
//! Brings a cache directory of WebP (or AVIF) derivatives in sync with a
//! source directory of PNG/JPEG images, reusing previous work wherever the
//! source bytes are unchanged.
//!
//! ## Per-file algorithm
//!
//! ```text
//! hash source bytes, classify (cover-* vs inline) → ceiling
//!   ├── manifest entry with same content hash, same settings fingerprint
//!   │   AND derivative on disk → skipped
//!   └── otherwise
//!         decode → cap width at ceiling (never upscale) → encode
//!         write <cache>/<same path, new extension>
//!         new manifest entry, count bytes saved
//! ```
//!
//! A failure on one file (unreadable, corrupt, encoder error) is logged and
//! counted; the rest of the batch carries on.
//!
//! Two sources that would produce the same derivative (`foo.png` and
//! `foo.jpg`) are not both converted: the first in path order keeps the
//! name and the others fail with [`ProcessError::OutputConflict`].
//!
//! ## Parallel Processing
//!
//! Files are converted on a dedicated [rayon](https://docs.rs/rayon) pool
//! with exactly `threads` workers, so at most that many images are decoded
//! at once. Workers only read the manifest loaded at the start of the run;
//! their results are folded into it afterwards and the manifest is saved
//! once, at the end.
//!
//! ## Output Structure
//!
//! ```text
//! .cache/images/
//! ├── manifest.json          # see crate::manifest
//! ├── cover-acme.webp        # ≤ 1600px wide
//! ├── logo.webp              # ≤ 800px wide
//! └── posts/images/foo.webp  # subdirectories mirror the source tree
//! ```

use crate::config::{PipelineConfig, effective_threads};
use crate::imaging::{
    BackendError, ConvertedImage, ImageBackend, OutputFormat, Quality, RustBackend, convert_image,
};
use crate::manifest::{
    Manifest, ManifestEntry, ManifestError, ManifestStore, hash_conversion_params, hash_file,
};
use crate::naming::{AssetClass, ResizeCeilings, classify, output_relative_path};
use crate::scan::{ScanError, SourceImage, discover};
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Cannot create cache directory {path}: {source}")]
    CacheDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Image processing failed: {0}")]
    Imaging(#[from] BackendError),
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error("Manifest error: {0}")]
    Manifest(#[from] ManifestError),
    #[error("Output {output} is already produced by {claimed_by}")]
    OutputConflict { output: String, claimed_by: String },
    #[error("Cannot start worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Settings for one conversion run.
#[derive(Debug, Clone)]
pub struct ConvertConfig {
    pub quality: Quality,
    pub format: OutputFormat,
    pub ceilings: ResizeCeilings,
    pub cover_prefix: String,
    /// Number of conversions allowed in flight at once.
    pub threads: usize,
    pub prune_orphans: bool,
}

impl ConvertConfig {
    pub fn from_pipeline_config(config: &PipelineConfig) -> Self {
        Self {
            quality: config.quality(),
            format: config.images.format,
            ceilings: config.ceilings(),
            cover_prefix: config.resize.cover_prefix.clone(),
            threads: effective_threads(&config.processing),
            prune_orphans: config.processing.prune_orphans,
        }
    }

    fn max_width_for(&self, file_name: &str) -> (AssetClass, u32) {
        let class = classify(file_name, &self.cover_prefix);
        (class, self.ceilings.max_width(class))
    }

    fn params_hash(&self, max_width: u32, output_name: &str) -> String {
        hash_conversion_params(self.format, self.quality, max_width, output_name)
    }
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self::from_pipeline_config(&PipelineConfig::default())
    }
}

/// Per-file progress, streamed to the CLI printer while the pool runs.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertEvent {
    pub source: String,
    pub status: ConvertStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConvertStatus {
    Cached,
    Converted {
        output: String,
        original: (u32, u32),
        written: (u32, u32),
        bytes_saved: i64,
    },
    Failed(String),
}

/// Summary of a conversion run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ConvertStats {
    pub converted: u32,
    pub skipped: u32,
    pub failed: u32,
    /// Sum of (source size − derivative size) over converted files. Negative
    /// when derivatives came out larger than their sources.
    pub bytes_saved: i64,
}

impl ConvertStats {
    pub fn total(&self) -> u32 {
        self.converted + self.skipped + self.failed
    }
}

impl fmt::Display for ConvertStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} converted, {} cached",
            self.converted, self.skipped
        )?;
        if self.failed > 0 {
            write!(f, ", {} failed", self.failed)?;
        }
        write!(f, " ({} total)", self.total())?;
        if self.converted > 0 {
            write!(
                f,
                ", {} saved",
                crate::output::format_bytes(self.bytes_saved)
            )?;
        }
        Ok(())
    }
}

/// What happened to one source file.
enum SourceOutcome {
    Cached,
    Converted {
        entry: ManifestEntry,
        image: ConvertedImage,
        bytes_saved: i64,
    },
}

/// Convert all sources with the production backend.
pub fn convert(
    source_dir: &Path,
    cache_dir: &Path,
    store: &ManifestStore,
    use_cache: bool,
    config: &ConvertConfig,
    events: Option<Sender<ConvertEvent>>,
) -> Result<ConvertStats, ProcessError> {
    let backend = RustBackend::new();
    convert_with_backend(
        &backend, source_dir, cache_dir, store, use_cache, config, events,
    )
}

/// Convert using a specific backend (allows testing with mock).
///
/// A missing `source_dir` is not an error: nothing is converted and the
/// manifest is left alone. Per-file failures are counted in the returned
/// stats. Only structural failures (cache directory, directory walk, worker
/// pool, manifest write) are returned as errors.
pub fn convert_with_backend(
    backend: &impl ImageBackend,
    source_dir: &Path,
    cache_dir: &Path,
    store: &ManifestStore,
    use_cache: bool,
    config: &ConvertConfig,
    events: Option<Sender<ConvertEvent>>,
) -> Result<ConvertStats, ProcessError> {
    if !source_dir.is_dir() {
        tracing::warn!(source = %source_dir.display(), "source directory not found, nothing to convert");
        return Ok(ConvertStats::default());
    }

    std::fs::create_dir_all(cache_dir).map_err(|source| ProcessError::CacheDir {
        path: cache_dir.to_path_buf(),
        source,
    })?;

    let assigned = assign_outputs(discover(source_dir)?, config.format);
    let mut manifest = if use_cache {
        store.load()
    } else {
        tracing::info!("cache disabled, converting every image");
        store.fresh()
    };
    tracing::info!(
        sources = assigned.len(),
        cached_entries = manifest.len(),
        threads = config.threads,
        "converting images"
    );

    let mut stats = ConvertStats::default();
    let (sources, conflicts): (Vec<AssignedSource>, Vec<AssignedSource>) = assigned
        .into_iter()
        .partition(|a| a.claimed_by.is_none());
    for conflict in &conflicts {
        let error = ProcessError::OutputConflict {
            output: conflict.output.clone(),
            claimed_by: conflict.claimed_by.clone().unwrap_or_default(),
        };
        tracing::error!(source = %conflict.source.relative, error = %error, "conversion failed");
        if let Some(tx) = &events {
            let _ = tx.send(ConvertEvent {
                source: conflict.source.relative.clone(),
                status: ConvertStatus::Failed(error.to_string()),
            });
        }
        // A stale entry would otherwise keep claiming the shared derivative.
        manifest.forget(&conflict.source.relative);
        stats.failed += 1;
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.threads.max(1))
        .thread_name(|i| format!("convert-{i}"))
        .build()?;

    let outcomes: Vec<(&AssignedSource, Result<SourceOutcome, ProcessError>)> = {
        let manifest = &manifest;
        let events = &events;
        pool.install(|| {
            sources
                .par_iter()
                .map(|assigned| {
                    let outcome = process_source(backend, assigned, manifest, cache_dir, config);
                    if let Some(tx) = events {
                        // Printer gone means nobody is listening; keep converting.
                        let _ = tx.send(event_for(&assigned.source, &outcome));
                    }
                    (assigned, outcome)
                })
                .collect()
        })
    };

    for (assigned, outcome) in outcomes {
        let source = &assigned.source;
        match outcome {
            Ok(SourceOutcome::Cached) => stats.skipped += 1,
            Ok(SourceOutcome::Converted {
                entry,
                bytes_saved,
                ..
            }) => {
                manifest.record(source.relative.clone(), entry);
                stats.converted += 1;
                stats.bytes_saved += bytes_saved;
            }
            Err(e) => {
                tracing::error!(source = %source.relative, error = %e, "conversion failed");
                stats.failed += 1;
            }
        }
    }

    if config.prune_orphans {
        let live: HashSet<&str> = sources
            .iter()
            .map(|a| a.source.relative.as_str())
            .collect();
        let pruned = manifest.retain_sources(&live);
        if pruned > 0 {
            tracing::info!(pruned, "dropped manifest entries for deleted sources");
        }
    }

    store.save(&mut manifest)?;
    tracing::info!(
        converted = stats.converted,
        skipped = stats.skipped,
        failed = stats.failed,
        bytes_saved = stats.bytes_saved,
        "conversion finished"
    );
    Ok(stats)
}

/// A discovered source paired with the derivative name it maps to.
struct AssignedSource {
    source: SourceImage,
    output: String,
    /// Set when an earlier source already maps to `output`.
    claimed_by: Option<String>,
}

/// Derive each source's output name. Sources arrive sorted by path, so the
/// first one to map to a name keeps it.
fn assign_outputs(sources: Vec<SourceImage>, format: OutputFormat) -> Vec<AssignedSource> {
    let mut owners: HashMap<String, String> = HashMap::new();
    sources
        .into_iter()
        .map(|source| {
            let output = output_relative_path(&source.relative, format);
            let claimed_by = match owners.get(&output) {
                Some(owner) => Some(owner.clone()),
                None => {
                    owners.insert(output.clone(), source.relative.clone());
                    None
                }
            };
            AssignedSource {
                source,
                output,
                claimed_by,
            }
        })
        .collect()
}

/// Hash, compare, and convert a single source.
fn process_source(
    backend: &impl ImageBackend,
    assigned: &AssignedSource,
    manifest: &Manifest,
    cache_dir: &Path,
    config: &ConvertConfig,
) -> Result<SourceOutcome, ProcessError> {
    let source = &assigned.source;
    let content_hash = hash_file(&source.path)?;
    let (class, max_width) = config.max_width_for(&source.file_name);
    let params_hash = config.params_hash(max_width, &assigned.output);
    if manifest.is_fresh(&source.relative, &content_hash, &params_hash, cache_dir) {
        tracing::debug!(source = %source.relative, "cache hit");
        return Ok(SourceOutcome::Cached);
    }

    let output_path = cache_dir.join(&assigned.output);
    let image = convert_image(
        backend,
        &source.path,
        &output_path,
        max_width,
        config.quality,
        config.format,
    )?;

    let source_size = std::fs::metadata(&source.path)?.len();
    let output_size = std::fs::metadata(&output_path)?.len();
    let bytes_saved = source_size as i64 - output_size as i64;

    tracing::info!(
        source = %source.relative,
        output = %assigned.output,
        class = ?class,
        width = image.output.width,
        height = image.output.height,
        resized = image.was_resized(),
        "converted"
    );

    Ok(SourceOutcome::Converted {
        entry: ManifestEntry {
            content_hash,
            params_hash,
            output_file_name: assigned.output.clone(),
            original_width: image.original.width,
            original_height: image.original.height,
            max_width_applied: max_width,
            converted_at: chrono::Utc::now(),
        },
        image,
        bytes_saved,
    })
}

fn event_for(source: &SourceImage, outcome: &Result<SourceOutcome, ProcessError>) -> ConvertEvent {
    let status = match outcome {
        Ok(SourceOutcome::Cached) => ConvertStatus::Cached,
        Ok(SourceOutcome::Converted {
            entry,
            image,
            bytes_saved,
        }) => ConvertStatus::Converted {
            output: entry.output_file_name.clone(),
            original: (image.original.width, image.original.height),
            written: (image.output.width, image.output.height),
            bytes_saved: *bytes_saved,
        },
        Err(e) => ConvertStatus::Failed(e.to_string()),
    };
    ConvertEvent {
        source: source.relative.clone(),
        status,
    }
}

// ============================================================================
// Dry run
// ============================================================================

/// Why a source would be converted on the next run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaleReason {
    /// No manifest entry.
    New,
    /// Content hash differs from the recorded one.
    Changed,
    /// Format, quality, ceiling, or output name differ from the recorded ones.
    SettingsChanged,
    /// Recorded derivative is gone from the cache directory.
    OutputMissing,
    /// Source could not be read for hashing.
    Unreadable(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannedAction {
    Fresh,
    Convert(StaleReason),
    /// Another source already maps to the same derivative; this one fails.
    Conflict { claimed_by: String },
}

/// One line of a dry-run report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedSource {
    pub source: String,
    pub output: String,
    pub class: AssetClass,
    pub max_width: u32,
    pub action: PlannedAction,
}

/// Report what a conversion run would do, without writing anything.
///
/// Uses the same freshness rule as [`Manifest::is_fresh`].
pub fn check(
    source_dir: &Path,
    cache_dir: &Path,
    manifest: &Manifest,
    config: &ConvertConfig,
) -> Result<Vec<PlannedSource>, ProcessError> {
    if !source_dir.is_dir() {
        tracing::warn!(source = %source_dir.display(), "source directory not found");
        return Ok(Vec::new());
    }

    let plans = assign_outputs(discover(source_dir)?, config.format)
        .into_iter()
        .map(|assigned| {
            let AssignedSource {
                source,
                output,
                claimed_by,
            } = assigned;
            let (class, max_width) = config.max_width_for(&source.file_name);
            let action = match (claimed_by, hash_file(&source.path)) {
                (Some(claimed_by), _) => PlannedAction::Conflict { claimed_by },
                (None, Ok(hash)) => planned_action(
                    manifest,
                    &source.relative,
                    &hash,
                    &config.params_hash(max_width, &output),
                    cache_dir,
                ),
                (None, Err(e)) => PlannedAction::Convert(StaleReason::Unreadable(e.to_string())),
            };
            PlannedSource {
                source: source.relative,
                output,
                class,
                max_width,
                action,
            }
        })
        .collect();
    Ok(plans)
}

fn planned_action(
    manifest: &Manifest,
    source_path: &str,
    content_hash: &str,
    params_hash: &str,
    cache_dir: &Path,
) -> PlannedAction {
    match manifest.get(source_path) {
        None => PlannedAction::Convert(StaleReason::New),
        Some(entry) if entry.content_hash != content_hash => {
            PlannedAction::Convert(StaleReason::Changed)
        }
        Some(entry) if entry.params_hash != params_hash => {
            PlannedAction::Convert(StaleReason::SettingsChanged)
        }
        Some(entry) if !cache_dir.join(&entry.output_file_name).is_file() => {
            PlannedAction::Convert(StaleReason::OutputMissing)
        }
        Some(_) => PlannedAction::Fresh,
    }
}
