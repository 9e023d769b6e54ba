//! # logiciel-images
//!
//! Build-time image pipeline for the Logiciel France directory site. Source
//! PNG/JPEG assets (company logos, blog covers, inline screenshots) are
//! converted into size-capped WebP derivatives, incrementally, and then
//! copied into the published build.
//!
//! # Architecture: Two Steps
//!
//! ```text
//! 1. Convert  public/images/  →  .cache/images/   (+ manifest.json)
//! 2. Copy     .cache/images/  →  dist/images/
//! ```
//!
//! The cache directory survives between builds (and between CI runs when
//! cached), so step 1 only re-encodes images whose bytes changed, whose
//! derivative went missing, or all of them after a processing-version bump.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`process`] | Step 1: hash, compare, and convert under a bounded worker pool |
//! | [`copy`] | Step 2: publish derivatives into the build output |
//! | [`manifest`] | Versioned JSON record of previous conversions |
//! | [`scan`] | Recursive discovery of source images |
//! | [`naming`] | `cover-` classification, resize ceilings, derivative names |
//! | [`imaging`] | Decode / resize / encode behind a backend trait |
//! | [`config`] | Optional TOML config: quality, format, ceilings, parallelism |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Content Hashes, Not Timestamps
//!
//! Freshness is decided by SHA-256 of the source bytes. Checkouts and CI
//! restores reset modification times; hashes survive them.
//!
//! ## One Manifest Write Per Run
//!
//! The manifest is loaded once, workers only read it, and their results are
//! folded in after the batch before a single atomic save. An interrupted run
//! leaves the previous manifest intact, so the next run simply redoes the
//! conversions that manifest does not vouch for.
//!
//! ## Failures Stay Local
//!
//! A corrupt image costs one error line and one tally, never the build. Only
//! structural problems (cache directory, manifest write) abort a run.

pub mod config;
pub mod copy;
pub mod imaging;
pub mod manifest;
pub mod naming;
pub mod output;
pub mod process;
pub mod scan;
