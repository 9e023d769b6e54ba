//! CLI output formatting.
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure and do no I/O. Diagnostics go through
//! `tracing`; these lines are the human-facing progress report.
//!
//! ## Convert
//!
//! ```text
//! cover-acme.png
//!     → cover-acme.webp 2000x1000 → 1600x800 (saved 1.2 MiB)
//! logo.jpg: cached
//! broken.png: FAILED Image processing failed: ...
//! ```
//!
//! ## Check
//!
//! ```text
//! cover-acme.png  [cover ≤1600px]  fresh
//! logo.jpg        [inline ≤800px]  convert (changed)
//!
//! 1 fresh, 1 to convert
//! ```

use crate::naming::AssetClass;
use crate::process::{ConvertEvent, ConvertStatus, PlannedAction, PlannedSource, StaleReason};

/// Human-readable byte count using binary units. Negative values keep their sign.
pub fn format_bytes(bytes: i64) -> String {
    const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];
    let sign = if bytes < 0 { "-" } else { "" };
    let magnitude = bytes.unsigned_abs();
    if magnitude < 1024 {
        return format!("{sign}{magnitude} B");
    }
    let mut value = magnitude as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{sign}{value:.1} {}", UNITS[unit])
}

fn format_dims((w, h): (u32, u32)) -> String {
    format!("{w}x{h}")
}

/// Format one per-file conversion event.
pub fn format_convert_event(event: &ConvertEvent) -> Vec<String> {
    match &event.status {
        ConvertStatus::Cached => vec![format!("{}: cached", event.source)],
        ConvertStatus::Converted {
            output,
            original,
            written,
            bytes_saved,
        } => {
            let size = if original == written {
                format_dims(*written)
            } else {
                format!("{} → {}", format_dims(*original), format_dims(*written))
            };
            let delta = if *bytes_saved >= 0 {
                format!("saved {}", format_bytes(*bytes_saved))
            } else {
                format!("grew {}", format_bytes(-bytes_saved))
            };
            vec![
                event.source.clone(),
                format!("    → {output} {size} ({delta})"),
            ]
        }
        ConvertStatus::Failed(message) => vec![format!("{}: FAILED {}", event.source, message)],
    }
}

fn class_label(class: AssetClass, max_width: u32) -> String {
    match class {
        AssetClass::Cover => format!("[cover ≤{max_width}px]"),
        AssetClass::Inline => format!("[inline ≤{max_width}px]"),
    }
}

fn action_label(action: &PlannedAction) -> String {
    match action {
        PlannedAction::Fresh => "fresh".to_string(),
        PlannedAction::Convert(StaleReason::New) => "convert (new)".to_string(),
        PlannedAction::Convert(StaleReason::Changed) => "convert (changed)".to_string(),
        PlannedAction::Convert(StaleReason::SettingsChanged) => {
            "convert (settings changed)".to_string()
        }
        PlannedAction::Convert(StaleReason::OutputMissing) => {
            "convert (output missing)".to_string()
        }
        PlannedAction::Convert(StaleReason::Unreadable(e)) => format!("convert (unreadable: {e})"),
        PlannedAction::Conflict { claimed_by } => format!("conflict (same output as {claimed_by})"),
    }
}

/// Format the dry-run report, aligned in columns, followed by a tally.
pub fn format_check_output(plans: &[PlannedSource]) -> Vec<String> {
    if plans.is_empty() {
        return vec!["No source images found".to_string()];
    }

    let labels: Vec<String> = plans
        .iter()
        .map(|p| class_label(p.class, p.max_width))
        .collect();
    let name_width = plans.iter().map(|p| p.source.chars().count()).max().unwrap_or(0);
    let label_width = labels.iter().map(|l| l.chars().count()).max().unwrap_or(0);

    let mut lines: Vec<String> = plans
        .iter()
        .zip(&labels)
        .map(|(plan, label)| {
            format!(
                "{:<name_width$}  {:<label_width$}  {}",
                plan.source,
                label,
                action_label(&plan.action)
            )
        })
        .collect();

    let fresh = plans
        .iter()
        .filter(|p| p.action == PlannedAction::Fresh)
        .count();
    let conflicts = plans
        .iter()
        .filter(|p| matches!(p.action, PlannedAction::Conflict { .. }))
        .count();
    let mut tally = format!(
        "{} fresh, {} to convert",
        fresh,
        plans.len() - fresh - conflicts
    );
    if conflicts > 0 {
        tally.push_str(&format!(", {} conflicting", conflicts));
    }
    lines.push(String::new());
    lines.push(tally);
    lines
}

pub fn print_check_output(plans: &[PlannedSource]) {
    for line in format_check_output(plans) {
        println!("{}", line);
    }
}
