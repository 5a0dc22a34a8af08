//! CLI output formatting for harvest runs.
//!
//! # Information-First Display
//!
//! Each category leads with its name; pages and downloads follow as indented
//! context. URLs are secondary information and are shortened when long, so a
//! run reads as an inventory of what was found and saved.
//!
//! # Output Format
//!
//! ## Run
//!
//! ```text
//! polar bear (quota 1000)
//!     page 0: 30 thumbnails, 28 new, 0 duplicate, 1 rejected, 1 skipped
//!         Identity: proxy 10.0.0.1:8080, user agent Mozilla/5.0
//!     page 1: navigation failed: Navigation to https://... failed: timeout
//!         Identity: proxy none, user agent Mozilla/5.0
//!     Collected 1000 URLs in 37 pages (quota met)
//!     0001/1000 0000.jpg (48213 bytes)
//!     0002/1000 FAILED https://img.example/b.jpg: Server answered 404
//! polar bear: 999 saved, 1 failed
//!
//! Harvest complete: 2 categories, 1998 saved, 2 failed
//! ```
//!
//! ## Check
//!
//! ```text
//! Config
//!     config.toml
//! Categories
//! 001 polar bear → ./dataset/polar bear (quota 1000)
//! 002 brown bear → ./dataset/brown bear (quota 1000)
//! Identity pool
//!     Proxies: 3 (random)
//!     User agents: 1 (random)
//! ```
//!
//! # Architecture
//!
//! Each output has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::collect::{CycleAbort, CycleReport};
use crate::config::{HarvestConfig, RotationStrategy};
use crate::identity::IdentityPool;
use crate::pipeline::{Category, CategoryReport, DownloadStatus, HarvestEvent};
use std::path::Path;

/// URLs longer than this are shortened in progress lines.
const MAX_URL_DISPLAY: usize = 96;

// ============================================================================
// Shared display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Shorten `url` to `max` characters, appending `...` if cut.
fn truncate_url(url: &str, max: usize) -> String {
    match url.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &url[..cut]),
        None => url.to_string(),
    }
}

/// `n/total` with both sides padded to the width of `total`.
fn progress(n: usize, total: usize) -> String {
    let width = total.to_string().len().max(4);
    format!("{n:0>width$}/{total:0>width$}")
}

fn strategy_name(strategy: RotationStrategy) -> &'static str {
    match strategy {
        RotationStrategy::Random => "random",
        RotationStrategy::RoundRobin => "round-robin",
    }
}

// ============================================================================
// Run output
// ============================================================================

fn format_cycle(report: &CycleReport) -> Vec<String> {
    let summary = match &report.aborted {
        Some(CycleAbort::Navigation(reason)) => {
            format!("page {}: navigation failed: {}", report.page, reason)
        }
        _ => format!(
            "page {}: {} thumbnails, {} new, {} duplicate, {} rejected, {} skipped",
            report.page,
            report.thumbnails,
            report.added,
            report.duplicates,
            report.rejected,
            report.skipped
        ),
    };
    let mut lines = vec![format!("{}{}", indent(1), summary)];
    if let Some(CycleAbort::LostListing(reason)) = &report.aborted {
        lines.push(format!("{}Listing lost: {}", indent(2), reason));
    }
    lines.push(format!("{}Identity: {}", indent(2), report.identity));
    lines
}

/// Format a single harvest progress event as display lines.
pub fn format_event(event: &HarvestEvent) -> Vec<String> {
    match event {
        HarvestEvent::CategoryStarted { name, quota } => {
            vec![format!("{} (quota {})", name, quota)]
        }
        HarvestEvent::CycleFinished(report) => format_cycle(report),
        HarvestEvent::UrlsCollected {
            found,
            cycles,
            outcome,
            ..
        } => {
            let pages = if *cycles == 1 { "page" } else { "pages" };
            vec![format!(
                "{}Collected {} URLs in {} {} ({})",
                indent(1),
                found,
                cycles,
                pages,
                outcome
            )]
        }
        HarvestEvent::ImageDownloaded {
            index,
            total,
            url,
            status,
        } => {
            let position = progress(index + 1, *total);
            let line = match status {
                DownloadStatus::Saved { file, bytes } => {
                    format!("{} {} ({} bytes)", position, file, bytes)
                }
                DownloadStatus::Failed(reason) => format!(
                    "{} FAILED {}: {}",
                    position,
                    truncate_url(url, MAX_URL_DISPLAY),
                    reason
                ),
            };
            vec![format!("{}{}", indent(1), line)]
        }
        HarvestEvent::CategoryFinished(report) => vec![format!(
            "{}: {} saved, {} failed",
            report.name, report.saved, report.failed
        )],
    }
}

/// Print a harvest progress event to stdout.
pub fn print_event(event: &HarvestEvent) {
    for line in format_event(event) {
        println!("{}", line);
    }
}

/// Format the end-of-run summary across all categories.
pub fn format_summary(reports: &[CategoryReport]) -> Vec<String> {
    let saved: usize = reports.iter().map(|r| r.saved).sum();
    let failed: usize = reports.iter().map(|r| r.failed).sum();
    let categories = if reports.len() == 1 {
        "category"
    } else {
        "categories"
    };
    let mut lines = vec![
        String::new(),
        format!(
            "Harvest complete: {} {}, {} saved, {} failed",
            reports.len(),
            categories,
            saved,
            failed
        ),
    ];
    for report in reports.iter().filter(|r| r.saved < r.found || r.found == 0) {
        lines.push(format!(
            "{}{}: {} of {} found URLs saved ({})",
            indent(1),
            report.name,
            report.saved,
            report.found,
            report.outcome
        ));
    }
    lines
}

/// Print the end-of-run summary to stdout.
pub fn print_summary(reports: &[CategoryReport]) {
    for line in format_summary(reports) {
        println!("{}", line);
    }
}

// ============================================================================
// Check output
// ============================================================================

/// Format the `check` command output: config source, categories and the
/// identity pool that sessions would draw from.
///
/// Destinations are shown under `root`, where a run would write them.
/// `config_file` is the `config.toml` that was loaded, if any.
pub fn format_check_output(
    config: &HarvestConfig,
    pool: &IdentityPool,
    root: &Path,
    config_file: Option<&Path>,
) -> Vec<String> {
    let mut lines = vec!["Config".to_string()];
    match config_file {
        Some(path) => lines.push(format!("{}{}", indent(1), path.display())),
        None => lines.push(format!("{}(stock defaults)", indent(1))),
    }

    lines.push("Categories".to_string());
    for (i, category) in Category::from_config(config, root).iter().enumerate() {
        lines.push(format!(
            "{} {} \u{2192} {} (quota {})",
            format_index(i + 1),
            category.name,
            category.dir.display(),
            category.quota
        ));
    }

    let strategy = strategy_name(config.identity.strategy);
    lines.push("Identity pool".to_string());
    if pool.proxies().is_empty() {
        lines.push(format!("{}Proxies: none (direct connection)", indent(1)));
    } else {
        lines.push(format!(
            "{}Proxies: {} ({})",
            indent(1),
            pool.proxies().len(),
            strategy
        ));
    }
    lines.push(format!(
        "{}User agents: {} ({})",
        indent(1),
        pool.user_agents().len(),
        strategy
    ));
    lines
}

/// Print the `check` command output to stdout.
pub fn print_check_output(
    config: &HarvestConfig,
    pool: &IdentityPool,
    root: &Path,
    config_file: Option<&Path>,
) {
    for line in format_check_output(config, pool, root, config_file) {
        println!("{}", line);
    }
}
