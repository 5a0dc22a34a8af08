//! # Simple Harvest
//!
//! Builds an image dataset: for each configured category, search an image
//! site, collect up to `quota` unique full-size image URLs, and download them
//! into `<dataset_root>/<category>/0000.jpg, 0001.jpg, ...`.
//!
//! # Architecture: Collect, Then Download
//!
//! Each category goes through two phases:
//!
//! ```text
//! 1. Collect    query  →  ordered, deduplicated URL list  (headless browser)
//! 2. Download   URLs   →  dataset/<category>/NNNN.jpg     (plain HTTP)
//! ```
//!
//! The phases never overlap. Every browser session is closed before the
//! first download starts, and the URL list is fixed by then, so downloads
//! can run in parallel without touching collection state.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`collect`] | Pagination cycles, result set, termination caps |
//! | [`render`] | Render session traits, headless Chrome backend, bounded waits |
//! | [`identity`] | Proxy / user-agent pool and rotation strategies |
//! | [`download`] | One bounded GET per URL, written atomically |
//! | [`pipeline`] | Per-category orchestration and progress events |
//! | [`config`] | `config.toml` loading, validation, and stock defaults |
//! | [`naming`] | Output file names and URL / category name checks |
//! | [`output`] | CLI output formatting for progress events and `check` |
//!
//! # Design Decisions
//!
//! ## One Browser Per Page
//!
//! A render session lives for exactly one results page. Proxy and user agent
//! are browser launch flags, so a fresh process is the only way to rotate
//! identity between pages; it also means a page that wedges the browser
//! costs one page, not the run. Sessions are closed by `Drop`.
//!
//! ## Bounded Acquisition
//!
//! Searches run dry. Collection stops at the quota or at the first
//! configured cap (pages, pages without anything new, wall-clock time) and
//! reports which one via [`collect::Outcome`].
//!
//! ## Failures Stay Local
//!
//! A thumbnail that cannot be read is skipped, a page that cannot be loaded
//! is abandoned, a download that fails leaves a gap in the numbering. Only a
//! browser that cannot be launched at all stops the run.

pub mod collect;
pub mod config;
pub mod download;
pub mod identity;
pub mod naming;
pub mod output;
pub mod pipeline;
pub mod render;

#[cfg(test)]
pub(crate) mod test_helpers;
