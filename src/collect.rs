//! URL collection: paginated traversal of image search results.
//!
//! Given a query and a quota, the [`Collector`] walks result pages one
//! *pagination cycle* at a time until it holds `quota` unique full-size image
//! URLs or a termination cap fires.
//!
//! ## One cycle
//!
//! ```text
//! pick identity ─► open session ─► load ?p=<page>&text=<query>
//!                                     │
//!                  ┌──────────────────┘
//!                  ▼
//!      for each thumbnail (until quota):
//!          click ─► wait for full image ─► read URL ─► insert if http(s)
//!            └──────────── always go back to the listing ◄──┘
//!                  │
//!                  ▼
//!      drop session, page += 1
//! ```
//!
//! ## Failure isolation
//!
//! | Failure | Scope | Effect |
//! |---|---|---|
//! | Click fails / no full image appears | one thumbnail | skipped, next thumbnail |
//! | Empty or non-http URL | one thumbnail | rejected, next thumbnail |
//! | Results page fails to load | one cycle | cycle abandoned, next page |
//! | Going back to the listing fails | rest of the cycle | cycle ends, next page |
//! | Session cannot be launched | whole run | [`CollectError`] |
//!
//! A fresh session per cycle means a blocked or crashed browser never leaks
//! into the next page, and each page can be fetched under another identity.
//!
//! ## Termination
//!
//! A query can run out of results, or keep returning the same ones. The
//! [`Limits`] caps (cycles, consecutive cycles without anything new,
//! wall-clock time) turn that into an explicit [`Outcome`] instead of an
//! endless loop.

use crate::config::{LimitsConfig, SearchConfig};
use crate::identity::{Identity, IdentityPool};
use crate::naming;
use crate::pipeline::HarvestEvent;
use crate::render::{ElementRef, RenderSession, Renderer, SessionError, WaitPolicy, wait_until};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use std::collections::HashSet;
use std::fmt;
use std::sync::mpsc::Sender;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Characters left unescaped in the query: alphanumerics plus `_ . - ~ /`.
const QUERY: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'_')
    .remove(b'.')
    .remove(b'-')
    .remove(b'~')
    .remove(b'/');

#[derive(Error, Debug)]
pub enum CollectError {
    #[error("Could not start a render session for page {page}: {source}")]
    SessionStart { page: u32, source: SessionError },
}

/// Build the results-page URL for `page` of `query`.
pub fn search_url(endpoint: &str, page: u32, query: &str) -> String {
    format!(
        "{endpoint}?p={page}&text={}",
        utf8_percent_encode(query, QUERY)
    )
}

// ============================================================================
// Result set
// ============================================================================

/// What happened to a URL offered to the [`ResultSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Insert {
    Added,
    Duplicate,
    Full,
}

/// Quota-bounded, insertion-ordered set of unique URLs.
#[derive(Debug, Clone)]
pub struct ResultSet {
    quota: usize,
    seen: HashSet<String>,
    urls: Vec<String>,
}

impl ResultSet {
    pub fn with_quota(quota: usize) -> Self {
        Self {
            quota,
            seen: HashSet::new(),
            urls: Vec::new(),
        }
    }

    pub fn insert(&mut self, url: String) -> Insert {
        if self.seen.contains(&url) {
            return Insert::Duplicate;
        }
        if self.is_full() {
            return Insert::Full;
        }
        self.seen.insert(url.clone());
        self.urls.push(url);
        Insert::Added
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.urls.len() >= self.quota
    }

    /// The URLs in the order they were first found.
    pub fn into_urls(self) -> Vec<String> {
        self.urls
    }
}

// ============================================================================
// Termination
// ============================================================================

/// Caps on a single `collect` call. `None` disables a cap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Limits {
    pub max_cycles: Option<u32>,
    pub max_stalled_cycles: Option<u32>,
    pub max_elapsed: Option<Duration>,
}

impl Limits {
    pub fn from_config(config: &LimitsConfig) -> Self {
        Self {
            max_cycles: config.cycle_cap(),
            max_stalled_cycles: config.stall_cap(),
            max_elapsed: config.max_elapsed_secs.map(Duration::from_secs),
        }
    }

    /// The first cap reached, if any.
    fn reached(&self, cycles: u32, stalled: u32, elapsed: Duration) -> Option<StopReason> {
        if let Some(max) = self.max_cycles.filter(|&max| cycles >= max) {
            return Some(StopReason::MaxCycles(max));
        }
        if let Some(max) = self.max_stalled_cycles.filter(|&max| stalled >= max) {
            return Some(StopReason::Stalled(max));
        }
        self.max_elapsed
            .filter(|&max| elapsed >= max)
            .map(StopReason::Deadline)
    }
}

/// Why collection stopped short of the quota.
///
/// `Stalled` counts every cycle that added no URL, whether it failed to load
/// or only turned up duplicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    MaxCycles(u32),
    Stalled(u32),
    Deadline(Duration),
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::MaxCycles(n) => write!(f, "reached the {n}-page limit"),
            StopReason::Stalled(n) => write!(f, "{n} pages in a row added nothing new"),
            StopReason::Deadline(d) => write!(f, "ran out of time after {}s", d.as_secs()),
        }
    }
}

/// How a `collect` call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    QuotaMet,
    /// Some URLs, fewer than the quota.
    Partial(StopReason),
    /// No URLs at all.
    NoProgress(StopReason),
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::QuotaMet => write!(f, "quota met"),
            Outcome::Partial(reason) => write!(f, "partial: {reason}"),
            Outcome::NoProgress(reason) => write!(f, "no progress: {reason}"),
        }
    }
}

/// Result of one `collect` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collection {
    pub urls: Vec<String>,
    pub cycles: u32,
    pub outcome: Outcome,
}

// ============================================================================
// Cycle reports
// ============================================================================

/// Why a cycle ended before visiting all its thumbnails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleAbort {
    /// The results page never loaded.
    Navigation(String),
    /// Going back from a detail view failed; the listing is gone.
    LostListing(String),
}

/// What one pagination cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub page: u32,
    pub identity: Identity,
    pub thumbnails: usize,
    pub added: usize,
    pub duplicates: usize,
    /// Detail views whose URL was empty or not http(s).
    pub rejected: usize,
    /// Thumbnails whose detail view could not be read.
    pub skipped: usize,
    pub aborted: Option<CycleAbort>,
}

impl CycleReport {
    fn new(page: u32, identity: Identity) -> Self {
        Self {
            page,
            identity,
            thumbnails: 0,
            added: 0,
            duplicates: 0,
            rejected: 0,
            skipped: 0,
            aborted: None,
        }
    }
}

// ============================================================================
// Collector
// ============================================================================

/// Drives render sessions over result pages for one query at a time.
pub struct Collector<'a, R: Renderer> {
    renderer: &'a R,
    identities: &'a IdentityPool,
    search: SearchConfig,
    wait: WaitPolicy,
    limits: Limits,
}

impl<'a, R: Renderer> Collector<'a, R> {
    pub fn new(
        renderer: &'a R,
        identities: &'a IdentityPool,
        search: &SearchConfig,
        limits: Limits,
    ) -> Self {
        Self {
            renderer,
            identities,
            search: search.clone(),
            wait: WaitPolicy::new(
                Duration::from_millis(search.wait_timeout_ms),
                Duration::from_millis(search.poll_interval_ms),
            ),
            limits,
        }
    }

    /// Collect up to `quota` unique image URLs for `query`.
    ///
    /// Only a session that cannot be launched is an error; every other
    /// failure is absorbed into the cycle it happened in. A
    /// [`HarvestEvent::CycleFinished`] is sent after each cycle.
    pub fn collect(
        &self,
        query: &str,
        quota: usize,
        events: Option<&Sender<HarvestEvent>>,
    ) -> Result<Collection, CollectError> {
        let started = Instant::now();
        let mut results = ResultSet::with_quota(quota);
        // One cycle per page, so the cursor doubles as the cycle count
        let mut page: u32 = 0;
        let mut stalled: u32 = 0;

        while !results.is_full() {
            if let Some(reason) = self.limits.reached(page, stalled, started.elapsed()) {
                tracing::warn!(query, %reason, found = results.len(), quota, "stopping short of quota");
                let outcome = if results.is_empty() {
                    Outcome::NoProgress(reason)
                } else {
                    Outcome::Partial(reason)
                };
                return Ok(Collection {
                    urls: results.into_urls(),
                    cycles: page,
                    outcome,
                });
            }

            let mut report = CycleReport::new(page, self.identities.next_identity());
            {
                let mut session = self
                    .renderer
                    .open(&report.identity)
                    .map_err(|source| CollectError::SessionStart { page, source })?;
                self.run_cycle(&mut session, query, &mut results, &mut report);
            }

            stalled = if report.added > 0 { 0 } else { stalled + 1 };
            if let Some(tx) = events {
                tx.send(HarvestEvent::CycleFinished(report)).ok();
            }
            page += 1;
        }

        Ok(Collection {
            urls: results.into_urls(),
            cycles: page,
            outcome: Outcome::QuotaMet,
        })
    }

    fn run_cycle(
        &self,
        session: &mut R::Session,
        query: &str,
        results: &mut ResultSet,
        report: &mut CycleReport,
    ) {
        let url = search_url(&self.search.endpoint, report.page, query);
        tracing::debug!(%url, identity = %report.identity, "loading results page");

        let listing = session
            .navigate(&url)
            .and_then(|()| self.wait_for(session, &self.search.thumbnail_selector));
        let thumbnails = match listing {
            Ok(thumbnails) => thumbnails,
            Err(e) => {
                tracing::warn!(%url, error = %e, "results page failed; skipping to next page");
                report.aborted = Some(CycleAbort::Navigation(e.to_string()));
                return;
            }
        };
        report.thumbnails = thumbnails.len();

        for thumbnail in &thumbnails {
            if results.is_full() {
                break;
            }
            if let Err(e) = session.click(thumbnail) {
                tracing::debug!(index = thumbnail.index, error = %e, "thumbnail click failed");
                report.skipped += 1;
                continue;
            }

            match self.extract(session) {
                Ok(Some(image_url)) => match results.insert(image_url) {
                    Insert::Added => report.added += 1,
                    Insert::Duplicate => report.duplicates += 1,
                    Insert::Full => {}
                },
                Ok(None) => report.rejected += 1,
                Err(e) => {
                    tracing::debug!(index = thumbnail.index, error = %e, "detail extraction failed");
                    report.skipped += 1;
                }
            }

            let returned = session
                .back()
                .and_then(|()| self.wait_for(session, &self.search.thumbnail_selector));
            if let Err(e) = returned {
                tracing::warn!(page = report.page, error = %e, "lost the results listing");
                report.aborted = Some(CycleAbort::LostListing(e.to_string()));
                break;
            }
        }
    }

    /// Read the full-size URL from the open detail view.
    ///
    /// `Ok(None)` when the attribute is missing or not an http(s) URL.
    fn extract(&self, session: &mut R::Session) -> Result<Option<String>, SessionError> {
        let full = &self.search.full_image_selector;
        let element = self
            .wait_for(session, full)?
            .into_iter()
            .next()
            .ok_or_else(|| SessionError::ElementMissing {
                selector: full.clone(),
                index: 0,
            })?;
        let value = session.attribute(&element, &self.search.image_attribute)?;
        Ok(value
            .map(|v| v.trim().to_string())
            .filter(|v| naming::has_http_scheme(v)))
    }

    /// Elements matching `selector`, waiting for at least one to appear.
    /// Empty if none did within the wait policy.
    fn wait_for(
        &self,
        session: &mut R::Session,
        selector: &str,
    ) -> Result<Vec<ElementRef>, SessionError> {
        let found = wait_until(&self.wait, || {
            session
                .find_elements(selector)
                .map(|elements| (!elements.is_empty()).then_some(elements))
        })?;
        Ok(found.unwrap_or_default())
    }
}
