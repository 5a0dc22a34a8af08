//! Category pipeline: collect URLs, then download them.
//!
//! Categories run one after another. For each one:
//!
//! ```text
//! create <dataset_root>/<name>/
//!   → collect up to `quota` unique URLs (sessions all closed by now)
//!   → download URL i to <dir>/<i:04>.jpg, once each, on the rayon pool
//! ```
//!
//! Download failures are per item and never stop the category. Only a
//! session that cannot be launched, or a directory that cannot be created,
//! aborts the run.
//!
//! Progress is sent as [`HarvestEvent`]s over an optional channel; the CLI
//! formats them with [`crate::output::format_event`].

use crate::collect::{CollectError, Collector, CycleReport, Outcome};
use crate::config::HarvestConfig;
use crate::download::Downloader;
use crate::naming;
use crate::render::Renderer;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HarvestError {
    #[error(transparent)]
    Collect(#[from] CollectError),
    #[error("Could not create {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// A named class of images with its own quota and output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    /// Search query and directory name.
    pub name: String,
    pub quota: usize,
    pub dir: PathBuf,
}

impl Category {
    /// One category per configured name, under `<root>/<dataset_root>/`.
    pub fn from_config(config: &HarvestConfig, root: &Path) -> Vec<Category> {
        let dataset = root.join(&config.dataset_root);
        config
            .categories
            .iter()
            .map(|name| Category {
                name: name.clone(),
                quota: config.quota,
                dir: dataset.join(name),
            })
            .collect()
    }
}

/// Outcome of one download attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadStatus {
    Saved { file: String, bytes: u64 },
    Failed(String),
}

/// Progress events emitted while harvesting.
#[derive(Debug, Clone)]
pub enum HarvestEvent {
    CategoryStarted {
        name: String,
        quota: usize,
    },
    CycleFinished(CycleReport),
    UrlsCollected {
        name: String,
        found: usize,
        cycles: u32,
        outcome: Outcome,
    },
    /// `index` is 0-based; `total` is the number of URLs being downloaded.
    ImageDownloaded {
        index: usize,
        total: usize,
        url: String,
        status: DownloadStatus,
    },
    CategoryFinished(CategoryReport),
}

/// Summary of one category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryReport {
    pub name: String,
    pub outcome: Outcome,
    pub found: usize,
    pub cycles: u32,
    pub attempted: usize,
    pub saved: usize,
    pub failed: usize,
}

/// Runs categories through collection and download.
pub struct Pipeline<'a, R: Renderer, D: Downloader> {
    collector: Collector<'a, R>,
    downloader: &'a D,
}

impl<'a, R: Renderer, D: Downloader> Pipeline<'a, R, D> {
    pub fn new(collector: Collector<'a, R>, downloader: &'a D) -> Self {
        Self {
            collector,
            downloader,
        }
    }

    /// Harvest every category in order.
    ///
    /// The channel, if any, is dropped on return so a receiving printer
    /// thread sees the end of the stream.
    pub fn run(
        &self,
        categories: &[Category],
        events: Option<Sender<HarvestEvent>>,
    ) -> Result<Vec<CategoryReport>, HarvestError> {
        categories
            .iter()
            .map(|category| self.run_category(category, events.as_ref()))
            .collect()
    }

    pub fn run_category(
        &self,
        category: &Category,
        events: Option<&Sender<HarvestEvent>>,
    ) -> Result<CategoryReport, HarvestError> {
        let send = |event: HarvestEvent| {
            if let Some(tx) = events {
                tx.send(event).ok();
            }
        };

        send(HarvestEvent::CategoryStarted {
            name: category.name.clone(),
            quota: category.quota,
        });
        std::fs::create_dir_all(&category.dir).map_err(|source| HarvestError::CreateDir {
            path: category.dir.clone(),
            source,
        })?;

        let collection = self
            .collector
            .collect(&category.name, category.quota, events)?;
        let found = collection.urls.len();
        send(HarvestEvent::UrlsCollected {
            name: category.name.clone(),
            found,
            cycles: collection.cycles,
            outcome: collection.outcome,
        });

        let urls: Vec<String> = collection.urls.into_iter().take(category.quota).collect();
        let total = urls.len();
        let statuses: Vec<DownloadStatus> = urls
            .par_iter()
            .enumerate()
            .map(|(index, url)| {
                let file = naming::image_file_name(index);
                let status = match self.downloader.download(url, &category.dir.join(&file)) {
                    Ok(bytes) => DownloadStatus::Saved { file, bytes },
                    Err(e) => {
                        tracing::debug!(url, error = %e, "download failed");
                        DownloadStatus::Failed(e.to_string())
                    }
                };
                send(HarvestEvent::ImageDownloaded {
                    index,
                    total,
                    url: url.clone(),
                    status: status.clone(),
                });
                status
            })
            .collect();

        let saved = statuses
            .iter()
            .filter(|s| matches!(s, DownloadStatus::Saved { .. }))
            .count();
        let report = CategoryReport {
            name: category.name.clone(),
            outcome: collection.outcome,
            found,
            cycles: collection.cycles,
            attempted: total,
            saved,
            failed: total - saved,
        };
        send(HarvestEvent::CategoryFinished(report.clone()));
        Ok(report)
    }
}
