//! Bounded worker pool for photo-page downloads.
//!
//! The engine fans a list of photo-page links out to an [`ImageDownloader`]
//! using a semaphore-based concurrency limit. With a limit of 1 the pages are
//! processed strictly in link order.
//!
//! # Failure policy
//!
//! A failed image is logged and counted and the run continues with the next
//! link. With `fail_fast` set, the first failure stops scheduling; downloads
//! already in flight are allowed to finish.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use imagefap_downloader::download::{DownloadEngine, ImageDownloader};
//! use imagefap_downloader::fetch::HttpFetcher;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let downloader = Arc::new(ImageDownloader::new(Arc::new(HttpFetcher::new()?)));
//! let engine = DownloadEngine::new(4)?;
//! let links = vec!["https://www.imagefap.com/photo/1/?gid=5".to_string()];
//! let stats = engine.run(links, downloader, Path::new("./Gallery")).await?;
//! println!("Completed: {}, Failed: {}", stats.completed(), stats.failed());
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use indicatif::ProgressBar;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use super::error::DownloadError;
use super::image::{ImageDownloader, SavedImage};

/// Minimum allowed concurrency value.
pub const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed concurrency value.
pub const MAX_CONCURRENCY: usize = 16;

/// Default concurrency: sequential, in link order.
pub const DEFAULT_CONCURRENCY: usize = 1;

/// Error type for download engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Invalid concurrency value provided.
    #[error(
        "invalid concurrency value {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"
    )]
    InvalidConcurrency {
        /// The invalid value that was provided.
        value: usize,
    },

    /// Semaphore was closed unexpectedly.
    #[error("semaphore closed unexpectedly")]
    SemaphoreClosed,

    /// A download task panicked or was cancelled.
    #[error("download task failed to complete: {0}")]
    Task(String),
}

/// A photo page that could not be downloaded.
#[derive(Debug)]
pub struct FailedDownload {
    /// Photo page URL.
    pub page_url: String,
    /// Why it failed.
    pub error: DownloadError,
}

/// Outcome of one engine run.
#[derive(Debug, Default)]
pub struct DownloadStats {
    saved: Vec<SavedImage>,
    failures: Vec<FailedDownload>,
    skipped: usize,
}

impl DownloadStats {
    /// Number of images stored (including identical repeats).
    #[must_use]
    pub fn completed(&self) -> usize {
        self.saved.len()
    }

    /// Number of photo pages that failed.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    /// Number of links never attempted because of fail-fast.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Total number of links handed to the engine.
    #[must_use]
    pub fn total(&self) -> usize {
        self.completed() + self.failed() + self.skipped()
    }

    /// Total bytes stored.
    #[must_use]
    pub fn bytes(&self) -> u64 {
        self.saved.iter().map(|image| image.bytes).sum()
    }

    /// Stored images, in completion order.
    #[must_use]
    pub fn saved(&self) -> &[SavedImage] {
        &self.saved
    }

    /// Failed photo pages, in completion order.
    #[must_use]
    pub fn failures(&self) -> &[FailedDownload] {
        &self.failures
    }

    /// True when every link was downloaded.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.skipped == 0
    }

    fn record(&mut self, page_url: String, result: Result<SavedImage, DownloadError>) {
        match result {
            Ok(saved) => self.saved.push(saved),
            Err(error) => {
                warn!(page_url = %page_url, error = %error, "image download failed");
                self.failures.push(FailedDownload { page_url, error });
            }
        }
    }
}

/// Download engine with bounded concurrency.
///
/// # Concurrency Model
///
/// - Each photo page runs in its own Tokio task
/// - A semaphore permit is acquired before spawning, so at most `concurrency`
///   pages are in flight and spawn order follows link order
/// - Permits are released automatically when downloads complete (RAII)
pub struct DownloadEngine {
    semaphore: Arc<Semaphore>,
    concurrency: usize,
    fail_fast: bool,
    progress: Option<ProgressBar>,
}

impl DownloadEngine {
    /// Creates an engine with the given concurrency limit.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConcurrency`] if the value is outside
    /// the valid range (1-16).
    #[instrument(level = "debug")]
    pub fn new(concurrency: usize) -> Result<Self, EngineError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&concurrency) {
            return Err(EngineError::InvalidConcurrency { value: concurrency });
        }
        debug!(concurrency, "creating download engine");
        Ok(Self {
            semaphore: Arc::new(Semaphore::new(concurrency)),
            concurrency,
            fail_fast: false,
            progress: None,
        })
    }

    /// Stops scheduling new downloads after the first failure.
    #[must_use]
    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Advances `progress` by one for every finished photo page.
    #[must_use]
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Returns the configured concurrency limit.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Downloads every photo page in `links` into `dest_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] only for engine-level faults (closed semaphore,
    /// panicked task). Per-image failures are reported in [`DownloadStats`].
    #[instrument(skip(self, links, downloader), fields(links = links.len(), dest = %dest_dir.display()))]
    pub async fn run(
        &self,
        links: Vec<String>,
        downloader: Arc<ImageDownloader>,
        dest_dir: &Path,
    ) -> Result<DownloadStats, EngineError> {
        let mut stats = DownloadStats::default();
        let mut tasks = JoinSet::new();
        let aborted = Arc::new(AtomicBool::new(false));
        let dest_dir: Arc<PathBuf> = Arc::new(dest_dir.to_path_buf());
        let total = links.len();

        for (index, page_url) in links.into_iter().enumerate() {
            let permit = Arc::clone(&self.semaphore)
                .acquire_owned()
                .await
                .map_err(|_| EngineError::SemaphoreClosed)?;

            // Drain finished tasks so failures are seen before the next spawn.
            while let Some(joined) = tasks.try_join_next() {
                let (url, result) = joined.map_err(|e| EngineError::Task(e.to_string()))?;
                self.finish(&mut stats, url, result);
            }

            if self.fail_fast && aborted.load(Ordering::SeqCst) {
                stats.skipped = total - index;
                info!(skipped = stats.skipped, "fail-fast: not scheduling remaining pages");
                break;
            }

            let downloader = Arc::clone(&downloader);
            let dest_dir = Arc::clone(&dest_dir);
            let aborted = Arc::clone(&aborted);
            tasks.spawn(async move {
                let result = downloader.download(&page_url, &dest_dir).await;
                if result.is_err() {
                    aborted.store(true, Ordering::SeqCst);
                }
                drop(permit);
                (page_url, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            let (url, result) = joined.map_err(|e| EngineError::Task(e.to_string()))?;
            self.finish(&mut stats, url, result);
        }

        info!(
            completed = stats.completed(),
            failed = stats.failed(),
            skipped = stats.skipped(),
            "download batch finished"
        );
        Ok(stats)
    }

    fn finish(
        &self,
        stats: &mut DownloadStats,
        page_url: String,
        result: Result<SavedImage, DownloadError>,
    ) {
        if let Some(progress) = &self.progress {
            progress.inc(1);
        }
        stats.record(page_url, result);
    }
}

impl std::fmt::Debug for DownloadEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadEngine")
            .field("concurrency", &self.concurrency)
            .field("fail_fast", &self.fail_fast)
            .field("progress", &self.progress.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_accepts_valid_concurrency() {
        assert_eq!(DownloadEngine::new(1).unwrap().concurrency(), 1);
        assert_eq!(DownloadEngine::new(16).unwrap().concurrency(), 16);
    }

    #[test]
    fn test_engine_rejects_zero_concurrency() {
        let err = DownloadEngine::new(0).unwrap_err();
        assert!(matches!(err, EngineError::InvalidConcurrency { value: 0 }));
    }

    #[test]
    fn test_engine_rejects_excessive_concurrency() {
        let err = DownloadEngine::new(17).unwrap_err();
        assert!(err.to_string().contains("between 1 and 16"));
    }

    #[test]
    fn test_stats_default_is_complete_and_empty() {
        let stats = DownloadStats::default();
        assert_eq!(stats.total(), 0);
        assert!(stats.is_complete());
    }

    #[test]
    fn test_stats_record_failure() {
        let mut stats = DownloadStats::default();
        stats.record(
            "https://www.imagefap.com/photo/1/".to_string(),
            Err(DownloadError::missing_photo("https://www.imagefap.com/photo/1/")),
        );
        assert_eq!(stats.failed(), 1);
        assert!(!stats.is_complete());
        assert_eq!(stats.failures()[0].page_url, "https://www.imagefap.com/photo/1/");
    }
}
