//! End-to-end gallery pipeline.
//!
//! resolve id → robots gate → gallery document → photo links → worker pool.
//! Identity resolution is pure, so an input on a foreign domain fails before
//! any network traffic. The robots gate runs before the gallery is fetched.

mod error;
mod progress;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tracing::{info, instrument, warn};
use url::Url;

use crate::download::{
    DEFAULT_CONCURRENCY, DownloadEngine, DownloadStats, ImageDownloader, RobotsGate,
    filename::gallery_dir_name,
};
use crate::fetch::{Fetch, HttpFetcher, HttpTimeouts};
use crate::links::extract_photo_links;
use crate::resolver::{GalleryId, normalize_input_url, resolve_gallery_id};
use crate::site::SiteConfig;
use crate::source::GallerySourceProvider;

pub use error::RunError;

/// Exit code for a run where every image was stored.
pub const EXIT_SUCCESS: i32 = 0;

/// Exit code for a fatal error (bad input, robots refusal, gallery fetch).
pub const EXIT_FATAL: i32 = 1;

/// Exit code for a run where some images failed or were skipped.
pub const EXIT_PARTIAL: i32 = 2;

/// Settings for one gallery run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Parent directory; the gallery folder is created inside it.
    pub output_dir: PathBuf,
    /// Maximum photo pages in flight (1-16).
    pub concurrency: usize,
    /// Stop scheduling downloads after the first failure.
    pub fail_fast: bool,
    /// HTTP timeouts for every request.
    pub timeouts: HttpTimeouts,
    /// Site origin for gallery, robots and relative link URLs.
    pub site: SiteConfig,
    /// Draw a progress bar on stderr.
    pub show_progress: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            concurrency: DEFAULT_CONCURRENCY,
            fail_fast: false,
            timeouts: HttpTimeouts::default(),
            site: SiteConfig::default(),
            show_progress: false,
        }
    }
}

/// What a finished run did.
#[derive(Debug)]
pub struct RunSummary {
    /// Gallery that was downloaded.
    pub gallery_id: GalleryId,
    /// Gallery title from the page, if it had one.
    pub title: Option<String>,
    /// Directory the images were written to.
    pub directory: PathBuf,
    /// Photo-page links found on the gallery page.
    pub total: usize,
    /// Per-image outcome.
    pub stats: DownloadStats,
}

impl RunSummary {
    /// Images stored.
    #[must_use]
    pub fn completed(&self) -> usize {
        self.stats.completed()
    }

    /// Images that failed.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.stats.failed()
    }

    /// Process exit code for this outcome.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        if self.stats.is_complete() {
            EXIT_SUCCESS
        } else {
            EXIT_PARTIAL
        }
    }
}

/// A configured pipeline that can download galleries.
///
/// Holds the shared fetcher, the gallery document cache and the robots cache,
/// so several galleries downloaded through one `GalleryRun` reuse them.
pub struct GalleryRun {
    fetcher: Arc<dyn Fetch>,
    provider: GallerySourceProvider,
    robots: RobotsGate,
    options: RunOptions,
}

impl GalleryRun {
    /// Builds a pipeline backed by a real HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::Client`] if the HTTP client cannot be built.
    pub fn new(options: RunOptions) -> Result<Self, RunError> {
        let fetcher = HttpFetcher::with_timeouts(options.timeouts).map_err(RunError::Client)?;
        Ok(Self::with_fetcher(Arc::new(fetcher), options))
    }

    /// Builds a pipeline over an arbitrary [`Fetch`] implementation.
    #[must_use]
    pub fn with_fetcher(fetcher: Arc<dyn Fetch>, options: RunOptions) -> Self {
        Self {
            provider: GallerySourceProvider::new(Arc::clone(&fetcher), options.site.clone()),
            robots: RobotsGate::new(Arc::clone(&fetcher)),
            fetcher,
            options,
        }
    }

    /// Options this pipeline was built with.
    #[must_use]
    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Downloads every image of the gallery named by `input`.
    ///
    /// # Errors
    ///
    /// Returns [`RunError`] for fatal failures: unrecognized input, robots
    /// refusal, gallery fetch failure, or an unusable output directory.
    /// Individual image failures are reported in the [`RunSummary`].
    #[instrument(skip(self), fields(input = %input))]
    pub async fn run(&self, input: &str) -> Result<RunSummary, RunError> {
        let started = Instant::now();

        let gallery_id = resolve_gallery_id(input)?;
        let input_url = normalize_input_url(input)?;
        info!(gallery_id = %gallery_id, "resolved gallery");

        self.ensure_robots_allowed(&input_url).await?;

        let source = self.provider.get_source(&gallery_id).await?;
        let links = extract_photo_links(source.document(), self.provider.site(), &gallery_id);
        let title = source.title().map(str::to_string);
        let directory = self
            .options
            .output_dir
            .join(gallery_dir_name(title.as_deref(), gallery_id.as_str()));

        info!(
            gallery_id = %gallery_id,
            title = ?title,
            links = links.len(),
            elapsed_ms = started.elapsed().as_millis(),
            "gallery prepared"
        );
        if links.is_empty() {
            warn!(gallery_id = %gallery_id, "no photo links found on gallery page");
        }

        tokio::fs::create_dir_all(&directory)
            .await
            .map_err(|source| RunError::Io {
                path: directory.clone(),
                source,
            })?;

        let total = links.len();
        let mut engine =
            DownloadEngine::new(self.options.concurrency)?.with_fail_fast(self.options.fail_fast);
        let progress = progress::photo_progress_bar(self.options.show_progress, total);
        if let Some(bar) = &progress {
            engine = engine.with_progress(bar.clone());
        }

        let download_started = Instant::now();
        let downloader = Arc::new(ImageDownloader::new(Arc::clone(&self.fetcher)));
        let stats = engine.run(links, downloader, &directory).await?;
        if let Some(bar) = progress {
            bar.finish_and_clear();
        }

        info!(
            directory = %directory.display(),
            completed = stats.completed(),
            failed = stats.failed(),
            total,
            elapsed_ms = download_started.elapsed().as_millis(),
            "gallery download finished"
        );

        Ok(RunSummary {
            gallery_id,
            title,
            directory,
            total,
            stats,
        })
    }

    async fn ensure_robots_allowed(&self, input_url: &Url) -> Result<(), RunError> {
        let robots_url = self.options.site.robots_url();
        self.robots.ensure_allowed(input_url, &robots_url).await?;
        Ok(())
    }
}

impl std::fmt::Debug for GalleryRun {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GalleryRun")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Downloads one gallery with a fresh HTTP-backed pipeline.
///
/// # Errors
///
/// See [`GalleryRun::run`].
pub async fn run_gallery(input: &str, options: &RunOptions) -> Result<RunSummary, RunError> {
    GalleryRun::new(options.clone())?.run(input).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tempfile::TempDir;

    use super::*;
    use crate::fetch::{FetchError, Fetched};
    use crate::resolver::ResolveError;

    const ORIGIN: &str = "https://www.imagefap.com";

    /// Serves canned bodies and records every requested URL.
    #[derive(Default)]
    struct ScriptedFetcher {
        bodies: HashMap<String, Vec<u8>>,
        requests: Mutex<Vec<String>>,
    }

    impl ScriptedFetcher {
        fn with(mut self, url: &str, body: &str) -> Self {
            self.bodies.insert(url.to_string(), body.as_bytes().to_vec());
            self
        }

        fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Fetch for ScriptedFetcher {
        async fn fetch(&self, url: &str) -> Result<Fetched, FetchError> {
            self.requests.lock().unwrap().push(url.to_string());
            self.bodies
                .get(url)
                .map(|body| Fetched {
                    url: url.to_string(),
                    status: 200,
                    body: body.clone(),
                })
                .ok_or_else(|| FetchError::http_status(url, 404))
        }
    }

    fn options(dir: &TempDir) -> RunOptions {
        RunOptions {
            output_dir: dir.path().to_path_buf(),
            ..RunOptions::default()
        }
    }

    fn gallery_fetcher() -> ScriptedFetcher {
        ScriptedFetcher::default()
            .with(
                &format!("{ORIGIN}/gallery.php?gid=42"),
                r#"<html><head><title>Beach Trip</title></head><body>
                   <a href="/photo/1/?gid=42&idx=0">one</a>
                   <a href="/photo/2/?gid=42&idx=1">two</a>
                   <a href="/photo/3/?gid=99&idx=0">other</a>
                   </body></html>"#,
            )
            .with(
                &format!("{ORIGIN}/photo/1/?gid=42&idx=0"),
                r#"<img id="mainPhoto" title="one.jpg" src="https://cdn.imagefap.com/1.jpg">"#,
            )
            .with(
                &format!("{ORIGIN}/photo/2/?gid=42&idx=1"),
                r#"<img id="mainPhoto" title="two.jpg" src="https://cdn.imagefap.com/2.jpg">"#,
            )
            .with("https://cdn.imagefap.com/1.jpg", "ONE")
            .with("https://cdn.imagefap.com/2.jpg", "TWO")
    }

    #[tokio::test]
    async fn test_run_downloads_gallery_into_titled_directory() {
        let temp = TempDir::new().unwrap();
        let run = GalleryRun::with_fetcher(Arc::new(gallery_fetcher()), options(&temp));

        let summary = run.run("imagefap.com/gallery/42").await.unwrap();

        assert_eq!(summary.gallery_id.as_str(), "42");
        assert_eq!(summary.title.as_deref(), Some("Beach Trip"));
        assert_eq!(summary.directory, temp.path().join("Beach Trip"));
        assert_eq!(summary.total, 2);
        assert_eq!(summary.completed(), 2);
        assert_eq!(summary.exit_code(), EXIT_SUCCESS);
        assert_eq!(std::fs::read(summary.directory.join("one.jpg")).unwrap(), b"ONE");
        assert_eq!(std::fs::read(summary.directory.join("two.jpg")).unwrap(), b"TWO");
    }

    #[tokio::test]
    async fn test_run_sequential_downloads_follow_link_order() {
        let temp = TempDir::new().unwrap();
        let fetcher = Arc::new(gallery_fetcher());
        let run = GalleryRun::with_fetcher(fetcher.clone(), options(&temp));

        run.run("https://www.imagefap.com/gallery/42").await.unwrap();

        let requests = fetcher.requests();
        let pages: Vec<&str> = requests
            .iter()
            .map(String::as_str)
            .filter(|url| url.contains("/photo/"))
            .collect();
        assert_eq!(
            pages,
            [
                "https://www.imagefap.com/photo/1/?gid=42&idx=0",
                "https://www.imagefap.com/photo/2/?gid=42&idx=1",
            ]
        );
        assert_eq!(requests[0], "https://www.imagefap.com/robots.txt");
    }

    #[tokio::test]
    async fn test_run_foreign_domain_makes_no_requests() {
        let temp = TempDir::new().unwrap();
        let fetcher = Arc::new(gallery_fetcher());
        let run = GalleryRun::with_fetcher(fetcher.clone(), options(&temp));

        let err = run.run("https://example.com/gallery/42").await.unwrap_err();

        assert!(matches!(err, RunError::Resolve(ResolveError::InvalidDomain { .. })));
        assert!(fetcher.requests().is_empty());
    }

    #[tokio::test]
    async fn test_run_robots_disallow_stops_before_gallery_fetch() {
        let temp = TempDir::new().unwrap();
        let fetcher = Arc::new(
            gallery_fetcher().with(
                "https://www.imagefap.com/robots.txt",
                "User-agent: *\nDisallow: /gallery/\n",
            ),
        );
        let run = GalleryRun::with_fetcher(fetcher.clone(), options(&temp));

        let err = run.run("https://www.imagefap.com/gallery/42").await.unwrap_err();

        assert!(matches!(err, RunError::Robots(_)));
        assert_eq!(fetcher.requests(), ["https://www.imagefap.com/robots.txt"]);
    }

    #[tokio::test]
    async fn test_run_partial_failure_reports_exit_code_two() {
        let temp = TempDir::new().unwrap();
        let fetcher = ScriptedFetcher::default()
            .with(
                "https://www.imagefap.com/gallery.php?gid=7",
                r#"<a href="/photo/1/?gid=7">a</a><a href="/photo/2/?gid=7">b</a>"#,
            )
            .with(
                "https://www.imagefap.com/photo/1/?gid=7",
                r#"<img id="mainPhoto" title="a.jpg" src="https://cdn.imagefap.com/a.jpg">"#,
            )
            .with("https://www.imagefap.com/photo/2/?gid=7", "<html></html>")
            .with("https://cdn.imagefap.com/a.jpg", "A");
        let run = GalleryRun::with_fetcher(Arc::new(fetcher), options(&temp));

        let summary = run.run("https://www.imagefap.com/gallery.php?gid=7").await.unwrap();

        assert_eq!(summary.directory, temp.path().join("7"));
        assert_eq!(summary.completed(), 1);
        assert_eq!(summary.failed(), 1);
        assert_eq!(summary.exit_code(), EXIT_PARTIAL);
    }

    #[tokio::test]
    async fn test_run_gallery_fetch_failure_is_fatal() {
        let temp = TempDir::new().unwrap();
        let run = GalleryRun::with_fetcher(Arc::new(ScriptedFetcher::default()), options(&temp));

        let err = run.run("https://www.imagefap.com/gallery/404").await.unwrap_err();

        assert!(matches!(err, RunError::Source(_)));
    }

    #[tokio::test]
    async fn test_run_invalid_concurrency_is_engine_error() {
        let temp = TempDir::new().unwrap();
        let options = RunOptions {
            concurrency: 0,
            ..options(&temp)
        };
        let run = GalleryRun::with_fetcher(Arc::new(gallery_fetcher()), options);

        let err = run.run("https://www.imagefap.com/gallery/42").await.unwrap_err();

        assert!(matches!(err, RunError::Engine(_)));
    }
}
