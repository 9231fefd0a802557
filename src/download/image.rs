//! Single-image download: photo page → main photo → payload → file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};
use url::Url;

use super::error::DownloadError;
use super::filename::{Claim, FilenameRegistry, fingerprint, image_filename};
use crate::fetch::Fetch;
use crate::html::{DocumentQuery, HtmlDocument, Selector};

/// Id of the element holding the full-resolution image on a photo page.
pub const MAIN_PHOTO_ID: &str = "mainPhoto";

/// Title and payload location read from a photo page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoReference {
    /// `title` attribute of the main photo, if present.
    pub title: Option<String>,
    /// Absolute URL of the image payload.
    pub src: Url,
}

/// An image payload paired with the name it will be stored under.
#[derive(Debug)]
pub struct DownloadedImage {
    /// Filename (already sanitized).
    pub filename: String,
    /// Raw payload.
    pub bytes: Vec<u8>,
}

/// Result of a successful single-image download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedImage {
    /// Photo page the image came from.
    pub page_url: String,
    /// Where the image was stored.
    pub path: PathBuf,
    /// Payload size in bytes.
    pub bytes: u64,
    /// True when identical content had already been written under this name in this run.
    pub already_present: bool,
}

/// Locates the main photo on a photo page and reads its title and source.
///
/// With more than one candidate element the first one wins and a warning is
/// logged.
///
/// # Errors
///
/// - [`DownloadError::MissingPhoto`] when no main photo element exists
/// - [`DownloadError::MissingAttribute`] when it has no usable `src`
pub fn locate_main_photo(
    document: &dyn DocumentQuery,
    page_url: &str,
) -> Result<PhotoReference, DownloadError> {
    let candidates = document.select(&Selector::id(MAIN_PHOTO_ID));
    let Some(photo) = candidates.first() else {
        return Err(DownloadError::missing_photo(page_url));
    };
    if candidates.len() > 1 {
        warn!(
            page_url,
            count = candidates.len(),
            "more than one main photo element found, using the first"
        );
    }

    let src = photo
        .attr("src")
        .map(str::trim)
        .filter(|src| !src.is_empty())
        .and_then(|src| resolve_src(src, page_url))
        .ok_or_else(|| DownloadError::missing_attribute(page_url, "src"))?;

    Ok(PhotoReference {
        title: photo.attr("title").map(str::to_string),
        src,
    })
}

fn resolve_src(src: &str, page_url: &str) -> Option<Url> {
    match Url::parse(page_url) {
        Ok(base) => base.join(src).ok(),
        Err(_) => Url::parse(src).ok(),
    }
}

/// Downloads the image behind a photo page into a destination directory.
pub struct ImageDownloader {
    fetcher: Arc<dyn Fetch>,
    registry: Arc<FilenameRegistry>,
}

impl ImageDownloader {
    /// Creates a downloader with its own filename registry.
    #[must_use]
    pub fn new(fetcher: Arc<dyn Fetch>) -> Self {
        Self::with_registry(fetcher, Arc::new(FilenameRegistry::new()))
    }

    /// Creates a downloader that shares `registry` with other downloaders.
    #[must_use]
    pub fn with_registry(fetcher: Arc<dyn Fetch>, registry: Arc<FilenameRegistry>) -> Self {
        Self { fetcher, registry }
    }

    /// Fetches `page_url`, finds its main photo, and writes the payload into `dest_dir`.
    ///
    /// The directory is created if missing; existing directories are fine.
    /// Files from earlier runs with the same name are overwritten.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError`] if either fetch fails, the page has no main
    /// photo, or the directory/file cannot be written. No file is written when
    /// the main photo is missing.
    #[instrument(skip(self, dest_dir), fields(page_url = %page_url))]
    pub async fn download(
        &self,
        page_url: &str,
        dest_dir: &Path,
    ) -> Result<SavedImage, DownloadError> {
        let page = self.fetcher.fetch(page_url).await?;
        let document = HtmlDocument::parse(&page.text());
        let photo = locate_main_photo(&document, &page.url)?;
        debug!(src = %photo.src, title = ?photo.title, "located main photo");

        tokio::fs::create_dir_all(dest_dir)
            .await
            .map_err(|e| DownloadError::io(dest_dir, e))?;

        let payload = self.fetcher.fetch(photo.src.as_str()).await?;
        let image = DownloadedImage {
            filename: image_filename(photo.title.as_deref(), &photo.src),
            bytes: payload.body,
        };

        self.store(page_url, image, dest_dir).await
    }

    async fn store(
        &self,
        page_url: &str,
        image: DownloadedImage,
        dest_dir: &Path,
    ) -> Result<SavedImage, DownloadError> {
        let bytes = u64::try_from(image.bytes.len()).unwrap_or(u64::MAX);
        let lease = self
            .registry
            .claim(&image.filename, &fingerprint(&image.bytes));
        let path = dest_dir.join(lease.name());

        if let Claim::Renamed(name) = lease.claim() {
            warn!(
                requested = %image.filename,
                stored_as = %name,
                "filename already used by a different image, qualifying with fingerprint"
            );
        }

        let wrote = lease
            .store_once(|| write_image(&path, &image.bytes))
            .await?;
        if wrote {
            info!(path = %path.display(), bytes, "image saved");
        } else {
            debug!(path = %path.display(), "identical image already written in this run");
        }

        Ok(SavedImage {
            page_url: page_url.to_string(),
            path,
            bytes,
            already_present: !wrote,
        })
    }
}

async fn write_image(path: &Path, bytes: &[u8]) -> Result<(), DownloadError> {
    if let Err(source) = tokio::fs::write(path, bytes).await {
        debug!(path = %path.display(), "removing partial file after write error");
        let _ = tokio::fs::remove_file(path).await;
        return Err(DownloadError::io(path, source));
    }
    Ok(())
}

impl std::fmt::Debug for ImageDownloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageDownloader")
            .field("claimed_names", &self.registry.len())
            .finish_non_exhaustive()
    }
}
