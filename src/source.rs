//! Gallery document provider with a keyed, single-flight cache.
//!
//! The gallery page is the most expensive document in a run and every later
//! step reads from it, so it is fetched at most once per gallery id for the
//! lifetime of a [`GallerySourceProvider`]. Concurrent callers asking for the
//! same id share one in-flight request; callers asking for different ids never
//! see each other's documents.

use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument};

use crate::fetch::{Fetch, FetchError};
use crate::html::{DocumentQuery, HtmlDocument, Selector};
use crate::resolver::GalleryId;
use crate::site::SiteConfig;

/// Errors from obtaining a gallery document.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The gallery document could not be fetched.
    #[error("failed to fetch gallery {gallery_id}: {source}")]
    Fetch {
        /// Gallery that was requested.
        gallery_id: GalleryId,
        /// Underlying transport error.
        #[source]
        source: FetchError,
    },
}

/// A fetched and parsed gallery document.
#[derive(Debug)]
pub struct GallerySource {
    gallery_id: GalleryId,
    url: String,
    document: HtmlDocument,
}

impl GallerySource {
    /// Wraps an already-parsed document.
    #[must_use]
    pub fn new(gallery_id: GalleryId, url: impl Into<String>, document: HtmlDocument) -> Self {
        Self {
            gallery_id,
            url: url.into(),
            document,
        }
    }

    /// Gallery this document was fetched for.
    #[must_use]
    pub fn gallery_id(&self) -> &GalleryId {
        &self.gallery_id
    }

    /// Final URL of the document after redirects.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Parsed document.
    #[must_use]
    pub fn document(&self) -> &HtmlDocument {
        &self.document
    }

    /// Text of the first `<title>` element, if present and non-blank.
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.document
            .select(&Selector::tag("title"))
            .first()
            .map(|element| element.text().trim())
            .filter(|title| !title.is_empty())
    }
}

type SourceSlot = Arc<OnceCell<Arc<GallerySource>>>;

/// Fetches gallery documents and memoizes them by [`GalleryId`].
pub struct GallerySourceProvider {
    fetcher: Arc<dyn Fetch>,
    site: SiteConfig,
    cache: DashMap<GalleryId, SourceSlot>,
}

impl GallerySourceProvider {
    /// Creates a provider with an empty cache.
    #[must_use]
    pub fn new(fetcher: Arc<dyn Fetch>, site: SiteConfig) -> Self {
        Self {
            fetcher,
            site,
            cache: DashMap::new(),
        }
    }

    /// Returns the gallery document for `gallery_id`, fetching it on first use.
    ///
    /// Failed fetches are not cached; a later call retries the request.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Fetch`] when the gallery page cannot be fetched.
    #[instrument(skip(self), fields(gallery_id = %gallery_id))]
    pub async fn get_source(
        &self,
        gallery_id: &GalleryId,
    ) -> Result<Arc<GallerySource>, SourceError> {
        // Clone the slot out so no map guard is held across the await.
        let slot: SourceSlot = self
            .cache
            .entry(gallery_id.clone())
            .or_default()
            .value()
            .clone();

        if let Some(source) = slot.get() {
            debug!("gallery document served from cache");
            return Ok(Arc::clone(source));
        }

        let source = slot
            .get_or_try_init(|| self.fetch_source(gallery_id))
            .await?;
        Ok(Arc::clone(source))
    }

    /// Returns true if a document for `gallery_id` is already cached.
    #[must_use]
    pub fn is_cached(&self, gallery_id: &GalleryId) -> bool {
        self.cache
            .get(gallery_id)
            .is_some_and(|slot| slot.initialized())
    }

    /// Site configuration used for request URLs.
    #[must_use]
    pub fn site(&self) -> &SiteConfig {
        &self.site
    }

    async fn fetch_source(&self, gallery_id: &GalleryId) -> Result<Arc<GallerySource>, SourceError> {
        let request_url = self.site.gallery_url(gallery_id.as_str());
        let fetched = self
            .fetcher
            .fetch(&request_url)
            .await
            .map_err(|source| SourceError::Fetch {
                gallery_id: gallery_id.clone(),
                source,
            })?;

        let document = HtmlDocument::parse(&fetched.text());
        info!(
            final_url = %fetched.url,
            elements = document.len(),
            "fetched gallery document"
        );
        Ok(Arc::new(GallerySource::new(
            gallery_id.clone(),
            fetched.url,
            document,
        )))
    }
}

impl std::fmt::Debug for GallerySourceProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GallerySourceProvider")
            .field("site", &self.site)
            .field("cached", &self.cache.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::fetch::Fetched;

    /// Serves fixed bodies and counts requests per URL.
    #[derive(Default)]
    struct CountingFetcher {
        pages: HashMap<String, String>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Fetch for CountingFetcher {
        async fn fetch(&self, url: &str) -> Result<Fetched, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            match self.pages.get(url) {
                Some(body) => Ok(Fetched {
                    url: url.to_string(),
                    status: 200,
                    body: body.clone().into_bytes(),
                }),
                None => Err(FetchError::http_status(url, 404)),
            }
        }
    }

    fn fetcher_with(pages: &[(&str, &str)]) -> Arc<CountingFetcher> {
        Arc::new(CountingFetcher {
            pages: pages
                .iter()
                .map(|(url, body)| ((*url).to_string(), (*body).to_string()))
                .collect(),
            calls: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn test_repeated_requests_fetch_once() {
        let fetcher = fetcher_with(&[(
            "https://www.imagefap.com/gallery.php?gid=1",
            "<title>One</title>",
        )]);
        let provider = GallerySourceProvider::new(fetcher.clone(), SiteConfig::default());
        let id = GalleryId::new("1");

        assert!(!provider.is_cached(&id));
        let first = provider.get_source(&id).await.unwrap();
        let second = provider.get_source(&id).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert!(provider.is_cached(&id));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(first.title(), Some("One"));
    }

    #[tokio::test]
    async fn test_cache_is_keyed_by_gallery_id() {
        let fetcher = fetcher_with(&[
            ("https://www.imagefap.com/gallery.php?gid=1", "<title>One</title>"),
            ("https://www.imagefap.com/gallery.php?gid=2", "<title>Two</title>"),
        ]);
        let provider = GallerySourceProvider::new(fetcher.clone(), SiteConfig::default());

        let one = provider.get_source(&GalleryId::new("1")).await.unwrap();
        let two = provider.get_source(&GalleryId::new("2")).await.unwrap();

        assert_eq!(one.title(), Some("One"));
        assert_eq!(two.title(), Some("Two"));
        assert_eq!(two.gallery_id().as_str(), "2");
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_one_fetch() {
        let fetcher = fetcher_with(&[(
            "https://www.imagefap.com/gallery.php?gid=9",
            "<title>Nine</title>",
        )]);
        let provider = Arc::new(GallerySourceProvider::new(
            fetcher.clone(),
            SiteConfig::default(),
        ));
        let id = GalleryId::new("9");

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..8 {
            let provider = Arc::clone(&provider);
            let id = id.clone();
            tasks.spawn(async move { provider.get_source(&id).await.map(|s| s.url().to_string()) });
        }
        while let Some(result) = tasks.join_next().await {
            assert!(result.unwrap().is_ok());
        }

        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_not_cached() {
        let fetcher = fetcher_with(&[]);
        let provider = GallerySourceProvider::new(fetcher.clone(), SiteConfig::default());
        let id = GalleryId::new("404");

        let err = provider.get_source(&id).await.unwrap_err();
        assert!(matches!(err, SourceError::Fetch { ref source, .. } if source.status() == Some(404)));
        assert!(!provider.is_cached(&id));

        let _ = provider.get_source(&id).await;
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_title_missing_or_blank_is_none() {
        let source = GallerySource::new(
            GalleryId::new("1"),
            "https://www.imagefap.com/pictures/1/x",
            HtmlDocument::parse("<title>   </title>"),
        );
        assert_eq!(source.title(), None);
    }
}
