//! HTTP transport behind a narrow fetch seam.
//!
//! Every network access in the crate goes through the [`Fetch`] trait: one
//! GET, one body. [`HttpFetcher`] is the reqwest-backed implementation used
//! by the binary; tests can substitute any in-memory implementation.
//!
//! # Example
//!
//! ```no_run
//! use imagefap_downloader::fetch::{Fetch, HttpFetcher};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let fetcher = HttpFetcher::new()?;
//! let page = fetcher.fetch("https://www.imagefap.com/gallery.php?gid=1").await?;
//! println!("{} bytes from {}", page.body.len(), page.url);
//! # Ok(())
//! # }
//! ```

mod client;
mod error;

pub use client::{CONNECT_TIMEOUT_SECS, HttpFetcher, HttpTimeouts, READ_TIMEOUT_SECS};
pub use error::FetchError;

use async_trait::async_trait;

/// A successfully fetched response body.
#[derive(Debug, Clone)]
pub struct Fetched {
    /// Final URL after redirects.
    pub url: String,
    /// HTTP status code of the final response.
    pub status: u16,
    /// Raw response body.
    pub body: Vec<u8>,
}

impl Fetched {
    /// Returns the body decoded as UTF-8, replacing invalid sequences.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Black-box GET capability.
///
/// Implementations return `Err` for transport failures and for non-success
/// HTTP statuses ([`FetchError::HttpStatus`]).
///
/// # Object Safety
///
/// This trait uses `async_trait` so it can be shared as `Arc<dyn Fetch>`.
#[async_trait]
pub trait Fetch: Send + Sync {
    /// Fetches `url` and returns its full body.
    async fn fetch(&self, url: &str) -> Result<Fetched, FetchError>;
}
