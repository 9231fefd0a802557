//! Photo-page downloads: single-image downloader, worker pool, robots gate.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use imagefap_downloader::download::ImageDownloader;
//! use imagefap_downloader::fetch::HttpFetcher;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let downloader = ImageDownloader::new(Arc::new(HttpFetcher::new()?));
//! let saved = downloader
//!     .download("https://www.imagefap.com/photo/1/?gid=5", Path::new("./Gallery"))
//!     .await?;
//! println!("Saved: {}", saved.path.display());
//! # Ok(())
//! # }
//! ```

mod engine;
mod error;
pub mod filename;
mod image;
mod robots;

pub use engine::{
    DEFAULT_CONCURRENCY, DownloadEngine, DownloadStats, EngineError, FailedDownload,
    MAX_CONCURRENCY, MIN_CONCURRENCY,
};
pub use error::DownloadError;
pub use filename::FilenameRegistry;
pub use image::{
    DownloadedImage, ImageDownloader, MAIN_PHOTO_ID, PhotoReference, SavedImage,
    locate_main_photo,
};
pub use robots::{RobotsDecision, RobotsError, RobotsGate, RobotsRules};
