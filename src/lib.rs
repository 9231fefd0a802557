//! imagefap gallery downloader library
//!
//! Turns a single gallery URL from imagefap.com into a folder of
//! full-resolution images.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`resolver`] - URL shape classification and gallery id extraction
//! - [`fetch`] - HTTP transport behind the [`Fetch`] trait
//! - [`html`] - Minimal document query capability over raw HTML
//! - [`source`] - Keyed, single-flight cache of gallery documents
//! - [`links`] - Photo-page link discovery and filtering
//! - [`download`] - Image download, robots.txt gate and the worker pool
//! - [`app`] - End-to-end pipeline used by the binary

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod app;
pub mod download;
pub mod fetch;
pub mod html;
pub mod links;
pub mod resolver;
pub mod site;
pub mod source;
mod user_agent;

// Re-export commonly used types
pub use app::{GalleryRun, RunError, RunOptions, RunSummary, run_gallery};
pub use download::{
    DEFAULT_CONCURRENCY, DownloadEngine, DownloadError, DownloadStats, EngineError,
    ImageDownloader, RobotsDecision, RobotsError, RobotsGate, SavedImage,
};
pub use fetch::{Fetch, FetchError, Fetched, HttpFetcher};
pub use html::{DocumentQuery, Element, HtmlDocument, Selector};
pub use links::extract_photo_links;
pub use resolver::{GalleryId, ResolveError, UrlShape, resolve_gallery_id};
pub use site::SiteConfig;
pub use source::{GallerySource, GallerySourceProvider, SourceError};
