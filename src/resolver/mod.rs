//! Gallery id resolution for user-supplied URLs.
//!
//! imagefap exposes the same gallery under several URL shapes. This module
//! classifies a URL into a [`UrlShape`] and lets each shape extract the
//! gallery id with its own rule.
//!
//! # Supported shapes
//!
//! | Example                                                      | Shape                   |
//! |--------------------------------------------------------------|-------------------------|
//! | `https://www.imagefap.com/gallery/12345678`                  | [`UrlShape::PathId`]    |
//! | `https://www.imagefap.com/pictures/12345678/Name-Of-Gallery` | [`UrlShape::PathId`]    |
//! | `https://www.imagefap.com/photo/987/?pgid=&gid=12345678`     | [`UrlShape::QueryGid`]  |
//! | `https://www.imagefap.com/gallery.php?gid=12345678`          | [`UrlShape::QueryGid`]  |
//!
//! # Example
//!
//! ```
//! use imagefap_downloader::resolver::resolve_gallery_id;
//!
//! let id = resolve_gallery_id("https://www.imagefap.com/gallery/12345678").unwrap();
//! assert_eq!(id.as_str(), "12345678");
//! ```

mod error;
pub mod utils;

pub use error::ResolveError;

use std::fmt;

use tracing::debug;
use url::Url;

use utils::with_default_scheme;

/// Hosts accepted as the target site.
pub const ACCEPTED_HOSTS: [&str; 2] = ["www.imagefap.com", "imagefap.com"];

/// Opaque token naming a gallery on the target site.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GalleryId(String);

impl GalleryId {
    /// Wraps an already-extracted gallery id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GalleryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for GalleryId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Classification of a gallery URL by its first path segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlShape {
    /// `/gallery/<id>` and `/pictures/<id>/<name>`: id is the second path segment.
    PathId,
    /// `/photo/<photo-id>/?...&gid=<id>` and `/gallery.php?gid=<id>`: id is in the query.
    QueryGid,
}

impl UrlShape {
    /// Classifies a first path segment; exact match only.
    #[must_use]
    pub fn classify(first_segment: &str) -> Option<Self> {
        match first_segment {
            "gallery" | "pictures" => Some(Self::PathId),
            "photo" | "gallery.php" => Some(Self::QueryGid),
            _ => None,
        }
    }

    /// Extracts the gallery id from `url` according to this shape.
    fn extract(self, url: &Url) -> Option<String> {
        match self {
            Self::PathId => url
                .path_segments()
                .and_then(|mut segments| segments.nth(1))
                .filter(|segment| !segment.is_empty())
                .map(str::to_string),
            Self::QueryGid => url
                .query()
                .and_then(|query| query.split('&').find_map(|param| param.strip_prefix("gid=")))
                .filter(|id| !id.is_empty())
                .map(str::to_string),
        }
    }
}

/// Normalizes user input into a parsed URL, assuming `http://` when no scheme is given.
///
/// # Errors
///
/// Returns [`ResolveError::InvalidUrl`] when the input cannot be parsed.
pub fn normalize_input_url(input: &str) -> Result<Url, ResolveError> {
    Url::parse(&with_default_scheme(input)).map_err(|_| ResolveError::invalid_url(input))
}

/// Resolves a gallery URL in any supported shape to its [`GalleryId`].
///
/// # Errors
///
/// - [`ResolveError::InvalidUrl`] when the input is not a URL
/// - [`ResolveError::InvalidDomain`] when the host is not imagefap.com
/// - [`ResolveError::UnrecognizedUrlFormat`] when no id can be found
pub fn resolve_gallery_id(input: &str) -> Result<GalleryId, ResolveError> {
    let url = normalize_input_url(input)?;

    let host = url.host_str().unwrap_or_default();
    if !ACCEPTED_HOSTS.contains(&host) {
        return Err(ResolveError::invalid_domain(input, host));
    }

    let first_segment = url
        .path_segments()
        .and_then(|mut segments| segments.next())
        .unwrap_or_default();

    let Some(shape) = UrlShape::classify(first_segment) else {
        return Err(ResolveError::unrecognized(
            input,
            &format!("unsupported path segment '{first_segment}'"),
        ));
    };

    let id = shape.extract(&url).ok_or_else(|| {
        ResolveError::unrecognized(
            input,
            match shape {
                UrlShape::PathId => "missing gallery id path segment",
                UrlShape::QueryGid => "missing gid= query parameter",
            },
        )
    })?;

    debug!(input, ?shape, gallery_id = %id, "resolved gallery id");
    Ok(GalleryId(id))
}
