//! Error types for the download module.
//!
//! Every variant names the photo page or path involved so a failure in a
//! long run can be traced back to a single image.

use std::path::PathBuf;

use thiserror::Error;

use crate::fetch::FetchError;

/// Errors that can occur while downloading a single image.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The photo page or the image payload could not be fetched.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The photo page has no primary photo element.
    #[error("no main photo found on {page_url}")]
    MissingPhoto {
        /// The photo page URL.
        page_url: String,
    },

    /// The primary photo element lacks a required attribute.
    #[error("main photo on {page_url} has no usable '{attribute}' attribute")]
    MissingAttribute {
        /// The photo page URL.
        page_url: String,
        /// The missing attribute name.
        attribute: &'static str,
    },

    /// File system error creating the destination or writing the image.
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl DownloadError {
    /// Creates a missing-photo error.
    pub fn missing_photo(page_url: impl Into<String>) -> Self {
        Self::MissingPhoto {
            page_url: page_url.into(),
        }
    }

    /// Creates a missing-attribute error.
    pub fn missing_attribute(page_url: impl Into<String>, attribute: &'static str) -> Self {
        Self::MissingAttribute {
            page_url: page_url.into(),
            attribute,
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
