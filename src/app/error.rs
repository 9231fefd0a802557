//! Fatal errors for a gallery run.

use std::path::PathBuf;

use thiserror::Error;

use crate::download::{EngineError, RobotsError};
use crate::fetch::FetchError;
use crate::resolver::ResolveError;
use crate::source::SourceError;

/// Errors that abort a gallery run before or during fan-out.
///
/// Per-image failures are not represented here; they are counted in
/// [`RunSummary`](super::RunSummary).
#[derive(Debug, Error)]
pub enum RunError {
    /// The input URL does not name a gallery.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// robots.txt refused the input URL or could not be loaded.
    #[error(transparent)]
    Robots(#[from] RobotsError),

    /// The gallery page could not be fetched.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// The worker pool could not be configured or failed internally.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// The HTTP client could not be constructed.
    #[error("failed to initialize HTTP client: {0}")]
    Client(#[source] FetchError),

    /// The gallery directory could not be created.
    #[error("cannot create gallery directory {path}: {source}")]
    Io {
        /// Directory that could not be created.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_error_is_transparent() {
        let error = RunError::from(ResolveError::invalid_domain(
            "https://example.com/gallery/1",
            "example.com",
        ));
        assert!(error.to_string().contains("example.com"));
    }

    #[test]
    fn test_io_error_names_directory() {
        let error = RunError::Io {
            path: PathBuf::from("/out/My Gallery"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(error.to_string().contains("/out/My Gallery"));
    }
}
