//! Error types for gallery id resolution.
//!
//! Follows the What/Why/Fix pattern used across the project: every variant
//! names the offending input and carries a suggestion for the user.

use thiserror::Error;

/// Errors that can occur while resolving a gallery URL to its id.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// Input could not be parsed as a URL at all
    #[error("invalid URL '{input}'\n  Suggestion: Paste the full gallery link, e.g. https://www.imagefap.com/gallery/12345678")]
    InvalidUrl {
        /// The raw input
        input: String,
    },

    /// URL points at a host other than the target site
    #[error("expected a gallery from imagefap.com, got a link to '{host}' ({input})\n  Suggestion: Only imagefap.com galleries are supported")]
    InvalidDomain {
        /// The raw input
        input: String,
        /// The host found in the input
        host: String,
    },

    /// URL is on the right site but its path/query has no recognizable gallery id
    #[error("could not detect a gallery id in '{input}': {reason}\n  Suggestion: Use a /gallery/, /pictures/, /photo/ or gallery.php?gid= link")]
    UnrecognizedUrlFormat {
        /// The raw input
        input: String,
        /// Why no id could be found
        reason: String,
    },
}

impl ResolveError {
    /// Creates an `InvalidUrl` error.
    #[must_use]
    pub fn invalid_url(input: &str) -> Self {
        Self::InvalidUrl {
            input: input.to_string(),
        }
    }

    /// Creates an `InvalidDomain` error.
    #[must_use]
    pub fn invalid_domain(input: &str, host: &str) -> Self {
        Self::InvalidDomain {
            input: input.to_string(),
            host: host.to_string(),
        }
    }

    /// Creates an `UnrecognizedUrlFormat` error.
    #[must_use]
    pub fn unrecognized(input: &str, reason: &str) -> Self {
        Self::UnrecognizedUrlFormat {
            input: input.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_domain_display() {
        let msg = ResolveError::invalid_domain("https://example.com/gallery/1", "example.com")
            .to_string();
        assert!(msg.contains("example.com"), "Expected host in: {msg}");
        assert!(msg.contains("Suggestion"), "Expected suggestion in: {msg}");
    }

    #[test]
    fn test_unrecognized_display() {
        let msg = ResolveError::unrecognized("https://www.imagefap.com/unknown/1", "unknown path")
            .to_string();
        assert!(msg.contains("unknown path"), "Expected reason in: {msg}");
        assert!(msg.contains("/unknown/1"), "Expected input in: {msg}");
    }

    #[test]
    fn test_invalid_url_display() {
        let msg = ResolveError::invalid_url("http://").to_string();
        assert!(msg.starts_with("invalid URL"), "unexpected: {msg}");
    }
}
