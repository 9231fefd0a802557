//! Target site configuration.
//!
//! The tool only ever talks to one site. [`SiteConfig`] carries the origin that
//! relative links are joined against and that gallery documents are requested
//! from. Tests point it at a local mock server.

use url::Url;

use crate::resolver::utils::hosts_match;

/// Canonical origin of the target site.
pub const DEFAULT_ORIGIN: &str = "https://www.imagefap.com";

/// Bare domain of the target site (the `www.` form is the canonical one).
pub const SITE_DOMAIN: &str = "imagefap.com";

/// Origin and host settings for the target site.
#[derive(Debug, Clone)]
pub struct SiteConfig {
    origin: Url,
}

impl SiteConfig {
    /// Creates a configuration for the given origin (`scheme://host[:port]`).
    ///
    /// Any path, query or fragment on `origin` is discarded.
    ///
    /// # Errors
    ///
    /// Returns [`url::ParseError`] when `origin` is not an absolute URL.
    pub fn new(origin: &str) -> Result<Self, url::ParseError> {
        let mut origin = Url::parse(origin)?;
        origin.set_path("");
        origin.set_query(None);
        origin.set_fragment(None);
        Ok(Self { origin })
    }

    /// Returns the origin without a trailing slash, e.g. `https://www.imagefap.com`.
    #[must_use]
    pub fn origin(&self) -> &str {
        self.origin.as_str().trim_end_matches('/')
    }

    /// Returns the origin as a parsed URL.
    #[must_use]
    pub fn origin_url(&self) -> &Url {
        &self.origin
    }

    /// Builds the gallery request URL that redirects to the canonical gallery page.
    #[must_use]
    pub fn gallery_url(&self, gallery_id: &str) -> String {
        format!("{}/gallery.php?gid={gallery_id}", self.origin())
    }

    /// Builds the robots.txt URL for this site.
    #[must_use]
    pub fn robots_url(&self) -> String {
        format!("{}/robots.txt", self.origin())
    }

    /// Returns true if `host` belongs to the target site or to the configured origin.
    #[must_use]
    pub fn is_site_host(&self, host: &str) -> bool {
        hosts_match(host, SITE_DOMAIN)
            || self
                .origin
                .host_str()
                .is_some_and(|origin_host| hosts_match(host, origin_host))
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            origin: Url::parse(DEFAULT_ORIGIN)
                .unwrap_or_else(|e| panic!("invalid default origin '{DEFAULT_ORIGIN}': {e}")),
        }
    }
}
