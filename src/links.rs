//! Photo-page link discovery for a gallery document.
//!
//! A gallery page links to far more than its photos: navigation, other
//! galleries, "similar" photos from unrelated galleries. Only links shaped
//! like `/photo/<token>/` whose `gid` query parameter equals the gallery id
//! are kept.
//!
//! The `gid` comparison is an exact query-parameter match. A substring test
//! would let gallery `100` pick up photos from gallery `1000`.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;
use url::Url;

use crate::html::{DocumentQuery, Selector};
use crate::resolver::GalleryId;
use crate::resolver::utils::{absolutize_link, compile_static_regex};
use crate::site::SiteConfig;

static PHOTO_PATH_RE: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r"^/photo/\w+/"));

/// Returns the ordered, deduplicated photo-page links of `gallery_id` found in `document`.
///
/// Links are absolutized against the site origin, deduplicated by exact string
/// equality keeping the first occurrence, and filtered to photo pages of this
/// gallery on the target site.
#[must_use]
pub fn extract_photo_links(
    document: &dyn DocumentQuery,
    site: &SiteConfig,
    gallery_id: &GalleryId,
) -> Vec<String> {
    let mut seen = HashSet::new();
    let candidates: Vec<String> = document
        .select(&Selector::tag("a"))
        .into_iter()
        .filter_map(|anchor| anchor.attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty())
        .map(|href| absolutize_link(href, site.origin_url()))
        .filter(|link| seen.insert(link.clone()))
        .collect();

    let links: Vec<String> = candidates
        .into_iter()
        .filter(|link| is_gallery_photo_link(link, site, gallery_id))
        .collect();

    debug!(
        gallery_id = %gallery_id,
        unique_links = seen.len(),
        photo_links = links.len(),
        "extracted photo links"
    );
    links
}

/// Returns true if `link` is a photo page of `gallery_id` on the target site.
#[must_use]
pub fn is_gallery_photo_link(link: &str, site: &SiteConfig, gallery_id: &GalleryId) -> bool {
    let Ok(url) = Url::parse(link) else {
        return false;
    };
    if !url.host_str().is_some_and(|host| site.is_site_host(host)) {
        return false;
    }
    if !PHOTO_PATH_RE.is_match(url.path()) {
        return false;
    }
    url.query_pairs()
        .any(|(key, value)| key == "gid" && value == gallery_id.as_str())
}
