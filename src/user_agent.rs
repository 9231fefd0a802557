//! Shared User-Agent string for every request the tool makes.
//!
//! Gallery pages, photo pages, image payloads and robots.txt all go out with
//! the same header so the traffic is attributable to a single tool.

/// Project URL for User-Agent identification (good citizenship; RFC 9308).
const PROJECT_UA_URL: &str = "https://github.com/fierce/imagefap-downloader";

/// Default User-Agent for all requests (identifies the tool and version).
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("imagefap-dl/{version} (gallery-archiver; +{PROJECT_UA_URL})")
}
