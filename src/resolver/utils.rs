//! Shared URL helpers: host normalization and link absolutization.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

/// Compiles a regex at static init; panics on invalid pattern.
pub fn compile_static_regex(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid static regex '{pattern}': {e}"))
}

/// Matches an explicit URL scheme (`http:`, `https:`, `ftp:` ...) at the start of input.
static SCHEME_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"^[A-Za-z][A-Za-z0-9+.-]*://"));

/// Normalizes a host string: trim, strip leading "www.", trailing '.', and lowercases.
#[must_use]
pub fn canonical_host(host: &str) -> String {
    host.trim()
        .trim_start_matches("www.")
        .trim_end_matches('.')
        .to_ascii_lowercase()
}

/// Returns true if the two host strings refer to the same host after normalization.
#[must_use]
pub fn hosts_match(lhs: &str, rhs: &str) -> bool {
    canonical_host(lhs) == canonical_host(rhs)
}

/// Prefixes `http://` onto input that carries no scheme.
///
/// `www.imagefap.com/gallery/1` becomes `http://www.imagefap.com/gallery/1`;
/// input that already names a scheme is returned trimmed but otherwise as-is.
#[must_use]
pub fn with_default_scheme(input: &str) -> String {
    let input = input.trim();
    if SCHEME_RE.is_match(input) {
        input.to_string()
    } else {
        format!("http://{}", input.trim_start_matches('/'))
    }
}

/// Resolves a link reference found in a document against the site origin.
///
/// References starting with `/` are prefixed with `origin`; `//host/...`
/// references take the origin's scheme; anything else passes through unchanged.
#[must_use]
pub fn absolutize_link(reference: &str, origin: &Url) -> String {
    if let Some(rest) = reference.strip_prefix("//") {
        return format!("{}://{rest}", origin.scheme());
    }
    if reference.starts_with('/') {
        return format!("{}{reference}", origin.as_str().trim_end_matches('/'));
    }
    reference.to_string()
}
