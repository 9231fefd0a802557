//! Minimal robots.txt policy gate for polite crawling.
//!
//! Supports `User-agent: *` groups with `Disallow:` and `Allow:` prefix rules.
//! The longest matching rule wins; on a tie `Allow` wins. Rules are fetched
//! once per origin and kept for the lifetime of the gate.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, info, instrument};
use url::Url;

use crate::fetch::{Fetch, FetchError};

/// Result of checking a URL against robots.txt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RobotsDecision {
    /// URL is allowed.
    Allowed,
    /// URL is disallowed by robots.txt.
    Disallowed,
}

/// Errors from robots.txt checking.
#[derive(Debug, thiserror::Error)]
pub enum RobotsError {
    #[error("invalid URL for robots.txt check: {0}")]
    InvalidUrl(String),
    #[error("failed to fetch robots.txt: {0}")]
    Fetch(#[source] FetchError),
    #[error("cannot load {0}: the site owner has disallowed it for bots")]
    Disallowed(String),
}

/// Parsed rules for the `*` user-agent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RobotsRules {
    disallow_all: bool,
    allowed_prefixes: Vec<String>,
    disallowed_prefixes: Vec<String>,
}

impl RobotsRules {
    /// Rules that allow everything (missing robots.txt).
    #[must_use]
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Rules that refuse everything (robots.txt behind auth).
    #[must_use]
    pub fn disallow_all() -> Self {
        Self {
            disallow_all: true,
            ..Self::default()
        }
    }

    /// Parses a robots.txt body for `User-agent: *` rules.
    #[must_use]
    pub fn parse(body: &str) -> Self {
        let mut in_star = false;
        let mut group_has_rules = false;
        let mut rules = Self::default();

        for line in body.lines() {
            let line = line.split('#').next().unwrap_or_default().trim();
            let Some((field, value)) = line.split_once(':') else {
                continue;
            };
            let field = field.trim().to_ascii_lowercase();
            let value = value.trim();

            match field.as_str() {
                "user-agent" => {
                    // A user-agent line after rules starts a new group.
                    if group_has_rules {
                        in_star = false;
                        group_has_rules = false;
                    }
                    in_star |= value == "*";
                }
                "allow" | "disallow" => {
                    group_has_rules = true;
                    if !in_star || value.is_empty() {
                        continue;
                    }
                    let prefix = normalize_rule_path(value);
                    let target = if field == "allow" {
                        &mut rules.allowed_prefixes
                    } else {
                        &mut rules.disallowed_prefixes
                    };
                    if !target.contains(&prefix) {
                        target.push(prefix);
                    }
                }
                _ => {}
            }
        }

        rules
            .disallowed_prefixes
            .sort_by_key(|b| std::cmp::Reverse(b.len()));
        rules
            .allowed_prefixes
            .sort_by_key(|b| std::cmp::Reverse(b.len()));
        rules
    }

    /// Evaluates a request target (path plus optional query).
    #[must_use]
    pub fn decide(&self, target: &str) -> RobotsDecision {
        if self.disallow_all {
            return RobotsDecision::Disallowed;
        }
        let longest = |prefixes: &[String]| {
            prefixes
                .iter()
                .filter(|prefix| target.starts_with(prefix.as_str()))
                .map(String::len)
                .max()
        };
        match (longest(&self.allowed_prefixes), longest(&self.disallowed_prefixes)) {
            (_, None) => RobotsDecision::Allowed,
            (Some(allow), Some(disallow)) if allow >= disallow => RobotsDecision::Allowed,
            _ => RobotsDecision::Disallowed,
        }
    }
}

fn normalize_rule_path(path: &str) -> String {
    let mut s = path.trim().to_string();
    if !s.starts_with('/') {
        s.insert(0, '/');
    }
    s
}

/// robots.txt checker with a per-origin cache.
pub struct RobotsGate {
    fetcher: Arc<dyn Fetch>,
    cache: DashMap<String, Arc<RobotsRules>>,
}

impl RobotsGate {
    /// Creates a gate that fetches robots.txt through `fetcher`.
    #[must_use]
    pub fn new(fetcher: Arc<dyn Fetch>) -> Self {
        Self {
            fetcher,
            cache: DashMap::new(),
        }
    }

    /// Returns whether `url` may be fetched according to `robots_url`.
    ///
    /// A missing robots.txt (404 or other 4xx) allows everything; 401/403
    /// disallows everything.
    ///
    /// # Errors
    ///
    /// Returns [`RobotsError::Fetch`] on network failures or 5xx responses.
    #[instrument(skip(self), fields(robots_url = %robots_url))]
    pub async fn check(&self, url: &Url, robots_url: &str) -> Result<RobotsDecision, RobotsError> {
        let rules = match self.cache.get(robots_url).map(|entry| Arc::clone(entry.value())) {
            Some(rules) => rules,
            None => {
                let rules = Arc::new(self.fetch_rules(robots_url).await?);
                self.cache
                    .insert(robots_url.to_string(), Arc::clone(&rules));
                rules
            }
        };

        let target = request_target(url);
        let decision = rules.decide(&target);
        if decision == RobotsDecision::Disallowed {
            debug!(target = %target, "robots.txt disallows path");
        }
        Ok(decision)
    }

    /// Like [`check`](Self::check) but turns a disallow into an error.
    ///
    /// # Errors
    ///
    /// Returns [`RobotsError::Disallowed`] when the URL is disallowed, or any
    /// error from [`check`](Self::check).
    pub async fn ensure_allowed(&self, url: &Url, robots_url: &str) -> Result<(), RobotsError> {
        match self.check(url, robots_url).await? {
            RobotsDecision::Allowed => Ok(()),
            RobotsDecision::Disallowed => Err(RobotsError::Disallowed(url.to_string())),
        }
    }

    async fn fetch_rules(&self, robots_url: &str) -> Result<RobotsRules, RobotsError> {
        Url::parse(robots_url).map_err(|_| RobotsError::InvalidUrl(robots_url.to_string()))?;
        match self.fetcher.fetch(robots_url).await {
            Ok(fetched) => {
                let rules = RobotsRules::parse(&fetched.text());
                info!(
                    disallow_rules = rules.disallowed_prefixes.len(),
                    allow_rules = rules.allowed_prefixes.len(),
                    "loaded robots.txt"
                );
                Ok(rules)
            }
            Err(error) => match error.status() {
                Some(401 | 403) => {
                    debug!("robots.txt requires auth; treating site as disallowed");
                    Ok(RobotsRules::disallow_all())
                }
                Some(status) if (400..500).contains(&status) => {
                    debug!(status, "no robots.txt; treating site as allowed");
                    Ok(RobotsRules::allow_all())
                }
                _ => Err(RobotsError::Fetch(error)),
            },
        }
    }
}

impl std::fmt::Debug for RobotsGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RobotsGate")
            .field("cached_origins", &self.cache.len())
            .finish_non_exhaustive()
    }
}

/// Path plus query, the part of a URL robots.txt rules apply to.
fn request_target(url: &Url) -> String {
    let path = if url.path().is_empty() { "/" } else { url.path() };
    match url.query() {
        Some(query) => format!("{path}?{query}"),
        None => path.to_string(),
    }
}
