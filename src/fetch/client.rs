//! reqwest-backed [`Fetch`] implementation.
//!
//! Centralizes networking defaults so every request shares the same timeout,
//! user-agent, compression, and proxy behavior.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, ClientBuilder, Proxy};
use tracing::{debug, instrument, warn};

use super::{Fetch, FetchError, Fetched};
use crate::user_agent;

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP read timeout (5 minutes for large images).
pub const READ_TIMEOUT_SECS: u64 = 300;

/// Connect/read timeouts applied to every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,
    /// Whole-request timeout in seconds.
    pub read_secs: u64,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self {
            connect_secs: CONNECT_TIMEOUT_SECS,
            read_secs: READ_TIMEOUT_SECS,
        }
    }
}

/// HTTP client for gallery pages, photo pages, payloads and robots.txt.
///
/// Create once and share (`Arc<HttpFetcher>`) to reuse pooled connections.
/// Redirects are followed, so the gallery.php form lands on the canonical
/// gallery page.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Creates a fetcher with default timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Client`] when the HTTP client cannot be built.
    pub fn new() -> Result<Self, FetchError> {
        Self::with_timeouts(HttpTimeouts::default())
    }

    /// Creates a fetcher with explicit timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Client`] when the HTTP client cannot be built.
    #[instrument(level = "debug")]
    pub fn with_timeouts(timeouts: HttpTimeouts) -> Result<Self, FetchError> {
        let user_agent = user_agent::default_user_agent();
        let client = match try_build_client(&user_agent, timeouts, false) {
            Ok(client) => client,
            Err(BuildClientFailure::Panic) => {
                // Some restricted sandbox environments panic when querying
                // system proxy settings. Fall back to env-proxy only.
                warn!("HTTP client hit system proxy panic; using env-proxy fallback builder");
                try_build_client(&user_agent, timeouts, true).map_err(|failure| {
                    FetchError::Client {
                        reason: failure.to_string(),
                    }
                })?
            }
            Err(failure) => {
                return Err(FetchError::Client {
                    reason: failure.to_string(),
                });
            }
        };
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    #[instrument(skip(self), fields(url = %url))]
    async fn fetch(&self, url: &str) -> Result<Fetched, FetchError> {
        let parsed = url::Url::parse(url).map_err(|_| FetchError::invalid_url(url))?;

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| FetchError::network(url, e))?;

        let status = response.status();
        if !status.is_success() {
            debug!(status = status.as_u16(), "non-success response");
            return Err(FetchError::http_status(url, status.as_u16()));
        }

        let final_url = response.url().to_string();
        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::network(url, e))?
            .to_vec();

        debug!(final_url = %final_url, bytes = body.len(), "fetched");
        Ok(Fetched {
            url: final_url,
            status: status.as_u16(),
            body,
        })
    }
}

enum BuildClientFailure {
    Panic,
    Build(reqwest::Error),
}

impl std::fmt::Display for BuildClientFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Panic => f.write_str("client construction panicked while reading proxy settings"),
            Self::Build(error) => write!(f, "{error}"),
        }
    }
}

fn try_build_client(
    user_agent: &str,
    timeouts: HttpTimeouts,
    disable_system_proxy_lookup: bool,
) -> Result<Client, BuildClientFailure> {
    let user_agent = user_agent.to_string();
    catch_unwind(AssertUnwindSafe(move || {
        let mut builder = base_builder(user_agent, timeouts);
        if disable_system_proxy_lookup {
            builder = apply_env_proxy_fallback(builder.no_proxy());
        }
        builder.build().map_err(BuildClientFailure::Build)
    }))
    .map_err(|_| BuildClientFailure::Panic)?
}

fn base_builder(user_agent: String, timeouts: HttpTimeouts) -> ClientBuilder {
    Client::builder()
        .connect_timeout(Duration::from_secs(timeouts.connect_secs))
        .timeout(Duration::from_secs(timeouts.read_secs))
        .user_agent(user_agent)
        .gzip(true)
}

fn apply_env_proxy_fallback(mut builder: ClientBuilder) -> ClientBuilder {
    if let Some(proxy) = env_proxy_for_scheme("https")
        && let Ok(resolved) = Proxy::https(&proxy)
    {
        builder = builder.proxy(resolved);
    }
    if let Some(proxy) = env_proxy_for_scheme("http")
        && let Ok(resolved) = Proxy::http(&proxy)
    {
        builder = builder.proxy(resolved);
    }
    builder
}

fn env_proxy_for_scheme(scheme: &str) -> Option<String> {
    match scheme {
        "https" => find_first_proxy_var(&["HTTPS_PROXY", "https_proxy", "ALL_PROXY", "all_proxy"]),
        "http" => find_first_proxy_var(&["HTTP_PROXY", "http_proxy", "ALL_PROXY", "all_proxy"]),
        _ => None,
    }
}

fn find_first_proxy_var(names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| {
        std::env::var(name)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}
