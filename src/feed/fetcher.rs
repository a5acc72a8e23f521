use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED};
use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;

use super::parser::parse_feed;
use super::{FeedFetcher, FetchedFeed};
use crate::storage::RequestOptions;
use crate::util::validate_proxy_url;

const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB
const CONNECT_TIMEOUT_SECS: u64 = 10;
const REQUEST_TIMEOUT_SECS: u64 = 30;
const MAX_REDIRECTS: usize = 5;

/// Default `User-Agent` sent with every feed request.
pub const DEFAULT_USER_AGENT: &str = concat!("feedpull/", env!("CARGO_PKG_VERSION"));

/// Errors that can occur while fetching and parsing a feed.
///
/// All of these are remote, per-feed conditions. The puller records their
/// message on the feed instead of propagating them.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The feed record has no link to fetch
    #[error("Feed has no link")]
    MissingLink,
    /// The per-feed proxy could not be configured
    #[error("Invalid proxy {0}")]
    InvalidProxy(String),
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// The pull deadline elapsed before the fetch completed
    #[error("Request timed out")]
    Timeout,
    /// Response body exceeded the 10MB size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Document could not be parsed as RSS, Atom or JSON Feed
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Fetch collaborator backed by `reqwest` and `feed-rs`.
#[derive(Debug, Clone)]
pub struct HttpFeedFetcher {
    client: reqwest::Client,
    user_agent: String,
}

impl HttpFeedFetcher {
    pub fn new(user_agent: &str) -> Result<Self, FetchError> {
        let client = Self::client_builder(user_agent).build()?;
        Ok(Self {
            client,
            user_agent: user_agent.to_string(),
        })
    }

    fn client_builder(user_agent: &str) -> reqwest::ClientBuilder {
        reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .user_agent(user_agent)
    }

    /// Shared client, or a dedicated one when the feed routes through a proxy.
    fn client_for(&self, options: &RequestOptions) -> Result<reqwest::Client, FetchError> {
        match options.proxy.as_deref().filter(|p| !p.is_empty()) {
            None => Ok(self.client.clone()),
            Some(proxy) => {
                validate_proxy_url(proxy)
                    .map_err(|e| FetchError::InvalidProxy(format!("{}: {}", proxy, e)))?;
                let proxy = reqwest::Proxy::all(proxy)
                    .map_err(|e| FetchError::InvalidProxy(format!("{}: {}", proxy, e)))?;
                Ok(Self::client_builder(&self.user_agent).proxy(proxy).build()?)
            }
        }
    }

    /// Fetch a feed and return only its title.
    ///
    /// Used to check that a link really serves a feed before subscribing.
    pub async fn fetch_title(
        &self,
        url: &str,
        options: &RequestOptions,
    ) -> Result<Option<String>, FetchError> {
        let unconditional = RequestOptions {
            proxy: options.proxy.clone(),
            ..RequestOptions::default()
        };
        let fetched = self.fetch(url, &unconditional).await?;
        Ok(fetched.title)
    }
}

#[async_trait]
impl FeedFetcher for HttpFeedFetcher {
    async fn fetch(&self, url: &str, options: &RequestOptions) -> Result<FetchedFeed, FetchError> {
        if url.is_empty() {
            return Err(FetchError::MissingLink);
        }

        let client = self.client_for(options)?;
        let response = client
            .get(url)
            .headers(conditional_headers(options))
            .send()
            .await?;

        let status = response.status();
        let etag = header_string(response.headers(), ETAG);
        let last_modified = header_string(response.headers(), LAST_MODIFIED);

        if status == StatusCode::NOT_MODIFIED {
            tracing::debug!(feed = %url, "Feed not modified since last fetch");
            return Ok(FetchedFeed {
                not_modified: true,
                etag: etag.or_else(|| options.etag.clone()),
                last_modified: last_modified.or_else(|| options.last_modified.clone()),
                ..FetchedFeed::default()
            });
        }

        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        let bytes = read_limited_bytes(response, MAX_FEED_SIZE).await?;
        let parsed = parse_feed(&bytes).map_err(|e| FetchError::Parse(e.to_string()))?;

        Ok(FetchedFeed {
            title: parsed.title,
            last_build: parsed.last_build,
            entries: parsed.entries,
            etag,
            last_modified,
            not_modified: false,
        })
    }
}

fn conditional_headers(options: &RequestOptions) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Some(value) = options
        .etag
        .as_deref()
        .and_then(|v| HeaderValue::from_str(v).ok())
    {
        headers.insert(IF_NONE_MATCH, value);
    }
    if let Some(value) = options
        .last_modified
        .as_deref()
        .and_then(|v| HeaderValue::from_str(v).ok())
    {
        headers.insert(IF_MODIFIED_SINCE, value);
    }
    headers
}

fn header_string(headers: &HeaderMap, name: reqwest::header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}
