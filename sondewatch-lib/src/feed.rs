//! Feed sources: the HTTP proxy and local export files.

use crate::error::SondeError;
use async_trait::async_trait;
use reqwest::Client as HttpClient;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// What the proxy is asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedQuery {
    All,
    /// Rows whose line contains the identifier substring, case-insensitive
    Single(String),
}

impl FeedQuery {
    /// `Single` for a non-blank filter, `All` otherwise
    pub fn from_filter(filter: Option<&str>) -> Self {
        match filter.map(str::trim).filter(|f| !f.is_empty()) {
            Some(id) => FeedQuery::Single(id.to_string()),
            None => FeedQuery::All,
        }
    }

    /// Query string pairs of the proxy contract
    pub fn query_pairs(&self) -> Vec<(&'static str, &str)> {
        match self {
            FeedQuery::All => vec![("mode", "all")],
            FeedQuery::Single(id) => vec![("mode", "single"), ("id", id.as_str())],
        }
    }

    pub fn filter(&self) -> Option<&str> {
        match self {
            FeedQuery::All => None,
            FeedQuery::Single(id) => Some(id),
        }
    }
}

impl fmt::Display for FeedQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedQuery::All => write!(f, "mode=all"),
            FeedQuery::Single(id) => write!(f, "mode=single&id={id}"),
        }
    }
}

/// Anything that can produce a telemetry export body
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch(&self, query: &FeedQuery) -> Result<String, SondeError>;

    /// Human-readable origin for logs
    fn describe(&self) -> String;
}

/// Proxy endpoint speaking `mode=all` / `mode=single&id=..`
#[derive(Debug, Clone)]
pub struct HttpFeed {
    client: HttpClient,
    url: String,
}

impl HttpFeed {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, SondeError> {
        let client = HttpClient::builder().timeout(timeout).build()?;
        Ok(Self { client, url: url.into() })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl FeedSource for HttpFeed {
    async fn fetch(&self, query: &FeedQuery) -> Result<String, SondeError> {
        debug!(url = %self.url, %query, "requesting feed");
        let response = self
            .client
            .get(&self.url)
            .query(&query.query_pairs())
            .header(reqwest::header::CACHE_CONTROL, "no-store")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SondeError::HttpStatus {
                status: status.as_u16(),
            });
        }
        Ok(response.text().await?)
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

/// Export file on disk, filtered locally the way the proxy would
#[derive(Debug, Clone)]
pub struct FileFeed {
    path: PathBuf,
}

impl FileFeed {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl FeedSource for FileFeed {
    async fn fetch(&self, query: &FeedQuery) -> Result<String, SondeError> {
        let body = tokio::fs::read_to_string(&self.path).await?;
        Ok(match query.filter() {
            Some(id) => filter_feed_body(&body, id),
            None => body,
        })
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Keep the header line plus every non-blank line containing `id`.
///
/// Matching is case-insensitive over the whole line; a blank `id` returns
/// the body unchanged.
pub fn filter_feed_body(body: &str, id: &str) -> String {
    let id = id.trim().to_lowercase();
    if id.is_empty() {
        return body.to_string();
    }
    let mut lines = body.split('\n').map(|l| l.strip_suffix('\r').unwrap_or(l));
    let mut out: Vec<&str> = lines.next().into_iter().collect();
    out.extend(lines.filter(|l| !l.trim().is_empty() && l.to_lowercase().contains(&id)));
    out.join("\n")
}
