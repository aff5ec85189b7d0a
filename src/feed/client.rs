//! Retrying HTTP client for bureau feeds
//!
//! Wraps an HTTP transport with bounded linear-backoff retries and a
//! last-good-document cache (in memory, optionally mirrored to disk).
//! Permanent upstream failures (4xx) are surfaced immediately; transient
//! ones (connection errors, timeouts, 5xx) are retried up to the budget.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;
use reqwest::Client;
use tracing::{debug, warn};

use super::{FeedError, FeedSource, FeedSpec, RawDocument, Transport, TransportResponse};
use crate::cache::DiskCache;

/// Browser-style User-Agent. The bureau's servers reject requests carrying
/// a default library agent.
const FEED_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Retry behaviour for transient fetch failures
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts including the first (so 3 = one fetch + two retries)
    pub max_attempts: u32,
    /// Base delay; attempt n waits n times this (linear backoff)
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(500),
        }
    }
}

/// Production transport backed by reqwest
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpTransport {
    /// Creates a transport with the bureau-friendly User-Agent
    pub fn new() -> Self {
        let client = Client::builder()
            .user_agent(FEED_USER_AGENT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client }
    }
}

impl Transport for HttpTransport {
    async fn get(&self, feed: &FeedSpec) -> Result<TransportResponse, FeedError> {
        let response = self
            .client
            .get(&feed.url)
            .timeout(feed.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FeedError::Timeout {
                        feed: feed.id.clone(),
                    }
                } else {
                    FeedError::Network {
                        feed: feed.id.clone(),
                        message: e.to_string(),
                    }
                }
            })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| FeedError::Network {
            feed: feed.id.clone(),
            message: e.to_string(),
        })?;

        Ok(TransportResponse { status, body })
    }
}

/// Feed client: fetches raw documents with retry and caches the last
/// success per feed identifier.
///
/// The cache is updated on fetch success regardless of whether the document
/// later parses, so a parse failure does not force an immediate re-fetch.
pub struct FeedClient<T: Transport = HttpTransport> {
    transport: T,
    retry: RetryPolicy,
    /// Last successfully fetched document per feed id
    last_good: Mutex<HashMap<String, RawDocument>>,
    disk: Option<DiskCache>,
}

impl FeedClient<HttpTransport> {
    /// Creates a client over the real HTTP transport with default retries
    pub fn new() -> Self {
        Self::with_transport(HttpTransport::new())
    }
}

impl Default for FeedClient<HttpTransport> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Transport> FeedClient<T> {
    /// Creates a client over a custom transport
    pub fn with_transport(transport: T) -> Self {
        Self {
            transport,
            retry: RetryPolicy::default(),
            last_good: Mutex::new(HashMap::new()),
            disk: None,
        }
    }

    /// Overrides the retry policy
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Mirrors successful fetches to a disk cache
    pub fn with_disk_cache(mut self, cache: DiskCache) -> Self {
        self.disk = Some(cache);
        self
    }

    /// Fetches a feed document, retrying transient failures with linear
    /// backoff. 4xx statuses are permanent and returned without retry.
    pub async fn fetch(&self, feed: &FeedSpec) -> Result<RawDocument, FeedError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let error = match self.transport.get(feed).await {
                Ok(response) if response.is_success() => {
                    let document = RawDocument {
                        feed_id: feed.id.clone(),
                        body: response.body,
                        fetched_at: Utc::now(),
                    };
                    self.remember(feed, &document);
                    debug!(feed = %feed.id, attempt, "feed fetched");
                    return Ok(document);
                }
                Ok(response) => FeedError::Status {
                    feed: feed.id.clone(),
                    status: response.status,
                },
                Err(e) => e,
            };

            if !error.is_transient() || attempt >= self.retry.max_attempts {
                return Err(error);
            }

            warn!(feed = %feed.id, attempt, %error, "transient fetch failure, retrying");
            tokio::time::sleep(self.retry.backoff * attempt).await;
        }
    }

    /// The most recent successfully fetched document for a feed, from
    /// memory first and the disk cache second. Expired disk entries are
    /// still returned; staleness is the caller's call.
    pub fn last_fetched(&self, feed_id: &str) -> Option<RawDocument> {
        if let Ok(guard) = self.last_good.lock() {
            if let Some(doc) = guard.get(feed_id) {
                return Some(doc.clone());
            }
        }
        self.disk
            .as_ref()
            .and_then(|cache| cache.read::<RawDocument>(feed_id))
            .map(|cached| cached.data)
    }

    fn remember(&self, feed: &FeedSpec, document: &RawDocument) {
        if let Ok(mut guard) = self.last_good.lock() {
            guard.insert(feed.id.clone(), document.clone());
        }
        if let Some(cache) = &self.disk {
            if let Err(e) = cache.write(&feed.id, document, feed.cache_ttl.as_secs()) {
                warn!(feed = %feed.id, error = %e, "failed to write feed document to disk cache");
            }
        }
    }
}

impl<T: Transport> FeedSource for FeedClient<T> {
    async fn fetch(&self, feed: &FeedSpec) -> Result<RawDocument, FeedError> {
        FeedClient::fetch(self, feed).await
    }

    fn last_fetched(&self, feed_id: &str) -> Option<RawDocument> {
        FeedClient::last_fetched(self, feed_id)
    }
}
