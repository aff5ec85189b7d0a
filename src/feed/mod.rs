//! Bureau feed retrieval and decoding
//!
//! This module owns everything between the upstream HTTP endpoints and the
//! structured records the risk engine consumes: feed identity, raw document
//! caching, the retrying HTTP client, and the schema-tolerant XML parsers.

pub mod client;
pub mod parser;

pub use client::{FeedClient, HttpTransport, RetryPolicy};
pub use parser::{parse_forecasts, parse_observations, ParseError};

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identity and fetch parameters for one upstream feed endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct FeedSpec {
    /// Stable feed identifier, used as the cache key (e.g. "fire-observations")
    pub id: String,
    /// Upstream URL returning the XML document
    pub url: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// How long a cached copy of this feed stays fresh
    pub cache_ttl: Duration,
}

/// A raw feed document as fetched, before any parsing.
///
/// Cached per feed identifier independent of parse success, so a parse
/// failure never forces an immediate re-fetch and already-fetched bytes
/// stay available.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDocument {
    /// Feed the document came from
    pub feed_id: String,
    /// The document body text
    pub body: String,
    /// When the fetch completed
    pub fetched_at: DateTime<Utc>,
}

/// Errors that can occur when fetching a feed document
#[derive(Debug, Clone, Error)]
pub enum FeedError {
    /// Connection-level failure; retried up to the retry budget
    #[error("network error fetching feed '{feed}': {message}")]
    Network { feed: String, message: String },

    /// The request exceeded its timeout; retried up to the retry budget
    #[error("timed out fetching feed '{feed}'")]
    Timeout { feed: String },

    /// Upstream returned a non-2xx status. 4xx is treated as permanent
    /// and surfaced without retry; 5xx is retried.
    #[error("upstream returned HTTP {status} for feed '{feed}'")]
    Status { feed: String, status: u16 },
}

impl FeedError {
    /// Whether a retry could plausibly succeed
    pub fn is_transient(&self) -> bool {
        match self {
            FeedError::Network { .. } | FeedError::Timeout { .. } => true,
            FeedError::Status { status, .. } => *status >= 500,
        }
    }
}

/// Raw HTTP response as seen by the feed client
#[derive(Debug, Clone)]
pub struct TransportResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body text
    pub body: String,
}

impl TransportResponse {
    /// True for 2xx statuses
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// One HTTP round trip. Implemented by the real reqwest transport and by
/// scripted stand-ins in tests, keeping retry logic testable offline.
pub trait Transport: Send + Sync {
    fn get(
        &self,
        feed: &FeedSpec,
    ) -> impl Future<Output = Result<TransportResponse, FeedError>> + Send;
}

/// Source of raw feed documents, as consumed by the refresh scheduler.
/// [`FeedClient`] is the production implementation.
pub trait FeedSource: Send + Sync {
    fn fetch(&self, feed: &FeedSpec) -> impl Future<Output = Result<RawDocument, FeedError>> + Send;

    /// The most recent successfully fetched document, when the source keeps
    /// one. Lets a cold start fall back to cached data while the upstream
    /// is unreachable.
    fn last_fetched(&self, _feed_id: &str) -> Option<RawDocument> {
        None
    }
}
