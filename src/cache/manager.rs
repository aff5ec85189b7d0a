//! Disk cache for raw feed documents
//!
//! Persists the last successfully fetched document per feed to JSON files
//! with expiry timestamps, so a restart (or a run of failed refreshes) can
//! fall back to the most recent good copy instead of a blank dataset.

use chrono::{DateTime, Duration, Utc};
use directories::ProjectDirs;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Wrapper struct for cached data stored on disk
#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry<T> {
    /// The cached data
    data: T,
    /// When the data was cached
    cached_at: DateTime<Utc>,
    /// When the cache entry expires
    expires_at: DateTime<Utc>,
}

/// Result of reading from cache, including metadata about cache freshness
#[derive(Debug)]
pub struct CachedData<T> {
    /// The cached data
    pub data: T,
    /// When the data was originally cached
    pub cached_at: DateTime<Utc>,
    /// Whether the cache entry has expired
    pub is_expired: bool,
}

/// Manages reading and writing cached feed documents to disk
///
/// Entries live as JSON files in an XDG-compliant cache directory
/// (`~/.cache/bomwatch/` on Linux), keyed by feed identifier. Each entry
/// carries an expiry timestamp; expired entries are still returned (with
/// `is_expired = true`) so a stale document beats no document when the
/// upstream is unreachable.
#[derive(Debug, Clone)]
pub struct DiskCache {
    /// Directory where cache files are stored
    cache_dir: PathBuf,
}

impl DiskCache {
    /// Creates a new DiskCache using the XDG-compliant cache directory.
    ///
    /// Returns `None` if the cache directory cannot be determined (e.g. no
    /// home directory).
    pub fn new() -> Option<Self> {
        let project_dirs = ProjectDirs::from("", "", "bomwatch")?;
        let cache_dir = project_dirs.cache_dir().to_path_buf();
        Some(Self { cache_dir })
    }

    /// Creates a new DiskCache rooted at a custom directory.
    ///
    /// Useful for testing or when a specific cache location is needed.
    pub fn with_dir(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    /// Returns the path to a cache file for the given key
    fn cache_path(&self, key: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.json", key))
    }

    /// Ensures the cache directory exists
    fn ensure_dir(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.cache_dir)
    }

    /// Writes data to the cache with a TTL in seconds.
    ///
    /// Feed refresh intervals are minutes, so TTLs are second-granular.
    ///
    /// # Arguments
    /// * `key` - Unique identifier for the cache entry (e.g. "fire-observations")
    /// * `data` - The data to cache (must implement Serialize)
    /// * `ttl_secs` - How long the entry should be considered fresh
    pub fn write<T: Serialize>(&self, key: &str, data: &T, ttl_secs: u64) -> std::io::Result<()> {
        self.ensure_dir()?;

        let now = Utc::now();
        let entry = CacheEntry {
            data,
            cached_at: now,
            expires_at: now + Duration::seconds(ttl_secs as i64),
        };

        let json = serde_json::to_string_pretty(&entry)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        fs::write(self.cache_path(key), json)
    }

    /// Reads data from the cache.
    ///
    /// Returns `None` if the entry doesn't exist or cannot be parsed.
    /// Returns `Some(CachedData)` with `is_expired = true` when the entry
    /// exists but has aged past its TTL, supporting graceful degradation.
    pub fn read<T: DeserializeOwned>(&self, key: &str) -> Option<CachedData<T>> {
        let path = self.cache_path(key);
        let content = fs::read_to_string(path).ok()?;
        let entry: CacheEntry<T> = serde_json::from_str(&content).ok()?;

        let now = Utc::now();
        let is_expired = now > entry.expires_at;

        Some(CachedData {
            data: entry.data,
            cached_at: entry.cached_at,
            is_expired,
        })
    }
}
