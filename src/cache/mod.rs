//! Disk caching for feed documents

mod manager;

pub use manager::{CachedData, DiskCache};
