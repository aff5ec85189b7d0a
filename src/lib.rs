//! bomwatch - weather bureau feed ingestion and risk scoring
//!
//! A service that periodically fetches weather bureau XML feeds, decodes
//! station observations and town forecasts, scores each station against
//! configurable fire, storm, and coastal risk profiles, and publishes the
//! results as immutable snapshots.

pub mod cache;
pub mod cli;
pub mod config;
pub mod feed;
pub mod model;
pub mod risk;
pub mod scheduler;
pub mod snapshot;
