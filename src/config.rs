//! Service configuration
//!
//! Configuration loads from a JSON file with every field optional; anything
//! omitted falls back to the bureau's Western Australia feeds and the
//! built-in risk profiles. Feed URLs, cadences, timeouts, and the full
//! factor/curve/threshold tables are all overridable, so operators can
//! re-point a domain at a different state feed or retune scoring without a
//! rebuild.

use std::path::Path;
use std::time::Duration as StdDuration;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::feed::FeedSpec;
use crate::model::Domain;
use crate::risk::DomainProfile;

/// Default observation feed (WA ten-minute observations)
const DEFAULT_OBSERVATIONS_URL: &str = "http://www.bom.gov.au/fwo/IDW60920.xml";
/// Default town forecast feed (WA precis forecasts)
const DEFAULT_FORECASTS_URL: &str = "http://www.bom.gov.au/fwo/IDW14199.xml";

const DEFAULT_TIMEOUT_SECS: u64 = 15;
/// Observations update on a ten-minute cadence upstream
const DEFAULT_OBSERVATION_REFRESH_SECS: u64 = 600;
/// Forecasts update roughly hourly upstream
const DEFAULT_FORECAST_REFRESH_SECS: u64 = 3600;

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Feed and scoring configuration for one risk domain
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DomainConfig {
    /// Observation feed URL for this domain
    pub feed_url: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// How often this domain's snapshot should be refreshed, in seconds
    pub refresh_secs: u64,
    /// Risk profile; `None` means the built-in default for the domain
    pub profile: Option<DomainProfile>,
}

impl Default for DomainConfig {
    fn default() -> Self {
        Self {
            feed_url: DEFAULT_OBSERVATIONS_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            refresh_secs: DEFAULT_OBSERVATION_REFRESH_SECS,
            profile: None,
        }
    }
}

/// Fetch configuration for the forecast feed
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    pub feed_url: String,
    pub timeout_secs: u64,
    pub refresh_secs: u64,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            feed_url: DEFAULT_FORECASTS_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            refresh_secs: DEFAULT_FORECAST_REFRESH_SECS,
        }
    }
}

/// Top-level service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Scheduler tick interval in seconds; `None` uses the shortest domain
    /// refresh interval
    pub tick_secs: Option<u64>,
    pub fire: DomainConfig,
    pub storm: DomainConfig,
    pub coastal: DomainConfig,
    pub forecasts: ForecastConfig,
}

impl AppConfig {
    /// Loads configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn domain(&self, domain: Domain) -> &DomainConfig {
        match domain {
            Domain::Fire => &self.fire,
            Domain::Storm => &self.storm,
            Domain::Coastal => &self.coastal,
        }
    }

    /// The feed spec for one domain's observation feed
    pub fn observation_feed(&self, domain: Domain) -> FeedSpec {
        let cfg = self.domain(domain);
        FeedSpec {
            id: format!("{domain}-observations"),
            url: cfg.feed_url.clone(),
            timeout: StdDuration::from_secs(cfg.timeout_secs),
            cache_ttl: StdDuration::from_secs(cfg.refresh_secs),
        }
    }

    /// The feed spec for the forecast feed
    pub fn forecast_feed(&self) -> FeedSpec {
        FeedSpec {
            id: "forecasts".to_string(),
            url: self.forecasts.feed_url.clone(),
            timeout: StdDuration::from_secs(self.forecasts.timeout_secs),
            cache_ttl: StdDuration::from_secs(self.forecasts.refresh_secs),
        }
    }

    /// The risk profile for a domain: the configured override, or the
    /// built-in default
    pub fn profile(&self, domain: Domain) -> DomainProfile {
        self.domain(domain)
            .profile
            .clone()
            .unwrap_or_else(|| DomainProfile::default_for(domain))
    }

    /// Refresh interval for one domain's snapshot
    pub fn refresh_interval(&self, domain: Domain) -> Duration {
        Duration::seconds(self.domain(domain).refresh_secs as i64)
    }

    /// Refresh interval for the forecast set
    pub fn forecast_refresh_interval(&self) -> Duration {
        Duration::seconds(self.forecasts.refresh_secs as i64)
    }

    /// How often the scheduler wakes to check what is due
    pub fn tick_interval(&self) -> StdDuration {
        let secs = self.tick_secs.unwrap_or_else(|| {
            Domain::ALL
                .iter()
                .map(|d| self.domain(*d).refresh_secs)
                .min()
                .unwrap_or(DEFAULT_OBSERVATION_REFRESH_SECS)
        });
        StdDuration::from_secs(secs.max(1))
    }
}
