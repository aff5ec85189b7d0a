//! Core data models for the bomwatch service
//!
//! This module contains the data types shared across the pipeline: station
//! observation records, forecast records, risk assessments, and the snapshot
//! type that bundles a scored dataset for one risk domain.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The risk domains served by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Fire,
    Storm,
    Coastal,
}

impl Domain {
    /// All domains, in the order the scheduler refreshes them
    pub const ALL: [Domain; 3] = [Domain::Fire, Domain::Storm, Domain::Coastal];

    /// Stable lowercase name, used for feed identifiers and log output
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Fire => "fire",
            Domain::Storm => "storm",
            Domain::Coastal => "coastal",
        }
    }
}

impl std::fmt::Display for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Discrete risk level, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
    Extreme,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RiskLevel::Low => "Low",
            RiskLevel::Moderate => "Moderate",
            RiskLevel::High => "High",
            RiskLevel::Extreme => "Extreme",
        };
        f.write_str(s)
    }
}

/// Sensor measurements reported by a station.
///
/// Every field is independently optional: bureau stations report different
/// sensor sets, and individual readings drop out of the feed when a sensor
/// is offline. Absence is preserved as `None`, never coerced to zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Measurements {
    /// Air temperature in degrees Celsius
    pub air_temperature: Option<f64>,
    /// Relative humidity percentage (0-100)
    pub relative_humidity: Option<f64>,
    /// Sustained wind speed in km/h
    pub wind_speed: Option<f64>,
    /// Wind gust speed in km/h
    pub wind_gust: Option<f64>,
    /// Compass wind direction as reported (e.g. "NNE")
    pub wind_direction: Option<String>,
    /// Rainfall since 9am local in millimetres
    pub rainfall_since_9am: Option<f64>,
    /// Mean sea level pressure in hPa
    pub mean_sea_level_pressure: Option<f64>,
    /// Visibility in kilometres
    pub visibility: Option<f64>,
}

impl Measurements {
    /// True when no numeric measurement is populated.
    ///
    /// Wind direction is descriptive text, not a scoring input, so it does
    /// not count towards a populated record.
    pub fn is_empty(&self) -> bool {
        self.air_temperature.is_none()
            && self.relative_humidity.is_none()
            && self.wind_speed.is_none()
            && self.wind_gust.is_none()
            && self.rainfall_since_9am.is_none()
            && self.mean_sea_level_pressure.is_none()
            && self.visibility.is_none()
    }
}

/// A single station observation decoded from the bureau feed.
///
/// Immutable once constructed by the parser; the risk engine only reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationRecord {
    /// Bureau station code
    pub station_code: String,
    /// Human-readable station name
    pub name: String,
    /// Latitude, if the feed supplied a parseable value
    pub latitude: Option<f64>,
    /// Longitude, if the feed supplied a parseable value
    pub longitude: Option<f64>,
    /// Observation timestamp (UTC), if present in the feed
    pub observed_at: Option<DateTime<Utc>>,
    /// The measurement set for this observation
    pub measurements: Measurements,
}

/// A short-range forecast entry for one locality and period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRecord {
    /// Locality (town) name
    pub locality: String,
    /// Bureau area code
    pub area_code: String,
    /// Forecast period index (0 = today)
    pub period_index: Option<u32>,
    /// Local start time of the period, as the feed's RFC 3339 text
    pub start_time: Option<String>,
    /// Forecast minimum temperature in Celsius
    pub min_temp: Option<f64>,
    /// Forecast maximum temperature in Celsius
    pub max_temp: Option<f64>,
    /// Probability of precipitation percentage
    pub rain_probability: Option<f64>,
    /// Short weather description
    pub precis: Option<String>,
    /// Bureau forecast icon code
    pub icon_code: Option<u32>,
}

/// The full set of forecast records from one fetch of the forecast feed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastSet {
    /// When the forecast feed was fetched
    pub fetched_at: DateTime<Utc>,
    /// Records sorted by locality, then period index
    pub records: Vec<ForecastRecord>,
}

/// Outcome of scoring one station for one domain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RiskOutcome {
    /// A computed score with its level and per-factor contributions.
    /// Contributions sum to the score.
    Scored {
        score: f64,
        level: RiskLevel,
        factors: BTreeMap<String, f64>,
    },
    /// Too few factors were present to score the record. Not an error:
    /// downstream treats this as level Low with an empty breakdown.
    InsufficientData,
}

/// Risk classification for one station in one domain.
///
/// Always derived from a [`StationRecord`]; never stored independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Station the assessment belongs to
    pub station_code: String,
    /// Risk domain the assessment was computed for
    pub domain: Domain,
    /// The scored or insufficient-data outcome
    pub outcome: RiskOutcome,
}

impl RiskAssessment {
    /// The effective display level. Insufficient data reports Low by policy.
    pub fn level(&self) -> RiskLevel {
        match &self.outcome {
            RiskOutcome::Scored { level, .. } => *level,
            RiskOutcome::InsufficientData => RiskLevel::Low,
        }
    }

    /// The numeric score, when one was computed
    pub fn score(&self) -> Option<f64> {
        match &self.outcome {
            RiskOutcome::Scored { score, .. } => Some(*score),
            RiskOutcome::InsufficientData => None,
        }
    }
}

/// A station record paired with its assessment for the snapshot's domain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub record: StationRecord,
    pub assessment: RiskAssessment,
}

/// The complete scored dataset for one domain at one refresh cycle.
///
/// Snapshots are immutable once published and replaced atomically in the
/// store; readers never observe a half-built one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Domain this snapshot covers
    pub domain: Domain,
    /// When the underlying feed document was fetched
    pub fetched_at: DateTime<Utc>,
    /// Scored stations, in feed order (first occurrence)
    pub entries: Vec<SnapshotEntry>,
    /// True when the snapshot came from a successful parse of at least one
    /// station. The store refuses to publish invalid snapshots.
    pub valid: bool,
}

impl Snapshot {
    /// Builds a snapshot from scored entries.
    ///
    /// The snapshot is valid only when at least one station was parsed;
    /// an empty entry list produces an invalid snapshot which the store
    /// will not accept as a replacement.
    pub fn new(domain: Domain, fetched_at: DateTime<Utc>, entries: Vec<SnapshotEntry>) -> Self {
        let valid = !entries.is_empty();
        Self {
            domain,
            fetched_at,
            entries,
            valid,
        }
    }

    /// Age of the snapshot relative to `now`
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.fetched_at
    }
}
