//! Published snapshot store and summary statistics
//!
//! The store is the hand-off point between the refresh scheduler (writer)
//! and anything that wants current data (readers). Each domain holds at
//! most one published snapshot; publishing swaps the whole `Arc` so readers
//! always see a complete dataset, never a partially refreshed one.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Duration, Utc};
use tracing::warn;

use crate::model::{Domain, ForecastSet, RiskLevel, Snapshot};

#[derive(Debug, Default)]
struct Inner {
    domains: HashMap<Domain, Arc<Snapshot>>,
    forecasts: Option<Arc<ForecastSet>>,
}

/// Shared store of the latest published snapshot per domain.
///
/// Cloning is cheap; all clones share state. A failed or empty refresh never
/// evicts previously published data, so consumers degrade to stale rather
/// than blank.
#[derive(Debug, Clone, Default)]
pub struct SnapshotStore {
    inner: Arc<RwLock<Inner>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The latest published snapshot for a domain, if any
    pub fn current(&self, domain: Domain) -> Option<Arc<Snapshot>> {
        self.read().domains.get(&domain).cloned()
    }

    /// Publishes a snapshot, replacing the previous one for its domain.
    ///
    /// Invalid snapshots (no stations parsed) are refused and the prior
    /// snapshot stays published. Returns whether the snapshot was accepted.
    pub fn publish(&self, snapshot: Snapshot) -> bool {
        if !snapshot.valid {
            warn!(
                domain = %snapshot.domain,
                "refusing to publish snapshot with no stations"
            );
            return false;
        }
        self.write()
            .domains
            .insert(snapshot.domain, Arc::new(snapshot));
        true
    }

    /// The latest published forecast set, if any
    pub fn current_forecasts(&self) -> Option<Arc<ForecastSet>> {
        self.read().forecasts.clone()
    }

    /// Publishes a forecast set. An empty set is refused like an invalid
    /// snapshot. Returns whether the set was accepted.
    pub fn publish_forecasts(&self, forecasts: ForecastSet) -> bool {
        if forecasts.records.is_empty() {
            warn!("refusing to publish empty forecast set");
            return false;
        }
        self.write().forecasts = Some(Arc::new(forecasts));
        true
    }

    /// Age of the published snapshot for a domain, or `None` when nothing
    /// has been published yet
    pub fn staleness(&self, domain: Domain, now: DateTime<Utc>) -> Option<Duration> {
        self.current(domain).map(|s| s.age(now))
    }

    /// Whether a domain needs refreshing: no snapshot yet, or the existing
    /// one has aged past the refresh interval
    pub fn is_due(&self, domain: Domain, refresh_interval: Duration, now: DateTime<Utc>) -> bool {
        match self.staleness(domain, now) {
            Some(age) => age >= refresh_interval,
            None => true,
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}

/// Aggregate view of one snapshot, for status logging and one-shot output
#[derive(Debug, Clone)]
pub struct SnapshotSummary {
    pub domain: Domain,
    /// Stations in the snapshot
    pub station_count: usize,
    /// Stations carrying at least one numeric measurement
    pub stations_with_data: usize,
    /// Highest-risk station and its score, when any station scored
    pub highest: Option<(String, f64)>,
    /// Mean score across scored stations
    pub mean_score: Option<f64>,
    /// Station count per risk level
    pub level_counts: BTreeMap<RiskLevel, usize>,
}

impl SnapshotSummary {
    pub fn of(snapshot: &Snapshot) -> Self {
        let mut highest: Option<(String, f64)> = None;
        let mut score_sum = 0.0;
        let mut scored = 0usize;
        let mut level_counts: BTreeMap<RiskLevel, usize> = BTreeMap::new();
        let mut stations_with_data = 0usize;

        for entry in &snapshot.entries {
            *level_counts.entry(entry.assessment.level()).or_insert(0) += 1;
            if !entry.record.measurements.is_empty() {
                stations_with_data += 1;
            }
            if let Some(score) = entry.assessment.score() {
                score_sum += score;
                scored += 1;
                let is_new_high = highest.as_ref().map_or(true, |(_, best)| score > *best);
                if is_new_high {
                    highest = Some((entry.record.station_code.clone(), score));
                }
            }
        }

        Self {
            domain: snapshot.domain,
            station_count: snapshot.entries.len(),
            stations_with_data,
            highest,
            mean_score: (scored > 0).then(|| score_sum / scored as f64),
            level_counts,
        }
    }
}
