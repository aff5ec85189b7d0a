//! Periodic refresh of domain snapshots and forecasts
//!
//! The scheduler drives the whole pipeline: on each tick it decides which
//! feeds are due, fetches and parses them concurrently, scores the results,
//! and publishes new snapshots. Domains are independent; one feed failing
//! never blocks the others, and a failed refresh leaves the previous
//! snapshot in place.
//!
//! Manual refreshes go through [`RefreshHandle`]. The trigger channel has
//! capacity one, so any number of triggers arriving while a cycle is in
//! flight coalesce into a single follow-up cycle.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::feed::{
    parse_forecasts, parse_observations, FeedError, FeedSource, FeedSpec, ParseError, RawDocument,
};
use crate::model::{Domain, ForecastSet, Snapshot, SnapshotEntry};
use crate::risk;
use crate::snapshot::SnapshotStore;

/// What the scheduler is doing right now
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedulerState {
    /// Waiting for the next tick or trigger
    #[default]
    Idle,
    /// A refresh cycle is in flight
    Fetching,
    /// The last cycle refreshed everything it attempted
    Ready,
    /// At least one refresh in the last cycle failed
    Failed,
}

/// Why a single refresh within a cycle failed
#[derive(Debug, Clone, Error)]
pub enum RefreshError {
    #[error(transparent)]
    Fetch(#[from] FeedError),

    #[error("{0}")]
    Parse(String),

    /// The document parsed but contained no usable records
    #[error("feed document contained no records")]
    Empty,
}

impl From<ParseError> for RefreshError {
    fn from(e: ParseError) -> Self {
        RefreshError::Parse(e.to_string())
    }
}

/// One feed refreshed during a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshTarget {
    Observations(Domain),
    Forecasts,
}

impl std::fmt::Display for RefreshTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RefreshTarget::Observations(domain) => write!(f, "{domain}-observations"),
            RefreshTarget::Forecasts => f.write_str("forecasts"),
        }
    }
}

/// Result of refreshing one feed: the published record count, or the error
#[derive(Debug, Clone)]
pub struct RefreshOutcome {
    pub target: RefreshTarget,
    pub result: Result<usize, RefreshError>,
}

/// What one scheduler cycle attempted and how it went
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// One outcome per feed that was due; empty when nothing was due
    pub outcomes: Vec<RefreshOutcome>,
}

impl CycleReport {
    /// A cycle succeeds when every attempted refresh succeeded
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }
}

#[derive(Debug, Default)]
struct StatusInner {
    state: Mutex<SchedulerState>,
    cycles: AtomicU64,
    last_report: Mutex<Option<CycleReport>>,
}

/// Cheap observable handle onto scheduler progress
#[derive(Debug, Clone, Default)]
pub struct StatusHandle {
    inner: Arc<StatusInner>,
}

impl StatusHandle {
    pub fn state(&self) -> SchedulerState {
        *self.inner.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Number of completed refresh cycles since startup
    pub fn cycles_completed(&self) -> u64 {
        self.inner.cycles.load(Ordering::SeqCst)
    }

    pub fn last_report(&self) -> Option<CycleReport> {
        self.inner
            .last_report
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn set_state(&self, state: SchedulerState) {
        *self.inner.state.lock().unwrap_or_else(|e| e.into_inner()) = state;
    }

    fn record_cycle(&self, report: CycleReport) {
        self.inner.cycles.fetch_add(1, Ordering::SeqCst);
        *self
            .inner
            .last_report
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(report);
    }
}

/// Requests an out-of-band refresh cycle.
///
/// Backed by a capacity-one channel: while a trigger is already queued,
/// further triggers are dropped, so a burst collapses into exactly one
/// extra cycle.
#[derive(Debug, Clone)]
pub struct RefreshHandle {
    trigger_tx: mpsc::Sender<()>,
}

impl RefreshHandle {
    /// Queues a refresh. Returns false when one is already queued.
    pub fn trigger(&self) -> bool {
        self.trigger_tx.try_send(()).is_ok()
    }
}

/// Drives periodic and manual refresh cycles against a [`FeedSource`]
pub struct RefreshScheduler<S: FeedSource> {
    source: Arc<S>,
    config: AppConfig,
    store: SnapshotStore,
    status: StatusHandle,
    trigger_rx: mpsc::Receiver<()>,
    // Held so trigger_rx.recv() stays pending even with no outside handles
    _trigger_tx: mpsc::Sender<()>,
}

impl<S: FeedSource> RefreshScheduler<S> {
    pub fn new(source: S, config: AppConfig, store: SnapshotStore) -> (Self, RefreshHandle) {
        let (trigger_tx, trigger_rx) = mpsc::channel(1);
        let handle = RefreshHandle {
            trigger_tx: trigger_tx.clone(),
        };
        let scheduler = Self {
            source: Arc::new(source),
            config,
            store,
            status: StatusHandle::default(),
            trigger_rx,
            _trigger_tx: trigger_tx,
        };
        (scheduler, handle)
    }

    pub fn status(&self) -> StatusHandle {
        self.status.clone()
    }

    /// Runs the scheduler loop forever.
    ///
    /// The first cycle runs immediately and refreshes everything; after
    /// that, ticks refresh only what is due and triggers refresh everything.
    /// Ticks that land while a cycle is still in flight are skipped rather
    /// than queued.
    pub async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.config.tick_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first interval tick completes immediately
        ticker.tick().await;

        self.run_cycle(true).await;

        loop {
            // Between cycles the observable state is Idle; the cycle's own
            // outcome lives in the last report.
            self.status.set_state(SchedulerState::Idle);
            tokio::select! {
                _ = ticker.tick() => {
                    self.run_cycle(false).await;
                }
                Some(()) = self.trigger_rx.recv() => {
                    self.run_cycle(true).await;
                }
            }
        }
    }

    /// Runs one refresh cycle.
    ///
    /// With `force` set, every feed refreshes regardless of age; otherwise
    /// only feeds whose published data has outlived its refresh interval.
    /// All due feeds are fetched concurrently.
    pub async fn run_cycle(&self, force: bool) -> CycleReport {
        self.status.set_state(SchedulerState::Fetching);
        let started_at = Utc::now();

        let due_domains: Vec<Domain> = Domain::ALL
            .into_iter()
            .filter(|d| {
                force || self
                    .store
                    .is_due(*d, self.config.refresh_interval(*d), started_at)
            })
            .collect();
        let forecasts_due = force || self.forecasts_due(started_at);

        let domain_refreshes = due_domains.iter().map(|d| self.refresh_observations(*d));
        let mut outcomes = join_all(domain_refreshes).await;
        if forecasts_due {
            outcomes.push(self.refresh_forecasts().await);
        }

        let report = CycleReport {
            started_at,
            finished_at: Utc::now(),
            outcomes,
        };

        let state = if report.is_success() {
            SchedulerState::Ready
        } else {
            SchedulerState::Failed
        };
        self.status.set_state(state);
        self.status.record_cycle(report.clone());

        info!(
            attempted = report.outcomes.len(),
            success = report.is_success(),
            "refresh cycle finished"
        );
        report
    }

    fn forecasts_due(&self, now: DateTime<Utc>) -> bool {
        match self.store.current_forecasts() {
            Some(current) => now - current.fetched_at >= self.config.forecast_refresh_interval(),
            None => true,
        }
    }

    /// Fetches a feed document, falling back to the source's last cached
    /// copy when the fetch fails and nothing has been published yet. Stale
    /// data beats a blank dataset on a cold start; once something is
    /// published, a failure simply keeps it.
    async fn fetch_or_cached(
        &self,
        feed: &FeedSpec,
        have_published: bool,
    ) -> Result<RawDocument, RefreshError> {
        match self.source.fetch(feed).await {
            Ok(document) => Ok(document),
            Err(e) if !have_published => match self.source.last_fetched(&feed.id) {
                Some(document) => {
                    warn!(feed = %feed.id, error = %e, "fetch failed, using last cached document");
                    Ok(document)
                }
                None => Err(e.into()),
            },
            Err(e) => Err(e.into()),
        }
    }

    /// Fetches, parses, scores, and publishes one domain's observations
    async fn refresh_observations(&self, domain: Domain) -> RefreshOutcome {
        let target = RefreshTarget::Observations(domain);
        let feed = self.config.observation_feed(domain);
        let profile = self.config.profile(domain);
        let have_published = self.store.current(domain).is_some();

        let result = async {
            let document = self.fetch_or_cached(&feed, have_published).await?;
            let records = parse_observations(&document)?;

            let entries: Vec<SnapshotEntry> = records
                .into_iter()
                .map(|record| {
                    let assessment = risk::assess(&record, domain, &profile);
                    SnapshotEntry { record, assessment }
                })
                .collect();
            let count = entries.len();

            let snapshot = Snapshot::new(domain, document.fetched_at, entries);
            if !self.store.publish(snapshot) {
                return Err(RefreshError::Empty);
            }
            Ok(count)
        }
        .await;

        match &result {
            Ok(count) => info!(%domain, stations = count, "published snapshot"),
            Err(e) => {
                error!(%domain, error = %e, "refresh failed, keeping previous snapshot")
            }
        }

        RefreshOutcome { target, result }
    }

    /// Fetches, parses, and publishes the forecast feed
    async fn refresh_forecasts(&self) -> RefreshOutcome {
        let feed = self.config.forecast_feed();
        let have_published = self.store.current_forecasts().is_some();

        let result = async {
            let document = self.fetch_or_cached(&feed, have_published).await?;
            let records = parse_forecasts(&document)?;
            let count = records.len();

            let set = ForecastSet {
                fetched_at: document.fetched_at,
                records,
            };
            if !self.store.publish_forecasts(set) {
                return Err(RefreshError::Empty);
            }
            Ok(count)
        }
        .await;

        match &result {
            Ok(count) => info!(records = count, "published forecasts"),
            Err(e) => warn!(error = %e, "forecast refresh failed, keeping previous set"),
        }

        RefreshOutcome {
            target: RefreshTarget::Forecasts,
            result,
        }
    }
}
