//! End-to-end pipeline tests: scripted HTTP transport through the feed
//! client, parsers, risk engine, scheduler, and snapshot store.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use bomwatch::config::AppConfig;
use bomwatch::feed::{
    FeedClient, FeedError, FeedSpec, RetryPolicy, Transport, TransportResponse,
};
use bomwatch::model::{Domain, RiskLevel};
use bomwatch::scheduler::{RefreshScheduler, SchedulerState};
use bomwatch::snapshot::SnapshotStore;

const OBS_XML: &str = r#"<product><observations>
  <station bom-id="94608" stn-name="PERTH METRO" lat="-31.92" lon="115.87">
    <period time-utc="2024-02-10T06:00:00+00:00">
      <level type="surface">
        <element type="air_temperature">42.0</element>
        <element type="rel-humidity">8</element>
        <element type="wind_spd_kmh">55</element>
        <element type="gust_kmh">70</element>
        <element type="vis_km">10</element>
      </level>
    </period>
  </station>
  <station bom-id="94614" stn-name="ROTTNEST ISLAND">
    <period time-utc="2024-02-10T06:00:00+00:00">
      <level type="surface">
        <element type="wind_spd_kmh">20</element>
        <element type="vis_km">2</element>
      </level>
    </period>
  </station>
</observations></product>"#;

const FORECAST_XML: &str = r#"<product><forecast>
  <area aac="WA_PT053" description="Perth" type="location">
    <forecast-period index="0" start-time-local="2024-02-10T00:00:00+08:00">
      <element type="air_temperature_maximum">42</element>
      <element type="probability_of_precipitation">5%</element>
      <text type="precis">Very hot and sunny.</text>
    </forecast-period>
  </area>
</forecast></product>"#;

/// Scripted HTTP transport. Each feed id carries a queue of responses;
/// once the queue empties the last response repeats.
struct ScriptedTransport {
    scripts: Mutex<HashMap<String, Vec<Result<TransportResponse, FeedError>>>>,
}

impl ScriptedTransport {
    fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
        }
    }

    fn script(self, feed_id: &str, responses: Vec<Result<TransportResponse, FeedError>>) -> Self {
        self.scripts
            .lock()
            .expect("script lock")
            .insert(feed_id.to_string(), responses);
        self
    }

    fn ok(body: &str) -> Result<TransportResponse, FeedError> {
        Ok(TransportResponse {
            status: 200,
            body: body.to_string(),
        })
    }

    fn timeout(feed_id: &str) -> Result<TransportResponse, FeedError> {
        Err(FeedError::Timeout {
            feed: feed_id.to_string(),
        })
    }
}

impl Transport for ScriptedTransport {
    async fn get(&self, feed: &FeedSpec) -> Result<TransportResponse, FeedError> {
        let mut scripts = self.scripts.lock().expect("script lock");
        let queue = scripts.get_mut(&feed.id).unwrap_or_else(|| {
            panic!("no script for feed '{}'", feed.id);
        });
        if queue.len() > 1 {
            queue.remove(0)
        } else {
            queue[0].clone()
        }
    }
}

fn all_good_transport() -> ScriptedTransport {
    let mut transport = ScriptedTransport::new();
    for domain in Domain::ALL {
        transport = transport.script(
            &format!("{domain}-observations"),
            vec![ScriptedTransport::ok(OBS_XML)],
        );
    }
    transport.script("forecasts", vec![ScriptedTransport::ok(FORECAST_XML)])
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        backoff: Duration::from_millis(1),
    }
}

#[tokio::test]
async fn test_full_pipeline_publishes_scored_snapshots() {
    let client = FeedClient::with_transport(all_good_transport()).with_retry(fast_retry());
    let store = SnapshotStore::new();
    let (scheduler, _handle) = RefreshScheduler::new(client, AppConfig::default(), store.clone());

    let report = scheduler.run_cycle(true).await;

    assert!(report.is_success());
    assert_eq!(scheduler.status().state(), SchedulerState::Ready);

    let fire = store.current(Domain::Fire).expect("fire snapshot");
    assert_eq!(fire.entries.len(), 2);
    // Hot, dry, and windy station scores extreme fire risk
    assert_eq!(fire.entries[0].assessment.level(), RiskLevel::Extreme);

    let coastal = store.current(Domain::Coastal).expect("coastal snapshot");
    // Moderate wind with poor visibility lands in moderate coastal risk
    let rottnest = &coastal.entries[1];
    assert_eq!(rottnest.record.station_code, "94614");
    assert_eq!(rottnest.assessment.level(), RiskLevel::Moderate);

    let forecasts = store.current_forecasts().expect("forecasts");
    assert_eq!(forecasts.records[0].locality, "Perth");
    assert_eq!(forecasts.records[0].rain_probability, Some(5.0));
}

#[tokio::test]
async fn test_transient_failures_recover_within_retry_budget() {
    // The fire feed times out twice before answering; the retry budget of
    // three attempts absorbs both, so the cycle still succeeds.
    let transport = all_good_transport().script(
        "fire-observations",
        vec![
            ScriptedTransport::timeout("fire-observations"),
            ScriptedTransport::timeout("fire-observations"),
            ScriptedTransport::ok(OBS_XML),
        ],
    );
    let client = FeedClient::with_transport(transport).with_retry(fast_retry());
    let store = SnapshotStore::new();
    let (scheduler, _handle) = RefreshScheduler::new(client, AppConfig::default(), store.clone());

    let report = scheduler.run_cycle(true).await;

    assert!(report.is_success(), "two timeouts fit in a three-attempt budget");
    assert!(store.current(Domain::Fire).is_some());
}

#[tokio::test]
async fn test_persistent_failure_marks_cycle_failed_but_publishes_rest() {
    let transport = all_good_transport().script(
        "storm-observations",
        vec![ScriptedTransport::timeout("storm-observations")],
    );
    let client = FeedClient::with_transport(transport).with_retry(fast_retry());
    let store = SnapshotStore::new();
    let (scheduler, _handle) = RefreshScheduler::new(client, AppConfig::default(), store.clone());

    let report = scheduler.run_cycle(true).await;

    assert!(!report.is_success());
    assert_eq!(scheduler.status().state(), SchedulerState::Failed);
    assert!(store.current(Domain::Storm).is_none());
    assert!(store.current(Domain::Fire).is_some());
    assert!(store.current(Domain::Coastal).is_some());
}

#[tokio::test]
async fn test_second_cycle_skips_everything_fresh() {
    let client = FeedClient::with_transport(all_good_transport()).with_retry(fast_retry());
    let store = SnapshotStore::new();
    let (scheduler, _handle) = RefreshScheduler::new(client, AppConfig::default(), store.clone());

    scheduler.run_cycle(true).await;
    let report = scheduler.run_cycle(false).await;

    assert!(report.outcomes.is_empty(), "nothing should be due immediately");
    assert_eq!(scheduler.status().cycles_completed(), 2);
}
