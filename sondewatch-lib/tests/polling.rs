//! End-to-end tests: file feed through the poller into the store

mod common;

use common::*;
use sondewatch_lib::config::EngineConfig;
use sondewatch_lib::feed::{FeedQuery, FileFeed};
use sondewatch_lib::observer::StoreObserver;
use sondewatch_lib::scheduler::{CycleStatus, Poller};
use sondewatch_lib::store::SharedStore;
use std::io::Write;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct Events(Mutex<Vec<String>>);

impl StoreObserver for Events {
    fn device_updated(&self, device: &DeviceState) {
        self.0.lock().unwrap().push(format!("updated {}", device.id));
    }

    fn device_removed(&self, id: &str) {
        self.0.lock().unwrap().push(format!("removed {id}"));
    }

    fn cycle_finished(&self, status: &CycleStatus) {
        let kind = match status {
            CycleStatus::Fresh { .. } => "fresh",
            CycleStatus::Stale { .. } => "stale",
            CycleStatus::Failed { .. } => "failed",
        };
        self.0.lock().unwrap().push(kind.to_string());
    }
}

fn live_feed() -> String {
    let now = Utc::now().timestamp();
    format!(
        "sonde;type;datetime;lat;lon;alt\n\
         S100;RS41;{};54.60;18.60;1000\n\
         S100;RS41;{};54.61;18.61;1050\n\
         M200;M10;{};54.70;18.70;500",
        now - 20,
        now - 10,
        now - 10
    )
}

#[tokio::test]
async fn test_file_feed_cycle_notifies_observer() {
    init_tracing();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{}", live_feed()).unwrap();

    let config = EngineConfig::default();
    let store = SharedStore::new(DeviceStore::from_config(&config));
    let events = Arc::new(Events::default());
    let poller = Poller::new(Arc::new(FileFeed::new(file.path())), store.clone(), &config, events.clone());

    let status = poller.run_cycle(&FeedQuery::All).await;
    assert!(matches!(status, CycleStatus::Fresh { attempts: 1, .. }));
    assert_eq!(*events.0.lock().unwrap(), ["updated M200", "updated S100", "fresh"]);

    let all = store.snapshot_all().await;
    assert_eq!(all.len(), 2);
    let s100 = store.snapshot("S100").await.unwrap();
    assert_eq!(s100.history().len(), 2);
    assert_eq!(s100.snapshot.alt, Some(1050.0));
    assert!(s100.derived.kinematics.vertical_speed.unwrap() > 0.0);
    println!("✅ File feed merged and observer notified");
}

#[tokio::test]
async fn test_single_mode_filters_rows() {
    init_tracing();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{}", live_feed()).unwrap();

    let config = EngineConfig::default();
    let store = SharedStore::new(DeviceStore::from_config(&config));
    let poller = Poller::new(
        Arc::new(FileFeed::new(file.path())),
        store.clone(),
        &config,
        Arc::new(Events::default()),
    );

    poller.run_cycle(&FeedQuery::from_filter(Some("m2"))).await;
    let ids: Vec<String> = store.snapshot_all().await.into_iter().map(|d| d.id).collect();
    assert_eq!(ids, ["M200"]);
}

#[tokio::test]
async fn test_missing_file_falls_back_to_cache() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("feed.csv");
    std::fs::write(&path, live_feed()).unwrap();

    let mut config = EngineConfig::default();
    config.poll.retry_unit_ms = 1;
    let store = SharedStore::new(DeviceStore::from_config(&config));
    let events = Arc::new(Events::default());
    let poller = Poller::new(Arc::new(FileFeed::new(&path)), store, &config, events.clone());

    assert!(poller.run_cycle(&FeedQuery::All).await.is_fresh());
    std::fs::remove_file(&path).unwrap();

    let status = poller.run_cycle(&FeedQuery::All).await;
    match status {
        CycleStatus::Stale { error, report } => {
            assert!(matches!(error, SondeError::Io(_)));
            // replaying the cached body changes nothing
            assert!(report.updated.is_empty());
            assert_eq!(report.ignored, 3);
        }
        other => panic!("Expected stale status, got: {:?}", other),
    }
    assert_eq!(events.0.lock().unwrap().last().map(String::as_str), Some("stale"));
}
