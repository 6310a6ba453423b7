use crate::config::EngineConfig;
use crate::lifecycle::DeviceStatus;
use crate::record::Normalizer;
use crate::store::DeviceStore;
use chrono::{DateTime, TimeDelta, Utc};

fn at(secs: i64) -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH + TimeDelta::seconds(secs)
}

fn feed(rows: &[(&str, i64, f64)]) -> String {
    let mut text = String::from("sonde;type;datetime;lat;lon;alt;temp;humi;pres");
    for (id, secs, alt) in rows {
        text.push_str(&format!("\n{id};RS41;{secs};54.6;18.6;{alt};20;50;1000"));
    }
    text
}

#[test]
fn test_history_capacity_is_fifo() {
    let mut config = EngineConfig::default();
    config.history.capacity = 3;
    let mut store = DeviceStore::from_config(&config);

    let rows: Vec<(&str, i64, f64)> = (0..5).map(|i| ("T1", 1000 + i * 10, 100.0 * i as f64)).collect();
    let batch = Normalizer::default().normalize(&feed(&rows)).unwrap();
    let report = store.merge_batch(batch, at(1050));
    assert_eq!(report.updated, ["T1"]);
    assert_eq!(report.created + report.appended, 5);

    let t1 = store.get("T1").unwrap();
    let times: Vec<i64> = t1.history().iter().map(|h| h.time.timestamp()).collect();
    assert_eq!(times, [1020, 1030, 1040]);
    assert_eq!(t1.snapshot.alt, Some(400.0));
    // launch follows eviction
    assert_eq!(t1.events.launch.unwrap().time, at(1020));
}

#[test]
fn test_remerging_a_batch_is_a_no_op() {
    let mut store = DeviceStore::default();
    let text = feed(&[("T1", 1000, 100.0), ("T1", 1010, 200.0)]);
    store.merge_batch(Normalizer::default().normalize(&text).unwrap(), at(1010));
    let before = store.get("T1").unwrap().clone();

    let report = store.merge_batch(Normalizer::default().normalize(&text).unwrap(), at(1010));
    assert!(report.updated.is_empty());
    assert_eq!(report.ignored, 2);
    assert_eq!(store.get("T1").unwrap(), &before);
}

#[test]
fn test_older_point_does_not_rewrite_snapshot() {
    let mut store = DeviceStore::default();
    let normalizer = Normalizer::default();
    store.merge_batch(normalizer.normalize(&feed(&[("T1", 2000, 500.0)])).unwrap(), at(2000));
    store.merge_batch(normalizer.normalize(&feed(&[("T1", 1000, 100.0)])).unwrap(), at(2000));

    let t1 = store.get("T1").unwrap();
    assert_eq!(t1.history().len(), 1);
    assert_eq!(t1.snapshot.alt, Some(500.0));
}

#[test]
fn test_derived_values_follow_snapshot() {
    let mut store = DeviceStore::default();
    let batch = Normalizer::default().normalize(&feed(&[("T1", 1000, 100.0)])).unwrap();
    store.merge_batch(batch, at(1000));

    let d = store.get("T1").unwrap().derived;
    assert!((d.dew_point.unwrap() - 9.3).abs() < 0.1);
    assert!((d.potential_temperature.unwrap() - 293.15).abs() < 1e-9);
    assert!(d.lcl_height.unwrap() > 1000.0);
    assert!(d.distance_to_rx.unwrap() > 0.0);
}

#[test]
fn test_lifecycle_finishes_then_expires() {
    let mut store = DeviceStore::default();
    let batch = Normalizer::default().normalize(&feed(&[("T1", 0, 100.0)])).unwrap();
    store.merge_batch(batch, at(0));
    assert_eq!(store.count_status(DeviceStatus::Active), 1);

    assert!(store.sweep(at(901)).is_empty());
    assert_eq!(store.get("T1").unwrap().status, DeviceStatus::Finished);

    assert!(store.sweep(at(21_600)).is_empty());
    assert_eq!(store.sweep(at(21_601)), ["T1"]);
    assert!(store.is_empty());
}

#[test]
fn test_columns_win_over_description() {
    let text = "sonde;type;datetime;lat;lon;alt;temp;pres;humi;description\n\
                T1;RS41;1000;54.6;18.6;100;5;900;60;t=3C p=850hPa h=40%\n\
                T1;RS41;1010;54.6;18.6;200;;n/a;;t=3C p=850hPa h=40%";
    let only = |time: DateTime<Utc>| {
        let mut batch = Normalizer::default().normalize(text).unwrap();
        batch.observations.retain(|o| o.point.time == time);
        batch
    };
    let mut store = DeviceStore::default();

    store.merge_batch(only(at(1000)), at(1000));
    let t1 = store.get("T1").unwrap();
    assert_eq!(
        (t1.snapshot.temperature, t1.snapshot.pressure, t1.snapshot.humidity),
        (Some(5.0), Some(900.0), Some(60.0))
    );
    assert_eq!(t1.history().back().unwrap().temperature, Some(5.0));

    // blank and unparsable cells fall back to the description
    store.merge_batch(only(at(1010)), at(1010));
    let t1 = store.get("T1").unwrap();
    assert_eq!(
        (t1.snapshot.temperature, t1.snapshot.pressure, t1.snapshot.humidity),
        (Some(3.0), Some(850.0), Some(40.0))
    );
    let last = t1.history().back().unwrap();
    assert_eq!((last.temperature, last.pressure, last.humidity), (Some(3.0), Some(850.0), Some(40.0)));
}

#[test]
fn test_device_state_json_shape() {
    let mut store = DeviceStore::default();
    let text = feed(&[("T1", 1000, 100.0), ("T1", 1010, 200.0)]);
    store.merge_batch(Normalizer::default().normalize(&text).unwrap(), at(1010));
    let t1 = store.get("T1").unwrap();

    let json = serde_json::to_value(t1).unwrap();
    assert_eq!(json["id"], "T1");
    assert_eq!(json["status"], "active");
    assert_eq!(json["snapshot"]["alt"], 200.0);
    assert_eq!(json["history"].as_array().unwrap().len(), 2);

    let back: crate::device::DeviceState = serde_json::from_value(json).unwrap();
    assert_eq!(back.id, t1.id);
    assert_eq!(back.status, DeviceStatus::Active);
    assert_eq!(back.history().len(), 2);
    assert_eq!(back.snapshot.alt, Some(200.0));
    assert_eq!(back.events.launch.map(|e| e.time), Some(at(1000)));
}
