//! Common test utilities and shared imports

// Allow unused imports and dead code since this is a shared module
// used across multiple test files - not all items are used in every test file
#[allow(unused_imports)]
pub use chrono::{DateTime, TimeDelta, Utc};
#[allow(unused_imports)]
pub use sondewatch_lib::columns::{ColumnMap, FallbackTable, Field, Resolution};
#[allow(unused_imports)]
pub use sondewatch_lib::device::{DeviceState, HistoryEntry};
#[allow(unused_imports)]
pub use sondewatch_lib::error::SondeError;
#[allow(unused_imports)]
pub use sondewatch_lib::record::{Normalizer, parse_number};
#[allow(unused_imports)]
pub use sondewatch_lib::store::{DeviceStore, MergeOutcome};
#[allow(unused_imports)]
pub use sondewatch_lib::timestamp::NaiveZone;

/// Route library logs to the test harness; `RUST_LOG` selects the level
#[allow(dead_code)]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// Header of the radiosondy.info CSV export
#[allow(dead_code)]
pub const EXPORT_HEADER: &str =
    "SONDE;Type;QRG;StartPlace;DateTime;Latitude;Longitude;Course;Speed;Altitude;Description;Status;Finder";

/// Three rows of one ascent in export layout
#[allow(dead_code)]
pub const EXPORT_ROWS: &str = "\
T1234567;RS41-SGP;403.000;Leba;2024-05-01 11:00:00;54.7530;17.5340;90;5;1200;Clb=5.2m/s t=3.1C h=71% p=880hPa batt=2.9V;Flying;
T1234567;RS41-SGP;403.000;Leba;2024-05-01 11:00:10;54.7531;17.5350;90;5;1252;Clb=5.1m/s t=2.8C h=70% p=874.5hPa batt=2.9V;Flying;
T1234567;RS41-SGP;403.000;Leba;2024-05-01 11:00:20;54.7532;17.5360;90;5;1303;Clb=5.0m/s t=2.4C h=69% p=869hPa batt=2.8V;Flying;";

#[allow(dead_code)]
pub fn export_feed() -> String {
    format!("{EXPORT_HEADER}\n{EXPORT_ROWS}")
}

#[allow(dead_code)]
pub fn at(secs: i64) -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH + TimeDelta::seconds(secs)
}

/// History fix with only position, altitude and temperature set
#[allow(dead_code)]
pub fn fix(secs: i64, alt: f64, temperature: f64) -> HistoryEntry {
    HistoryEntry {
        time: at(secs),
        lat: 54.5,
        lon: 18.5,
        alt: Some(alt),
        temperature: Some(temperature),
        pressure: None,
        humidity: None,
        signal: None,
        battery: None,
    }
}
