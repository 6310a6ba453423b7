use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

const FIXED_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const FIXED_LEN: usize = "YYYY-MM-DD HH:MM:SS".len();

/// Naive layouts accepted by the generic fallback, tried in order
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%d.%m.%Y %H:%M:%S",
];

/// Zone in which timestamps without an offset are interpreted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NaiveZone {
    /// Host local calendar
    #[default]
    Local,
    Utc,
}

impl NaiveZone {
    fn to_utc(self, naive: NaiveDateTime) -> Option<DateTime<Utc>> {
        match self {
            NaiveZone::Local => Local
                .from_local_datetime(&naive)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc)),
            NaiveZone::Utc => Some(Utc.from_utc_datetime(&naive)),
        }
    }
}

/// Resolve a timestamp cell to an absolute UTC instant.
///
/// Tried in order:
/// 1. all digits: epoch seconds below 11 digits, epoch milliseconds otherwise
/// 2. `YYYY-MM-DD HH:MM:SS` in `zone`
/// 3. RFC 3339 / RFC 2822, then a few naive layouts in `zone`, then a bare
///    `YYYY-MM-DD` taken as UTC midnight
pub fn parse_timestamp(raw: &str, zone: NaiveZone) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if raw.bytes().all(|b| b.is_ascii_digit()) {
        let n: i64 = raw.parse().ok()?;
        return if raw.len() < 11 {
            DateTime::from_timestamp(n, 0)
        } else {
            DateTime::from_timestamp_millis(n)
        };
    }

    if raw.len() == FIXED_LEN {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, FIXED_FORMAT) {
            return zone.to_utc(naive);
        }
    }

    parse_generic(raw, zone)
}

fn parse_generic(raw: &str, zone: NaiveZone) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Some(naive) = NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
    {
        return zone.to_utc(naive);
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}
