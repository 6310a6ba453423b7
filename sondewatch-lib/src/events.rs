use crate::device::HistoryEntry;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Position of a flight event
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EventMarker {
    pub time: DateTime<Utc>,
    pub lat: f64,
    pub lon: f64,
    pub alt: Option<f64>,
}

impl From<&HistoryEntry> for EventMarker {
    fn from(h: &HistoryEntry) -> Self {
        Self {
            time: h.time,
            lat: h.lat,
            lon: h.lon,
            alt: h.alt,
        }
    }
}

/// Launch and burst markers of one flight
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FlightEvents {
    pub launch: Option<EventMarker>,
    pub burst: Option<EventMarker>,
}

/// Finds launch and burst points in a sonde history
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EventDetector {
    hysteresis_m: f64,
}

impl EventDetector {
    pub fn new(hysteresis_m: f64) -> Self {
        Self { hysteresis_m }
    }

    pub fn hysteresis_m(&self) -> f64 {
        self.hysteresis_m
    }

    /// Recompute both markers from the retained history.
    ///
    /// The burst marker sits on the highest fix but is only published while
    /// the latest fix is more than the hysteresis below it.
    pub fn detect<'a>(&self, history: impl IntoIterator<Item = &'a HistoryEntry>) -> FlightEvents {
        let mut launch: Option<&HistoryEntry> = None;
        let mut apex: Option<(&HistoryEntry, f64)> = None;
        let mut last: Option<&HistoryEntry> = None;

        for h in history {
            if h.lat.is_finite() && h.lon.is_finite() && launch.is_none_or(|l| h.time < l.time) {
                launch = Some(h);
            }
            if let Some(alt) = h.alt.filter(|a| a.is_finite()) {
                if apex.is_none_or(|(_, top)| alt > top) {
                    apex = Some((h, alt));
                }
            }
            if last.is_none_or(|l| h.time >= l.time) {
                last = Some(h);
            }
        }

        let burst = match (apex, last.and_then(|l| l.alt).filter(|a| a.is_finite())) {
            (Some((apex, top)), Some(current)) if current < top - self.hysteresis_m => Some(EventMarker::from(apex)),
            _ => None,
        };

        FlightEvents {
            launch: launch.map(EventMarker::from),
            burst,
        }
    }
}

impl Default for EventDetector {
    fn default() -> Self {
        Self::new(crate::constants::BURST_HYSTERESIS_M)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn fix(secs: i64, alt: f64) -> HistoryEntry {
        HistoryEntry {
            time: DateTime::<Utc>::UNIX_EPOCH + TimeDelta::seconds(secs),
            lat: 54.0 + secs as f64 * 1e-4,
            lon: 18.0,
            alt: Some(alt),
            temperature: None,
            pressure: None,
            humidity: None,
            signal: None,
            battery: None,
        }
    }

    #[test]
    fn test_launch_is_earliest_fix() {
        let history = [fix(10, 100.0), fix(20, 200.0)];
        let events = EventDetector::default().detect(&history);
        assert_eq!(events.launch.unwrap().time, history[0].time);
        assert_eq!(events.burst, None);
        assert_eq!(EventDetector::default().detect(std::iter::empty()), FlightEvents::default());
    }

    #[test]
    fn test_burst_waits_for_hysteresis() {
        let detector = EventDetector::default();
        let mut history = vec![fix(0, 0.0), fix(10, 20_000.0), fix(20, 30_000.0)];
        assert_eq!(detector.detect(&history).burst, None);

        // 5 m below the apex: still within hysteresis
        history.push(fix(30, 29_995.0));
        assert_eq!(detector.detect(&history).burst, None);

        // 10 m below is not "more than" 10 m
        history.push(fix(40, 29_990.0));
        assert_eq!(detector.detect(&history).burst, None);

        history.push(fix(50, 29_900.0));
        let burst = detector.detect(&history).burst.unwrap();
        assert_eq!(burst.alt, Some(30_000.0));
        assert_eq!(burst.time, history[2].time);
    }

    #[test]
    fn test_burst_tracks_new_apex() {
        let detector = EventDetector::new(10.0);
        let mut history = vec![fix(0, 1000.0), fix(10, 900.0)];
        assert_eq!(detector.detect(&history).burst.unwrap().alt, Some(1000.0));

        // climbing again past the old apex withdraws the marker
        history.push(fix(20, 1200.0));
        assert_eq!(detector.detect(&history).burst, None);

        history.push(fix(30, 1100.0));
        assert_eq!(detector.detect(&history).burst.unwrap().alt, Some(1200.0));
    }
}
