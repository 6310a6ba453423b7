use crate::config::Receiver;
use crate::events::{EventDetector, FlightEvents};
use crate::kinematics::Kinematics;
use crate::lifecycle::{DeviceStatus, LifecyclePolicy};
use crate::physics::{self, Stability};
use crate::record::Observation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// A retained fix in a sonde's history
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub time: DateTime<Utc>,
    pub lat: f64,
    pub lon: f64,
    pub alt: Option<f64>,
    pub temperature: Option<f64>,
    pub pressure: Option<f64>,
    pub humidity: Option<f64>,
    pub signal: Option<f64>,
    pub battery: Option<f64>,
}

/// Latest observed values of a sonde
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub time: Option<DateTime<Utc>>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    /// Altitude (m)
    pub alt: Option<f64>,
    /// Temperature (°C)
    pub temperature: Option<f64>,
    /// Pressure (hPa)
    pub pressure: Option<f64>,
    /// Relative humidity (%)
    pub humidity: Option<f64>,
    /// Wind speed (m/s)
    pub wind_speed: Option<f64>,
    /// Wind direction (°)
    pub wind_direction: Option<f64>,
    /// Signal strength (dB)
    pub signal: Option<f64>,
    /// Supply voltage (V)
    pub battery: Option<f64>,
    /// Climb rate reported in the description (m/s)
    pub climb_rate: Option<f64>,
}

/// Quantities recomputed from the snapshot and history after every merge
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Derived {
    /// Dew point (°C)
    pub dew_point: Option<f64>,
    /// Potential temperature θ (K)
    pub potential_temperature: Option<f64>,
    /// Lifted condensation level above the sonde (m)
    pub lcl_height: Option<f64>,
    /// Altitude of the 0 °C isotherm (m)
    pub zero_isotherm_height: Option<f64>,
    /// Ground distance to the receiver (m)
    pub distance_to_rx: Option<f64>,
    pub kinematics: Kinematics,
    pub stability: Option<Stability>,
}

/// Everything known about one sonde
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceState {
    pub id: String,
    pub type_label: Option<String>,
    pub snapshot: Snapshot,
    pub derived: Derived,
    pub status: DeviceStatus,
    /// Seconds since the latest fix, as of the last merge or sweep
    pub age_secs: Option<f64>,
    pub events: FlightEvents,
    history: VecDeque<HistoryEntry>,
}

impl DeviceState {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            type_label: None,
            snapshot: Snapshot::default(),
            derived: Derived::default(),
            status: DeviceStatus::Active,
            age_secs: None,
            events: FlightEvents::default(),
            history: VecDeque::new(),
        }
    }

    /// Retained fixes, oldest first
    pub fn history(&self) -> &VecDeque<HistoryEntry> {
        &self.history
    }

    /// Time of the latest accepted fix
    pub fn latest_time(&self) -> Option<DateTime<Utc>> {
        self.snapshot.time
    }

    /// Record an observation if it is strictly newer than the latest fix.
    ///
    /// Returns `false` and leaves the state untouched for replays and
    /// out-of-order points.
    pub(crate) fn apply(&mut self, obs: &Observation, capacity: usize) -> bool {
        if self.snapshot.time.is_some_and(|t| obs.point.time <= t) {
            return false;
        }

        let p = &obs.point;
        let extracted = &obs.aux.extracted;
        let temperature = first_finite(p.temperature, extracted.temperature);
        let pressure = first_finite(p.pressure, extracted.pressure);
        let humidity = first_finite(p.humidity, extracted.humidity);
        let signal = first_finite(obs.aux.signal, None);
        let battery = first_finite(extracted.battery, None);

        self.history.push_back(HistoryEntry {
            time: p.time,
            lat: p.lat,
            lon: p.lon,
            alt: p.alt,
            temperature,
            pressure,
            humidity,
            signal,
            battery,
        });
        while self.history.len() > capacity.max(1) {
            self.history.pop_front();
        }

        if let Some(label) = obs.aux.type_label.as_deref().filter(|l| !l.is_empty()) {
            self.type_label = Some(label.to_string());
        }
        self.snapshot = Snapshot {
            time: Some(p.time),
            lat: Some(p.lat),
            lon: Some(p.lon),
            alt: p.alt,
            temperature,
            pressure,
            humidity,
            wind_speed: obs.aux.wind_speed,
            wind_direction: obs.aux.wind_direction,
            signal,
            battery,
            climb_rate: first_finite(extracted.climb_rate, None),
        };
        true
    }

    /// Refresh age and status against `now`
    pub(crate) fn refresh_lifecycle(&mut self, now: DateTime<Utc>, policy: &LifecyclePolicy) {
        if let Some(time) = self.snapshot.time {
            let age = LifecyclePolicy::age_secs(now, time);
            self.age_secs = Some(age);
            self.status = policy.classify(age);
        }
    }

    /// Recompute every derived quantity and the flight events
    pub(crate) fn recompute(&mut self, rx: &Receiver, detector: &EventDetector) {
        let s = &self.snapshot;
        let dew_point = physics::dew_point(s.temperature, s.humidity);
        let distance_to_rx = match (s.lat, s.lon) {
            (Some(lat), Some(lon)) => Some(physics::haversine(rx.lat, rx.lon, lat, lon)),
            _ => None,
        };

        self.derived = Derived {
            dew_point,
            potential_temperature: physics::potential_temperature(s.temperature, s.pressure),
            lcl_height: physics::lcl_height(s.temperature, dew_point),
            zero_isotherm_height: physics::zero_isotherm_height(&self.history),
            distance_to_rx,
            kinematics: Kinematics::from_history(&self.history, s.climb_rate),
            stability: physics::stability(&self.history),
        };
        self.events = detector.detect(&self.history);
    }
}

fn first_finite(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    a.filter(|v| v.is_finite()).or(b.filter(|v| v.is_finite()))
}

struct Value(Option<f64>, usize);

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(v) => write!(f, "{:.*}", self.1, v),
            None => write!(f, "-"),
        }
    }
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = &self.snapshot;
        let d = &self.derived;
        let last_fix = s
            .time
            .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "-".to_string());
        let status = match self.status {
            DeviceStatus::Active => "Active",
            DeviceStatus::Finished => "Finished",
        };
        let class = d
            .stability
            .map(|st| st.class.to_string())
            .unwrap_or_else(|| "-".to_string());

        writeln!(f, "Sonde ID: {}", self.id)?;
        writeln!(f, "Type: {}", self.type_label.as_deref().unwrap_or("-"))?;
        writeln!(f, "Last fix: {last_fix}")?;
        writeln!(f, "Status: {status}")?;
        writeln!(f, "Alt [m]: {}", Value(s.alt, 0))?;
        writeln!(f, "Temp [C]: {}", Value(s.temperature, 1))?;
        writeln!(f, "Dew point [C]: {}", Value(d.dew_point, 1))?;
        writeln!(f, "Pressure [hPa]: {}", Value(s.pressure, 1))?;
        writeln!(f, "RH [%]: {}", Value(s.humidity, 0))?;
        writeln!(f, "Vertical speed [m/s]: {}", Value(d.kinematics.vertical_speed, 1))?;
        writeln!(f, "Horizontal speed [m/s]: {}", Value(d.kinematics.horizontal_speed, 1))?;
        writeln!(f, "Course [deg]: {}", Value(d.kinematics.course, 0))?;
        writeln!(f, "Distance to RX [m]: {}", Value(d.distance_to_rx, 0))?;
        writeln!(f, "Zero isotherm [m]: {}", Value(d.zero_isotherm_height, 0))?;
        writeln!(f, "LCL [m]: {}", Value(d.lcl_height, 0))?;
        writeln!(f, "Theta potential [K]: {}", Value(d.potential_temperature, 1))?;
        writeln!(f, "Stability Gamma [K/km]: {}", Value(d.stability.map(|st| st.lapse_rate), 1))?;
        write!(f, "Stability class: {class}")
    }
}
