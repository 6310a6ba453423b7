//! Chart-ready series built from a sonde history.

use crate::device::HistoryEntry;
use crate::physics;
use chrono::{DateTime, Utc};
use serde::Serialize;

fn finite(v: Option<f64>) -> Option<f64> {
    v.filter(|x| x.is_finite())
}

/// A value over time, tagged with the altitude it was measured at
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub time: DateTime<Utc>,
    pub value: f64,
    pub alt: Option<f64>,
}

/// A value against another quantity (temperature, altitude)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct XyPoint {
    pub x: f64,
    pub y: f64,
    pub alt: Option<f64>,
}

/// Horizontal wind sample at the altitude of the later fix of a pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WindSample {
    pub alt: f64,
    /// m/s
    pub speed: f64,
    /// degrees, [0, 360)
    pub direction: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WindProfile {
    pub ascent: Vec<WindSample>,
    pub descent: Vec<WindSample>,
}

fn series<'a>(
    history: impl IntoIterator<Item = &'a HistoryEntry>,
    value: impl Fn(&HistoryEntry) -> Option<f64>,
) -> Vec<SeriesPoint> {
    history
        .into_iter()
        .filter_map(|h| {
            Some(SeriesPoint {
                time: h.time,
                value: finite(value(h))?,
                alt: h.alt,
            })
        })
        .collect()
}

pub fn temperature_series<'a>(history: impl IntoIterator<Item = &'a HistoryEntry>) -> Vec<SeriesPoint> {
    series(history, |h| h.temperature)
}

pub fn humidity_series<'a>(history: impl IntoIterator<Item = &'a HistoryEntry>) -> Vec<SeriesPoint> {
    series(history, |h| h.humidity)
}

pub fn pressure_series<'a>(history: impl IntoIterator<Item = &'a HistoryEntry>) -> Vec<SeriesPoint> {
    series(history, |h| h.pressure)
}

/// Ground speed between consecutive fixes, stamped at the later fix.
///
/// Pairs without a positive time step are skipped; no clamping applies.
pub fn horizontal_speed_series<'a>(history: impl IntoIterator<Item = &'a HistoryEntry>) -> Vec<SeriesPoint> {
    let fixes: Vec<&HistoryEntry> = history.into_iter().collect();
    fixes
        .windows(2)
        .filter_map(|pair| {
            let (a, b) = (pair[0], pair[1]);
            let dt = (b.time - a.time).num_milliseconds() as f64 / 1000.0;
            if dt <= 0.0 {
                return None;
            }
            let v = physics::haversine(a.lat, a.lon, b.lat, b.lon) / dt;
            v.is_finite().then_some(SeriesPoint {
                time: b.time,
                value: v,
                alt: b.alt,
            })
        })
        .collect()
}

/// Wind speed and direction against altitude, split at the apex.
///
/// Fixes are ordered by time first. The pair ending at index `i` counts as
/// ascent while `i` is at or before the highest fix.
pub fn wind_profile<'a>(history: impl IntoIterator<Item = &'a HistoryEntry>) -> WindProfile {
    let mut fixes: Vec<&HistoryEntry> = history.into_iter().collect();
    fixes.sort_by_key(|h| h.time);

    let apex = fixes
        .iter()
        .enumerate()
        .filter_map(|(i, h)| Some((i, finite(h.alt)?)))
        .fold(None, |best: Option<(usize, f64)>, (i, alt)| match best {
            Some((_, top)) if alt <= top => best,
            _ => Some((i, alt)),
        })
        .map(|(i, _)| i);

    let mut profile = WindProfile::default();
    for (i, pair) in fixes.windows(2).enumerate() {
        let (a, b) = (pair[0], pair[1]);
        let Some(alt) = finite(b.alt) else { continue };
        if ![a.lat, a.lon, b.lat, b.lon].iter().all(|c| c.is_finite()) {
            continue;
        }
        let dt = (b.time - a.time).num_milliseconds() as f64 / 1000.0;
        if dt <= 0.0 {
            continue;
        }
        let speed = physics::haversine(a.lat, a.lon, b.lat, b.lon) / dt;
        let direction = physics::bearing(a.lat, a.lon, b.lat, b.lon);
        if !speed.is_finite() || !direction.is_finite() {
            continue;
        }

        let sample = WindSample { alt, speed, direction };
        if apex.is_none_or(|top| i < top) {
            profile.ascent.push(sample);
        } else {
            profile.descent.push(sample);
        }
    }
    profile
}

/// Air density (kg/m³) on x against altitude on y
pub fn air_density_profile<'a>(history: impl IntoIterator<Item = &'a HistoryEntry>) -> Vec<XyPoint> {
    history
        .into_iter()
        .filter_map(|h| {
            let alt = finite(h.alt)?;
            Some(XyPoint {
                x: physics::air_density(h.pressure, h.temperature)?,
                y: alt,
                alt: Some(alt),
            })
        })
        .collect()
}

fn against_temperature<'a>(
    history: impl IntoIterator<Item = &'a HistoryEntry>,
    value: impl Fn(&HistoryEntry) -> Option<f64>,
) -> Vec<XyPoint> {
    history
        .into_iter()
        .filter_map(|h| {
            Some(XyPoint {
                x: finite(h.temperature)?,
                y: finite(value(h))?,
                alt: h.alt,
            })
        })
        .collect()
}

/// Signal strength (dB) against temperature (°C)
pub fn signal_vs_temperature<'a>(history: impl IntoIterator<Item = &'a HistoryEntry>) -> Vec<XyPoint> {
    against_temperature(history, |h| h.signal)
}

/// Supply voltage (V) against temperature (°C)
pub fn battery_vs_temperature<'a>(history: impl IntoIterator<Item = &'a HistoryEntry>) -> Vec<XyPoint> {
    against_temperature(history, |h| h.battery)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn fix(secs: i64, lat: f64, alt: Option<f64>) -> HistoryEntry {
        HistoryEntry {
            time: DateTime::<Utc>::UNIX_EPOCH + TimeDelta::seconds(secs),
            lat,
            lon: 18.0,
            alt,
            temperature: Some(15.0),
            pressure: Some(1013.25),
            humidity: None,
            signal: Some(-95.0),
            battery: None,
        }
    }

    #[test]
    fn test_series_skip_missing_values() {
        let history = [fix(0, 54.0, Some(0.0)), fix(10, 54.0, None)];
        assert_eq!(temperature_series(&history).len(), 2);
        assert!(humidity_series(&history).is_empty());
        assert_eq!(pressure_series(&history)[1].alt, None);
        assert_eq!(signal_vs_temperature(&history).len(), 2);
        assert!(battery_vs_temperature(&history).is_empty());
    }

    #[test]
    fn test_horizontal_speed_skips_zero_dt() {
        let history = [fix(0, 54.0, None), fix(0, 54.001, None), fix(10, 54.002, None)];
        let speeds = horizontal_speed_series(&history);
        assert_eq!(speeds.len(), 1);
        // 0.001° of latitude is about 111 m
        assert!((speeds[0].value - 11.1).abs() < 0.1);
    }

    #[test]
    fn test_wind_profile_splits_at_apex() {
        let history = [
            fix(0, 54.000, Some(0.0)),
            fix(10, 54.001, Some(100.0)),
            fix(20, 54.002, Some(200.0)),
            fix(30, 54.003, Some(150.0)),
        ];
        let profile = wind_profile(&history);
        assert_eq!(profile.ascent.len(), 2);
        assert_eq!(profile.descent.len(), 1);
        assert_eq!(profile.descent[0].alt, 150.0);
        assert!(profile.ascent[0].direction < 1.0 || profile.ascent[0].direction > 359.0);
    }

    #[test]
    fn test_air_density_at_sea_level() {
        let history = [fix(0, 54.0, Some(0.0))];
        let rho = air_density_profile(&history);
        assert!((rho[0].x - 1.225).abs() < 0.01);
        assert_eq!(rho[0].y, 0.0);
    }
}
