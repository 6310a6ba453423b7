//! Atmospheric and geodesic calculations.
//!
//! Every function takes plain numbers (or history slices) and returns `None`
//! when a required input is missing or non-finite.

use crate::constants::*;
use crate::device::HistoryEntry;
use serde::{Deserialize, Serialize};
use strum_macros::Display;

fn finite(v: Option<f64>) -> Option<f64> {
    v.filter(|x| x.is_finite())
}

/// Great-circle distance in metres
pub fn haversine(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().asin()
}

/// Initial bearing (forward azimuth) from point 1 to point 2, in [0, 360)
pub fn bearing(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let d_lon = (lon2 - lon1).to_radians();
    let y = d_lon.sin() * phi2.cos();
    let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * d_lon.cos();
    let deg = y.atan2(x).to_degrees();
    (deg + 360.0) % 360.0
}

/// Dew point (°C) from temperature (°C) and relative humidity (%), Magnus form
pub fn dew_point(temperature: Option<f64>, humidity: Option<f64>) -> Option<f64> {
    let t = finite(temperature)?;
    let rh = finite(humidity)?;
    let alpha = MAGNUS_A * t / (MAGNUS_B + t) + (rh.clamp(0.0, 100.0) / 100.0).ln();
    finite(Some(MAGNUS_B * alpha / (MAGNUS_A - alpha)))
}

/// Potential temperature θ (K) from temperature (°C) and pressure (hPa)
pub fn potential_temperature(temperature: Option<f64>, pressure: Option<f64>) -> Option<f64> {
    let t = finite(temperature)?;
    let p = finite(pressure).filter(|&p| p > 0.0)?;
    Some((t + KELVIN_OFFSET) * (REFERENCE_PRESSURE_HPA / p).powf(POISSON_EXPONENT))
}

/// Lifted condensation level above the parcel (m); `None` when supersaturated
pub fn lcl_height(temperature: Option<f64>, dew_point: Option<f64>) -> Option<f64> {
    let t = finite(temperature)?;
    let td = finite(dew_point)?;
    if t < td {
        return None;
    }
    Some(LCL_METRES_PER_DEGREE * (t - td))
}

/// Dry air density (kg/m³) from pressure (hPa) and temperature (°C)
pub fn air_density(pressure: Option<f64>, temperature: Option<f64>) -> Option<f64> {
    let p = finite(pressure)?;
    let t = finite(temperature)?;
    finite(Some(p * 100.0 / (DRY_AIR_GAS_CONSTANT * (t + KELVIN_OFFSET))))
}

/// (altitude, temperature) pairs of `history` with both values finite, by altitude
fn temperature_profile(history: &[&HistoryEntry]) -> Vec<(f64, f64)> {
    let mut pts: Vec<(f64, f64)> = history
        .iter()
        .filter_map(|h| Some((finite(h.alt)?, finite(h.temperature)?)))
        .collect();
    pts.sort_by(|a, b| a.0.total_cmp(&b.0));
    pts
}

/// Altitude (m) of the lowest 0 °C crossing, linearly interpolated
pub fn zero_isotherm_height<'a>(history: impl IntoIterator<Item = &'a HistoryEntry>) -> Option<f64> {
    let entries: Vec<&HistoryEntry> = history.into_iter().collect();
    let pts = temperature_profile(&entries);
    pts.windows(2).find_map(|w| {
        let (z1, t1) = w[0];
        let (z2, t2) = w[1];
        let crosses = (t1 <= 0.0 && t2 >= 0.0) || (t1 >= 0.0 && t2 <= 0.0);
        if !crosses {
            return None;
        }
        if t1 == t2 {
            return Some(z1);
        }
        let k = -t1 / (t2 - t1);
        Some(z1 + k * (z2 - z1))
    })
}

/// Stability class derived from the mean lapse rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StabilityClass {
    #[strum(to_string = "very unstable")]
    VeryUnstable,
    #[strum(to_string = "unstable")]
    Unstable,
    #[strum(to_string = "neutral")]
    Neutral,
    #[strum(to_string = "stable")]
    Stable,
    #[strum(to_string = "very stable")]
    VeryStable,
}

impl StabilityClass {
    /// Classify a lapse rate γ in K/km
    pub fn from_lapse_rate(gamma: f64) -> Self {
        if gamma > 9.8 {
            StabilityClass::VeryUnstable
        } else if gamma > 7.0 {
            StabilityClass::Unstable
        } else if gamma > 4.0 {
            StabilityClass::Neutral
        } else if gamma > 0.0 {
            StabilityClass::Stable
        } else {
            StabilityClass::VeryStable
        }
    }
}

/// Mean lapse rate and its classification
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stability {
    /// Mean lapse rate γ (K/km), positive when temperature falls with height
    pub lapse_rate: f64,
    pub class: StabilityClass,
}

/// Stability over the top `STABILITY_MAX_SEGMENTS` altitude segments.
///
/// Segments thinner than `STABILITY_MIN_SEGMENT_KM` are ignored; with no
/// usable segment the result is `None`.
pub fn stability<'a>(history: impl IntoIterator<Item = &'a HistoryEntry>) -> Option<Stability> {
    let entries: Vec<&HistoryEntry> = history.into_iter().collect();
    let pts = temperature_profile(&entries);
    if pts.len() < 2 {
        return None;
    }

    let segments = (pts.len() - 1).min(STABILITY_MAX_SEGMENTS);
    let start = pts.len() - 1 - segments;
    let rates: Vec<f64> = pts[start..]
        .windows(2)
        .filter_map(|w| {
            let dz_km = (w[1].0 - w[0].0) / 1000.0;
            if dz_km <= STABILITY_MIN_SEGMENT_KM {
                return None;
            }
            finite(Some(-(w[1].1 - w[0].1) / dz_km))
        })
        .collect();

    if rates.is_empty() {
        return None;
    }
    let gamma = rates.iter().sum::<f64>() / rates.len() as f64;
    finite(Some(gamma)).map(|lapse_rate| Stability {
        lapse_rate,
        class: StabilityClass::from_lapse_rate(lapse_rate),
    })
}
