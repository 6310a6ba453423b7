use crate::constants::{KINEMATICS_MAX_DT_SECS, KINEMATICS_MIN_DT_SECS};
use crate::device::HistoryEntry;
use crate::physics::{bearing, haversine};
use serde::{Deserialize, Serialize};

/// Motion of a sonde between its two latest fixes
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Kinematics {
    /// Ground speed (m/s)
    pub horizontal_speed: Option<f64>,
    /// Climb rate (m/s), negative while descending
    pub vertical_speed: Option<f64>,
    /// Speed along the 3-D path (m/s)
    pub speed_3d: Option<f64>,
    /// Course over ground (°, 0 = north)
    pub course: Option<f64>,
}

impl Kinematics {
    /// Derive kinematics from history, preferring a reported climb rate.
    ///
    /// With fewer than two points only the reported climb rate is available.
    pub fn from_history<'a, I>(history: I, reported_climb: Option<f64>) -> Self
    where
        I: IntoIterator<Item = &'a HistoryEntry>,
        I::IntoIter: DoubleEndedIterator,
    {
        let reported_climb = reported_climb.filter(|v| v.is_finite());
        let mut latest = history.into_iter().rev();
        let (Some(b), Some(a)) = (latest.next(), latest.next()) else {
            return Self {
                vertical_speed: reported_climb,
                ..Self::default()
            };
        };
        Self::between(a, b, reported_climb)
    }

    /// Kinematics from fix `a` to the later fix `b`
    pub fn between(a: &HistoryEntry, b: &HistoryEntry, reported_climb: Option<f64>) -> Self {
        let dt = ((b.time - a.time).num_milliseconds() as f64 / 1000.0)
            .clamp(KINEMATICS_MIN_DT_SECS, KINEMATICS_MAX_DT_SECS);
        let dh = haversine(a.lat, a.lon, b.lat, b.lon);
        let dz = match (a.alt, b.alt) {
            (Some(za), Some(zb)) if za.is_finite() && zb.is_finite() => Some(zb - za),
            _ => None,
        };

        let horizontal_speed = Some(dh / dt).filter(|v| v.is_finite());
        let vertical_speed = reported_climb.or(dz.map(|dz| dz / dt));
        let speed_3d = match (horizontal_speed, vertical_speed, dz) {
            (Some(_), Some(_), Some(dz)) => Some((dh * dh + dz * dz).sqrt() / dt),
            _ => None,
        };
        let course = Some(bearing(a.lat, a.lon, b.lat, b.lon)).filter(|v| v.is_finite());

        Self {
            horizontal_speed,
            vertical_speed,
            speed_3d,
            course,
        }
    }
}
