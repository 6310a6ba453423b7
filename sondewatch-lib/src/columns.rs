use serde::{Deserialize, Serialize};
use strum_macros::Display;
use tracing::debug;

/// Logical columns understood by the normalizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Field {
    Identifier,
    Type,
    Latitude,
    Longitude,
    Altitude,
    Temperature,
    Pressure,
    Humidity,
    WindSpeed,
    WindDirection,
    Signal,
    Timestamp,
    Description,
}

impl Field {
    pub const ALL: [Field; 13] = [
        Field::Identifier,
        Field::Type,
        Field::Latitude,
        Field::Longitude,
        Field::Altitude,
        Field::Temperature,
        Field::Pressure,
        Field::Humidity,
        Field::WindSpeed,
        Field::WindDirection,
        Field::Signal,
        Field::Timestamp,
        Field::Description,
    ];

    /// Header names recognised for this field, in priority order
    pub fn candidates(self) -> &'static [&'static str] {
        match self {
            Field::Identifier => &["sonde", "id", "serial"],
            Field::Type => &["type", "model"],
            Field::Latitude => &["latitude", "lat"],
            Field::Longitude => &["longitude", "lon", "lng"],
            Field::Altitude => &["altitude", "alt"],
            Field::Temperature => &["temp", "temperature"],
            Field::Pressure => &["pres", "pressure", "p"],
            Field::Humidity => &["humi", "rh"],
            Field::WindSpeed => &["speed", "ws"],
            Field::WindDirection => &["course", "wd"],
            Field::Signal => &["rssi"],
            Field::Timestamp => &["datetime", "time", "timestamp"],
            Field::Description => &["description", "desc"],
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Column offsets used when a header name cannot be resolved.
///
/// Offsets differ between deployed export variants, so the table is
/// configurable and carries a layout name for logging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackTable {
    pub layout: String,
    pub identifier: Option<usize>,
    #[serde(rename = "type")]
    pub type_label: Option<usize>,
    pub timestamp: Option<usize>,
    pub latitude: Option<usize>,
    pub longitude: Option<usize>,
    pub altitude: Option<usize>,
    pub description: Option<usize>,
}

impl FallbackTable {
    /// `SONDE;Type;QRG;StartPlace;DateTime;Latitude;Longitude;Course;Speed;Altitude;Description;Status;Finder`
    pub fn radiosondy_export() -> Self {
        Self {
            layout: "radiosondy-export".to_string(),
            identifier: Some(0),
            type_label: Some(1),
            timestamp: Some(4),
            latitude: Some(5),
            longitude: Some(6),
            altitude: Some(9),
            description: Some(10),
        }
    }

    /// No positional fallback at all
    pub fn none() -> Self {
        Self {
            layout: "none".to_string(),
            identifier: None,
            type_label: None,
            timestamp: None,
            latitude: None,
            longitude: None,
            altitude: None,
            description: None,
        }
    }

    fn offset(&self, field: Field) -> Option<usize> {
        match field {
            Field::Identifier => self.identifier,
            Field::Type => self.type_label,
            Field::Timestamp => self.timestamp,
            Field::Latitude => self.latitude,
            Field::Longitude => self.longitude,
            Field::Altitude => self.altitude,
            Field::Description => self.description,
            _ => None,
        }
    }
}

impl Default for FallbackTable {
    fn default() -> Self {
        Self::radiosondy_export()
    }
}

/// How a column position was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Resolution {
    Exact,
    Substring,
    Positional,
}

/// Logical field → column position for one batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMap {
    positions: [Option<(usize, Resolution)>; 13],
}

impl ColumnMap {
    /// Resolve every field against a lower-cased header vector.
    ///
    /// Exact match over all candidates first, then substring match, then the
    /// positional fallback when the header is wide enough to contain it.
    pub fn resolve(headers: &[String], fallback: &FallbackTable) -> Self {
        let mut positions = [None; 13];
        for field in Field::ALL {
            let found = find_exact(headers, field.candidates())
                .map(|i| (i, Resolution::Exact))
                .or_else(|| find_substring(headers, field.candidates()).map(|i| (i, Resolution::Substring)))
                .or_else(|| {
                    fallback
                        .offset(field)
                        .filter(|&offset| headers.len() > offset)
                        .map(|offset| (offset, Resolution::Positional))
                });
            if let Some((index, how)) = found {
                debug!(%field, index, resolution = %how, "column resolved");
            }
            positions[field.index()] = found;
        }
        Self { positions }
    }

    /// Column position of a field, `None` when unresolved
    pub fn position(&self, field: Field) -> Option<usize> {
        self.positions[field.index()].map(|(i, _)| i)
    }

    pub fn resolution(&self, field: Field) -> Option<Resolution> {
        self.positions[field.index()].map(|(_, how)| how)
    }

    /// Fields that will read as null for the whole batch
    pub fn unresolved(&self) -> Vec<Field> {
        Field::ALL
            .into_iter()
            .filter(|f| self.positions[f.index()].is_none())
            .collect()
    }
}

fn find_exact(headers: &[String], names: &[&str]) -> Option<usize> {
    names
        .iter()
        .find_map(|name| headers.iter().position(|h| h == name))
}

fn find_substring(headers: &[String], names: &[&str]) -> Option<usize> {
    names
        .iter()
        .find_map(|name| headers.iter().position(|h| h.contains(name)))
}
