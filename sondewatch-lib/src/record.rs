use crate::columns::{ColumnMap, FallbackTable, Field};
use crate::constants::UNKNOWN_ID;
use crate::description::DescriptionFields;
use crate::error::SondeError;
use crate::table::{RawRow, RawTable};
use crate::timestamp::{NaiveZone, parse_timestamp};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;
use strum_macros::Display;
use tracing::{debug, info};

static NUMBER_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+-]?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?").expect("number pattern is valid"));

/// One instant of one sonde, as read from the feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationPoint {
    pub time: DateTime<Utc>,
    pub lat: f64,
    pub lon: f64,
    /// Altitude (m)
    pub alt: Option<f64>,
    /// Temperature (°C)
    pub temperature: Option<f64>,
    /// Pressure (hPa)
    pub pressure: Option<f64>,
    /// Relative humidity (%)
    pub humidity: Option<f64>,
}

/// Auxiliary fields travelling with a point
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Auxiliary {
    pub type_label: Option<String>,
    /// Wind speed (m/s)
    pub wind_speed: Option<f64>,
    /// Wind direction (°)
    pub wind_direction: Option<f64>,
    /// Received signal strength (dB)
    pub signal: Option<f64>,
    pub description: String,
    pub extracted: DescriptionFields,
}

/// A normalised row ready for merging
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub id: String,
    pub point: ObservationPoint,
    pub aux: Auxiliary,
}

/// Why a data row was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum RowRejection {
    #[strum(to_string = "unresolvable timestamp")]
    BadTimestamp,
    #[strum(to_string = "missing or invalid coordinates")]
    BadCoordinates,
    #[strum(to_string = "identifier filter mismatch")]
    FilteredOut,
}

/// Row accounting for one batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchStats {
    pub rows: usize,
    pub accepted: usize,
    pub bad_timestamp: usize,
    pub bad_coordinates: usize,
    pub filtered_out: usize,
}

impl BatchStats {
    fn reject(&mut self, why: RowRejection) {
        match why {
            RowRejection::BadTimestamp => self.bad_timestamp += 1,
            RowRejection::BadCoordinates => self.bad_coordinates += 1,
            RowRejection::FilteredOut => self.filtered_out += 1,
        }
    }

    pub fn rejected(&self) -> usize {
        self.bad_timestamp + self.bad_coordinates + self.filtered_out
    }
}

/// Output of normalising one feed body
#[derive(Debug, Clone)]
pub struct NormalizedBatch {
    pub observations: Vec<Observation>,
    pub stats: BatchStats,
    pub columns: ColumnMap,
}

impl NormalizedBatch {
    /// Group observations per identifier, each group sorted by time.
    ///
    /// The sort is stable, so rows sharing a timestamp keep feed order.
    pub fn into_device_groups(self) -> BTreeMap<String, Vec<Observation>> {
        let mut groups: BTreeMap<String, Vec<Observation>> = BTreeMap::new();
        for obs in self.observations {
            groups.entry(obs.id.clone()).or_default().push(obs);
        }
        for group in groups.values_mut() {
            group.sort_by_key(|obs| obs.point.time);
        }
        groups
    }
}

/// Turns raw feed text into typed observations
#[derive(Debug, Clone)]
pub struct Normalizer {
    fallback: FallbackTable,
    zone: NaiveZone,
    filter: Option<String>,
}

impl Normalizer {
    pub fn new(fallback: FallbackTable, zone: NaiveZone) -> Self {
        Self {
            fallback,
            zone,
            filter: None,
        }
    }

    /// Keep only identifiers containing `filter` (case-insensitive); empty clears it
    pub fn with_filter(mut self, filter: Option<&str>) -> Self {
        self.filter = filter
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(str::to_lowercase);
        self
    }

    pub fn filter(&self) -> Option<&str> {
        self.filter.as_deref()
    }

    /// Parse and normalise a whole feed body.
    ///
    /// Only a missing header or data section is an error; bad rows are
    /// counted in [`BatchStats`] and skipped.
    pub fn normalize(&self, text: &str) -> Result<NormalizedBatch, SondeError> {
        let table = RawTable::parse(text)?;
        let columns = ColumnMap::resolve(table.headers(), &self.fallback);
        debug!(
            layout = %self.fallback.layout,
            unresolved = ?columns.unresolved(),
            "column map built"
        );

        let mut stats = BatchStats {
            rows: table.len(),
            ..Default::default()
        };
        let mut observations = Vec::with_capacity(table.len());

        for (line, row) in table.rows() {
            match self.normalize_row(&row, &columns) {
                Ok(obs) => observations.push(obs),
                Err(why) => {
                    debug!(line, reason = %why, "row skipped");
                    stats.reject(why);
                }
            }
        }
        stats.accepted = observations.len();

        info!(
            rows = stats.rows,
            accepted = stats.accepted,
            rejected = stats.rejected(),
            "feed normalised"
        );

        Ok(NormalizedBatch {
            observations,
            stats,
            columns,
        })
    }

    /// Normalise one data row against a resolved column map
    pub fn normalize_row(&self, row: &RawRow<'_>, columns: &ColumnMap) -> Result<Observation, RowRejection> {
        let cell = |field: Field| row.cell(columns.position(field));

        let time = parse_timestamp(cell(Field::Timestamp), self.zone).ok_or(RowRejection::BadTimestamp)?;

        let (lat, lon) = match (parse_number(cell(Field::Latitude)), parse_number(cell(Field::Longitude))) {
            (Some(lat), Some(lon)) => (lat, lon),
            _ => return Err(RowRejection::BadCoordinates),
        };

        let id = match cell(Field::Identifier) {
            "" => UNKNOWN_ID.to_string(),
            id => id.to_string(),
        };
        if let Some(filter) = &self.filter {
            if !id.to_lowercase().contains(filter.as_str()) {
                return Err(RowRejection::FilteredOut);
            }
        }

        let description = cell(Field::Description).to_string();
        let extracted = DescriptionFields::parse(&description);
        let type_label = Some(cell(Field::Type))
            .filter(|t| !t.is_empty())
            .map(str::to_string);

        Ok(Observation {
            id,
            point: ObservationPoint {
                time,
                lat,
                lon,
                alt: parse_number(cell(Field::Altitude)),
                temperature: parse_number(cell(Field::Temperature)),
                pressure: parse_number(cell(Field::Pressure)),
                humidity: parse_number(cell(Field::Humidity)),
            },
            aux: Auxiliary {
                type_label,
                wind_speed: parse_number(cell(Field::WindSpeed)),
                wind_direction: parse_number(cell(Field::WindDirection)),
                signal: parse_number(cell(Field::Signal)),
                description,
                extracted,
            },
        })
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(FallbackTable::default(), NaiveZone::default())
    }
}

/// Lenient float parse: the longest leading numeric prefix, finite only.
///
/// `"512.4hPa"` reads as `512.4`; `""`, `"n/a"` and `"NaN"` read as `None`.
pub fn parse_number(text: &str) -> Option<f64> {
    let text = text.trim();
    NUMBER_PREFIX
        .find(text)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}
