// Engine constants for radiosonde tracking

/// Mean Earth radius used by the haversine distance (metres)
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Default receiver latitude (Gdynia Oksywie)
pub const DEFAULT_RX_LAT: f64 = 54.546;

/// Default receiver longitude (Gdynia Oksywie)
pub const DEFAULT_RX_LON: f64 = 18.5501;

/// Seconds without new data before a sonde is considered finished
pub const ACTIVE_TIMEOUT_SECS: u64 = 900;

/// Seconds a finished sonde stays in the store before it is pruned
pub const VISIBILITY_WINDOW_SECS: u64 = 6 * 3600;

/// Retained history points per sonde (about 50 min at 5 s cadence)
pub const HISTORY_LIMIT: usize = 600;

/// Altitude drop below the apex required before the burst marker is shown (metres)
pub const BURST_HYSTERESIS_M: f64 = 10.0;

/// Polling period of the scheduler (milliseconds)
pub const POLL_INTERVAL_MS: u64 = 5_000;

/// Hard timeout of a single feed fetch (milliseconds)
pub const FETCH_TIMEOUT_MS: u64 = 30_000;

/// Fetch attempts per scheduled cycle
pub const FETCH_ATTEMPTS: u32 = 3;

/// Retry delay unit; attempt `n` waits `n` units (milliseconds)
pub const RETRY_UNIT_MS: u64 = 1_200;

/// Identifier used for rows with an empty identifier cell
pub const UNKNOWN_ID: &str = "UNKNOWN";

/// Magnus coefficient `a` for the dew point approximation
pub const MAGNUS_A: f64 = 17.27;

/// Magnus coefficient `b` for the dew point approximation (°C)
pub const MAGNUS_B: f64 = 237.7;

/// Poisson exponent R/cp used for potential temperature
pub const POISSON_EXPONENT: f64 = 0.2854;

/// Reference pressure for potential temperature (hPa)
pub const REFERENCE_PRESSURE_HPA: f64 = 1000.0;

/// Offset between Celsius and Kelvin
pub const KELVIN_OFFSET: f64 = 273.15;

/// LCL height per degree of dew point depression (metres)
pub const LCL_METRES_PER_DEGREE: f64 = 125.0;

/// Specific gas constant of dry air (J/(kg·K))
pub const DRY_AIR_GAS_CONSTANT: f64 = 287.0;

/// Bounds of the time delta used by the kinematics (seconds)
pub const KINEMATICS_MIN_DT_SECS: f64 = 0.5;
pub const KINEMATICS_MAX_DT_SECS: f64 = 600.0;

/// Maximum number of altitude segments averaged by the stability index
pub const STABILITY_MAX_SEGMENTS: usize = 10;

/// Minimum altitude delta of a usable stability segment (km)
pub const STABILITY_MIN_SEGMENT_KM: f64 = 0.05;
