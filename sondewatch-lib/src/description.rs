//! Extraction of measurements embedded in the free-text description column.
//!
//! The description is written by the decoder firmware and looks like
//! `Clb=5.2m/s t=-12.3C h=45% p=512.4hPa batt=2.9V`. Each value has its own
//! extractor, so order and partial presence do not matter.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

macro_rules! extractor {
    ($name:ident, $pattern:literal) => {
        static $name: LazyLock<Regex> = LazyLock::new(|| Regex::new($pattern).expect("extractor pattern is valid"));
    };
}

extractor!(CLIMB, r"(?i)Clb\s*=\s*([-+]?\d+(?:\.\d+)?)\s*m/s");
extractor!(TEMPERATURE, r"(?i)t\s*=\s*([-+]?\d+(?:\.\d+)?)\s*C");
extractor!(HUMIDITY, r"(?i)h\s*=\s*([-+]?\d+(?:\.\d+)?)\s*%");
extractor!(PRESSURE, r"(?i)p\s*=\s*([-+]?\d+(?:\.\d+)?)\s*hPa");
extractor!(BATTERY, r"(?i)(?:batt|bat|vbatt)\s*=\s*([-+]?\d+(?:\.\d+)?)\s*V");

/// Optional values found in a description
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DescriptionFields {
    /// Vertical climb rate (m/s)
    pub climb_rate: Option<f64>,
    /// Temperature (°C)
    pub temperature: Option<f64>,
    /// Relative humidity (%)
    pub humidity: Option<f64>,
    /// Pressure (hPa)
    pub pressure: Option<f64>,
    /// Supply voltage (V)
    pub battery: Option<f64>,
}

impl DescriptionFields {
    /// Scan a description; an empty text yields all `None`.
    pub fn parse(text: &str) -> Self {
        if text.is_empty() {
            return Self::default();
        }
        Self {
            climb_rate: first_number(&CLIMB, text),
            temperature: first_number(&TEMPERATURE, text),
            humidity: first_number(&HUMIDITY, text),
            pressure: first_number(&PRESSURE, text),
            battery: first_number(&BATTERY, text),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

fn first_number(re: &Regex, text: &str) -> Option<f64> {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_description() {
        let d = DescriptionFields::parse("Clb=5.2m/s t=-12.3C h=45% p=512.4hPa batt=2.9V");
        assert_eq!(d.climb_rate, Some(5.2));
        assert_eq!(d.temperature, Some(-12.3));
        assert_eq!(d.humidity, Some(45.0));
        assert_eq!(d.pressure, Some(512.4));
        assert_eq!(d.battery, Some(2.9));
    }

    #[test]
    fn test_order_spacing_and_case() {
        let d = DescriptionFields::parse("P = 850 HPA  clb = -3 M/S VBATT=3.1 v");
        assert_eq!(d.pressure, Some(850.0));
        assert_eq!(d.climb_rate, Some(-3.0));
        assert_eq!(d.battery, Some(3.1));
        assert_eq!(d.temperature, None);
        assert_eq!(d.humidity, None);
    }

    #[test]
    fn test_first_match_wins() {
        let d = DescriptionFields::parse("h=10% h=20%");
        assert_eq!(d.humidity, Some(10.0));
    }

    #[test]
    fn test_empty_and_unrelated_text() {
        assert!(DescriptionFields::parse("").is_empty());
        assert!(DescriptionFields::parse("RS41 launched from Leba").is_empty());
    }
}
