//! # Trip Replay
//!
//! GPS trip path replay for fleet and driver monitoring dashboards.
//!
//! This library provides:
//! - Path normalization (validity filtering, chronological ordering)
//! - Distance-and-bearing streaming simplification of noisy GPS traces
//! - Risk segmentation into colored, contiguous polyline runs
//! - A render model with start/end markers for map surfaces
//! - Canonical trip records mapped from legacy API field names
//! - A deterministic live-telemetry random walk
//!
//! ## Features
//!
//! - **`parallel`** - Enable parallel batch replay with rayon
//! - **`http`** - Enable the async trip API client
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use trip_replay::{build_replay, ReplayConfig, RiskClass, Sample, Timestamp};
//!
//! let raw = vec![
//!     Sample::new(37.7769, -122.4194).with_risk(72.0).with_timestamp(Timestamp::Millis(3_000)),
//!     Sample::new(37.7749, -122.4194).with_risk(12.0).with_timestamp(Timestamp::Millis(1_000)),
//!     Sample::new(37.7759, -122.4194).with_risk(18.0).with_timestamp(Timestamp::Millis(2_000)),
//! ];
//!
//! let replay = build_replay(raw, &ReplayConfig::default());
//!
//! assert_eq!(replay.start().map(|s| s.lat), Some(37.7749));
//! for segment in replay.segments() {
//!     println!("{} points in {} ({})", segment.points.len(), segment.class, segment.color());
//! }
//! assert_eq!(replay.segments().last().map(|s| s.class), Some(RiskClass::High));
//! ```

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use log::info;
use serde::de::{self, Deserializer, Unexpected, Visitor};
use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{ReplayError, Result};

// Geographic utilities (distance, bearing, bounds, center)
pub mod geo_utils;

// Replay pipeline stages
pub mod normalize;
pub use normalize::normalize_path;

pub mod simplify;
pub use simplify::simplify_path;

pub mod segment;
pub use segment::{segment_by_risk, segment_spans, RiskClass, Segment, SegmentSpan};

pub mod replay;
pub use replay::{RenderView, ReplayCache, ReplayModel, TripReplay};

// Canonical trip records and legacy field mapping
pub mod records;
pub use records::{Decoded, Diagnostic, TripDetail, TripEvent, TripSummary};

// Live telemetry simulator
pub mod telemetry;
pub use telemetry::{LiveSample, TelemetrySimulator, TelemetryState};

// HTTP module for the trip API
#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "http")]
pub use http::{TripApiClient, TripApiConfig};

// ============================================================================
// Core Types
// ============================================================================

/// A latitude/longitude pair in WGS84 degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl LatLon {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Check that both coordinates are finite and within geographic range.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }
}

/// Bounding box of a path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

/// When a sample was recorded.
///
/// Devices report epoch milliseconds; the backend and older records carry
/// date strings. Both are kept verbatim and only interpreted for ordering.
///
/// Deserializes from an integer, a finite float (truncated to whole
/// milliseconds) or a string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum Timestamp {
    /// Milliseconds since the Unix epoch
    Millis(i64),
    /// A textual date, parsed on demand
    Text(String),
}

impl Timestamp {
    /// Interpret the timestamp as epoch milliseconds.
    ///
    /// Text is accepted as RFC 3339, RFC 2822, `YYYY-MM-DD[T ]HH:MM:SS[.fff]`
    /// (UTC), `YYYY-MM-DD` (midnight UTC) or a decimal integer of epoch
    /// milliseconds. Returns `None` when the text matches none of these.
    ///
    /// ```rust
    /// use trip_replay::Timestamp;
    ///
    /// let ts = Timestamp::Text("1970-01-01T00:00:01Z".into());
    /// assert_eq!(ts.epoch_millis(), Some(1_000));
    /// assert_eq!(Timestamp::Text("soon".into()).epoch_millis(), None);
    /// ```
    pub fn epoch_millis(&self) -> Option<i64> {
        match self {
            Timestamp::Millis(ms) => Some(*ms),
            Timestamp::Text(text) => parse_timestamp_text(text),
        }
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_any(TimestampVisitor)
    }
}

struct TimestampVisitor;

impl<'de> Visitor<'de> for TimestampVisitor {
    type Value = Timestamp;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("epoch milliseconds or a date string")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Timestamp, E> {
        Ok(Timestamp::Millis(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Timestamp, E> {
        i64::try_from(v)
            .map(Timestamp::Millis)
            .map_err(|_| E::invalid_value(Unexpected::Unsigned(v), &self))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<Timestamp, E> {
        if v.is_finite() {
            Ok(Timestamp::Millis(v as i64))
        } else {
            Err(E::invalid_value(Unexpected::Float(v), &self))
        }
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Timestamp, E> {
        Ok(Timestamp::Text(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> std::result::Result<Timestamp, E> {
        Ok(Timestamp::Text(v))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Timestamp::Millis(ms) => write!(f, "{}", ms),
            Timestamp::Text(text) => f.write_str(text),
        }
    }
}

const NAIVE_DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

fn parse_timestamp_text(text: &str) -> Option<i64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(ms) = text.parse::<i64>() {
        return Some(ms);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.timestamp_millis());
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Some(dt.timestamp_millis());
    }

    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Some(dt.and_utc().timestamp_millis());
        }
    }

    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp_millis())
}

/// One timestamped GPS sample of a trip, optionally annotated with a risk score.
///
/// # Example
/// ```
/// use trip_replay::{Sample, Timestamp};
///
/// let sample = Sample::new(37.7749, -122.4194)
///     .with_timestamp(Timestamp::Millis(1_700_000_000_000))
///     .with_risk(42.0);
/// assert!(sample.has_valid_position());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub lat: f64,
    pub lon: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Timestamp>,
    /// Drowsiness/behavior risk score in `[0, 100]`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk: Option<f64>,
}

impl Sample {
    /// Create a sample with no timestamp and no risk data.
    pub fn new(lat: f64, lon: f64) -> Self {
        Self {
            lat,
            lon,
            timestamp: None,
            risk: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_risk(mut self, risk: f64) -> Self {
        self.risk = Some(risk);
        self
    }

    pub fn position(&self) -> LatLon {
        LatLon::new(self.lat, self.lon)
    }

    /// Check if the sample can be placed on a map.
    pub fn has_valid_position(&self) -> bool {
        self.position().is_valid()
    }

    /// Chronological sort key: epoch milliseconds, or 0 when the timestamp
    /// is missing or unparsable.
    pub fn order_key(&self) -> i64 {
        self.timestamp
            .as_ref()
            .and_then(Timestamp::epoch_millis)
            .unwrap_or(0)
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Default simplifier distance threshold in meters.
pub const DEFAULT_MIN_DISTANCE_METERS: f64 = 5.0;
/// Default simplifier bearing deviation threshold in degrees.
pub const DEFAULT_MIN_DEVIATION_DEGREES: f64 = 45.0;
/// Risk scores at or above this are high risk.
pub const DEFAULT_HIGH_RISK_THRESHOLD: f64 = 60.0;
/// Risk scores at or above this (and below high) are moderate risk.
pub const DEFAULT_MODERATE_RISK_THRESHOLD: f64 = 30.0;

/// Configuration for the replay pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    /// A candidate farther than this from the last kept point is kept.
    /// Default: 5.0 meters
    pub min_distance_meters: f64,

    /// A candidate whose heading deviates at least this much from the last
    /// kept heading is kept.
    /// Default: 45.0 degrees
    pub min_deviation_degrees: f64,

    /// Risk threshold for the high class.
    /// Default: 60.0
    pub high_risk_threshold: f64,

    /// Risk threshold for the moderate class.
    /// Default: 30.0
    pub moderate_risk_threshold: f64,

    /// Always retain the final sample of the ordered path.
    /// Default: true
    pub keep_last_point: bool,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            min_distance_meters: DEFAULT_MIN_DISTANCE_METERS,
            min_deviation_degrees: DEFAULT_MIN_DEVIATION_DEGREES,
            high_risk_threshold: DEFAULT_HIGH_RISK_THRESHOLD,
            moderate_risk_threshold: DEFAULT_MODERATE_RISK_THRESHOLD,
            keep_last_point: true,
        }
    }
}

impl ReplayConfig {
    /// Parse a JSON configuration. Missing fields take their defaults.
    ///
    /// ```rust
    /// use trip_replay::ReplayConfig;
    ///
    /// let config = ReplayConfig::from_json_str(r#"{"min_distance_meters": 10.0}"#).unwrap();
    /// assert_eq!(config.min_distance_meters, 10.0);
    /// assert_eq!(config.min_deviation_degrees, 45.0);
    /// ```
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: ReplayConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that all thresholds are usable.
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("min_distance_meters", self.min_distance_meters),
            ("min_deviation_degrees", self.min_deviation_degrees),
            ("high_risk_threshold", self.high_risk_threshold),
            ("moderate_risk_threshold", self.moderate_risk_threshold),
        ];

        for (field, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(ReplayError::invalid_config(
                    field,
                    format!("must be finite and non-negative, got {}", value),
                ));
            }
        }

        if self.min_deviation_degrees > 180.0 {
            return Err(ReplayError::invalid_config(
                "min_deviation_degrees",
                "deviation never exceeds 180 degrees",
            ));
        }

        if self.moderate_risk_threshold > self.high_risk_threshold {
            return Err(ReplayError::invalid_config(
                "moderate_risk_threshold",
                "must not exceed high_risk_threshold",
            ));
        }

        Ok(())
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// Run the full replay pipeline on a raw path.
///
/// Normalizes, simplifies, segments by risk and assembles the render model.
/// Never fails: an empty or entirely invalid path yields an empty model.
pub fn build_replay(raw: Vec<Sample>, config: &ReplayConfig) -> ReplayModel {
    let ordered = normalize_path(raw);
    let simplified = simplify_path(ordered, config);
    ReplayModel::from_simplified(simplified, config)
}

/// Replay many trips sequentially.
pub fn build_replays(
    trips: Vec<(String, Vec<Sample>)>,
    config: &ReplayConfig,
) -> Vec<(String, ReplayModel)> {
    let start = std::time::Instant::now();
    let total = trips.len();

    let replays: Vec<(String, ReplayModel)> = trips
        .into_iter()
        .map(|(trip_id, raw)| (trip_id, build_replay(raw, config)))
        .collect();

    info!("[TripReplay] Built {} replays in {:?}", total, start.elapsed());
    replays
}

/// Replay many trips in parallel using rayon.
///
/// Each replay is independent, so the output matches [`build_replays`]
/// element for element and in the same order.
#[cfg(feature = "parallel")]
pub fn build_replays_parallel(
    trips: Vec<(String, Vec<Sample>)>,
    config: &ReplayConfig,
) -> Vec<(String, ReplayModel)> {
    use rayon::prelude::*;

    let start = std::time::Instant::now();
    let total = trips.len();

    let replays: Vec<(String, ReplayModel)> = trips
        .into_par_iter()
        .map(|(trip_id, raw)| (trip_id, build_replay(raw, config)))
        .collect();

    info!(
        "[TripReplay] Built {} replays in parallel in {:?}",
        total,
        start.elapsed()
    );
    replays
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_validation() {
        assert!(Sample::new(37.7749, -122.4194).has_valid_position());
        assert!(Sample::new(90.0, 180.0).has_valid_position());
        assert!(!Sample::new(f64::NAN, 0.0).has_valid_position());
        assert!(!Sample::new(0.0, f64::NEG_INFINITY).has_valid_position());
        assert!(!Sample::new(90.1, 0.0).has_valid_position());
        assert!(!Sample::new(0.0, 180.1).has_valid_position());
    }

    #[test]
    fn test_timestamp_formats() {
        let cases = [
            ("2024-03-01T10:00:00Z", 1_709_287_200_000),
            ("2024-03-01T12:00:00+02:00", 1_709_287_200_000),
            ("2024-03-01T10:00:00.250", 1_709_287_200_250),
            ("2024-03-01 10:00:00", 1_709_287_200_000),
            ("Fri, 01 Mar 2024 10:00:00 +0000", 1_709_287_200_000),
            ("2024-03-01", 1_709_251_200_000),
            ("1709287200000", 1_709_287_200_000),
        ];
        for (text, expected) in cases {
            assert_eq!(
                Timestamp::Text(text.to_string()).epoch_millis(),
                Some(expected),
                "parsing {}",
                text
            );
        }
        assert_eq!(Timestamp::Text("".into()).epoch_millis(), None);
        assert_eq!(Timestamp::Text("yesterday".into()).epoch_millis(), None);
    }

    #[test]
    fn test_order_key_defaults_to_epoch() {
        assert_eq!(Sample::new(0.0, 0.0).order_key(), 0);
        let garbled = Sample::new(0.0, 0.0).with_timestamp(Timestamp::Text("??".into()));
        assert_eq!(garbled.order_key(), 0);
    }

    #[test]
    fn test_timestamp_serde_untagged() {
        let millis: Timestamp = serde_json::from_str("1700000000000").unwrap();
        assert_eq!(millis, Timestamp::Millis(1_700_000_000_000));
        let text: Timestamp = serde_json::from_str("\"2024-03-01\"").unwrap();
        assert_eq!(text, Timestamp::Text("2024-03-01".into()));
    }

    #[test]
    fn test_sample_accepts_float_timestamp() {
        let sample: Sample =
            serde_json::from_str(r#"{"lat": 1.0, "lon": 2.0, "timestamp": 1709287200000.0}"#).unwrap();
        assert_eq!(sample.timestamp, Some(Timestamp::Millis(1_709_287_200_000)));

        let fractional: Timestamp = serde_json::from_str("1500.9").unwrap();
        assert_eq!(fractional, Timestamp::Millis(1_500));

        assert!(serde_json::from_str::<Timestamp>("true").is_err());
        assert!(serde_json::from_str::<Timestamp>("18446744073709551615").is_err());
    }

    #[test]
    fn test_config_defaults_and_validation() {
        let config = ReplayConfig::default();
        assert_eq!(config.min_distance_meters, 5.0);
        assert_eq!(config.min_deviation_degrees, 45.0);
        assert_eq!(config.high_risk_threshold, 60.0);
        assert_eq!(config.moderate_risk_threshold, 30.0);
        assert!(config.keep_last_point);
        assert!(config.validate().is_ok());

        let inverted = ReplayConfig {
            moderate_risk_threshold: 70.0,
            ..ReplayConfig::default()
        };
        assert!(matches!(
            inverted.validate(),
            Err(ReplayError::InvalidConfig { field: "moderate_risk_threshold", .. })
        ));

        assert!(ReplayConfig::from_json_str(r#"{"min_distance_meters": -1}"#).is_err());
        assert!(ReplayConfig::from_json_str("not json").is_err());
    }

    #[test]
    fn test_build_replay_empty() {
        let model = build_replay(Vec::new(), &ReplayConfig::default());
        assert!(model.is_empty());
        assert_eq!(model.segment_count(), 0);
        assert!(model.start().is_none());
    }

    #[test]
    fn test_build_replays_keeps_order() {
        let trips = vec![
            ("a".to_string(), vec![Sample::new(1.0, 1.0)]),
            ("b".to_string(), Vec::new()),
        ];
        let replays = build_replays(trips, &ReplayConfig::default());
        assert_eq!(replays[0].0, "a");
        assert!(!replays[0].1.is_empty());
        assert_eq!(replays[1].0, "b");
        assert!(replays[1].1.is_empty());
    }
}
