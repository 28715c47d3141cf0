//! Canonical trip records and the legacy field mapping.
//!
//! The trip API has accumulated several spellings for the same fields
//! (`trip_id` vs `id`, `ts` vs `time` vs `timestamp`, ...). Every accepted
//! spelling is listed here, in priority order, and mapped onto one canonical
//! shape at the boundary. Records missing a field that has no default produce
//! a [`Diagnostic::MissingField`] instead of a guess. Diagnostics never abort
//! decoding.
//!
//! | Record | Canonical field | Accepted names |
//! |--------|-----------------|----------------|
//! | trip | `id` | `trip_id`, `id` |
//! | trip | `driver` | `driver_id`, `driver` |
//! | trip | `start` | `start_time`, `start` |
//! | trip | `end` | `end_time`, `end` |
//! | trip | `max_speed` | `max_speed`, `maxSpeed`, else max of `sensor_data[].speed` |
//! | trip | `distance_km` | `distance_km` |
//! | trip | `risk` | `risk_level`, `risk` |
//! | trip | `status` | `status` |
//! | path point | `lat` | `lat`, `latitude` |
//! | path point | `lon` | `lon`, `lng`, `longitude` |
//! | path point | `timestamp` | `timestamp`, `ts`, `time` |
//! | path point | `risk` | `risk`, `risk_score` |
//! | event | `timestamp` | `timestamp`, `ts`, `time` |
//! | event | `kind` | `type`, `event_type`, `label` |
//! | event | `description` | `description`, `desc`, `details` |
//! | event | `id` | `id`, else `{kind}-{index}` |

use std::fmt;

use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Result, Sample, Timestamp};

const TRIP_ID: &[&str] = &["trip_id", "id"];
const TRIP_DRIVER: &[&str] = &["driver_id", "driver"];
const TRIP_START: &[&str] = &["start_time", "start"];
const TRIP_END: &[&str] = &["end_time", "end"];
const TRIP_MAX_SPEED: &[&str] = &["max_speed", "maxSpeed"];
const TRIP_DISTANCE: &[&str] = &["distance_km"];
const TRIP_RISK: &[&str] = &["risk_level", "risk"];
const TRIP_STATUS: &[&str] = &["status"];

const POINT_LAT: &[&str] = &["lat", "latitude"];
const POINT_LON: &[&str] = &["lon", "lng", "longitude"];
const POINT_TIMESTAMP: &[&str] = &["timestamp", "ts", "time"];
const POINT_RISK: &[&str] = &["risk", "risk_score"];

const EVENT_TIMESTAMP: &[&str] = &["timestamp", "ts", "time"];
const EVENT_KIND: &[&str] = &["type", "event_type", "label"];
const EVENT_DESCRIPTION: &[&str] = &["description", "desc", "details"];
const EVENT_ID: &[&str] = &["id"];

const UNKNOWN: &str = "Unknown";
const DEFAULT_EVENT_KIND: &str = "Activity";

// ============================================================================
// Canonical Records
// ============================================================================

/// Summary row for one trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripSummary {
    pub id: String,
    pub driver: String,
    pub start: Option<Timestamp>,
    pub end: Option<Timestamp>,
    pub max_speed: f64,
    pub distance_km: f64,
    /// Risk label assigned by the backend, `Unknown` when absent
    pub risk: String,
    /// Trip status (`ACTIVE`, `COMPLETED`, ...), `Unknown` when absent
    pub status: String,
}

/// An alert or activity recorded during a trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripEvent {
    pub id: String,
    pub timestamp: Option<Timestamp>,
    pub kind: String,
    pub description: String,
}

/// Everything needed to render one trip: summary, raw path and events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripDetail {
    pub trip: TripSummary,
    /// Raw path in storage order; run it through the replay pipeline before drawing
    pub path: Vec<Sample>,
    pub events: Vec<TripEvent>,
}

/// Which kind of record a diagnostic refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Trip,
    PathPoint,
    Event,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RecordKind::Trip => "trip",
            RecordKind::PathPoint => "path point",
            RecordKind::Event => "event",
        })
    }
}

/// Non-fatal problem found while mapping a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Diagnostic {
    /// None of the accepted names for a field were present.
    MissingField {
        record: RecordKind,
        index: Option<usize>,
        field: &'static str,
    },
    /// The record was not a JSON object and was skipped.
    NotAnObject {
        record: RecordKind,
        index: Option<usize>,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::MissingField { record, index: Some(i), field } => {
                write!(f, "{} #{} is missing field `{}`", record, i, field)
            }
            Diagnostic::MissingField { record, index: None, field } => {
                write!(f, "{} is missing field `{}`", record, field)
            }
            Diagnostic::NotAnObject { record, index: Some(i) } => {
                write!(f, "{} #{} is not an object", record, i)
            }
            Diagnostic::NotAnObject { record, index: None } => {
                write!(f, "{} is not an object", record)
            }
        }
    }
}

/// A decoded value together with the diagnostics raised while mapping it.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded<T> {
    pub value: T,
    pub diagnostics: Vec<Diagnostic>,
}

impl<T> Decoded<T> {
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Log every diagnostic at warn level and return the value.
    pub fn log_and_take(self) -> T {
        for diagnostic in &self.diagnostics {
            warn!("[records] {}", diagnostic);
        }
        self.value
    }
}

// ============================================================================
// Field Lookup
// ============================================================================

/// First accepted name whose value is present and not blank.
fn lookup<'a>(obj: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    names
        .iter()
        .filter_map(|name| obj.get(*name))
        .find(|v| !is_blank(v))
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Numeric value; numeric strings are accepted, anything else is NaN.
pub(crate) fn as_number(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) => s.trim().parse().unwrap_or(f64::NAN),
        _ => f64::NAN,
    }
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Numbers are epoch milliseconds; strings are kept verbatim.
fn as_timestamp(value: &Value) -> Option<Timestamp> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
            .map(Timestamp::Millis),
        Value::String(s) => Some(Timestamp::Text(s.clone())),
        _ => None,
    }
}

struct Mapper<'a> {
    record: RecordKind,
    index: Option<usize>,
    diagnostics: &'a mut Vec<Diagnostic>,
}

impl Mapper<'_> {
    fn missing(&mut self, field: &'static str) {
        self.diagnostics.push(Diagnostic::MissingField {
            record: self.record,
            index: self.index,
            field,
        });
    }

    fn required_text(&mut self, obj: &Map<String, Value>, names: &[&str], field: &'static str) -> String {
        match lookup(obj, names).and_then(as_text) {
            Some(text) => text,
            None => {
                self.missing(field);
                String::new()
            }
        }
    }
}

// ============================================================================
// Record Mapping
// ============================================================================

/// Map one trip object onto [`TripSummary`].
///
/// `id` is the only required field; everything else has a documented default.
pub fn map_trip(obj: &Map<String, Value>, diagnostics: &mut Vec<Diagnostic>) -> TripSummary {
    let mut mapper = Mapper {
        record: RecordKind::Trip,
        index: None,
        diagnostics,
    };

    let id = mapper.required_text(obj, TRIP_ID, "id");

    let max_speed = lookup(obj, TRIP_MAX_SPEED)
        .map(as_number)
        .filter(|v| v.is_finite())
        .unwrap_or_else(|| max_sensor_speed(obj));

    TripSummary {
        id,
        driver: lookup(obj, TRIP_DRIVER).and_then(as_text).unwrap_or_default(),
        start: lookup(obj, TRIP_START).and_then(as_timestamp),
        end: lookup(obj, TRIP_END).and_then(as_timestamp),
        max_speed,
        distance_km: lookup(obj, TRIP_DISTANCE)
            .map(as_number)
            .filter(|v| v.is_finite())
            .unwrap_or(0.0),
        risk: lookup(obj, TRIP_RISK)
            .and_then(as_text)
            .unwrap_or_else(|| UNKNOWN.to_string()),
        status: lookup(obj, TRIP_STATUS)
            .and_then(as_text)
            .unwrap_or_else(|| UNKNOWN.to_string()),
    }
}

/// Highest finite `speed` among `sensor_data` records, 0 when there are none.
fn max_sensor_speed(obj: &Map<String, Value>) -> f64 {
    obj.get("sensor_data")
        .and_then(Value::as_array)
        .map(|records| {
            records
                .iter()
                .filter_map(|r| r.get("speed"))
                .map(as_number)
                .filter(|v| v.is_finite())
                .fold(0.0, f64::max)
        })
        .unwrap_or(0.0)
}

/// Map one raw path point onto a [`Sample`].
///
/// A point missing either coordinate is reported and skipped. A coordinate
/// that is present but unparsable becomes NaN and is dropped later by the
/// normalizer.
pub fn map_path_point(value: &Value, index: usize, diagnostics: &mut Vec<Diagnostic>) -> Option<Sample> {
    let Some(obj) = value.as_object() else {
        diagnostics.push(Diagnostic::NotAnObject {
            record: RecordKind::PathPoint,
            index: Some(index),
        });
        return None;
    };

    let mut mapper = Mapper {
        record: RecordKind::PathPoint,
        index: Some(index),
        diagnostics,
    };

    let lat = lookup(obj, POINT_LAT).map(as_number);
    let lon = lookup(obj, POINT_LON).map(as_number);
    if lat.is_none() {
        mapper.missing("lat");
    }
    if lon.is_none() {
        mapper.missing("lon");
    }

    let mut sample = Sample::new(lat?, lon?);
    sample.timestamp = lookup(obj, POINT_TIMESTAMP).and_then(as_timestamp);
    sample.risk = lookup(obj, POINT_RISK)
        .map(as_number)
        .filter(|r| r.is_finite());
    Some(sample)
}

/// Map one raw event onto a [`TripEvent`].
pub fn map_event(value: &Value, index: usize, diagnostics: &mut Vec<Diagnostic>) -> Option<TripEvent> {
    let Some(obj) = value.as_object() else {
        diagnostics.push(Diagnostic::NotAnObject {
            record: RecordKind::Event,
            index: Some(index),
        });
        return None;
    };

    let mut mapper = Mapper {
        record: RecordKind::Event,
        index: Some(index),
        diagnostics,
    };

    let timestamp = lookup(obj, EVENT_TIMESTAMP).and_then(as_timestamp);
    if timestamp.is_none() {
        mapper.missing("timestamp");
    }

    let kind = lookup(obj, EVENT_KIND)
        .and_then(as_text)
        .unwrap_or_else(|| DEFAULT_EVENT_KIND.to_string());

    Some(TripEvent {
        id: lookup(obj, EVENT_ID)
            .and_then(as_text)
            .unwrap_or_else(|| format!("{}-{}", kind, index)),
        timestamp,
        kind,
        description: lookup(obj, EVENT_DESCRIPTION)
            .and_then(as_text)
            .unwrap_or_default(),
    })
}

fn array_field<'a>(obj: &'a Map<String, Value>, name: &str) -> &'a [Value] {
    obj.get(name)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

// ============================================================================
// Payload Decoding
// ============================================================================

/// Decode a trip detail payload (`GET /trips/{id}`).
///
/// The trip summary fields live at the top level of the payload next to the
/// `path` and `events` arrays. Missing arrays decode as empty.
///
/// ```rust
/// use serde_json::json;
/// use trip_replay::records::decode_trip_detail;
///
/// let payload = json!({
///     "trip_id": "T-1",
///     "driver": "D-9",
///     "path": [
///         {"lat": 37.77, "lon": -122.41, "timestamp": 1_000},
///         {"latitude": "37.78", "lng": -122.42, "ts": "2024-03-01T10:00:00Z"}
///     ],
///     "events": [{"ts": "2024-03-01T10:00:01Z", "label": "Yawn"}]
/// });
///
/// let decoded = decode_trip_detail(&payload);
/// assert!(decoded.is_clean());
/// assert_eq!(decoded.value.trip.id, "T-1");
/// assert_eq!(decoded.value.path.len(), 2);
/// assert_eq!(decoded.value.events[0].id, "Yawn-0");
/// ```
pub fn decode_trip_detail(payload: &Value) -> Decoded<TripDetail> {
    let mut diagnostics = Vec::new();

    let empty = Map::new();
    let obj = match payload.as_object() {
        Some(obj) => obj,
        None => {
            diagnostics.push(Diagnostic::NotAnObject {
                record: RecordKind::Trip,
                index: None,
            });
            &empty
        }
    };

    let trip = map_trip(obj, &mut diagnostics);

    let path: Vec<Sample> = array_field(obj, "path")
        .iter()
        .enumerate()
        .filter_map(|(i, v)| map_path_point(v, i, &mut diagnostics))
        .collect();

    let events: Vec<TripEvent> = array_field(obj, "events")
        .iter()
        .enumerate()
        .filter_map(|(i, v)| map_event(v, i, &mut diagnostics))
        .collect();

    Decoded {
        value: TripDetail { trip, path, events },
        diagnostics,
    }
}

/// Decode a trip list payload (`GET /trips`): `{"trips": [...]}` or a bare array.
pub fn decode_trip_list(payload: &Value) -> Decoded<Vec<TripSummary>> {
    let mut diagnostics = Vec::new();

    let items: &[Value] = match payload {
        Value::Array(items) => items,
        Value::Object(obj) => array_field(obj, "trips"),
        _ => &[],
    };

    let trips: Vec<TripSummary> = items
        .iter()
        .enumerate()
        .filter_map(|(i, item)| match item.as_object() {
            Some(obj) => {
                let before = diagnostics.len();
                let trip = map_trip(obj, &mut diagnostics);
                for d in &mut diagnostics[before..] {
                    if let Diagnostic::MissingField { index, .. } = d {
                        *index = Some(i);
                    }
                }
                Some(trip)
            }
            None => {
                diagnostics.push(Diagnostic::NotAnObject {
                    record: RecordKind::Trip,
                    index: Some(i),
                });
                None
            }
        })
        .collect();

    Decoded {
        value: trips,
        diagnostics,
    }
}

/// Parse and decode a trip detail JSON document.
pub fn parse_trip_detail(json: &str) -> Result<Decoded<TripDetail>> {
    let payload: Value = serde_json::from_str(json)?;
    Ok(decode_trip_detail(&payload))
}

/// Parse and decode a trip list JSON document.
pub fn parse_trip_list(json: &str) -> Result<Decoded<Vec<TripSummary>>> {
    let payload: Value = serde_json::from_str(json)?;
    Ok(decode_trip_list(&payload))
}
