//! Replay assembly: the render model handed to a map surface.
//!
//! A [`ReplayModel`] owns the simplified path for one render. Segments are
//! stored as index spans and handed out as borrowed slices, so the samples
//! are never duplicated between the path and its colored segments.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use log::debug;
use serde::Serialize;

use crate::geo_utils::{compute_bounds, compute_center, polyline_length};
use crate::records::{TripDetail, TripEvent, TripSummary};
use crate::segment::{segment_spans, RiskClass, Segment, SegmentSpan};
use crate::{build_replay, Bounds, LatLon, ReplayConfig, Sample, Timestamp};

/// Drawable replay of one trip: colored segments plus start/end markers.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReplayModel {
    path: Vec<Sample>,
    spans: Vec<SegmentSpan>,
    bounds: Option<Bounds>,
    center: Option<LatLon>,
    total_distance: f64,
}

impl ReplayModel {
    /// Assemble a model from a simplified path and its segment spans.
    ///
    /// Spans are passed through unchanged. Start and end markers are derived
    /// from the path, so an empty path yields a model with no markers.
    pub fn assemble(path: Vec<Sample>, spans: Vec<SegmentSpan>) -> Self {
        debug_assert!(spans.iter().all(|s| s.start <= s.end && s.end < path.len()));

        let bounds = compute_bounds(&path);
        let center = compute_center(&path);
        let total_distance = polyline_length(&path);

        Self {
            path,
            spans,
            bounds,
            center,
            total_distance,
        }
    }

    /// Segment a simplified path by risk and assemble the result.
    pub fn from_simplified(path: Vec<Sample>, config: &ReplayConfig) -> Self {
        let spans = segment_spans(&path, config);
        Self::assemble(path, spans)
    }

    /// The simplified path, in chronological order.
    pub fn path(&self) -> &[Sample] {
        &self.path
    }

    pub fn spans(&self) -> &[SegmentSpan] {
        &self.spans
    }

    /// Risk segments borrowing from the simplified path.
    pub fn segments(&self) -> impl Iterator<Item = Segment<'_>> + '_ {
        self.spans.iter().map(move |span| Segment {
            points: &self.path[span.range()],
            class: span.class,
        })
    }

    pub fn segment_count(&self) -> usize {
        self.spans.len()
    }

    /// Start marker: first point of the simplified path.
    pub fn start(&self) -> Option<&Sample> {
        self.path.first()
    }

    /// End marker: last point of the simplified path.
    pub fn end(&self) -> Option<&Sample> {
        self.path.last()
    }

    /// True when there is nothing to draw; render as "no data".
    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
    }

    pub fn bounds(&self) -> Option<Bounds> {
        self.bounds
    }

    /// Centroid of the simplified path.
    ///
    /// Keeps the whole trip in view when the map opens. Surfaces that open
    /// on the trip's first point instead use [`ReplayModel::start_center`].
    pub fn center(&self) -> Option<LatLon> {
        self.center
    }

    /// Map center anchored on the start marker.
    pub fn start_center(&self) -> Option<LatLon> {
        self.start().map(Sample::position)
    }

    /// Length of the simplified path in meters.
    pub fn total_distance(&self) -> f64 {
        self.total_distance
    }

    /// Release the simplified path once rendering is done.
    pub fn into_path(self) -> Vec<Sample> {
        self.path
    }

    /// Flatten the model into the shape a map surface consumes.
    pub fn render_view(&self) -> RenderView<'_> {
        RenderView {
            segments: self
                .segments()
                .map(|seg| RenderSegment {
                    class: seg.class,
                    color: seg.color(),
                    positions: seg.points.iter().map(|s| [s.lat, s.lon]).collect(),
                })
                .collect(),
            start: self.start().map(|s| Marker::new("Start", s)),
            end: self.end().map(|s| Marker::new("End", s)),
            center: self.center,
            bounds: self.bounds,
            total_distance_meters: self.total_distance,
        }
    }
}

/// Serializable view of a [`ReplayModel`]: one styled line per segment and two markers.
#[derive(Debug, Clone, Serialize)]
pub struct RenderView<'a> {
    pub segments: Vec<RenderSegment>,
    pub start: Option<Marker<'a>>,
    pub end: Option<Marker<'a>>,
    pub center: Option<LatLon>,
    pub bounds: Option<Bounds>,
    pub total_distance_meters: f64,
}

/// One polyline with its stroke color. Positions are `[lat, lon]` pairs.
#[derive(Debug, Clone, Serialize)]
pub struct RenderSegment {
    pub class: RiskClass,
    pub color: &'static str,
    pub positions: Vec<[f64; 2]>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Marker<'a> {
    pub label: &'static str,
    pub position: [f64; 2],
    pub timestamp: Option<&'a Timestamp>,
}

impl<'a> Marker<'a> {
    fn new(label: &'static str, sample: &'a Sample) -> Self {
        Self {
            label,
            position: [sample.lat, sample.lon],
            timestamp: sample.timestamp.as_ref(),
        }
    }
}

/// A trip ready for the detail view: summary, events and the replayed path.
#[derive(Debug, Clone, PartialEq)]
pub struct TripReplay {
    pub trip: TripSummary,
    pub events: Vec<TripEvent>,
    pub replay: ReplayModel,
}

impl TripReplay {
    /// Replay the raw path of a decoded trip. The raw path is consumed.
    pub fn from_detail(detail: TripDetail, config: &ReplayConfig) -> Self {
        let TripDetail { trip, path, events } = detail;
        let replay = build_replay(path, config);
        debug!(
            "[TripReplay] trip {}: {} points, {} segments",
            trip.id,
            replay.path().len(),
            replay.segment_count()
        );
        Self { trip, events, replay }
    }
}

// ============================================================================
// Memoization
// ============================================================================

/// Recomputes a replay only when the raw path content changes.
///
/// Re-rendering with an identical raw path returns the cached model. A hash
/// of every sample field rejects changed input quickly; a hit is confirmed by
/// comparing the stored input bit for bit, so a hash collision rebuilds.
#[derive(Debug, Default)]
pub struct ReplayCache {
    config: ReplayConfig,
    key: Option<u64>,
    input: Vec<Sample>,
    model: Option<ReplayModel>,
    hits: u64,
    misses: u64,
}

impl ReplayCache {
    pub fn new(config: ReplayConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &ReplayConfig {
        &self.config
    }

    /// Replace the configuration, dropping any cached model.
    pub fn set_config(&mut self, config: ReplayConfig) {
        self.config = config;
        self.invalidate();
    }

    pub fn invalidate(&mut self) {
        self.key = None;
        self.input.clear();
        self.model = None;
    }

    /// Return the replay for `raw`, rebuilding it if the content changed.
    pub fn get_or_build(&mut self, raw: &[Sample]) -> &ReplayModel {
        let key = content_key(raw);

        let model = match self.model.take() {
            Some(model) if self.key == Some(key) && same_content(&self.input, raw) => {
                self.hits += 1;
                model
            }
            _ => {
                self.misses += 1;
                debug!("[ReplayCache] rebuilding replay for {} raw samples", raw.len());
                self.input = raw.to_vec();
                build_replay(raw.to_vec(), &self.config)
            }
        };

        self.key = Some(key);
        self.model.insert(model)
    }

    /// (hits, misses) since creation.
    pub fn stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }
}

/// Bitwise sample equality: NaN matches NaN and 0.0 differs from -0.0.
fn same_content(a: &[Sample], b: &[Sample]) -> bool {
    a.len() == b.len()
        && a.iter().zip(b).all(|(x, y)| {
            x.lat.to_bits() == y.lat.to_bits()
                && x.lon.to_bits() == y.lon.to_bits()
                && x.risk.map(f64::to_bits) == y.risk.map(f64::to_bits)
                && x.timestamp == y.timestamp
        })
}

fn content_key(raw: &[Sample]) -> u64 {
    let mut hasher = DefaultHasher::new();
    raw.len().hash(&mut hasher);
    for s in raw {
        s.lat.to_bits().hash(&mut hasher);
        s.lon.to_bits().hash(&mut hasher);
        s.risk.map(f64::to_bits).hash(&mut hasher);
        s.timestamp.hash(&mut hasher);
    }
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trip() -> Vec<Sample> {
        vec![
            Sample::new(37.7749, -122.4194).with_risk(10.0).with_timestamp(Timestamp::Millis(1)),
            Sample::new(37.7759, -122.4194).with_risk(20.0).with_timestamp(Timestamp::Millis(2)),
            Sample::new(37.7769, -122.4194).with_risk(70.0).with_timestamp(Timestamp::Millis(3)),
            Sample::new(37.7779, -122.4194).with_risk(75.0).with_timestamp(Timestamp::Millis(4)),
        ]
    }

    #[test]
    fn test_empty_model() {
        let model = ReplayModel::assemble(Vec::new(), Vec::new());
        assert!(model.is_empty());
        assert!(model.start().is_none());
        assert!(model.end().is_none());
        assert_eq!(model.segments().count(), 0);
        assert!(model.bounds().is_none());
        assert!(model.center().is_none());
        assert_eq!(model.total_distance(), 0.0);
    }

    #[test]
    fn test_single_point_has_markers_but_no_segments() {
        let config = ReplayConfig::default();
        let model = ReplayModel::from_simplified(vec![Sample::new(1.0, 2.0)], &config);
        assert_eq!(model.start(), model.end());
        assert!(model.start().is_some());
        assert_eq!(model.segment_count(), 0);
    }

    #[test]
    fn test_markers_and_segments() {
        let config = ReplayConfig::default();
        let path = trip();
        let model = ReplayModel::from_simplified(path.clone(), &config);

        assert_eq!(model.start(), path.first());
        assert_eq!(model.end(), path.last());

        let classes: Vec<RiskClass> = model.segments().map(|s| s.class).collect();
        assert_eq!(classes, vec![RiskClass::Safe, RiskClass::High]);
        assert!(model.total_distance() > 300.0);
    }

    #[test]
    fn test_render_view_serializes() {
        let config = ReplayConfig::default();
        let model = ReplayModel::from_simplified(trip(), &config);
        let json = serde_json::to_value(model.render_view()).unwrap();

        assert_eq!(json["segments"][0]["class"], "safe");
        assert_eq!(json["segments"][0]["color"], "#2e7d32");
        assert_eq!(json["segments"][1]["color"], "#c62828");
        assert_eq!(json["start"]["label"], "Start");
        assert_eq!(json["end"]["label"], "End");
        assert_eq!(json["end"]["timestamp"], 4);
        assert_eq!(json["segments"][0]["positions"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_trip_replay_from_detail() {
        let payload = serde_json::json!({
            "trip_id": "T-9",
            "path": [
                {"lat": 37.7769, "lon": -122.4194, "timestamp": 3},
                {"lat": 37.7749, "lon": -122.4194, "timestamp": 1},
                {"lat": "garbage", "lon": -122.4194, "timestamp": 2}
            ],
            "events": [{"ts": 2, "type": "YAWN"}]
        });
        let detail = crate::records::decode_trip_detail(&payload).value;
        let trip = TripReplay::from_detail(detail, &ReplayConfig::default());

        assert_eq!(trip.trip.id, "T-9");
        assert_eq!(trip.events.len(), 1);
        assert_eq!(trip.replay.path().len(), 2);
        assert_eq!(trip.replay.start().map(|s| s.lat), Some(37.7749));
        assert_eq!(trip.replay.segments().next().map(|s| s.class), Some(RiskClass::Neutral));
    }

    #[test]
    fn test_cache_hits_on_identical_input() {
        let mut cache = ReplayCache::new(ReplayConfig::default());
        let raw = trip();

        let first = cache.get_or_build(&raw).clone();
        let second = cache.get_or_build(&raw).clone();
        assert_eq!(first, second);
        assert_eq!(cache.stats(), (1, 1));
    }

    #[test]
    fn test_cache_rebuilds_on_change() {
        let mut cache = ReplayCache::new(ReplayConfig::default());
        let mut raw = trip();
        cache.get_or_build(&raw);

        raw[1].risk = Some(95.0);
        let model = cache.get_or_build(&raw);
        assert_eq!(model.path()[1].risk, Some(95.0));
        assert_eq!(cache.stats(), (0, 2));
    }

    #[test]
    fn test_cache_invalidated_by_config() {
        let mut cache = ReplayCache::default();
        let raw = trip();
        cache.get_or_build(&raw);
        cache.set_config(ReplayConfig {
            high_risk_threshold: 90.0,
            ..ReplayConfig::default()
        });
        let model = cache.get_or_build(&raw);
        let classes: Vec<RiskClass> = model.segments().map(|s| s.class).collect();
        assert_eq!(classes, vec![RiskClass::Safe, RiskClass::Moderate]);
        assert_eq!(cache.stats(), (0, 2));
    }

    #[test]
    fn test_cache_rebuilds_on_key_collision() {
        let mut cache = ReplayCache::default();
        let first = trip();
        cache.get_or_build(&first);

        // Another input whose key matches the stored one must not reuse the model
        let mut other = trip();
        other[0].lat = 37.7739;
        cache.key = Some(content_key(&other));

        let model = cache.get_or_build(&other);
        assert_eq!(model.start().map(|s| s.lat), Some(37.7739));
        assert_eq!(cache.stats(), (0, 2));
    }

    #[test]
    fn test_cache_hits_on_nan_input() {
        let mut cache = ReplayCache::default();
        let mut raw = trip();
        raw.push(Sample::new(f64::NAN, 0.0));

        cache.get_or_build(&raw);
        cache.get_or_build(&raw);
        assert_eq!(cache.stats(), (1, 1));
    }

    #[test]
    fn test_start_center_follows_start_marker() {
        let model = ReplayModel::from_simplified(trip(), &ReplayConfig::default());
        assert_eq!(model.start_center(), Some(LatLon::new(37.7749, -122.4194)));
        assert_ne!(model.start_center(), model.center());
        assert_eq!(ReplayModel::default().start_center(), None);
    }
}
