//! # Geographic Utilities
//!
//! Geographic computations used by the replay pipeline.
//!
//! ## Overview
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`haversine_distance`] | Great-circle distance between two positions |
//! | [`initial_bearing`] | Compass heading from one position to another |
//! | [`bearing_deviation`] | Circular difference between two headings |
//! | [`polyline_length`] | Total length of a sample path in meters |
//! | [`compute_bounds`] | Bounding box of a sample path |
//! | [`compute_center`] | Centroid of a sample path |
//!
//! ## Example
//!
//! ```rust
//! use trip_replay::{LatLon, geo_utils};
//!
//! let a = LatLon::new(37.7749, -122.4194);
//! let b = LatLon::new(37.7759, -122.4194);
//!
//! let dist = geo_utils::haversine_distance(&a, &b);
//! assert!((dist - 111.2).abs() < 1.0);
//!
//! let heading = geo_utils::initial_bearing(&a, &b);
//! assert!(heading.abs() < 1e-6); // due north
//! ```
//!
//! ## Algorithm Notes
//!
//! Distances use the haversine formula on a sphere of radius 6,371,000 m.
//! Bearings are initial great-circle bearings, normalized to `[0, 360)`.
//! All inputs are WGS84 degrees.

use geo::{Bearing, Haversine, Point};

use crate::{Bounds, LatLon, Sample};

/// Mean Earth radius used for all distance calculations, in meters.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

// =============================================================================
// Distance and Heading
// =============================================================================

/// Calculate the great-circle distance between two positions using the Haversine formula.
///
/// Returns meters along the surface of a sphere with radius [`EARTH_RADIUS_METERS`].
/// Written out rather than delegated to `geo::Haversine`, whose mean radius
/// is 6,371,008.8 m; simplification thresholds are calibrated to 6,371,000 m.
///
/// # Example
///
/// ```rust
/// use trip_replay::{LatLon, geo_utils};
///
/// let london = LatLon::new(51.5074, -0.1278);
/// let paris = LatLon::new(48.8566, 2.3522);
///
/// let distance = geo_utils::haversine_distance(&london, &paris);
/// assert!((distance - 343_560.0).abs() < 1000.0);
/// ```
#[inline]
pub fn haversine_distance(a: &LatLon, b: &LatLon) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let sin_dlat = ((b.lat - a.lat).to_radians() / 2.0).sin();
    let sin_dlon = ((b.lon - a.lon).to_radians() / 2.0).sin();

    let h = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlon * sin_dlon;
    2.0 * EARTH_RADIUS_METERS * h.sqrt().atan2((1.0 - h).sqrt())
}

/// Initial great-circle bearing from `from` to `to`, in degrees within `[0, 360)`.
///
/// North is 0°, east 90°, south 180°, west 270°. Identical positions yield 0°.
#[inline]
pub fn initial_bearing(from: &LatLon, to: &LatLon) -> f64 {
    let origin = Point::new(from.lon, from.lat);
    let destination = Point::new(to.lon, to.lat);
    let bearing = Haversine::bearing(origin, destination).rem_euclid(360.0);
    // rem_euclid can round a tiny negative value up to exactly 360.0
    if bearing >= 360.0 {
        0.0
    } else {
        bearing
    }
}

/// Circular distance between two bearings, in degrees within `[0, 180]`.
///
/// ```rust
/// use trip_replay::geo_utils::bearing_deviation;
///
/// assert_eq!(bearing_deviation(350.0, 10.0), 20.0);
/// assert_eq!(bearing_deviation(90.0, 270.0), 180.0);
/// ```
#[inline]
pub fn bearing_deviation(a: f64, b: f64) -> f64 {
    let diff = (a - b).abs();
    diff.min(360.0 - diff)
}

/// Total length of a sample path in meters.
///
/// Sums the haversine distance between consecutive samples. Empty or
/// single-sample paths return 0.0.
pub fn polyline_length(samples: &[Sample]) -> f64 {
    if samples.len() < 2 {
        return 0.0;
    }

    samples
        .windows(2)
        .map(|w| haversine_distance(&w[0].position(), &w[1].position()))
        .sum()
}

// =============================================================================
// Bounds and Center
// =============================================================================

/// Compute the bounding box of a sample path.
///
/// Returns `None` for an empty path.
pub fn compute_bounds(samples: &[Sample]) -> Option<Bounds> {
    if samples.is_empty() {
        return None;
    }

    let mut min_lat = f64::MAX;
    let mut max_lat = f64::MIN;
    let mut min_lon = f64::MAX;
    let mut max_lon = f64::MIN;

    for s in samples {
        min_lat = min_lat.min(s.lat);
        max_lat = max_lat.max(s.lat);
        min_lon = min_lon.min(s.lon);
        max_lon = max_lon.max(s.lon);
    }

    Some(Bounds { min_lat, max_lat, min_lon, max_lon })
}

/// Compute the arithmetic centroid of a sample path.
///
/// Suitable for the small areas a single trip covers. Paths crossing the
/// antimeridian will average to the wrong side of the globe.
/// Returns `None` for an empty path.
pub fn compute_center(samples: &[Sample]) -> Option<LatLon> {
    if samples.is_empty() {
        return None;
    }

    let n = samples.len() as f64;
    let sum_lat: f64 = samples.iter().map(|s| s.lat).sum();
    let sum_lon: f64 = samples.iter().map(|s| s.lon).sum();

    Some(LatLon::new(sum_lat / n, sum_lon / n))
}

// =============================================================================
// Unit Tests
// =============================================================================
