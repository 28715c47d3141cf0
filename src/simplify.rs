//! Greedy streaming simplification for GPS traces.
//!
//! A lightweight alternative to Douglas-Peucker tailored to dense, noisy
//! vehicle traces. The simplifier walks the ordered path once, tracking the
//! last retained point and the bearing at which it was reached. A candidate
//! is retained when it is far enough from the last retained point, or when
//! the heading towards it turns sharply away from the last retained bearing:
//!
//! ```text
//! keep(candidate) = distance(last_kept, candidate) > min_distance
//!                || deviation(bearing(last_kept, candidate), last_bearing) >= min_deviation
//! ```
//!
//! Near-stationary jitter and near-straight runs collapse, while turns and
//! real movement survive. Output complexity is bounded by distance travelled
//! rather than by sample rate.
//!
//! The first point is always retained. When [`ReplayConfig::keep_last_point`]
//! is set (the default), the last point of the input is appended if the
//! threshold loop discarded it, so a replay always ends where the trip ended.

use log::debug;

use crate::geo_utils::{bearing_deviation, haversine_distance, initial_bearing};
use crate::{ReplayConfig, Sample};

/// Simplify a chronologically ordered path.
///
/// Consumes the ordered path and returns the retained samples, moved rather
/// than cloned. The result is a subsequence of the input that always starts
/// with the input's first sample and, with `keep_last_point`, ends with its
/// last sample.
///
/// # Example
///
/// ```rust
/// use trip_replay::{ReplayConfig, Sample, simplify_path};
///
/// // Three points 2 m apart heading north: the middle one is jitter.
/// let meter = 1.0 / 111_195.0;
/// let path = vec![
///     Sample::new(0.0, 0.0),
///     Sample::new(2.0 * meter, 0.0),
///     Sample::new(4.0 * meter, 0.0),
/// ];
///
/// let simplified = simplify_path(path, &ReplayConfig::default());
/// assert_eq!(simplified.len(), 2);
/// ```
pub fn simplify_path(path: Vec<Sample>, config: &ReplayConfig) -> Vec<Sample> {
    let input_len = path.len();
    if input_len <= 2 {
        return path;
    }

    let mut iter = path.into_iter();
    let Some(first) = iter.next() else {
        return Vec::new();
    };

    let mut kept = vec![first];
    let mut last_bearing: Option<f64> = None;
    let mut last_discarded: Option<Sample> = None;

    for candidate in iter {
        // kept is never empty: it starts with the first sample
        let last_kept = kept[kept.len() - 1].position();
        let position = candidate.position();

        let distance = haversine_distance(&last_kept, &position);
        let bearing = initial_bearing(&last_kept, &position);
        let deviation = last_bearing.map_or(0.0, |last| bearing_deviation(bearing, last));

        if distance > config.min_distance_meters || deviation >= config.min_deviation_degrees {
            kept.push(candidate);
            last_bearing = Some(bearing);
            last_discarded = None;
        } else {
            last_discarded = Some(candidate);
        }
    }

    if config.keep_last_point {
        if let Some(last) = last_discarded {
            kept.push(last);
        }
    }

    debug!(
        "[simplify] kept {} of {} points (min_distance={}m, min_deviation={}deg)",
        kept.len(),
        input_len,
        config.min_distance_meters,
        config.min_deviation_degrees
    );

    kept
}
