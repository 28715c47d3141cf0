//! Path normalization: validity filtering and chronological ordering.
//!
//! Raw trip paths arrive in storage order, which is not guaranteed to be
//! chronological, and may contain garbled coordinates. Normalization drops
//! every sample that cannot be placed on a map and stably sorts the rest by
//! timestamp. Samples without a usable timestamp order as epoch 0; their
//! original timestamp value is left untouched.

use log::debug;

use crate::Sample;

/// Normalize a raw path into chronological order.
///
/// - Samples with non-finite or out-of-range coordinates are dropped.
/// - A non-finite risk value is cleared, so the sample counts as carrying
///   no risk data.
/// - The sort is stable: samples with equal timestamps keep their input order.
///
/// # Example
///
/// ```rust
/// use trip_replay::{Sample, Timestamp, normalize_path};
///
/// let raw = vec![
///     Sample::new(37.0002, -122.0).with_timestamp(Timestamp::Millis(2_000)),
///     Sample::new(f64::NAN, -122.0).with_timestamp(Timestamp::Millis(1_500)),
///     Sample::new(37.0001, -122.0).with_timestamp(Timestamp::Millis(1_000)),
/// ];
///
/// let ordered = normalize_path(raw);
/// assert_eq!(ordered.len(), 2);
/// assert_eq!(ordered[0].lat, 37.0001);
/// ```
pub fn normalize_path(raw: Vec<Sample>) -> Vec<Sample> {
    let input_len = raw.len();

    let mut keyed: Vec<(i64, Sample)> = raw
        .into_iter()
        .filter(|s| s.has_valid_position())
        .map(|mut s| {
            if s.risk.is_some_and(|r| !r.is_finite()) {
                s.risk = None;
            }
            (s.order_key(), s)
        })
        .collect();

    // sort_by_key is stable
    keyed.sort_by_key(|(key, _)| *key);

    let ordered: Vec<Sample> = keyed.into_iter().map(|(_, s)| s).collect();

    if ordered.len() < input_len {
        debug!(
            "[normalize] dropped {} of {} samples with invalid coordinates",
            input_len - ordered.len(),
            input_len
        );
    }

    ordered
}

/// Check the ordered-path invariant: every adjacent pair is non-decreasing in time.
pub fn is_chronological(path: &[Sample]) -> bool {
    path.windows(2)
        .all(|w| w[0].order_key() <= w[1].order_key())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Timestamp;

    fn at(lat: f64, millis: i64) -> Sample {
        Sample::new(lat, 0.0).with_timestamp(Timestamp::Millis(millis))
    }

    #[test]
    fn test_empty_input() {
        assert!(normalize_path(Vec::new()).is_empty());
    }

    #[test]
    fn test_sorts_by_timestamp() {
        let ordered = normalize_path(vec![at(3.0, 300), at(1.0, 100), at(2.0, 200)]);
        let lats: Vec<f64> = ordered.iter().map(|s| s.lat).collect();
        assert_eq!(lats, vec![1.0, 2.0, 3.0]);
        assert!(is_chronological(&ordered));
    }

    #[test]
    fn test_drops_invalid_coordinates() {
        let raw = vec![
            at(1.0, 1),
            Sample::new(f64::NAN, 0.0),
            Sample::new(0.0, f64::INFINITY),
            Sample::new(91.0, 0.0),
            Sample::new(0.0, -180.5),
            at(2.0, 2),
        ];
        let ordered = normalize_path(raw);
        assert_eq!(ordered.len(), 2);
    }

    #[test]
    fn test_missing_timestamp_orders_first_and_is_preserved() {
        let untimed = Sample::new(9.0, 0.0);
        let garbled = Sample::new(8.0, 0.0).with_timestamp(Timestamp::Text("not a date".into()));
        let ordered = normalize_path(vec![at(1.0, 1_000), untimed, garbled]);

        assert_eq!(ordered[0].lat, 9.0);
        assert!(ordered[0].timestamp.is_none());
        assert_eq!(ordered[1].lat, 8.0);
        assert_eq!(
            ordered[1].timestamp,
            Some(Timestamp::Text("not a date".into()))
        );
        assert_eq!(ordered[2].lat, 1.0);
    }

    #[test]
    fn test_ties_keep_input_order() {
        let ordered = normalize_path(vec![at(1.0, 5), at(2.0, 5), at(3.0, 5)]);
        let lats: Vec<f64> = ordered.iter().map(|s| s.lat).collect();
        assert_eq!(lats, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_mixed_timestamp_representations() {
        let iso = Sample::new(2.0, 0.0)
            .with_timestamp(Timestamp::Text("2024-03-01T10:00:05Z".into()));
        let millis = Sample::new(1.0, 0.0)
            .with_timestamp(Timestamp::Millis(1_709_287_200_000)); // 2024-03-01T10:00:00Z
        let ordered = normalize_path(vec![iso, millis]);
        assert_eq!(ordered[0].lat, 1.0);
        assert_eq!(ordered[1].lat, 2.0);
    }

    #[test]
    fn test_non_finite_risk_is_cleared() {
        let ordered = normalize_path(vec![at(1.0, 1).with_risk(f64::NAN), at(2.0, 2).with_risk(40.0)]);
        assert_eq!(ordered[0].risk, None);
        assert_eq!(ordered[1].risk, Some(40.0));
    }
}
