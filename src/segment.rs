//! Risk segmentation of a simplified path.
//!
//! Splits a path into contiguous runs that share a risk class so each run can
//! be drawn with its own color. Adjacent segments share their boundary point:
//! the segment that ends at a transition includes the first point of the new
//! class, which makes the rendered line continuous with the color change
//! exactly at the transition.
//!
//! Segments never copy samples. [`segment_spans`] returns index ranges into
//! the path and [`segment_by_risk`] turns them into borrowed slices.

use std::fmt;
use std::ops::RangeInclusive;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{ReplayConfig, Sample};

/// Discretized risk bucket used for segment coloring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskClass {
    Safe,
    Moderate,
    High,
    /// The path carries no risk data at all.
    Neutral,
}

impl RiskClass {
    /// Classify a single risk score.
    ///
    /// `score >= high` is high, `moderate <= score < high` is moderate and
    /// everything else is safe. A missing or non-finite score is safe; paths
    /// without any risk data are handled by the segmenter as [`RiskClass::Neutral`].
    ///
    /// ```rust
    /// use trip_replay::{ReplayConfig, RiskClass};
    ///
    /// let config = ReplayConfig::default();
    /// assert_eq!(RiskClass::classify(Some(60.0), &config), RiskClass::High);
    /// assert_eq!(RiskClass::classify(Some(59.999), &config), RiskClass::Moderate);
    /// assert_eq!(RiskClass::classify(None, &config), RiskClass::Safe);
    /// ```
    pub fn classify(score: Option<f64>, config: &ReplayConfig) -> Self {
        match score {
            Some(r) if r >= config.high_risk_threshold => RiskClass::High,
            Some(r) if r >= config.moderate_risk_threshold => RiskClass::Moderate,
            _ => RiskClass::Safe,
        }
    }

    /// Stroke color for the map surface.
    pub fn color(&self) -> &'static str {
        match self {
            RiskClass::High => "#c62828",
            RiskClass::Moderate => "#f57c00",
            RiskClass::Safe => "#2e7d32",
            RiskClass::Neutral => "#1565c0",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskClass::Safe => "safe",
            RiskClass::Moderate => "moderate",
            RiskClass::High => "high",
            RiskClass::Neutral => "neutral",
        }
    }
}

impl fmt::Display for RiskClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// A segment described by the indices of its first and last point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentSpan {
    /// Index of the first point in the path
    pub start: usize,
    /// Index of the last point in the path (inclusive)
    pub end: usize,
    pub class: RiskClass,
}

impl SegmentSpan {
    pub fn range(&self) -> RangeInclusive<usize> {
        self.start..=self.end
    }
}

/// A drawable run of points sharing one risk class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Segment<'a> {
    pub points: &'a [Sample],
    pub class: RiskClass,
}

impl Segment<'_> {
    pub fn color(&self) -> &'static str {
        self.class.color()
    }
}

/// True when at least one sample carries a finite risk score.
pub fn has_risk_data(path: &[Sample]) -> bool {
    path.iter().any(|s| s.risk.is_some_and(f64::is_finite))
}

/// Partition a path into risk-class spans.
///
/// Walks the path pairwise. When a point's class differs from its
/// predecessor's, the open span is closed at that point (inclusive) with the
/// predecessor's class and a new span opens at the same point. The last span
/// takes the class of its own last point.
///
/// Paths with fewer than two points produce no spans. Paths without any risk
/// data produce a single [`RiskClass::Neutral`] span.
pub fn segment_spans(path: &[Sample], config: &ReplayConfig) -> Vec<SegmentSpan> {
    let n = path.len();
    if n < 2 {
        return Vec::new();
    }

    if !has_risk_data(path) {
        return vec![SegmentSpan {
            start: 0,
            end: n - 1,
            class: RiskClass::Neutral,
        }];
    }

    let classes: Vec<RiskClass> = path
        .iter()
        .map(|s| RiskClass::classify(s.risk, config))
        .collect();

    let mut spans = Vec::new();
    let mut start = 0;

    for i in 1..n {
        let prev_class = classes[i - 1];
        if classes[i] != prev_class {
            spans.push(SegmentSpan {
                start,
                end: i,
                class: prev_class,
            });
            start = i;
        }
    }

    spans.push(SegmentSpan {
        start,
        end: n - 1,
        class: classes[n - 1],
    });

    debug!("[segment] {} points -> {} risk segments", n, spans.len());

    spans
}

/// Partition a path into borrowed risk segments.
///
/// # Example
///
/// ```rust
/// use trip_replay::{ReplayConfig, RiskClass, Sample, segment_by_risk};
///
/// let path = vec![
///     Sample::new(0.0, 0.0).with_risk(10.0),
///     Sample::new(0.001, 0.0).with_risk(15.0),
///     Sample::new(0.002, 0.0).with_risk(75.0),
///     Sample::new(0.003, 0.0).with_risk(80.0),
/// ];
///
/// let segments = segment_by_risk(&path, &ReplayConfig::default());
/// assert_eq!(segments.len(), 2);
/// assert_eq!(segments[0].class, RiskClass::Safe);
/// assert_eq!(segments[0].points.len(), 3); // includes the boundary point
/// assert_eq!(segments[1].class, RiskClass::High);
/// assert_eq!(segments[1].points.len(), 2);
/// ```
pub fn segment_by_risk<'a>(path: &'a [Sample], config: &ReplayConfig) -> Vec<Segment<'a>> {
    segment_spans(path, config)
        .into_iter()
        .map(|span| Segment {
            points: &path[span.range()],
            class: span.class,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn risky(values: &[f64]) -> Vec<Sample> {
        values
            .iter()
            .enumerate()
            .map(|(i, r)| Sample::new(i as f64 * 0.001, 0.0).with_risk(*r))
            .collect()
    }

    fn classes(spans: &[SegmentSpan]) -> Vec<RiskClass> {
        spans.iter().map(|s| s.class).collect()
    }

    #[test]
    fn test_classification_boundaries() {
        let config = ReplayConfig::default();
        assert_eq!(RiskClass::classify(Some(59.999), &config), RiskClass::Moderate);
        assert_eq!(RiskClass::classify(Some(60.0), &config), RiskClass::High);
        assert_eq!(RiskClass::classify(Some(29.999), &config), RiskClass::Safe);
        assert_eq!(RiskClass::classify(Some(30.0), &config), RiskClass::Moderate);
        assert_eq!(RiskClass::classify(Some(100.0), &config), RiskClass::High);
        assert_eq!(RiskClass::classify(Some(0.0), &config), RiskClass::Safe);
        assert_eq!(RiskClass::classify(Some(f64::NAN), &config), RiskClass::Safe);
    }

    #[test]
    fn test_colors() {
        assert_eq!(RiskClass::High.color(), "#c62828");
        assert_eq!(RiskClass::Moderate.color(), "#f57c00");
        assert_eq!(RiskClass::Safe.color(), "#2e7d32");
        assert_eq!(RiskClass::Neutral.color(), "#1565c0");
    }

    #[test]
    fn test_fewer_than_two_points() {
        let config = ReplayConfig::default();
        assert!(segment_spans(&[], &config).is_empty());
        assert!(segment_spans(&risky(&[80.0]), &config).is_empty());
    }

    #[test]
    fn test_no_risk_is_single_neutral_segment() {
        let config = ReplayConfig::default();
        let path: Vec<Sample> = (0..5).map(|i| Sample::new(i as f64 * 0.001, 0.0)).collect();
        let spans = segment_spans(&path, &config);
        assert_eq!(
            spans,
            vec![SegmentSpan { start: 0, end: 4, class: RiskClass::Neutral }]
        );
    }

    #[test]
    fn test_uniform_class_single_segment() {
        let config = ReplayConfig::default();
        let spans = segment_spans(&risky(&[40.0, 45.0, 50.0]), &config);
        assert_eq!(spans, vec![SegmentSpan { start: 0, end: 2, class: RiskClass::Moderate }]);
    }

    #[test]
    fn test_boundary_point_shared() {
        let config = ReplayConfig::default();
        let spans = segment_spans(&risky(&[10.0, 10.0, 40.0, 40.0, 70.0]), &config);
        assert_eq!(
            spans,
            vec![
                SegmentSpan { start: 0, end: 2, class: RiskClass::Safe },
                SegmentSpan { start: 2, end: 4, class: RiskClass::Moderate },
                SegmentSpan { start: 4, end: 4, class: RiskClass::High },
            ]
        );
    }

    #[test]
    fn test_alternating_classes() {
        let config = ReplayConfig::default();
        let spans = segment_spans(&risky(&[10.0, 90.0, 10.0, 90.0]), &config);
        assert_eq!(
            classes(&spans),
            vec![RiskClass::Safe, RiskClass::High, RiskClass::Safe, RiskClass::High]
        );
        assert!(spans.windows(2).all(|w| w[0].end == w[1].start));
    }

    #[test]
    fn test_missing_risk_on_risky_path_is_safe() {
        let config = ReplayConfig::default();
        let mut path = risky(&[70.0, 70.0, 70.0]);
        path[2].risk = None;
        let spans = segment_spans(&path, &config);
        assert_eq!(classes(&spans), vec![RiskClass::High, RiskClass::Safe]);
    }

    #[test]
    fn test_segments_borrow_path() {
        let config = ReplayConfig::default();
        let path = risky(&[10.0, 65.0, 65.0]);
        let segments = segment_by_risk(&path, &config);
        assert_eq!(segments.len(), 2);
        assert!(std::ptr::eq(&segments[0].points[0], &path[0]));
        assert!(std::ptr::eq(&segments[1].points[0], &path[1]));
        assert_eq!(segments[1].color(), "#c62828");
    }

    #[test]
    fn test_custom_thresholds() {
        let config = ReplayConfig {
            high_risk_threshold: 80.0,
            moderate_risk_threshold: 50.0,
            ..ReplayConfig::default()
        };
        assert_eq!(RiskClass::classify(Some(60.0), &config), RiskClass::Moderate);
        assert_eq!(RiskClass::classify(Some(45.0), &config), RiskClass::Safe);
    }
}
