//! Simulated live telemetry for the monitoring view.
//!
//! A bounded random walk over position, speed and risk. The walk state is an
//! explicit value threaded through [`step`], and the random source is passed
//! in, so a seeded generator reproduces the same feed exactly. Scheduling
//! (one step every [`DEFAULT_INTERVAL_MS`]) is left to the caller.
//!
//! # Example
//!
//! ```rust
//! use trip_replay::telemetry::TelemetrySimulator;
//!
//! let feed: Vec<_> = TelemetrySimulator::seeded(7, 0).take(20).collect();
//! assert_eq!(feed.len(), 20);
//! assert!(feed.iter().all(|s| s.risk <= 100));
//! ```

use std::fmt;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::{Sample, Timestamp};

/// Interval between emitted samples in the monitoring view.
pub const DEFAULT_INTERVAL_MS: i64 = 1_500;

/// Maximum per-step position change in degrees (each axis moves by at most half of this).
const POSITION_STEP_DEGREES: f64 = 0.0005;
/// Maximum per-step speed change (each step moves by at most half of this).
const SPEED_STEP: f64 = 6.0;
/// Maximum per-step risk change (each step moves by at most half of this).
const RISK_STEP: f64 = 6.0;
/// Speeds above this count as moving.
const ACTIVE_SPEED: f64 = 5.0;

/// Random walk state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TelemetryState {
    pub lat: f64,
    pub lon: f64,
    pub speed: f64,
    pub risk: f64,
}

impl Default for TelemetryState {
    fn default() -> Self {
        Self {
            lat: 37.7749,
            lon: -122.4194,
            speed: 0.0,
            risk: 10.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VehicleState {
    Idle,
    Active,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DriverStatus {
    Alert,
    Yawning,
    Drowsy,
}

impl DriverStatus {
    /// Driver status for a risk score: drowsy above 60, yawning above 30.
    pub fn from_risk(risk: f64) -> Self {
        if risk > 60.0 {
            DriverStatus::Drowsy
        } else if risk > 30.0 {
            DriverStatus::Yawning
        } else {
            DriverStatus::Alert
        }
    }
}

impl fmt::Display for DriverStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DriverStatus::Alert => "ALERT",
            DriverStatus::Yawning => "YAWNING",
            DriverStatus::Drowsy => "DROWSY",
        })
    }
}

/// One emitted telemetry reading, as shown in the monitoring view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveSample {
    /// Rounded speed
    pub speed: u32,
    pub lat: f64,
    pub lon: f64,
    pub state: VehicleState,
    /// Rounded risk in `[0, 100]`
    pub risk: u32,
    pub driver_status: DriverStatus,
    /// Epoch milliseconds
    pub timestamp: i64,
}

impl LiveSample {
    /// Convert into a replay sample so a live trail can be replayed.
    pub fn to_sample(&self) -> Sample {
        Sample::new(self.lat, self.lon)
            .with_timestamp(Timestamp::Millis(self.timestamp))
            .with_risk(self.risk as f64)
    }
}

/// Advance the walk by one step.
///
/// Pure apart from the random draws: the same state, generator state and
/// timestamp always produce the same result. Speed never drops below 0 and
/// risk stays within `[0, 100]`. Driver status is derived from the unrounded
/// risk.
pub fn step<R: Rng>(
    state: TelemetryState,
    rng: &mut R,
    timestamp: i64,
) -> (TelemetryState, LiveSample) {
    let lat = state.lat + (rng.gen::<f64>() - 0.5) * POSITION_STEP_DEGREES;
    let lon = state.lon + (rng.gen::<f64>() - 0.5) * POSITION_STEP_DEGREES;
    let speed = (state.speed + (rng.gen::<f64>() - 0.5) * SPEED_STEP).max(0.0);
    let risk = (state.risk + (rng.gen::<f64>() - 0.5) * RISK_STEP).clamp(0.0, 100.0);

    let next = TelemetryState { lat, lon, speed, risk };

    let sample = LiveSample {
        speed: speed.round() as u32,
        lat,
        lon,
        state: if speed > ACTIVE_SPEED {
            VehicleState::Active
        } else {
            VehicleState::Idle
        },
        risk: risk.round() as u32,
        driver_status: DriverStatus::from_risk(risk),
        timestamp,
    };

    (next, sample)
}

/// Iterator over an endless simulated feed.
pub struct TelemetrySimulator<R = StdRng> {
    state: TelemetryState,
    rng: R,
    next_timestamp: i64,
    interval_ms: i64,
}

impl TelemetrySimulator<StdRng> {
    /// Deterministic feed from a seed, starting at `start_timestamp`.
    pub fn seeded(seed: u64, start_timestamp: i64) -> Self {
        Self::new(TelemetryState::default(), StdRng::seed_from_u64(seed), start_timestamp)
    }
}

impl<R: Rng> TelemetrySimulator<R> {
    pub fn new(state: TelemetryState, rng: R, start_timestamp: i64) -> Self {
        Self {
            state,
            rng,
            next_timestamp: start_timestamp,
            interval_ms: DEFAULT_INTERVAL_MS,
        }
    }

    pub fn with_interval(mut self, interval_ms: i64) -> Self {
        self.interval_ms = interval_ms;
        self
    }

    pub fn state(&self) -> TelemetryState {
        self.state
    }
}

impl<R: Rng> Iterator for TelemetrySimulator<R> {
    type Item = LiveSample;

    fn next(&mut self) -> Option<LiveSample> {
        let (state, sample) = step(self.state, &mut self.rng, self.next_timestamp);
        self.state = state;
        self.next_timestamp += self.interval_ms;
        Some(sample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;

    #[test]
    fn test_seeded_feed_is_deterministic() {
        let a: Vec<LiveSample> = TelemetrySimulator::seeded(42, 0).take(50).collect();
        let b: Vec<LiveSample> = TelemetrySimulator::seeded(42, 0).take(50).collect();
        assert_eq!(a, b);

        let c: Vec<LiveSample> = TelemetrySimulator::seeded(43, 0).take(50).collect();
        assert_ne!(a, c);
    }

    #[test]
    fn test_walk_stays_bounded() {
        let mut state = TelemetryState::default();
        let mut rng = StdRng::seed_from_u64(1);
        for i in 0..5_000 {
            let (next, sample) = step(state, &mut rng, i);
            assert!(next.speed >= 0.0);
            assert!((0.0..=100.0).contains(&next.risk));
            assert!(sample.risk <= 100);
            assert!((next.lat - state.lat).abs() <= POSITION_STEP_DEGREES / 2.0 + 1e-12);
            assert!((next.lon - state.lon).abs() <= POSITION_STEP_DEGREES / 2.0 + 1e-12);
            state = next;
        }
    }

    #[test]
    fn test_timestamps_advance_by_interval() {
        let feed: Vec<LiveSample> = TelemetrySimulator::seeded(3, 1_000)
            .with_interval(500)
            .take(3)
            .collect();
        let stamps: Vec<i64> = feed.iter().map(|s| s.timestamp).collect();
        assert_eq!(stamps, vec![1_000, 1_500, 2_000]);
    }

    #[test]
    fn test_risk_clamped_at_floor() {
        // StepRng(0, 0) draws 0.0 every time: every delta is at its most negative
        let mut rng = StepRng::new(0, 0);
        let state = TelemetryState { risk: 1.0, speed: 1.0, ..TelemetryState::default() };
        let (next, sample) = step(state, &mut rng, 0);
        assert_eq!(next.risk, 0.0);
        assert_eq!(next.speed, 0.0);
        assert_eq!(sample.state, VehicleState::Idle);
        assert_eq!(sample.driver_status, DriverStatus::Alert);
    }

    #[test]
    fn test_driver_status_thresholds() {
        assert_eq!(DriverStatus::from_risk(30.0), DriverStatus::Alert);
        assert_eq!(DriverStatus::from_risk(30.5), DriverStatus::Yawning);
        assert_eq!(DriverStatus::from_risk(60.0), DriverStatus::Yawning);
        assert_eq!(DriverStatus::from_risk(60.5), DriverStatus::Drowsy);
    }

    #[test]
    fn test_live_sample_json_shape() {
        let sample = LiveSample {
            speed: 12,
            lat: 1.0,
            lon: 2.0,
            state: VehicleState::Active,
            risk: 65,
            driver_status: DriverStatus::Drowsy,
            timestamp: 99,
        };
        let json = serde_json::to_value(&sample).unwrap();
        assert_eq!(json["driverStatus"], "DROWSY");
        assert_eq!(json["state"], "ACTIVE");

        let replay_sample = sample.to_sample();
        assert_eq!(replay_sample.risk, Some(65.0));
        assert_eq!(replay_sample.timestamp, Some(Timestamp::Millis(99)));
    }
}
