//! Simulated live telemetry, replayed as a trail.
//!
//! Run with: cargo run --example live_feed

use trip_replay::telemetry::TelemetrySimulator;
use trip_replay::{build_replay, ReplayConfig, Sample};

fn main() {
    let start = 1_709_287_200_000; // 2024-03-01T10:00:00Z

    println!("Live feed (seed 7, one reading every 1.5s)\n");

    let feed: Vec<_> = TelemetrySimulator::seeded(7, start).take(40).collect();
    for reading in feed.iter().take(10) {
        println!(
            "  t={} speed={:>3} risk={:>3} {:?} {}",
            reading.timestamp, reading.speed, reading.risk, reading.state, reading.driver_status
        );
    }
    println!("  ... {} readings total\n", feed.len());

    let trail: Vec<Sample> = feed.iter().map(|r| r.to_sample()).collect();
    let replay = build_replay(trail, &ReplayConfig::default());

    println!(
        "Trail: {} -> {} points, {} segments, {:.0}m",
        feed.len(),
        replay.path().len(),
        replay.segment_count(),
        replay.total_distance()
    );
    for segment in replay.segments() {
        println!("  {:>8} ({} points)", segment.class, segment.points.len());
    }
}
