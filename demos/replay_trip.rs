//! Replay a recorded trip: normalize, simplify, segment by risk.
//!
//! Run with: cargo run --example replay_trip

use trip_replay::records::parse_trip_detail;
use trip_replay::{ReplayConfig, TripReplay};

const TRIP_JSON: &str = r#"{
    "trip_id": "T-1042",
    "driver_id": "D-7",
    "start_time": "2024-03-01T10:00:00Z",
    "end_time": "2024-03-01T10:00:50Z",
    "risk_level": "MEDIUM",
    "status": "COMPLETED",
    "path": [
        {"lat": 37.77490, "lng": -122.41940, "ts": "2024-03-01T10:00:00Z", "risk_score": 12},
        {"lat": 37.77491, "lng": -122.41940, "ts": "2024-03-01T10:00:05Z", "risk_score": 14},
        {"lat": 37.77590, "lng": -122.41940, "ts": "2024-03-01T10:00:15Z", "risk_score": 22},
        {"lat": 37.77690, "lng": -122.41940, "ts": "2024-03-01T10:00:25Z", "risk_score": 41},
        {"lat": 37.77690, "lng": -122.41800, "ts": "2024-03-01T10:00:35Z", "risk_score": 67},
        {"lat": 37.77690, "lng": -122.41660, "ts": "2024-03-01T10:00:45Z", "risk_score": 72},
        {"lat": 37.77790, "lng": -122.41660, "ts": "2024-03-01T10:00:10Z", "risk_score": 18},
        {"lat": "n/a", "lng": -122.41660, "ts": "2024-03-01T10:00:50Z"}
    ],
    "events": [
        {"ts": "2024-03-01T10:00:30Z", "type": "Yawn", "desc": "Driver yawned twice"},
        {"ts": "2024-03-01T10:00:40Z", "type": "Drowsiness", "desc": "Eyes closed for 1.2s"}
    ]
}"#;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let decoded = parse_trip_detail(TRIP_JSON)?;
    for diagnostic in &decoded.diagnostics {
        println!("warning: {}", diagnostic);
    }

    let config = ReplayConfig::default();
    let trip = TripReplay::from_detail(decoded.value, &config);

    println!("Trip {} (driver {}, {})\n", trip.trip.id, trip.trip.driver, trip.trip.status);
    println!(
        "Config: min_distance={}m, min_deviation={}deg, high>={}, moderate>={}\n",
        config.min_distance_meters,
        config.min_deviation_degrees,
        config.high_risk_threshold,
        config.moderate_risk_threshold
    );

    let replay = &trip.replay;
    if replay.is_empty() {
        println!("No GPS data for this trip");
        return Ok(());
    }

    println!("Simplified path: {} points, {:.0}m", replay.path().len(), replay.total_distance());
    for (i, segment) in replay.segments().enumerate() {
        println!(
            "  segment {}: {:>8} {} ({} points)",
            i + 1,
            segment.class,
            segment.color(),
            segment.points.len()
        );
    }

    if let (Some(start), Some(end)) = (replay.start(), replay.end()) {
        println!("\nStart: ({:.5}, {:.5})", start.lat, start.lon);
        println!("End:   ({:.5}, {:.5})", end.lat, end.lon);
    }

    println!("\nEvents:");
    for event in &trip.events {
        let at = event.timestamp.as_ref().map(|t| t.to_string()).unwrap_or_default();
        println!("  [{}] {}: {}", at, event.kind, event.description);
    }

    println!("\nRender view:\n{}", serde_json::to_string_pretty(&replay.render_view())?);
    Ok(())
}
