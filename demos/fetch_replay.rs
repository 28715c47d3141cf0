//! Fetch trips from the trip API and replay one of them.
//!
//! Run with: cargo run --example fetch_replay --features http -- [TRIP_ID]
//! The API base comes from TRIP_API_BASE (default http://localhost:5000).

use std::sync::Arc;

use trip_replay::http::{ProgressCallback, TripApiClient, TripApiConfig};
use trip_replay::ReplayConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let api = TripApiConfig::from_env();
    println!("Trip API: {}\n", api.base_url);

    let client = TripApiClient::new(api)?;

    let progress: ProgressCallback = Arc::new(|done, total| {
        if done == total || done % 10 == 0 {
            println!("  distances: {}/{}", done, total);
        }
    });
    let trips = client.fetch_trips(Some(progress)).await?;

    println!("\n{} trips:", trips.len());
    for trip in &trips {
        println!(
            "  {:<12} driver={:<8} {:>7.2}km max={:>5.1} risk={} {}",
            trip.id, trip.driver, trip.distance_km, trip.max_speed, trip.risk, trip.status
        );
    }

    let trip_id = match std::env::args().nth(1) {
        Some(id) => id,
        None => match trips.first() {
            Some(trip) => trip.id.clone(),
            None => return Ok(()),
        },
    };

    let trip = client.fetch_replay(&trip_id, &ReplayConfig::default()).await?;
    println!(
        "\nTrip {}: {} points, {} segments, {} events",
        trip.trip.id,
        trip.replay.path().len(),
        trip.replay.segment_count(),
        trip.events.len()
    );
    for segment in trip.replay.segments() {
        println!("  {:>8} {} ({} points)", segment.class, segment.color(), segment.points.len());
    }

    Ok(())
}
