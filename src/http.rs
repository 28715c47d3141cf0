//! HTTP client for the trip API.
//!
//! This module provides:
//! - Trip list fetching with concurrent per-trip distance lookups
//! - Trip detail fetching, mapped through the canonical record layer
//! - One-call fetch-and-replay for the trip detail view
//! - Retry with exponential backoff on transport errors and 429

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use reqwest::{Client, StatusCode, Url};
use serde_json::Value;

use crate::records::{as_number, decode_trip_detail, decode_trip_list, TripDetail, TripSummary};
use crate::replay::TripReplay;
use crate::{ReplayConfig, ReplayError, Result};

/// API base used when neither the config nor `TRIP_API_BASE` names one.
pub const DEFAULT_API_BASE: &str = "http://localhost:5000";
/// Environment variable overriding the API base.
pub const API_BASE_ENV: &str = "TRIP_API_BASE";

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_CONCURRENCY: usize = 8;
const DEFAULT_MAX_RETRIES: u32 = 3;

/// Progress callback type: (completed, total)
pub type ProgressCallback = Arc<dyn Fn(u32, u32) + Send + Sync>;

/// Connection settings for the trip API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TripApiConfig {
    /// Base URL of the trip API. Default: `http://localhost:5000`
    pub base_url: String,
    /// Per-request timeout. Default: 30 seconds
    pub timeout_secs: u64,
    /// Maximum in-flight distance lookups. Default: 8
    pub max_concurrency: usize,
    /// Retries on transport errors and 429 responses. Default: 3
    pub max_retries: u32,
}

impl Default for TripApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl TripApiConfig {
    /// Defaults, with the base URL taken from `TRIP_API_BASE` when set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(base) = std::env::var(API_BASE_ENV) {
            if !base.trim().is_empty() {
                config.base_url = base.trim().to_string();
            }
        }
        config
    }
}

/// Async client for the trip API.
pub struct TripApiClient {
    client: Client,
    base: Url,
    config: TripApiConfig,
}

impl TripApiClient {
    /// Create a client for the configured API base.
    pub fn new(config: TripApiConfig) -> Result<Self> {
        let base = Url::parse(&config.base_url).map_err(|e| {
            ReplayError::invalid_config("base_url", format!("{}: {}", config.base_url, e))
        })?;

        if base.cannot_be_a_base() {
            return Err(ReplayError::invalid_config(
                "base_url",
                format!("{} cannot be used as a base URL", config.base_url),
            ));
        }

        let client = Client::builder()
            .pool_max_idle_per_host(config.max_concurrency * 2)
            .pool_idle_timeout(Duration::from_secs(60))
            .tcp_keepalive(Duration::from_secs(30))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ReplayError::Request(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, base, config })
    }

    pub fn config(&self) -> &TripApiConfig {
        &self.config
    }

    /// Build `{base}/{segments...}`, percent-encoding each segment.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ReplayError::invalid_config("base_url", "cannot be used as a base URL"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Fetch the trip list, then each trip's distance concurrently.
    ///
    /// Distance lookups never fail the list. A non-success status keeps the
    /// distance the list already carried; a transport or decode failure
    /// resets it to 0 km. Both are logged as warnings.
    pub async fn fetch_trips(&self, on_progress: Option<ProgressCallback>) -> Result<Vec<TripSummary>> {
        use futures::stream::{self, StreamExt};

        let start = Instant::now();
        let payload = self.get_json(&self.endpoint(&["trips"])?).await?;
        let trips = decode_trip_list(&payload).log_and_take();

        let total = trips.len() as u32;
        let completed = Arc::new(AtomicU32::new(0));

        info!(
            "[TripApiClient] Fetched {} trips, looking up distances (max concurrent: {})",
            total, self.config.max_concurrency
        );

        let trips: Vec<TripSummary> = stream::iter(trips)
            .map(|mut trip| {
                let completed = Arc::clone(&completed);
                let callback = on_progress.clone();

                async move {
                    if !trip.id.is_empty() {
                        match self.fetch_distance(&trip.id).await {
                            Ok(km) => trip.distance_km = km,
                            Err(e @ ReplayError::Http { .. }) => {
                                warn!(
                                    "[TripApiClient] Distance lookup for trip {} failed: {}, keeping {} km",
                                    trip.id, e, trip.distance_km
                                );
                            }
                            Err(e) => {
                                warn!("[TripApiClient] Failed to fetch distance for trip {}: {}", trip.id, e);
                                trip.distance_km = 0.0;
                            }
                        }
                    }

                    let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                    if let Some(ref cb) = callback {
                        cb(done, total);
                    }
                    trip
                }
            })
            .buffered(self.config.max_concurrency.max(1))
            .collect()
            .await;

        info!(
            "[TripApiClient] DONE: {} trips with distances in {:.2}s",
            trips.len(),
            start.elapsed().as_secs_f64()
        );

        Ok(trips)
    }

    /// Distance travelled on a trip, in kilometers.
    pub async fn fetch_distance(&self, trip_id: &str) -> Result<f64> {
        let payload = self.get_json(&self.endpoint(&["trips", trip_id, "distance"])?).await?;
        Ok(payload
            .get("distance_km")
            .map(as_number)
            .filter(|km| km.is_finite())
            .unwrap_or(0.0))
    }

    /// Fetch one trip with its raw path and events.
    pub async fn fetch_trip(&self, trip_id: &str) -> Result<TripDetail> {
        let payload = self.get_json(&self.endpoint(&["trips", trip_id])?).await?;
        let decoded = decode_trip_detail(&payload);
        debug!(
            "[TripApiClient] trip {}: {} path points, {} events, {} diagnostics",
            trip_id,
            decoded.value.path.len(),
            decoded.value.events.len(),
            decoded.diagnostics.len()
        );
        Ok(decoded.log_and_take())
    }

    /// Fetch one trip and replay its path.
    pub async fn fetch_replay(&self, trip_id: &str, config: &ReplayConfig) -> Result<TripReplay> {
        let detail = self.fetch_trip(trip_id).await?;
        Ok(TripReplay::from_detail(detail, config))
    }

    async fn get_json(&self, url: &Url) -> Result<Value> {
        let mut retries = 0;
        let req_start = Instant::now();

        loop {
            match self.client.get(url.clone()).send().await {
                Ok(resp) => {
                    let status = resp.status();

                    if status == StatusCode::TOO_MANY_REQUESTS && retries < self.config.max_retries {
                        retries += 1;
                        let wait = backoff(retries);
                        warn!(
                            "[Fetch {}] 429 Too Many Requests, retry {} with {:?} backoff",
                            url, retries, wait
                        );
                        tokio::time::sleep(wait).await;
                        continue;
                    }

                    if !status.is_success() {
                        return Err(ReplayError::Http {
                            url: url.to_string(),
                            status: status.as_u16(),
                        });
                    }

                    let bytes = resp
                        .bytes()
                        .await
                        .map_err(|e| ReplayError::Request(format!("Body download error: {}", e)))?;

                    debug!(
                        "[Fetch {}] {:.1}KB in {:?}",
                        url,
                        bytes.len() as f64 / 1024.0,
                        req_start.elapsed()
                    );

                    return Ok(serde_json::from_slice(&bytes)?);
                }
                Err(e) => {
                    if retries >= self.config.max_retries {
                        return Err(ReplayError::Request(format!("Request error: {}", e)));
                    }

                    retries += 1;
                    let wait = backoff(retries);
                    warn!("[Fetch {}] Error: {}, retry {} after {:?}", url, e, retries, wait);
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }
}

/// Exponential backoff: 400ms, 800ms, 1.6s, then 3.2s max
fn backoff(retry: u32) -> Duration {
    Duration::from_millis(200 * (1 << retry.min(4)))
}

/// Blocking wrapper: fetch and replay one trip on a private tokio runtime.
pub fn fetch_replay_blocking(
    api: TripApiConfig,
    trip_id: &str,
    config: &ReplayConfig,
) -> Result<TripReplay> {
    use tokio::runtime::Builder;

    let rt = Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .map_err(|e| ReplayError::Request(format!("Runtime error: {}", e)))?;

    let client = TripApiClient::new(api)?;
    rt.block_on(client.fetch_replay(trip_id, config))
}
