//! Shared fixtures for integration tests
//!
//! `Canned` is an in-process HTTP client and scheduler: replies are chosen by
//! URL substring and delivered synchronously from `get`.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tempfile::TempDir;

use just_weather::bridge::{FetchCallback, FetchEvent, HttpClient, Scheduler, SyncFetchBridge};
use just_weather::cache::{CacheConfig, KeyedFileCache};
use just_weather::data::{
    ElprisUpstream, ExternalDataClient, Geocoder, GeocodingUpstream, OpenMeteo,
};
use just_weather::routes::Services;

pub const WEATHER_BASE: &str = "http://weather.test/v1/forecast";
pub const GEO_BASE: &str = "http://geo.test/v1/search";
pub const PRICES_BASE: &str = "http://prices.test/api/v1/prices";

#[derive(Debug, Clone)]
pub enum Reply {
    Body(String),
    Error(String),
    Timeout,
    /// Never invokes the callback
    Silent,
}

#[derive(Default)]
pub struct Canned {
    routes: Mutex<Vec<(String, Reply)>>,
    calls: Mutex<Vec<String>>,
}

impl Canned {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Answers every URL containing `fragment`; later routes take priority
    pub fn route(&self, fragment: &str, reply: Reply) {
        self.routes.lock().insert(0, (fragment.to_string(), reply));
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

impl HttpClient for Canned {
    fn get(&self, url: &str, _timeout: Duration, callback: FetchCallback) {
        self.calls.lock().push(url.to_string());
        let reply = self
            .routes
            .lock()
            .iter()
            .find(|(fragment, _)| url.contains(fragment.as_str()))
            .map(|(_, reply)| reply.clone());

        match reply {
            Some(Reply::Body(body)) => callback(FetchEvent::Response(body.into_bytes())),
            Some(Reply::Error(reason)) => callback(FetchEvent::Error(reason)),
            Some(Reply::Timeout) => callback(FetchEvent::Timeout),
            Some(Reply::Silent) => drop(callback),
            None => callback(FetchEvent::Error(format!("no canned reply for {}", url))),
        }
    }
}

impl Scheduler for Canned {
    fn tick(&self, _now_ms: Option<u64>) {}
}

pub fn bridge(canned: &Arc<Canned>, timeout: Duration) -> Arc<SyncFetchBridge> {
    let client: Arc<dyn HttpClient> = canned.clone();
    let scheduler: Arc<dyn Scheduler> = canned.clone();
    Arc::new(SyncFetchBridge::new(client, scheduler).with_timeout(timeout))
}

pub fn cache(dir: &TempDir, subdir: &str, ttl: u64) -> KeyedFileCache {
    KeyedFileCache::new(CacheConfig::new(dir.path().join(subdir), ttl))
}

pub fn weather_client(
    canned: &Arc<Canned>,
    dir: &TempDir,
    ttl: u64,
) -> ExternalDataClient<OpenMeteo> {
    ExternalDataClient::new(
        OpenMeteo::new().with_base_url(WEATHER_BASE),
        cache(dir, "weather_cache", ttl),
        bridge(canned, Duration::from_millis(200)),
    )
}

pub fn geocoder(canned: &Arc<Canned>, dir: &TempDir) -> Geocoder {
    Geocoder::new(ExternalDataClient::new(
        GeocodingUpstream::new().with_base_url(GEO_BASE),
        cache(dir, "geo_cache", 3600),
        bridge(canned, Duration::from_millis(200)),
    ))
}

pub fn services(canned: &Arc<Canned>, dir: &TempDir) -> Services {
    let bridge = bridge(canned, Duration::from_millis(200));
    Services::new(
        ExternalDataClient::new(
            OpenMeteo::new().with_base_url(WEATHER_BASE),
            cache(dir, "weather_cache", 900),
            Arc::clone(&bridge),
        ),
        Geocoder::new(ExternalDataClient::new(
            GeocodingUpstream::new().with_base_url(GEO_BASE),
            cache(dir, "geo_cache", 3600),
            Arc::clone(&bridge),
        )),
        ExternalDataClient::new(
            ElprisUpstream::new().with_base_url(PRICES_BASE),
            cache(dir, "prices_cache", 3600),
            bridge,
        ),
    )
}

/// Open-Meteo payload with the given temperature
pub fn weather_body(temperature: f64) -> String {
    format!(
        r#"{{
            "current_units": {{"temperature_2m": "°C", "wind_speed_10m": "km/h"}},
            "current": {{
                "time": "2024-07-15T14:00",
                "temperature_2m": {},
                "relative_humidity_2m": 71,
                "is_day": 1,
                "precipitation": 0.0,
                "weather_code": 3,
                "surface_pressure": 1009.8,
                "wind_speed_10m": 9.4,
                "wind_direction_10m": 200
            }}
        }}"#,
        temperature
    )
}

pub const SPRINGFIELD_BODY: &str = r#"{
    "results": [
        {"id": 4409896, "name": "Springfield", "latitude": 37.21533, "longitude": -93.29824,
         "country": "United States", "country_code": "US", "admin1": "Missouri",
         "population": 169176, "timezone": "America/Chicago"},
        {"id": 4250542, "name": "Springfield", "latitude": 39.80172, "longitude": -89.64371,
         "country": "United States", "country_code": "US", "admin1": "Illinois",
         "population": 116565, "timezone": "America/Chicago"},
        {"id": 2147714, "name": "Springfield", "latitude": -27.66, "longitude": 152.92,
         "country": "Australia", "country_code": "AU", "admin1": "Queensland",
         "population": 18000, "timezone": "Australia/Brisbane"}
    ]
}"#;

pub const PRICES_BODY: &str = r#"[
    {"SEK_per_kWh": 0.50, "EUR_per_kWh": 0.0437, "EXR": 11.44,
     "time_start": "2024-01-25T00:00:00+01:00", "time_end": "2024-01-25T01:00:00+01:00"},
    {"SEK_per_kWh": 1.50, "EUR_per_kWh": 0.1311, "EXR": 11.44,
     "time_start": "2024-01-25T01:00:00+01:00", "time_end": "2024-01-25T02:00:00+01:00"}
]"#;
