//! Upstream data clients for Just Weather
//!
//! Every external data source (weather, geocoding, electricity prices) is an
//! [`Upstream`] plugged into the shared [`ExternalDataClient`], which handles
//! the cache lookup, the bridged live fetch and the cache write-back.

pub mod cities;
pub mod client;
pub mod geocoding;
pub mod prices;
pub mod weather;

pub use cities::{search_popular_cities, PopularCity, POPULAR_CITIES};
pub use client::{CachePolicy, ExternalDataClient, Upstream};
pub use geocoding::{CitySearch, CitySource, Geocoder, GeocodingUpstream, Place};
pub use prices::{DayPrices, ElprisUpstream, PriceArea, PricePoint, PriceQuery};
pub use weather::{Coordinates, CurrentWeather, OpenMeteo};

use thiserror::Error;

use crate::bridge::BridgeError;

/// Errors surfaced by an upstream client
///
/// Cache problems never appear here: they are logged and treated as a miss.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Required request fields are missing or malformed
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    /// The bridged wait for the upstream exceeded its timeout
    #[error("upstream request timed out")]
    UpstreamTimeout,

    /// The upstream call failed at the network or protocol level
    #[error("upstream request failed: {0}")]
    UpstreamError(String),

    /// The upstream payload did not have the expected JSON shape
    #[error("failed to parse upstream response: {0}")]
    ParseError(String),
}

impl FetchError {
    /// Whether a caller may reasonably try the same request again
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::UpstreamTimeout)
    }

    /// HTTP status code used when reporting this error through the API
    pub fn status_code(&self) -> u16 {
        match self {
            FetchError::InvalidParameters(_) => 400,
            FetchError::UpstreamTimeout => 504,
            FetchError::UpstreamError(_) | FetchError::ParseError(_) => 502,
        }
    }
}

impl From<BridgeError> for FetchError {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::TimedOut => FetchError::UpstreamTimeout,
            BridgeError::Failed(reason) => FetchError::UpstreamError(reason),
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::ParseError(err.to_string())
    }
}
