//! Request routing and JSON envelopes for the public API
//!
//! Everything here is synchronous and independent of the HTTP server: a
//! request is described by [`ApiRequest`] and answered with an
//! [`ApiResponse`]. Upstream calls block on the fetch bridge, so callers
//! must run [`handle`] outside of any async context.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use url::form_urlencoded;

use crate::bridge::SyncFetchBridge;
use crate::cache::{CacheConfig, KeyedFileCache};
use crate::cli::ServerConfig;
use crate::data::{
    Coordinates, ElprisUpstream, ExternalDataClient, FetchError, Geocoder, GeocodingUpstream,
    OpenMeteo, Place, PriceArea, PriceQuery,
};

/// Endpoints listed on the index page and in 404 answers
pub const ENDPOINTS: [(&str, &str, &str); 7] = [
    ("GET", "/", "this page"),
    ("GET", "/echo", "echo the request line"),
    ("POST", "/echo", "echo the raw body"),
    ("GET", "/v1/current?lat=XX&lon=YY", "current weather by coordinates"),
    ("GET", "/v1/weather?city=NAME&country=CODE&region=REGION", "weather by city name"),
    ("GET", "/v1/cities?query=SEARCH", "city search (autocomplete)"),
    ("GET", "/v1/prices?date=YYYY-MM-DD&price=SE3", "electricity spot prices"),
];

const DEFAULT_PRICE_AREA: PriceArea = PriceArea::SE3;

/// Errors raised while reading query-string parameters
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("missing required parameter '{0}'")]
    Missing(String),

    #[error("invalid value '{value}' for parameter '{name}'")]
    Invalid { name: String, value: String },

    #[error("malformed query string: {0}")]
    Malformed(String),
}

/// Decoded query-string parameters; the first occurrence of a name wins
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams(HashMap<String, String>);

impl QueryParams {
    /// Parses `a=1&b=two+words&c=%C3%A5`
    ///
    /// `+` decodes to a space. Pairs without `=` get an empty value.
    /// Percent-escapes that do not decode to UTF-8 make the whole query
    /// malformed instead of being replaced.
    pub fn parse(query: &str) -> Result<Self, QueryError> {
        let mut params = HashMap::new();
        for (name, value) in form_urlencoded::parse(query.as_bytes()) {
            if name.contains(char::REPLACEMENT_CHARACTER)
                || value.contains(char::REPLACEMENT_CHARACTER)
            {
                return Err(QueryError::Malformed(query.to_string()));
            }
            params
                .entry(name.into_owned())
                .or_insert_with(|| value.into_owned());
        }
        Ok(Self(params))
    }

    /// Value of a parameter, `None` if absent or blank
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn require(&self, name: &str) -> Result<&str, QueryError> {
        self.get(name)
            .ok_or_else(|| QueryError::Missing(name.to_string()))
    }

    /// Parses a required float, accepting any of `names` as aliases
    pub fn require_f64(&self, names: &[&str]) -> Result<f64, QueryError> {
        let (name, raw) = names
            .iter()
            .find_map(|n| self.get(n).map(|v| (*n, v)))
            .ok_or_else(|| QueryError::Missing(names.first().copied().unwrap_or("").to_string()))?;

        raw.parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| QueryError::Invalid {
                name: name.to_string(),
                value: raw.to_string(),
            })
    }
}

/// A request as seen by the router
#[derive(Debug, Clone, Copy)]
pub struct ApiRequest<'a> {
    pub method: &'a str,
    pub path: &'a str,
    pub query: Option<&'a str>,
    pub body: &'a [u8],
}

/// A fully rendered answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl ApiResponse {
    /// `{"success":true,"data":...}`
    pub fn success(data: Value) -> Self {
        Self::json(200, &json!({ "success": true, "data": data }))
    }

    /// `{"success":false,"error":{"code","type","message"}}`
    pub fn error(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        Self::json(
            status,
            &json!({
                "success": false,
                "error": {
                    "code": status,
                    "type": error_type(status),
                    "message": message,
                }
            }),
        )
    }

    pub fn text(status: u16, content_type: &'static str, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            content_type,
            body: body.into(),
        }
    }

    fn json(status: u16, value: &Value) -> Self {
        // Serializing a Value cannot fail
        let body = serde_json::to_vec(value).unwrap_or_else(|_| b"{}".to_vec());
        Self::text(status, "application/json", body)
    }
}

impl From<QueryError> for ApiResponse {
    fn from(err: QueryError) -> Self {
        ApiResponse::error(400, err.to_string())
    }
}

impl From<FetchError> for ApiResponse {
    fn from(err: FetchError) -> Self {
        ApiResponse::error(err.status_code(), err.to_string())
    }
}

/// Human-readable name for an error status
pub fn error_type(status: u16) -> &'static str {
    match status {
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        502 => "Bad Gateway",
        504 => "Gateway Timeout",
        _ => "Internal Server Error",
    }
}

/// The upstream clients shared by all handlers
pub struct Services {
    pub weather: ExternalDataClient<OpenMeteo>,
    pub geocoder: Geocoder,
    pub prices: ExternalDataClient<ElprisUpstream>,
}

impl Services {
    pub fn new(
        weather: ExternalDataClient<OpenMeteo>,
        geocoder: Geocoder,
        prices: ExternalDataClient<ElprisUpstream>,
    ) -> Self {
        Self {
            weather,
            geocoder,
            prices,
        }
    }

    /// Wires the three clients to one bridge with the configured caches
    pub fn from_config(config: &ServerConfig, bridge: Arc<SyncFetchBridge>) -> Self {
        let cache = |subdir: &str, ttl: u64| {
            let cache_config = CacheConfig::new(config.cache_dir.join(subdir), ttl);
            let cache_config = if config.cache_enabled {
                cache_config
            } else {
                cache_config.disabled()
            };
            KeyedFileCache::new(cache_config)
        };

        let weather = ExternalDataClient::new(
            OpenMeteo::new(),
            cache("weather_cache", config.weather_ttl),
            Arc::clone(&bridge),
        );
        let geocoding = ExternalDataClient::new(
            GeocodingUpstream::new()
                .with_language(config.language.clone())
                .with_max_results(config.max_results),
            cache("geo_cache", config.geo_ttl),
            Arc::clone(&bridge),
        );
        let prices = ExternalDataClient::new(
            ElprisUpstream::new(),
            cache("prices_cache", config.prices_ttl),
            bridge,
        );

        Self::new(weather, Geocoder::new(geocoding), prices)
    }
}

/// Routes one request to its handler
pub fn handle(services: &Services, request: &ApiRequest<'_>) -> ApiResponse {
    let response = match (request.method, request.path) {
        ("GET", "/") => index(),
        ("GET", "/echo") => echo_request_line(request),
        ("POST", "/echo") => ApiResponse::text(200, "text/plain", request.body.to_vec()),
        ("GET", "/v1/current") => with_query(request, |q| current_weather(services, q)),
        ("GET", "/v1/weather") => with_query(request, |q| weather_by_city(services, q)),
        ("GET", "/v1/cities") => with_query(request, |q| search_cities(services, q)),
        ("GET", "/v1/prices") => with_query(request, |q| day_prices(services, q)),
        (_, path) if is_known_path(path) => ApiResponse::error(
            405,
            format!("method {} is not supported on {}", request.method, path),
        ),
        (_, path) => not_found(path),
    };

    tracing::debug!(
        method = request.method,
        path = request.path,
        status = response.status,
        "handled request"
    );
    response
}

fn is_known_path(path: &str) -> bool {
    ENDPOINTS
        .iter()
        .any(|(_, route, _)| route.split('?').next() == Some(path))
}

fn with_query(
    request: &ApiRequest<'_>,
    handler: impl FnOnce(&QueryParams) -> Result<Value, ApiResponse>,
) -> ApiResponse {
    let params = match QueryParams::parse(request.query.unwrap_or("")) {
        Ok(params) => params,
        Err(e) => return e.into(),
    };
    match handler(&params) {
        Ok(data) => ApiResponse::success(data),
        Err(response) => response,
    }
}

fn index() -> ApiResponse {
    let items: String = ENDPOINTS
        .iter()
        .map(|(method, route, what)| {
            format!(
                "<li><b>{} {}</b> - {}</li>",
                method,
                route.replace('&', "&amp;"),
                what
            )
        })
        .collect();
    let html = format!(
        "<!DOCTYPE html><html><head><title>Just Weather</title></head><body>\
         <h1>Just Weather API</h1><p>Available endpoints:</p><ul>{}</ul></body></html>",
        items
    );
    ApiResponse::text(200, "text/html; charset=utf-8", html)
}

fn echo_request_line(request: &ApiRequest<'_>) -> ApiResponse {
    let line = match request.query {
        Some(query) if !query.is_empty() => {
            format!("{} {}?{}", request.method, request.path, query)
        }
        _ => format!("{} {}", request.method, request.path),
    };
    ApiResponse::text(200, "text/plain", line)
}

fn not_found(path: &str) -> ApiResponse {
    let available: Vec<String> = ENDPOINTS
        .iter()
        .map(|(method, route, _)| format!("{} {}", method, route))
        .collect();
    ApiResponse::error(
        404,
        format!(
            "The requested endpoint '{}' was not found. Available endpoints: {}",
            path,
            available.join(", ")
        ),
    )
}

fn current_weather(services: &Services, query: &QueryParams) -> Result<Value, ApiResponse> {
    let latitude = query.require_f64(&["lat"])?;
    let longitude = query.require_f64(&["lon", "long"])?;
    let coords = Coordinates::new(latitude, longitude);

    let weather = services.weather.fetch(&coords)?;
    Ok(json!({
        "current_weather": to_value(&weather)?,
        "location": { "latitude": coords.latitude, "longitude": coords.longitude },
    }))
}

fn weather_by_city(services: &Services, query: &QueryParams) -> Result<Value, ApiResponse> {
    let city = query.require("city")?;
    let place = services
        .geocoder
        .locate(city, query.get("region"), query.get("country"))?
        .ok_or_else(|| ApiResponse::error(404, format!("City '{}' not found", city)))?;

    let coords = Coordinates::new(place.latitude, place.longitude);
    let weather = services.weather.fetch(&coords)?;
    Ok(json!({
        "location": location_json(&place),
        "current_weather": to_value(&weather)?,
    }))
}

fn search_cities(services: &Services, query: &QueryParams) -> Result<Value, ApiResponse> {
    let text = query.require("query")?;
    let found = services.geocoder.search_smart(text)?;
    let cities: Vec<Value> = found.results.iter().map(location_json).collect();
    Ok(json!({
        "query": text,
        "count": cities.len(),
        "source": found.source,
        "cities": cities,
    }))
}

fn day_prices(services: &Services, query: &QueryParams) -> Result<Value, ApiResponse> {
    let date = match query.get("date") {
        Some(date) => date.to_string(),
        None => chrono::Local::now().date_naive().format("%Y-%m-%d").to_string(),
    };
    let area = query
        .get("price")
        .unwrap_or_else(|| DEFAULT_PRICE_AREA.as_str());

    let price_query = PriceQuery::parse(&date, area)?;
    let day = services.prices.fetch(&price_query)?;
    to_value(&day)
}

fn location_json(place: &Place) -> Value {
    json!({
        "name": place.name,
        "country": place.country,
        "country_code": place.country_code,
        "region": place.admin1,
        "latitude": place.latitude,
        "longitude": place.longitude,
        "population": place.population,
        "timezone": place.timezone,
    })
}

fn to_value(value: &impl Serialize) -> Result<Value, ApiResponse> {
    serde_json::to_value(value).map_err(|e| {
        tracing::error!(error = %e, "failed to serialize response");
        ApiResponse::error(500, "failed to serialize response")
    })
}
