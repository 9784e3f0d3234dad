//! Open-Meteo current weather upstream
//!
//! Builds forecast URLs for a coordinate pair and turns the `current` block
//! of the Open-Meteo response into a [`CurrentWeather`].

use serde::{Deserialize, Serialize};

use super::client::Upstream;
use super::FetchError;

/// Base URL for the Open-Meteo forecast API
pub const OPEN_METEO_BASE_URL: &str = "https://api.open-meteo.com/v1/forecast";

/// Variables requested in the `current` block
const CURRENT_FIELDS: &str = "temperature_2m,relative_humidity_2m,apparent_temperature,is_day,precipitation,weather_code,surface_pressure,wind_speed_10m,wind_direction_10m";

const DEFAULT_TEMPERATURE_UNIT: &str = "°C";
const DEFAULT_WINDSPEED_UNIT: &str = "km/h";
const PRECIPITATION_UNIT: &str = "mm";

/// A point on the globe in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Checks that both values are finite and inside their valid ranges
    pub fn validate(&self) -> Result<(), FetchError> {
        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            return Err(FetchError::InvalidParameters(format!(
                "latitude must be between -90 and 90, got {}",
                self.latitude
            )));
        }
        if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(FetchError::InvalidParameters(format!(
                "longitude must be between -180 and 180, got {}",
                self.longitude
            )));
        }
        Ok(())
    }
}

/// Current conditions at a location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentWeather {
    pub temperature: f64,
    pub temperature_unit: String,
    pub apparent_temperature: Option<f64>,
    pub windspeed: f64,
    pub windspeed_unit: String,
    /// Wind direction in whole degrees
    pub wind_direction_10m: i32,
    pub wind_direction_name: String,
    /// WMO weather interpretation code
    pub weather_code: i32,
    pub weather_description: String,
    pub is_day: bool,
    pub precipitation: f64,
    pub precipitation_unit: String,
    /// Relative humidity in percent
    pub humidity: f64,
    /// Surface pressure in hPa
    pub pressure: f64,
    /// Observation time as reported upstream (GMT, `YYYY-MM-DDTHH:MM`)
    pub time: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// Upstream definition for Open-Meteo current weather
#[derive(Debug, Clone)]
pub struct OpenMeteo {
    base_url: String,
}

impl Default for OpenMeteo {
    fn default() -> Self {
        Self::new()
    }
}

impl OpenMeteo {
    pub fn new() -> Self {
        Self {
            base_url: OPEN_METEO_BASE_URL.to_string(),
        }
    }

    /// Points the upstream at a different host, e.g. a mock server
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Parses an Open-Meteo payload for the given coordinates
    ///
    /// The requested coordinates are reported rather than the grid point
    /// echoed by the API, so cached and live answers are identical.
    pub fn parse_response(
        &self,
        body: &[u8],
        coords: &Coordinates,
    ) -> Result<CurrentWeather, FetchError> {
        let response: OpenMeteoResponse = serde_json::from_slice(body)?;
        let current = response.current;
        let units = response.current_units.unwrap_or_default();

        let direction = current.wind_direction_10m.unwrap_or(0.0).round() as i32;
        let code = current.weather_code.unwrap_or(0);

        Ok(CurrentWeather {
            temperature: current.temperature_2m,
            temperature_unit: units
                .temperature_2m
                .unwrap_or_else(|| DEFAULT_TEMPERATURE_UNIT.to_string()),
            apparent_temperature: current.apparent_temperature,
            windspeed: current.wind_speed_10m.unwrap_or(0.0),
            windspeed_unit: units
                .wind_speed_10m
                .unwrap_or_else(|| DEFAULT_WINDSPEED_UNIT.to_string()),
            wind_direction_10m: direction,
            wind_direction_name: wind_direction_name(direction).to_string(),
            weather_code: code,
            weather_description: weather_description(code).to_string(),
            is_day: current.is_day.unwrap_or(0) != 0,
            precipitation: current.precipitation.unwrap_or(0.0),
            precipitation_unit: PRECIPITATION_UNIT.to_string(),
            humidity: current.relative_humidity_2m.unwrap_or(0.0),
            pressure: current.surface_pressure.unwrap_or(0.0),
            time: current.time.unwrap_or_default(),
            latitude: coords.latitude,
            longitude: coords.longitude,
        })
    }
}

impl Upstream for OpenMeteo {
    type Params = Coordinates;
    type Output = CurrentWeather;

    const NAME: &'static str = "open-meteo";

    fn validate(&self, params: &Coordinates) -> Result<(), FetchError> {
        params.validate()
    }

    fn cache_input(&self, params: &Coordinates) -> String {
        format!("weather_{:.6}_{:.6}", params.latitude, params.longitude)
    }

    fn url(&self, params: &Coordinates) -> String {
        format!(
            "{}?latitude={:.6}&longitude={:.6}&current={}&timezone=GMT",
            self.base_url, params.latitude, params.longitude, CURRENT_FIELDS
        )
    }

    fn parse(&self, body: &[u8], params: &Coordinates) -> Result<CurrentWeather, FetchError> {
        self.parse_response(body, params)
    }
}

/// Text description of a WMO weather interpretation code
///
/// Codes from WMO (World Meteorological Organization):
/// - 0-3: Clear to overcast
/// - 45, 48: Fog
/// - 51-55: Drizzle
/// - 61-65: Rain
/// - 71-77: Snow
/// - 80-86: Showers
/// - 95-99: Thunderstorm
pub fn weather_description(code: i32) -> &'static str {
    match code {
        0 => "Clear sky",
        1 => "Mainly clear",
        2 => "Partly cloudy",
        3 => "Overcast",
        45 => "Fog",
        48 => "Depositing rime fog",
        51 => "Light drizzle",
        53 => "Moderate drizzle",
        55 => "Dense drizzle",
        61 => "Slight rain",
        63 => "Moderate rain",
        65 => "Heavy rain",
        71 => "Slight snow",
        73 => "Moderate snow",
        75 => "Heavy snow",
        77 => "Snow grains",
        80 => "Slight rain showers",
        81 => "Moderate rain showers",
        82 => "Violent rain showers",
        85 => "Slight snow showers",
        86 => "Heavy snow showers",
        95 => "Thunderstorm",
        96 => "Thunderstorm with slight hail",
        99 => "Thunderstorm with heavy hail",
        _ => "Unknown",
    }
}

const COMPASS_POINTS: [&str; 16] = [
    "North",
    "North-Northeast",
    "Northeast",
    "East-Northeast",
    "East",
    "East-Southeast",
    "Southeast",
    "South-Southeast",
    "South",
    "South-Southwest",
    "Southwest",
    "West-Southwest",
    "West",
    "West-Northwest",
    "Northwest",
    "North-Northwest",
];

/// 16-point compass name for a wind direction in degrees
///
/// Each point covers a 22.5° sector centred on its bearing. Any integer is
/// accepted and wrapped into `0..360`.
pub fn wind_direction_name(degrees: i32) -> &'static str {
    let degrees = f64::from(degrees.rem_euclid(360));
    let sector = ((degrees + 11.25) / 22.5) as usize % COMPASS_POINTS.len();
    COMPASS_POINTS[sector]
}

/// Open-Meteo API response structure
#[derive(Debug, Deserialize)]
struct OpenMeteoResponse {
    current_units: Option<CurrentUnits>,
    current: CurrentBlock,
}

#[derive(Debug, Default, Deserialize)]
struct CurrentUnits {
    temperature_2m: Option<String>,
    wind_speed_10m: Option<String>,
}

/// Current weather block from Open-Meteo
#[derive(Debug, Deserialize)]
struct CurrentBlock {
    time: Option<String>,
    temperature_2m: f64,
    relative_humidity_2m: Option<f64>,
    apparent_temperature: Option<f64>,
    is_day: Option<i32>,
    precipitation: Option<f64>,
    weather_code: Option<i32>,
    surface_pressure: Option<f64>,
    wind_speed_10m: Option<f64>,
    wind_direction_10m: Option<f64>,
}
