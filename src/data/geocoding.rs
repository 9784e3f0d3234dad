//! Open-Meteo geocoding: place name search
//!
//! [`GeocodingUpstream`] describes the HTTP side. [`Geocoder`] wraps the
//! cache-backed client and adds the result-shaping helpers used by the API:
//! region filtering, best-match selection and the tiered autocomplete.

use serde::{Deserialize, Serialize};

use super::cities::{search_popular_cities, PopularCity};
use super::client::{CachePolicy, ExternalDataClient, Upstream};
use super::FetchError;

/// Base URL for the Open-Meteo geocoding API
pub const GEOCODING_BASE_URL: &str = "https://geocoding-api.open-meteo.com/v1/search";

/// Shortest accepted search term, counted in characters after trimming
pub const MIN_QUERY_LENGTH: usize = 2;

pub const DEFAULT_MAX_RESULTS: usize = 10;
pub const DEFAULT_LANGUAGE: &str = "en";

/// One geocoding match
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Place {
    #[serde(default)]
    pub id: u64,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub country_code: String,
    /// First-level administrative area (state, province, county)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin2: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub population: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
}

impl Place {
    fn population_or_zero(&self) -> u64 {
        self.population.unwrap_or(0)
    }
}

impl From<&PopularCity> for Place {
    fn from(city: &PopularCity) -> Self {
        Place {
            id: 0,
            name: city.name.to_string(),
            latitude: city.latitude,
            longitude: city.longitude,
            country: city.country.to_string(),
            country_code: city.country_code.to_string(),
            population: Some(city.population),
            ..Place::default()
        }
    }
}

/// Upstream definition for the geocoding search endpoint
///
/// The cache slot depends on the place name only, so language and result
/// count changes do not fragment the cache.
#[derive(Debug, Clone)]
pub struct GeocodingUpstream {
    base_url: String,
    language: String,
    max_results: usize,
}

impl Default for GeocodingUpstream {
    fn default() -> Self {
        Self::new()
    }
}

impl GeocodingUpstream {
    pub fn new() -> Self {
        Self {
            base_url: GEOCODING_BASE_URL.to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
            max_results: DEFAULT_MAX_RESULTS,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn max_results(&self) -> usize {
        self.max_results
    }
}

#[derive(Debug, Deserialize)]
struct GeocodingResponse {
    #[serde(default)]
    results: Option<Vec<Place>>,
}

impl Upstream for GeocodingUpstream {
    type Params = String;
    type Output = Vec<Place>;

    const NAME: &'static str = "geocoding";

    fn validate(&self, name: &String) -> Result<(), FetchError> {
        if name.trim().chars().count() < MIN_QUERY_LENGTH {
            return Err(FetchError::InvalidParameters(format!(
                "place name must be at least {} characters",
                MIN_QUERY_LENGTH
            )));
        }
        Ok(())
    }

    fn cache_input(&self, name: &String) -> String {
        name.clone()
    }

    fn url(&self, name: &String) -> String {
        format!(
            "{}?name={}&count={}&language={}&format=json",
            self.base_url,
            urlencoding::encode(name.trim()),
            self.max_results,
            urlencoding::encode(&self.language)
        )
    }

    fn parse(&self, body: &[u8], _name: &String) -> Result<Vec<Place>, FetchError> {
        let response: GeocodingResponse = serde_json::from_slice(body)?;
        Ok(response.results.unwrap_or_default())
    }
}

/// Where an autocomplete answer came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CitySource {
    Popular,
    Cache,
    Live,
}

/// Result of [`Geocoder::search_smart`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CitySearch {
    pub source: CitySource,
    pub results: Vec<Place>,
}

/// Place search with cache-aware variants and result helpers
pub struct Geocoder {
    client: ExternalDataClient<GeocodingUpstream>,
}

impl Geocoder {
    pub fn new(client: ExternalDataClient<GeocodingUpstream>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ExternalDataClient<GeocodingUpstream> {
        &self.client
    }

    /// Searches by name, reading and writing the cache
    pub fn search(&self, name: &str) -> Result<Vec<Place>, FetchError> {
        self.client
            .fetch_with_policy(&name.to_string(), CachePolicy::ReadWrite)
    }

    /// Searches by name using existing cache entries but never creating any
    pub fn search_readonly_cache(&self, name: &str) -> Result<Vec<Place>, FetchError> {
        self.client
            .fetch_with_policy(&name.to_string(), CachePolicy::ReadOnly)
    }

    /// Searches by name straight against the upstream
    pub fn search_no_cache(&self, name: &str) -> Result<Vec<Place>, FetchError> {
        self.client
            .fetch_with_policy(&name.to_string(), CachePolicy::Bypass)
    }

    /// Searches by name and narrows the matches to a region
    ///
    /// `region` is matched case-insensitively as a substring of `admin1` or
    /// `admin2`, with `_` and `+` read as spaces. When nothing matches, all
    /// results are returned unfiltered.
    pub fn search_detailed(
        &self,
        name: &str,
        region: Option<&str>,
    ) -> Result<Vec<Place>, FetchError> {
        let results = self.search(name)?;
        Ok(match region {
            Some(region) => filter_by_region(results, region),
            None => results,
        })
    }

    /// Resolves a place name to the single best match
    ///
    /// # Returns
    /// * `Ok(Some(Place))` - the preferred match for `country`
    /// * `Ok(None)` - the upstream knows no place by that name
    /// * `Err(FetchError)` - validation or upstream failure
    pub fn locate(
        &self,
        name: &str,
        region: Option<&str>,
        country: Option<&str>,
    ) -> Result<Option<Place>, FetchError> {
        let results = self.search_detailed(name, region)?;
        Ok(best_result(&results, country).cloned())
    }

    /// Autocomplete search in three tiers
    ///
    /// 1. the static popular-cities table (prefix match)
    /// 2. an existing valid cache entry for the exact query
    /// 3. a live upstream call that does not write the cache
    pub fn search_smart(&self, query: &str) -> Result<CitySearch, FetchError> {
        let query = query.to_string();
        self.client.upstream().validate(&query)?;

        let popular = search_popular_cities(&query, self.client.upstream().max_results());
        if !popular.is_empty() {
            tracing::debug!(query = %query, count = popular.len(), "popular cities hit");
            return Ok(CitySearch {
                source: CitySource::Popular,
                results: popular.into_iter().map(Place::from).collect(),
            });
        }

        if let Some(results) = self.client.cached(&query) {
            if !results.is_empty() {
                return Ok(CitySearch {
                    source: CitySource::Cache,
                    results,
                });
            }
        }

        let results = self.search_no_cache(&query)?;
        Ok(CitySearch {
            source: CitySource::Live,
            results,
        })
    }
}

/// Keeps the places whose `admin1`/`admin2` contain `region`
///
/// Returns the input unchanged if the region is blank or matches nothing.
pub fn filter_by_region(results: Vec<Place>, region: &str) -> Vec<Place> {
    let needle: String = region
        .trim()
        .chars()
        .map(|c| if matches!(c, '_' | '+') { ' ' } else { c })
        .collect::<String>()
        .to_lowercase();
    if needle.is_empty() {
        return results;
    }

    let matches_region = |admin: &Option<String>| {
        admin
            .as_deref()
            .map(|a| a.to_lowercase().contains(&needle))
            .unwrap_or(false)
    };

    let filtered: Vec<Place> = results
        .iter()
        .filter(|p| matches_region(&p.admin1) || matches_region(&p.admin2))
        .cloned()
        .collect();

    if filtered.is_empty() {
        tracing::debug!(region, "no results match region, keeping all");
        results
    } else {
        filtered
    }
}

/// Picks the preferred place among `results`
///
/// With a country hint, the most populous exact country-code match wins,
/// then the most populous country-name match (case-insensitive, substring
/// allowed). Otherwise, or if nothing matched, the most populous result
/// wins. Ties keep the earlier result.
pub fn best_result<'a>(results: &'a [Place], country: Option<&str>) -> Option<&'a Place> {
    if let Some(country) = country.map(str::trim).filter(|c| !c.is_empty()) {
        let by_code = most_populous(
            results
                .iter()
                .filter(|p| !p.country_code.is_empty())
                .filter(|p| p.country_code.eq_ignore_ascii_case(country)),
        );
        if by_code.is_some() {
            return by_code;
        }

        let wanted = country.to_lowercase();
        let by_name = most_populous(
            results
                .iter()
                .filter(|p| !p.country.is_empty())
                .filter(|p| p.country.to_lowercase().contains(&wanted)),
        );
        if by_name.is_some() {
            return by_name;
        }
    }

    most_populous(results.iter())
}

fn most_populous<'a>(places: impl Iterator<Item = &'a Place>) -> Option<&'a Place> {
    let mut best: Option<&'a Place> = None;
    for place in places {
        match best {
            Some(b) if place.population_or_zero() <= b.population_or_zero() => {}
            _ => best = Some(place),
        }
    }
    best
}

/// Human-readable one-liner: `"Name, Admin1, Country (lat, lon)"`
///
/// The admin part is omitted when unknown.
pub fn format_place(place: &Place) -> String {
    let mut out = place.name.clone();
    if let Some(admin1) = place.admin1.as_deref().filter(|a| !a.is_empty()) {
        out.push_str(", ");
        out.push_str(admin1);
    }
    out.push_str(", ");
    out.push_str(&place.country);
    out.push_str(&format!(" ({:.4}, {:.4})", place.latitude, place.longitude));
    out
}
