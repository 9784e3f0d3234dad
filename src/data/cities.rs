//! Static table of popular cities
//!
//! The first tier of city autocomplete. Lookups here never touch the cache
//! or the network.

use serde::Serialize;

/// A well-known city with enough data to answer an autocomplete query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PopularCity {
    pub name: &'static str,
    pub country: &'static str,
    pub country_code: &'static str,
    pub latitude: f64,
    pub longitude: f64,
    pub population: u64,
}

macro_rules! city {
    ($name:expr, $country:expr, $code:expr, $lat:expr, $lon:expr, $pop:expr) => {
        PopularCity {
            name: $name,
            country: $country,
            country_code: $code,
            latitude: $lat,
            longitude: $lon,
            population: $pop,
        }
    };
}

/// Popular cities, roughly by size
pub static POPULAR_CITIES: [PopularCity; 32] = [
    city!("Tokyo", "Japan", "JP", 35.6895, 139.6917, 8_336_599),
    city!("New York", "United States", "US", 40.7143, -74.0060, 8_175_133),
    city!("London", "United Kingdom", "GB", 51.5085, -0.1257, 7_556_900),
    city!("Berlin", "Germany", "DE", 52.5244, 13.4105, 3_426_354),
    city!("Madrid", "Spain", "ES", 40.4165, -3.7026, 3_255_944),
    city!("Kyiv", "Ukraine", "UA", 50.4547, 30.5238, 2_797_553),
    city!("Rome", "Italy", "IT", 41.8919, 12.5113, 2_318_895),
    city!("Paris", "France", "FR", 48.8534, 2.3488, 2_138_551),
    city!("Bucharest", "Romania", "RO", 44.4323, 26.1063, 1_877_155),
    city!("Budapest", "Hungary", "HU", 47.4980, 19.0399, 1_741_041),
    city!("Warsaw", "Poland", "PL", 52.2298, 21.0118, 1_702_139),
    city!("Hamburg", "Germany", "DE", 53.5753, 10.0153, 1_739_117),
    city!("Vienna", "Austria", "AT", 48.2085, 16.3721, 1_691_468),
    city!("Barcelona", "Spain", "ES", 41.3888, 2.1590, 1_620_343),
    city!("Munich", "Germany", "DE", 48.1374, 11.5755, 1_260_391),
    city!("Prague", "Czechia", "CZ", 50.0880, 14.4208, 1_165_581),
    city!("Milan", "Italy", "IT", 45.4643, 9.1895, 1_236_837),
    city!("Stockholm", "Sweden", "SE", 59.3294, 18.0687, 1_515_017),
    city!("Amsterdam", "Netherlands", "NL", 52.3740, 4.8897, 741_636),
    city!("Vilnius", "Lithuania", "LT", 54.6892, 25.2798, 542_366),
    city!("Copenhagen", "Denmark", "DK", 55.6759, 12.5655, 1_153_615),
    city!("Lviv", "Ukraine", "UA", 49.8383, 24.0232, 717_803),
    city!("Oslo", "Norway", "NO", 59.9127, 10.7461, 580_000),
    city!("Helsinki", "Finland", "FI", 60.1695, 24.9354, 558_457),
    city!("Riga", "Latvia", "LV", 56.9460, 24.1059, 742_572),
    city!("Gothenburg", "Sweden", "SE", 57.7072, 11.9668, 572_799),
    city!("Odesa", "Ukraine", "UA", 46.4775, 30.7326, 1_001_558),
    city!("Malmö", "Sweden", "SE", 55.6059, 13.0007, 301_706),
    city!("Tallinn", "Estonia", "EE", 59.4370, 24.7536, 394_024),
    city!("Uppsala", "Sweden", "SE", 59.8588, 17.6389, 133_117),
    city!("Luleå", "Sweden", "SE", 65.5842, 22.1547, 48_638),
    city!("Kiruna", "Sweden", "SE", 67.8557, 20.2251, 18_154),
];

/// Cities whose name starts with `query`, ignoring case
///
/// Results keep table order and are capped at `limit`. Surrounding
/// whitespace in the query is ignored; an empty query matches nothing.
pub fn search_popular_cities(query: &str, limit: usize) -> Vec<&'static PopularCity> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }

    POPULAR_CITIES
        .iter()
        .filter(|city| city.name.to_lowercase().starts_with(&needle))
        .take(limit)
        .collect()
}

/// Get all popular cities
pub fn all_popular_cities() -> &'static [PopularCity] {
    &POPULAR_CITIES
}
