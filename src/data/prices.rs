//! Swedish electricity spot prices from elprisetjustnu.se
//!
//! One request covers one calendar day in one price area. The upstream
//! answers with an array of intervals (hourly, or quarter-hourly for newer
//! dates) that is summarised into [`DayPrices`].

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

use super::client::Upstream;
use super::FetchError;

/// Base URL for the elprisetjustnu.se price API
pub const ELPRIS_BASE_URL: &str = "https://www.elprisetjustnu.se/api/v1/prices";

/// Swedish electricity price area
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PriceArea {
    /// Luleå, northern Sweden
    SE1,
    /// Sundsvall, northern central Sweden
    SE2,
    /// Stockholm, southern central Sweden
    SE3,
    /// Malmö, southern Sweden
    SE4,
}

impl PriceArea {
    pub const ALL: [PriceArea; 4] = [PriceArea::SE1, PriceArea::SE2, PriceArea::SE3, PriceArea::SE4];

    pub fn as_str(&self) -> &'static str {
        match self {
            PriceArea::SE1 => "SE1",
            PriceArea::SE2 => "SE2",
            PriceArea::SE3 => "SE3",
            PriceArea::SE4 => "SE4",
        }
    }
}

impl fmt::Display for PriceArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PriceArea {
    type Err = FetchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        PriceArea::ALL
            .into_iter()
            .find(|area| area.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                FetchError::InvalidParameters(format!(
                    "unknown price area '{}', expected one of SE1, SE2, SE3, SE4",
                    s
                ))
            })
    }
}

/// Which day and area to fetch prices for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceQuery {
    pub date: NaiveDate,
    pub area: PriceArea,
}

impl PriceQuery {
    pub fn new(date: NaiveDate, area: PriceArea) -> Self {
        Self { date, area }
    }

    /// Builds a query from textual `YYYY-MM-DD` date and area code
    pub fn parse(date: &str, area: &str) -> Result<Self, FetchError> {
        let date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d").map_err(|_| {
            FetchError::InvalidParameters(format!("date must be YYYY-MM-DD, got '{}'", date))
        })?;
        Ok(Self::new(date, area.parse()?))
    }
}

/// One price interval as published upstream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    #[serde(rename = "SEK_per_kWh")]
    pub sek_per_kwh: f64,
    #[serde(rename = "EUR_per_kWh")]
    pub eur_per_kwh: f64,
    /// SEK per EUR exchange rate used for the conversion
    #[serde(rename = "EXR")]
    pub exchange_rate: f64,
    pub time_start: DateTime<FixedOffset>,
    pub time_end: DateTime<FixedOffset>,
}

/// All price intervals of one day in one area, with summary figures
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayPrices {
    pub date: NaiveDate,
    pub area: PriceArea,
    pub points: Vec<PricePoint>,
    /// Cheapest interval in SEK/kWh, `None` for an empty day
    pub min_sek_per_kwh: Option<f64>,
    pub max_sek_per_kwh: Option<f64>,
    pub avg_sek_per_kwh: Option<f64>,
}

impl DayPrices {
    pub fn new(query: &PriceQuery, points: Vec<PricePoint>) -> Self {
        let prices = || points.iter().map(|p| p.sek_per_kwh);
        let min = prices().reduce(f64::min);
        let max = prices().reduce(f64::max);
        let avg = if points.is_empty() {
            None
        } else {
            Some(prices().sum::<f64>() / points.len() as f64)
        };

        Self {
            date: query.date,
            area: query.area,
            min_sek_per_kwh: min,
            max_sek_per_kwh: max,
            avg_sek_per_kwh: avg,
            points,
        }
    }

    /// Interval covering `instant`, if any
    pub fn price_at(&self, instant: DateTime<FixedOffset>) -> Option<&PricePoint> {
        self.points
            .iter()
            .find(|p| p.time_start <= instant && instant < p.time_end)
    }
}

/// Upstream definition for the elprisetjustnu.se day files
#[derive(Debug, Clone)]
pub struct ElprisUpstream {
    base_url: String,
}

impl Default for ElprisUpstream {
    fn default() -> Self {
        Self::new()
    }
}

impl ElprisUpstream {
    pub fn new() -> Self {
        Self {
            base_url: ELPRIS_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

impl Upstream for ElprisUpstream {
    type Params = PriceQuery;
    type Output = DayPrices;

    const NAME: &'static str = "elpris";

    fn validate(&self, _query: &PriceQuery) -> Result<(), FetchError> {
        // Both fields are already typed
        Ok(())
    }

    fn cache_input(&self, query: &PriceQuery) -> String {
        format!("prices_{}_{}", query.date.format("%Y-%m-%d"), query.area)
    }

    fn url(&self, query: &PriceQuery) -> String {
        format!(
            "{}/{:04}/{:02}-{:02}_{}.json",
            self.base_url,
            query.date.year(),
            query.date.month(),
            query.date.day(),
            query.area
        )
    }

    fn parse(&self, body: &[u8], query: &PriceQuery) -> Result<DayPrices, FetchError> {
        let points: Vec<PricePoint> = serde_json::from_slice(body)?;
        Ok(DayPrices::new(query, points))
    }
}
