//! Command-line interface parsing for the Just Weather server
//!
//! Flags are parsed with clap (with environment variable fallbacks) and then
//! folded into a validated [`ServerConfig`].

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser};
use directories::ProjectDirs;
use thiserror::Error;

/// Default listen address
pub const DEFAULT_BIND: &str = "127.0.0.1:10680";

/// Default cache lifetimes in seconds
pub const DEFAULT_WEATHER_TTL: u64 = 900;
pub const DEFAULT_GEO_TTL: u64 = 604_800;
pub const DEFAULT_PRICES_TTL: u64 = 604_800;

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Upper bound the geocoding API accepts for `count`
pub const MAX_RESULTS_LIMIT: usize = 100;

/// Error types for CLI argument validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CliError {
    #[error("Invalid timeout: must be at least 1 second")]
    InvalidTimeout,

    #[error("Invalid max results: {0} (expected 1..=100)")]
    InvalidMaxResults(usize),

    #[error("Invalid language: must not be empty")]
    InvalidLanguage,
}

/// Just Weather - cached weather, geocoding and electricity price API
#[derive(Parser, Debug)]
#[command(name = "just-weather")]
#[command(about = "JSON API for cached weather, city search and electricity prices")]
#[command(version)]
pub struct Cli {
    /// Address to listen on
    #[arg(long, env = "JUST_WEATHER_BIND", default_value = DEFAULT_BIND)]
    pub bind: SocketAddr,

    /// Root directory for the file caches (defaults to the user cache dir)
    #[arg(long, env = "JUST_WEATHER_CACHE_DIR", value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Disable all file caches (the env var takes 1/0, yes/no, on/off)
    #[arg(
        long,
        env = "JUST_WEATHER_NO_CACHE",
        action = ArgAction::SetTrue,
        value_parser = BoolishValueParser::new()
    )]
    pub no_cache: bool,

    /// Weather cache lifetime in seconds
    #[arg(long, env = "JUST_WEATHER_WEATHER_TTL", default_value_t = DEFAULT_WEATHER_TTL)]
    pub weather_ttl: u64,

    /// Geocoding cache lifetime in seconds
    #[arg(long, env = "JUST_WEATHER_GEO_TTL", default_value_t = DEFAULT_GEO_TTL)]
    pub geo_ttl: u64,

    /// Electricity price cache lifetime in seconds
    #[arg(long, env = "JUST_WEATHER_PRICES_TTL", default_value_t = DEFAULT_PRICES_TTL)]
    pub prices_ttl: u64,

    /// Upstream request timeout in seconds
    #[arg(long, env = "JUST_WEATHER_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout_secs: u64,

    /// Language for geocoding results
    #[arg(long, env = "JUST_WEATHER_LANGUAGE", default_value = "en")]
    pub language: String,

    /// Maximum number of geocoding results per search
    #[arg(long, env = "JUST_WEATHER_MAX_RESULTS", default_value_t = 10)]
    pub max_results: usize,
}

/// Runtime configuration derived from CLI arguments
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    /// Parent of `weather_cache/`, `geo_cache/` and `prices_cache/`
    pub cache_dir: PathBuf,
    pub cache_enabled: bool,
    pub weather_ttl: u64,
    pub geo_ttl: u64,
    pub prices_ttl: u64,
    pub timeout: Duration,
    pub language: String,
    pub max_results: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 10680)),
            cache_dir: default_cache_dir(),
            cache_enabled: true,
            weather_ttl: DEFAULT_WEATHER_TTL,
            geo_ttl: DEFAULT_GEO_TTL,
            prices_ttl: DEFAULT_PRICES_TTL,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            language: "en".to_string(),
            max_results: 10,
        }
    }
}

impl ServerConfig {
    /// Creates a ServerConfig from parsed CLI arguments.
    ///
    /// # Returns
    /// * `Ok(ServerConfig)` with the validated settings
    /// * `Err(CliError)` if a value is out of range
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        if cli.timeout_secs == 0 {
            return Err(CliError::InvalidTimeout);
        }
        if cli.max_results == 0 || cli.max_results > MAX_RESULTS_LIMIT {
            return Err(CliError::InvalidMaxResults(cli.max_results));
        }
        let language = cli.language.trim();
        if language.is_empty() {
            return Err(CliError::InvalidLanguage);
        }

        Ok(ServerConfig {
            bind: cli.bind,
            cache_dir: cli.cache_dir.clone().unwrap_or_else(default_cache_dir),
            cache_enabled: !cli.no_cache,
            weather_ttl: cli.weather_ttl,
            geo_ttl: cli.geo_ttl,
            prices_ttl: cli.prices_ttl,
            timeout: Duration::from_secs(cli.timeout_secs),
            language: language.to_string(),
            max_results: cli.max_results,
        })
    }
}

/// Per-user cache directory, or `./cache` when none can be determined
pub fn default_cache_dir() -> PathBuf {
    ProjectDirs::from("", "", "just-weather")
        .map(|dirs| dirs.cache_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("./cache"))
}
