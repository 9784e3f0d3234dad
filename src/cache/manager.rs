//! Keyed file cache for persisting raw upstream payloads to disk
//!
//! Provides a `KeyedFileCache` that stores opaque byte payloads under an MD5
//! digest of a normalized input string. Entry age is taken from the file's
//! modification time, so no separate metadata is written next to the payload.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use thiserror::Error;

/// File suffix shared by every cache entry
pub const ENTRY_SUFFIX: &str = ".json";

/// Length of a rendered cache key (128-bit digest as lowercase hex)
pub const KEY_LENGTH: usize = 32;

/// Errors reported by cache operations
///
/// Callers on the standard fetch path treat every variant as a cache miss;
/// none of them is surfaced to API users.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Key derivation was asked to hash an empty string
    #[error("cannot derive a cache key from empty input")]
    EmptyInput,

    /// No entry exists for the key (or the cache is disabled)
    #[error("cache entry not found")]
    NotFound,

    /// The entry exists but is older than the configured TTL
    #[error("cache entry expired")]
    Expired,

    /// Directory or file access failed
    #[error("cache I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Configuration for one logical cache (weather, geocoding, prices)
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Directory holding this cache's entries
    pub cache_dir: PathBuf,
    /// Maximum entry age
    pub ttl: Duration,
    /// When false every read misses and every write is a silent no-op
    pub enabled: bool,
}

impl CacheConfig {
    pub fn new(cache_dir: impl Into<PathBuf>, ttl_seconds: u64) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            ttl: Duration::from_secs(ttl_seconds),
            enabled: true,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Durable, TTL-bounded key to bytes store
///
/// Entries live as `<hex_key>.json` in a single flat directory. Validity is
/// recomputed from the filesystem on every call and never remembered in
/// memory, so several instances may safely point at the same directory.
/// Writes overwrite in place; concurrent writers to one key race and the
/// last write wins.
#[derive(Debug, Clone)]
pub struct KeyedFileCache {
    config: CacheConfig,
}

impl KeyedFileCache {
    /// Creates a cache instance, creating its directory if needed
    ///
    /// Directory creation failure is only logged: reads will miss and
    /// writes will report I/O errors, neither of which fails a fetch.
    pub fn new(config: CacheConfig) -> Self {
        if let Err(e) = fs::create_dir_all(&config.cache_dir) {
            tracing::warn!(
                dir = %config.cache_dir.display(),
                error = %e,
                "failed to create cache directory"
            );
        }
        Self { config }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Normalizes caller-supplied text so formatting differences share a key
    ///
    /// Lower-cases ASCII letters, collapses runs of space, tab, `+` and `_`
    /// into a single `_`, and drops leading and trailing separators.
    ///
    /// # Example
    /// `"  New+York__City "` becomes `"new_york_city"`.
    pub fn normalize(input: &str) -> String {
        let mut out = String::with_capacity(input.len());
        let mut pending_sep = false;

        for c in input.chars() {
            if matches!(c, ' ' | '\t' | '+' | '_') {
                pending_sep = !out.is_empty();
                continue;
            }
            if pending_sep {
                out.push('_');
                pending_sep = false;
            }
            out.push(c.to_ascii_lowercase());
        }

        out
    }

    /// Derives the fixed-width hex key for an (already normalized) input
    ///
    /// # Returns
    /// * `Ok(String)` - 32 lowercase hex characters
    /// * `Err(CacheError::EmptyInput)` - if `input` is empty
    pub fn derive_key(input: &str) -> Result<String, CacheError> {
        if input.is_empty() {
            return Err(CacheError::EmptyInput);
        }
        Ok(format!("{:x}", md5::compute(input.as_bytes())))
    }

    /// Normalizes then derives a key in one step
    pub fn cache_key(input: &str) -> Result<String, CacheError> {
        Self::derive_key(&Self::normalize(input))
    }

    /// Returns the on-disk path for a cache key
    pub fn entry_path(&self, key: &str) -> PathBuf {
        self.config.cache_dir.join(format!("{}{}", key, ENTRY_SUFFIX))
    }

    /// Returns true if an entry exists for `key` and is within the TTL
    ///
    /// A disabled cache always reports invalid.
    pub fn is_valid(&self, key: &str) -> bool {
        self.is_valid_at(key, SystemTime::now())
    }

    /// Same as [`is_valid`](Self::is_valid) but evaluated at a given instant
    pub fn is_valid_at(&self, key: &str, now: SystemTime) -> bool {
        if !self.config.enabled || key.is_empty() {
            return false;
        }
        match entry_age(&self.entry_path(key), now) {
            Some(age) => age <= self.config.ttl,
            None => false,
        }
    }

    /// Loads the raw payload for `key`, checking the TTL first
    ///
    /// # Returns
    /// * `Ok(Vec<u8>)` - the bytes exactly as saved
    /// * `Err(CacheError::NotFound)` - no entry, or the cache is disabled
    /// * `Err(CacheError::Expired)` - the entry is older than the TTL
    /// * `Err(CacheError::Io)` - the entry is empty or unreadable
    pub fn load(&self, key: &str) -> Result<Vec<u8>, CacheError> {
        if !self.config.enabled {
            return Err(CacheError::NotFound);
        }
        let path = self.entry_path(key);
        match entry_age(&path, SystemTime::now()) {
            None => return Err(CacheError::NotFound),
            Some(age) if age > self.config.ttl => return Err(CacheError::Expired),
            Some(_) => {}
        }
        read_entry(&path)
    }

    /// Loads the raw payload for `key` without looking at its age
    ///
    /// Meant for cache warming and inspection; the fetch path always goes
    /// through [`is_valid`](Self::is_valid) and [`load`](Self::load).
    pub fn load_raw(&self, key: &str) -> Result<Vec<u8>, CacheError> {
        read_entry(&self.entry_path(key))
    }

    /// Writes `data` under `key`, replacing any previous entry
    ///
    /// A disabled cache reports success without touching the filesystem.
    pub fn save(&self, key: &str, data: &[u8]) -> Result<(), CacheError> {
        if !self.config.enabled {
            return Ok(());
        }
        fs::create_dir_all(&self.config.cache_dir)?;
        fs::write(self.entry_path(key), data)?;
        Ok(())
    }

    /// Deletes the entry for `key`; a missing entry is not an error
    pub fn invalidate(&self, key: &str) -> Result<(), CacheError> {
        match fs::remove_file(self.entry_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Deletes every `*.json` entry in the cache directory
    ///
    /// Other files are left alone and a missing directory counts as already
    /// clear. Removal keeps going past individual failures and reports the
    /// last one.
    pub fn clear(&self) -> Result<(), CacheError> {
        let entries = match fs::read_dir(&self.config.cache_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        let mut last_error = None;
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    last_error = Some(e);
                    continue;
                }
            };
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.len() <= ENTRY_SUFFIX.len() || !name.ends_with(ENTRY_SUFFIX) {
                continue;
            }
            if let Err(e) = fs::remove_file(entry.path()) {
                last_error = Some(e);
            }
        }

        match last_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }
}

/// Age of the file at `path` relative to `now`, or `None` if it is missing
///
/// Modification times in the future count as age zero.
fn entry_age(path: &Path, now: SystemTime) -> Option<Duration> {
    let modified = fs::metadata(path).and_then(|m| m.modified()).ok()?;
    Some(now.duration_since(modified).unwrap_or(Duration::ZERO))
}

fn read_entry(path: &Path) -> Result<Vec<u8>, CacheError> {
    match fs::read(path) {
        Ok(bytes) if bytes.is_empty() => Err(CacheError::Io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "cache entry is empty",
        ))),
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(CacheError::NotFound),
        Err(e) => Err(e.into()),
    }
}
