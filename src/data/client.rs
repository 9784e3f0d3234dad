//! Cache-backed client shared by every upstream
//!
//! Flow for one request: validate parameters, derive the cache key from the
//! parameters alone, serve a valid cached payload if it parses, otherwise
//! fetch through the bridge, parse, and write the raw bytes back.

use std::sync::Arc;

use crate::bridge::SyncFetchBridge;
use crate::cache::KeyedFileCache;

use super::FetchError;

/// One external data source: how to validate, key, locate and parse it
pub trait Upstream: Send + Sync {
    /// Value object describing what is requested
    type Params;
    /// Typed result handed back to callers
    type Output;

    /// Short name used in log lines
    const NAME: &'static str;

    /// Rejects missing or malformed fields before any I/O happens
    fn validate(&self, params: &Self::Params) -> Result<(), FetchError>;

    /// Canonical string the cache key is derived from
    ///
    /// Must depend on the logical request only, never on the URL or on
    /// anything that varies between attempts.
    fn cache_input(&self, params: &Self::Params) -> String;

    /// Upstream URL with percent-escaped query values
    fn url(&self, params: &Self::Params) -> String;

    /// Parses a raw payload, whether cached or live
    fn parse(&self, body: &[u8], params: &Self::Params) -> Result<Self::Output, FetchError>;
}

/// How a fetch may use the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CachePolicy {
    /// Read valid entries and write back fresh payloads
    #[default]
    ReadWrite,
    /// Read valid entries but never write, for noisy autocomplete queries
    ReadOnly,
    /// Skip the cache entirely
    Bypass,
}

/// Composes a [`KeyedFileCache`] and a [`SyncFetchBridge`] for one upstream
pub struct ExternalDataClient<U: Upstream> {
    upstream: U,
    cache: KeyedFileCache,
    bridge: Arc<SyncFetchBridge>,
    policy: CachePolicy,
}

impl<U: Upstream> ExternalDataClient<U> {
    pub fn new(upstream: U, cache: KeyedFileCache, bridge: Arc<SyncFetchBridge>) -> Self {
        Self {
            upstream,
            cache,
            bridge,
            policy: CachePolicy::default(),
        }
    }

    /// Sets the policy used by [`fetch`](Self::fetch)
    pub fn with_policy(mut self, policy: CachePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn upstream(&self) -> &U {
        &self.upstream
    }

    pub fn cache(&self) -> &KeyedFileCache {
        &self.cache
    }

    /// Cache key for `params`, or `None` if no key can be derived
    pub fn cache_key(&self, params: &U::Params) -> Option<String> {
        match KeyedFileCache::cache_key(&self.upstream.cache_input(params)) {
            Ok(key) => Some(key),
            Err(e) => {
                tracing::warn!(upstream = U::NAME, error = %e, "cannot derive cache key");
                None
            }
        }
    }

    /// Returns a valid cached answer without touching the network
    ///
    /// Invalid parameters, missing or expired entries and unreadable
    /// payloads all yield `None`.
    pub fn cached(&self, params: &U::Params) -> Option<U::Output> {
        self.upstream.validate(params).ok()?;
        let key = self.cache_key(params)?;
        self.read_cached(&key, params)
    }

    /// Fetches with the client's default policy
    pub fn fetch(&self, params: &U::Params) -> Result<U::Output, FetchError> {
        self.fetch_with_policy(params, self.policy)
    }

    /// Fetches with an explicit cache policy
    ///
    /// # Returns
    /// * `Ok(U::Output)` - from a valid cache entry or a live fetch
    /// * `Err(FetchError::InvalidParameters)` - before any cache or network I/O
    /// * `Err(FetchError::UpstreamTimeout | UpstreamError)` - the live call failed
    /// * `Err(FetchError::ParseError)` - the live payload was malformed
    ///
    /// A cached payload that fails to parse falls through to a live fetch.
    /// Cache write failures are logged and do not fail the request.
    pub fn fetch_with_policy(
        &self,
        params: &U::Params,
        policy: CachePolicy,
    ) -> Result<U::Output, FetchError> {
        self.upstream.validate(params)?;

        let key = match policy {
            CachePolicy::Bypass => None,
            CachePolicy::ReadWrite | CachePolicy::ReadOnly => self.cache_key(params),
        };

        if let Some(key) = key.as_deref() {
            if let Some(output) = self.read_cached(key, params) {
                return Ok(output);
            }
        }

        let url = self.upstream.url(params);
        tracing::info!(upstream = U::NAME, %url, "fetching from upstream");

        let body = self.bridge.get(&url).map_err(|e| {
            tracing::warn!(upstream = U::NAME, error = %e, "upstream fetch failed");
            FetchError::from(e)
        })?;

        let output = self.upstream.parse(&body, params).map_err(|e| {
            tracing::warn!(upstream = U::NAME, error = %e, "upstream payload rejected");
            e
        })?;

        if policy == CachePolicy::ReadWrite {
            if let Some(key) = key.as_deref() {
                match self.cache.save(key, &body) {
                    Ok(()) => tracing::debug!(upstream = U::NAME, key, "saved to cache"),
                    Err(e) => {
                        tracing::warn!(upstream = U::NAME, key, error = %e, "cache write failed")
                    }
                }
            }
        }

        Ok(output)
    }

    fn read_cached(&self, key: &str, params: &U::Params) -> Option<U::Output> {
        if !self.cache.is_enabled() {
            tracing::debug!(upstream = U::NAME, "cache disabled");
            return None;
        }
        if !self.cache.is_valid(key) {
            tracing::debug!(upstream = U::NAME, key, "cache MISS");
            return None;
        }

        let bytes = match self.cache.load(key) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(upstream = U::NAME, key, error = %e, "cache load failed");
                return None;
            }
        };

        match self.upstream.parse(&bytes, params) {
            Ok(output) => {
                tracing::debug!(upstream = U::NAME, key, "cache HIT");
                Some(output)
            }
            Err(e) => {
                tracing::warn!(
                    upstream = U::NAME,
                    key,
                    error = %e,
                    "cached payload unreadable, fetching live"
                );
                None
            }
        }
    }
}
