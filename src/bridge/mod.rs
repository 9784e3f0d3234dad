//! Blocking fetch facade over a callback-driven HTTP client
//!
//! The upstream clients want a plain `get(url) -> bytes` call, but the HTTP
//! primitive underneath only accepts a completion callback and makes progress
//! when a cooperative scheduler is ticked. This module defines those two
//! collaborators as traits and provides the bridge between the two worlds,
//! plus tokio/reqwest-backed implementations of the collaborators.

mod runtime;
mod sync_fetch;

use std::time::Duration;

pub use runtime::{ReqwestHttpClient, RuntimeScheduler};
pub use sync_fetch::{BridgeError, SyncFetchBridge, DEFAULT_TIMEOUT};

/// Outcome delivered to a fetch callback, exactly once per request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchEvent {
    /// The upstream answered successfully with this body
    Response(Vec<u8>),
    /// Network or protocol failure
    Error(String),
    /// The client gave up waiting for the upstream
    Timeout,
}

/// Completion callback handed to [`HttpClient::get`]
pub type FetchCallback = Box<dyn FnOnce(FetchEvent) + Send + 'static>;

/// Non-blocking HTTP GET primitive
///
/// Implementations must invoke `callback` at most once. They may invoke it
/// synchronously from inside `get`, from inside [`Scheduler::tick`], or from
/// another thread entirely.
pub trait HttpClient: Send + Sync {
    fn get(&self, url: &str, timeout: Duration, callback: FetchCallback);
}

/// Cooperative scheduler that must be ticked for pending work to progress
pub trait Scheduler: Send + Sync {
    /// Runs one slice of pending work
    ///
    /// `now_ms` is a monotonic timestamp in milliseconds, or `None` when the
    /// caller has no monotonic clock to offer.
    fn tick(&self, now_ms: Option<u64>);
}
