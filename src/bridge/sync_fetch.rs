//! Synchronous fetch bridge
//!
//! Only one fetch may be registered as active at a time. Calls on the same
//! bridge are serialized behind a mutex, and every call is tagged with a
//! request id so a callback that arrives after its caller gave up cannot
//! write into a later call's context.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use thiserror::Error;

use super::{FetchEvent, HttpClient, Scheduler};

/// Default wall-clock limit for one bridged call
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest the bridge waits for a completion signal between two ticks
const WAIT_SLICE: Duration = Duration::from_millis(2);

/// Errors returned by [`SyncFetchBridge::get`]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// No completion arrived before the timeout, or the client reported one
    #[error("timed out waiting for upstream response")]
    TimedOut,

    /// The client reported a network or protocol error
    #[error("upstream request failed: {0}")]
    Failed(String),
}

/// State correlating one in-flight request with its eventual callback
#[derive(Debug, Default)]
struct FetchContext {
    completed: bool,
    error: Option<BridgeError>,
    payload: Option<Vec<u8>>,
}

impl FetchContext {
    fn record(&mut self, event: FetchEvent) {
        match event {
            FetchEvent::Response(body) => self.payload = Some(body),
            FetchEvent::Error(reason) => self.error = Some(BridgeError::Failed(reason)),
            FetchEvent::Timeout => self.error = Some(BridgeError::TimedOut),
        }
        self.completed = true;
    }
}

#[derive(Debug)]
struct ActiveFetch {
    id: u64,
    context: FetchContext,
}

/// The single active-context slot shared with callbacks
#[derive(Debug, Default)]
struct Slot {
    active: Mutex<Option<ActiveFetch>>,
    signal: Condvar,
}

impl Slot {
    fn deliver(&self, id: u64, event: FetchEvent) {
        let mut active = self.active.lock();
        match active.as_mut() {
            Some(fetch) if fetch.id == id && !fetch.context.completed => {
                fetch.context.record(event);
                self.signal.notify_all();
            }
            _ => tracing::trace!(request_id = id, "dropping callback for inactive fetch"),
        }
    }
}

/// Clears the active registration however the call exits
struct Registration<'a>(&'a Slot);

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        self.0.active.lock().take();
    }
}

/// Blocking `get(url)` on top of an [`HttpClient`] and a [`Scheduler`]
///
/// Each call registers a fresh context, issues the request, then alternates
/// between ticking the scheduler and briefly waiting for the callback until
/// it fires or the timeout elapses. Timeout expiry only ends the wait; the
/// underlying request keeps running and its late callback is dropped.
///
/// The bridge performs no retries.
pub struct SyncFetchBridge {
    client: Arc<dyn HttpClient>,
    scheduler: Arc<dyn Scheduler>,
    slot: Arc<Slot>,
    in_flight: Mutex<()>,
    next_id: AtomicU64,
    timeout: Duration,
    clock_origin: Option<Instant>,
}

impl SyncFetchBridge {
    pub fn new(client: Arc<dyn HttpClient>, scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            client,
            scheduler,
            slot: Arc::new(Slot::default()),
            in_flight: Mutex::new(()),
            next_id: AtomicU64::new(1),
            timeout: DEFAULT_TIMEOUT,
            clock_origin: None,
        }
    }

    /// Sets the default timeout used by [`get`](Self::get)
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Passes monotonic milliseconds to every scheduler tick
    ///
    /// Without this the scheduler is ticked with `None`.
    pub fn with_monotonic_clock(mut self) -> Self {
        self.clock_origin = Some(Instant::now());
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Fetches `url`, blocking for at most the configured timeout
    pub fn get(&self, url: &str) -> Result<Vec<u8>, BridgeError> {
        self.get_with_timeout(url, self.timeout)
    }

    /// Fetches `url`, blocking for at most `timeout`
    ///
    /// # Returns
    /// * `Ok(Vec<u8>)` - the response body
    /// * `Err(BridgeError::TimedOut)` - no completion in time
    /// * `Err(BridgeError::Failed)` - the client reported an error
    pub fn get_with_timeout(&self, url: &str, timeout: Duration) -> Result<Vec<u8>, BridgeError> {
        let _serial = self.in_flight.lock();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        *self.slot.active.lock() = Some(ActiveFetch {
            id,
            context: FetchContext::default(),
        });
        let _registration = Registration(&self.slot);

        let slot = Arc::clone(&self.slot);
        self.client
            .get(url, timeout, Box::new(move |event| slot.deliver(id, event)));

        let started = Instant::now();
        let context = loop {
            self.scheduler.tick(self.monotonic_ms());

            let mut active = self.slot.active.lock();
            if !is_completed(&active) {
                let elapsed = started.elapsed();
                if elapsed >= timeout {
                    break take_context(&mut active);
                }
                self.slot
                    .signal
                    .wait_for(&mut active, WAIT_SLICE.min(timeout - elapsed));
                if !is_completed(&active) {
                    continue;
                }
            }
            break take_context(&mut active);
        };

        if !context.completed {
            tracing::warn!(url, request_id = id, "timed out waiting for upstream response");
            return Err(BridgeError::TimedOut);
        }
        if let Some(error) = context.error {
            return Err(error);
        }
        context
            .payload
            .ok_or_else(|| BridgeError::Failed("completed without a payload".to_string()))
    }

    fn monotonic_ms(&self) -> Option<u64> {
        self.clock_origin
            .map(|origin| u64::try_from(origin.elapsed().as_millis()).unwrap_or(u64::MAX))
    }
}

fn is_completed(active: &Option<ActiveFetch>) -> bool {
    active.as_ref().is_some_and(|fetch| fetch.context.completed)
}

fn take_context(active: &mut Option<ActiveFetch>) -> FetchContext {
    active.take().map(|fetch| fetch.context).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::FetchCallback;
    use std::collections::VecDeque;
    use std::thread;

    /// What the loopback does with a request for a given URL
    #[derive(Clone)]
    enum Script {
        Respond(Vec<u8>),
        EchoUrl,
        Fail(String),
        ClientTimeout,
        Stall,
        ImmediateFail(String),
    }

    /// Fake client + scheduler pair: callbacks queued by `get` fire on `tick`
    struct Loopback {
        script: Mutex<Script>,
        queued: Mutex<VecDeque<(FetchCallback, FetchEvent)>>,
        stalled: Mutex<Vec<FetchCallback>>,
        late_event: Mutex<Option<FetchEvent>>,
        ticks: Mutex<Vec<Option<u64>>>,
        requests: Mutex<Vec<String>>,
    }

    impl Loopback {
        fn new(script: Script) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script),
                queued: Mutex::new(VecDeque::new()),
                stalled: Mutex::new(Vec::new()),
                late_event: Mutex::new(None),
                ticks: Mutex::new(Vec::new()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn set_script(&self, script: Script) {
            *self.script.lock() = script;
        }

        fn fire_stalled(&self, event: FetchEvent) {
            let stalled: Vec<_> = self.stalled.lock().drain(..).collect();
            for callback in stalled {
                callback(event.clone());
            }
        }
    }

    impl HttpClient for Loopback {
        fn get(&self, url: &str, _timeout: Duration, callback: FetchCallback) {
            self.requests.lock().push(url.to_string());
            let script = self.script.lock().clone();
            let event = match script {
                Script::Respond(body) => FetchEvent::Response(body),
                Script::EchoUrl => FetchEvent::Response(url.as_bytes().to_vec()),
                Script::Fail(reason) => FetchEvent::Error(reason),
                Script::ClientTimeout => FetchEvent::Timeout,
                Script::Stall => {
                    self.stalled.lock().push(callback);
                    return;
                }
                Script::ImmediateFail(reason) => {
                    callback(FetchEvent::Error(reason));
                    return;
                }
            };
            self.queued.lock().push_back((callback, event));
        }
    }

    impl Scheduler for Loopback {
        fn tick(&self, now_ms: Option<u64>) {
            self.ticks.lock().push(now_ms);
            if let Some(event) = self.late_event.lock().take() {
                self.fire_stalled(event);
            }
            let ready: Vec<_> = self.queued.lock().drain(..).collect();
            for (callback, event) in ready {
                callback(event);
            }
        }
    }

    fn bridge_for(loopback: &Arc<Loopback>) -> SyncFetchBridge {
        SyncFetchBridge::new(loopback.clone(), loopback.clone())
    }

    #[test]
    fn test_get_returns_response_body() {
        let loopback = Loopback::new(Script::Respond(b"{\"ok\":true}".to_vec()));
        let bridge = bridge_for(&loopback);

        let body = bridge.get("http://upstream/a").expect("Should succeed");

        assert_eq!(body, b"{\"ok\":true}".to_vec());
        assert_eq!(loopback.requests.lock().as_slice(), ["http://upstream/a"]);
    }

    #[test]
    fn test_get_reports_client_error() {
        let loopback = Loopback::new(Script::Fail("connection refused".to_string()));
        let bridge = bridge_for(&loopback);

        let err = bridge.get("http://upstream/a").unwrap_err();

        assert_eq!(err, BridgeError::Failed("connection refused".to_string()));
    }

    #[test]
    fn test_client_timeout_event_maps_to_timed_out() {
        let loopback = Loopback::new(Script::ClientTimeout);
        let bridge = bridge_for(&loopback);

        assert_eq!(bridge.get("http://upstream/a"), Err(BridgeError::TimedOut));
    }

    #[test]
    fn test_callback_fired_inside_get_is_seen() {
        let loopback = Loopback::new(Script::ImmediateFail("dns".to_string()));
        let bridge = bridge_for(&loopback);

        assert_eq!(
            bridge.get("http://upstream/a"),
            Err(BridgeError::Failed("dns".to_string()))
        );
    }

    #[test]
    fn test_silent_client_times_out_within_margin() {
        let loopback = Loopback::new(Script::Stall);
        let bridge = bridge_for(&loopback);

        let started = Instant::now();
        let result = bridge.get_with_timeout("http://upstream/slow", Duration::from_millis(200));
        let elapsed = started.elapsed();

        assert_eq!(result, Err(BridgeError::TimedOut));
        assert!(elapsed >= Duration::from_millis(200));
        assert!(elapsed < Duration::from_millis(500), "took {:?}", elapsed);
        assert!(bridge.slot.active.lock().is_none(), "registration must be cleared");
    }

    #[test]
    fn test_late_callback_does_not_corrupt_next_call() {
        let loopback = Loopback::new(Script::Stall);
        let bridge = bridge_for(&loopback).with_timeout(Duration::from_millis(50));

        assert_eq!(bridge.get("http://upstream/first"), Err(BridgeError::TimedOut));

        // The stalled request completes on the first tick of the second call
        loopback.set_script(Script::Respond(b"fresh".to_vec()));
        *loopback.late_event.lock() = Some(FetchEvent::Response(b"stale".to_vec()));
        let body = bridge.get("http://upstream/second").expect("Second call succeeds");
        assert_eq!(body, b"fresh".to_vec());

        // And after the bridge is idle again
        loopback.set_script(Script::Stall);
        let _ = bridge.get("http://upstream/third");
        loopback.fire_stalled(FetchEvent::Response(b"late".to_vec()));
        assert!(bridge.slot.active.lock().is_none());
    }

    #[test]
    fn test_ticks_without_clock_pass_none() {
        let loopback = Loopback::new(Script::Respond(b"x".to_vec()));
        let bridge = bridge_for(&loopback);

        bridge.get("http://upstream/a").unwrap();

        let ticks = loopback.ticks.lock();
        assert!(!ticks.is_empty());
        assert!(ticks.iter().all(Option::is_none));
    }

    #[test]
    fn test_ticks_with_clock_pass_timestamps() {
        let loopback = Loopback::new(Script::Respond(b"x".to_vec()));
        let bridge = bridge_for(&loopback).with_monotonic_clock();

        bridge.get("http://upstream/a").unwrap();

        assert!(loopback.ticks.lock().iter().all(Option::is_some));
    }

    #[test]
    fn test_concurrent_callers_are_serialized() {
        let loopback = Loopback::new(Script::EchoUrl);
        let bridge = Arc::new(bridge_for(&loopback));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let bridge = Arc::clone(&bridge);
                thread::spawn(move || {
                    let url = format!("http://upstream/{}", i);
                    let body = bridge.get(&url).expect("Should succeed");
                    assert_eq!(body, url.into_bytes());
                })
            })
            .collect();

        for handle in handles {
            handle.join().expect("Thread should not panic");
        }
        assert_eq!(loopback.requests.lock().len(), 8);
    }
}
