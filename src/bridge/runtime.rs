//! tokio + reqwest implementations of the bridge collaborators
//!
//! `RuntimeScheduler` owns a current-thread tokio runtime that only makes
//! progress while it is ticked, and `ReqwestHttpClient` spawns requests onto
//! that runtime and reports back through the completion callback.

use std::io;
use std::time::Duration;

use reqwest::Client;
use tokio::runtime::{Builder, Handle, Runtime};

use super::{FetchCallback, FetchEvent, HttpClient, Scheduler};

/// User agent sent with every upstream request
const USER_AGENT: &str = concat!("just-weather/", env!("CARGO_PKG_VERSION"));

/// How long one tick drives the runtime
const DEFAULT_TICK_SLICE: Duration = Duration::from_millis(5);

/// Cooperative scheduler backed by a current-thread tokio runtime
///
/// Spawned tasks only run inside [`Scheduler::tick`], which drives the
/// runtime for a short slice. Ticking must happen outside of any async
/// context (tokio refuses to nest `block_on`).
#[derive(Debug)]
pub struct RuntimeScheduler {
    runtime: Runtime,
    slice: Duration,
}

impl RuntimeScheduler {
    pub fn new() -> io::Result<Self> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        Ok(Self {
            runtime,
            slice: DEFAULT_TICK_SLICE,
        })
    }

    /// Sets how long each tick drives the runtime
    pub fn with_tick_slice(mut self, slice: Duration) -> Self {
        self.slice = slice;
        self
    }

    /// Handle used to spawn work that progresses on tick
    pub fn handle(&self) -> Handle {
        self.runtime.handle().clone()
    }
}

impl Scheduler for RuntimeScheduler {
    fn tick(&self, _now_ms: Option<u64>) {
        // tokio keeps its own clock, the timestamp is not needed here.
        // The sleep must be built inside this runtime to use its timer
        let slice = self.slice;
        self.runtime.block_on(async move {
            tokio::time::sleep(slice).await;
        });
    }
}

/// Non-blocking GET built on reqwest
///
/// Requests are spawned on the given runtime handle. Non-success HTTP
/// statuses are reported as errors.
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: Client,
    handle: Handle,
}

impl ReqwestHttpClient {
    pub fn new(handle: Handle) -> Result<Self, reqwest::Error> {
        let client = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self { client, handle })
    }
}

impl HttpClient for ReqwestHttpClient {
    fn get(&self, url: &str, timeout: Duration, callback: FetchCallback) {
        let request = self.client.get(url).timeout(timeout);
        self.handle.spawn(async move {
            callback(perform(request).await);
        });
    }
}

async fn perform(request: reqwest::RequestBuilder) -> FetchEvent {
    let response = match request.send().await {
        Ok(response) => response,
        Err(e) => return classify(e),
    };

    let status = response.status();
    if !status.is_success() {
        return FetchEvent::Error(format!("HTTP status {}", status));
    }

    match response.bytes().await {
        Ok(body) => FetchEvent::Response(body.to_vec()),
        Err(e) => classify(e),
    }
}

fn classify(error: reqwest::Error) -> FetchEvent {
    if error.is_timeout() {
        FetchEvent::Timeout
    } else {
        FetchEvent::Error(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Instant;

    #[test]
    fn test_spawned_work_only_progresses_on_tick() {
        let scheduler = RuntimeScheduler::new().expect("runtime");
        let (tx, rx) = mpsc::channel();
        scheduler.handle().spawn(async move {
            let _ = tx.send(42);
        });

        assert!(rx.try_recv().is_err(), "nothing runs before the first tick");
        scheduler.tick(None);
        assert_eq!(rx.try_recv(), Ok(42));
    }

    #[test]
    fn test_tick_drives_timers() {
        let scheduler = RuntimeScheduler::new()
            .expect("runtime")
            .with_tick_slice(Duration::from_millis(1));
        let (tx, rx) = mpsc::channel();
        scheduler.handle().spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let _ = tx.send(());
        });

        let started = Instant::now();
        while rx.try_recv().is_err() {
            assert!(started.elapsed() < Duration::from_secs(2));
            scheduler.tick(Some(0));
        }
    }
}
