use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use http::{HeaderMap, StatusCode};
use tokio::sync::oneshot;
use url::Url;

use crate::dispatch::{CoordinatorConfig, RequestCoordinator};
use crate::{Body, ErrorKind, Result, Transport};

/// A [`Transport`] that records every call and lets the test decide when
/// and how each fetch settles.
///
/// In gated mode a fetch blocks until [`MockTransport::complete`] is called
/// for its URL; a fetch that is never completed stays pending forever. In
/// responding mode every fetch settles right away.
#[derive(Debug, Default)]
pub(crate) struct MockTransport {
    gated: bool,
    calls: Mutex<HashMap<String, usize>>,
    started: Mutex<Vec<String>>,
    gates: Mutex<HashMap<String, VecDeque<oneshot::Sender<Result<Body>>>>>,
    failures: Mutex<HashMap<String, ErrorKind>>,
    running: AtomicUsize,
    peak_running: AtomicUsize,
}

/// Keeps the running counters accurate even when a fetch is dropped
struct RunningGuard<'a>(&'a AtomicUsize);

impl<'a> RunningGuard<'a> {
    fn enter(running: &'a AtomicUsize, peak: &AtomicUsize) -> Self {
        let now = running.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(now, Ordering::SeqCst);
        Self(running)
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MockTransport {
    pub(crate) fn gated() -> Arc<Self> {
        Arc::new(Self {
            gated: true,
            ..Self::default()
        })
    }

    pub(crate) fn responding() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make every responding-mode fetch of `url` fail with `error`
    pub(crate) fn fail_with(&self, url: &str, error: ErrorKind) {
        self.failures.lock().unwrap().insert(url.to_string(), error);
    }

    /// Settle the oldest blocked fetch of `url` with `outcome`
    ///
    /// # Panics
    ///
    /// Panics if no fetch of `url` is currently blocked
    pub(crate) fn complete(&self, url: &str, outcome: Result<Body>) {
        let gate = self
            .gates
            .lock()
            .unwrap()
            .get_mut(url)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| panic!("no blocked fetch for {url}"));
        // The fetch may have been abandoned in the meantime
        let _ = gate.send(outcome);
    }

    pub(crate) fn succeed(&self, url: &str) {
        self.complete(url, Ok(body(url)));
    }

    /// Number of fetches started for `url`
    pub(crate) fn calls(&self, url: &str) -> usize {
        self.calls.lock().unwrap().get(url).copied().unwrap_or_default()
    }

    /// URLs in the order their fetches started
    pub(crate) fn started(&self) -> Vec<String> {
        self.started.lock().unwrap().clone()
    }

    pub(crate) fn running(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }

    pub(crate) fn peak_running(&self) -> usize {
        self.peak_running.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn fetch(&self, url: &Url, _timeout: Duration) -> Result<Body> {
        let key = url.as_str().to_string();
        *self.calls.lock().unwrap().entry(key.clone()).or_default() += 1;
        self.started.lock().unwrap().push(key.clone());
        let _running = RunningGuard::enter(&self.running, &self.peak_running);

        if !self.gated {
            return match self.failures.lock().unwrap().get(&key) {
                Some(error) => Err(error.clone()),
                None => Ok(body(&key)),
            };
        }

        let (tx, rx) = oneshot::channel();
        self.gates.lock().unwrap().entry(key).or_default().push_back(tx);
        match rx.await {
            Ok(outcome) => outcome,
            Err(_) => std::future::pending().await,
        }
    }
}

/// A 200 body whose content is the URL it was fetched from
pub(crate) fn body(url: &str) -> Body {
    Body::new(
        Url::parse(url).expect("Expected valid test URL"),
        StatusCode::OK,
        HeaderMap::new(),
        url.as_bytes(),
    )
}

/// Coordinator backed by `transport` with the given global limits
pub(crate) fn coordinator(
    transport: &Arc<MockTransport>,
    max_concurrency: usize,
    request_timeout: Duration,
) -> RequestCoordinator {
    let config = CoordinatorConfig {
        max_concurrency,
        request_timeout,
        ..CoordinatorConfig::default()
    };
    RequestCoordinator::with_transport(config, Arc::clone(transport) as Arc<dyn Transport>)
        .expect("Expected valid test configuration")
}

/// Let every spawned task run until it blocks.
///
/// Meant for tests on a paused clock, where the sleep completes as soon as
/// the runtime is idle.
pub(crate) async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}
