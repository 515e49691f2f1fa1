use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::num::NonZeroUsize;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use tokio::task::JoinError;
use url::Url;

use crate::dispatch::{
    CoordinatorConfig, EndpointIdentity, EndpointQueue, EndpointStats, EndpointStatsMap,
};
use crate::transport::{ReqwestTransport, Transport};
use crate::{Body, ErrorKind, FetchRequest, Result};

/// The settlement of one fetch, observable by any number of callers
type SharedResponse = Shared<BoxFuture<'static, Result<Body>>>;

/// Tracking state of a fetch that has not been retired yet
#[derive(Debug)]
struct InFlightEntry {
    /// Distinguishes this fetch from earlier and later fetches of the same URL
    id: u64,
    /// Callers attached to this fetch, including the one that started it
    waiters: usize,
    response: SharedResponse,
}

impl InFlightEntry {
    fn is_pending(&self) -> bool {
        self.response.peek().is_none()
    }
}

/// Routes fetches to per-endpoint queues and coalesces identical requests.
///
/// The `RequestCoordinator` owns two tables:
/// - one [`EndpointQueue`] per [`EndpointIdentity`], created on first use,
/// - the in-flight table, mapping the exact URL string of every unsettled
///   fetch to its shared result.
///
/// A request for a URL that is already in flight joins the existing fetch:
/// no new task is submitted and every caller observes the same outcome.
/// Once a fetch settles its entry is retired, so the next request for the
/// URL starts a fresh fetch. Nothing is cached.
///
/// Cloning is cheap; clones share both tables.
#[derive(Debug, Clone)]
pub struct RequestCoordinator {
    /// Map of endpoint to its queue, created on demand
    queues: Arc<DashMap<EndpointIdentity, Arc<EndpointQueue>>>,

    /// Unsettled fetches keyed by the caller's exact URL string
    in_flight: Arc<DashMap<String, InFlightEntry>>,

    /// Performs the actual fetches
    transport: Arc<dyn Transport>,

    config: Arc<CoordinatorConfig>,

    /// Concurrency limit of endpoints without an override
    global_concurrency: NonZeroUsize,

    /// Endpoint-specific concurrency limits
    overrides: Arc<HashMap<EndpointIdentity, NonZeroUsize>>,

    next_id: Arc<AtomicU64>,
}

impl RequestCoordinator {
    /// Create a coordinator that fetches through a [`ReqwestTransport`]
    /// built from `config`.
    ///
    /// # Errors
    ///
    /// Returns an `Err` if the configuration is invalid or the HTTP client
    /// cannot be built.
    pub fn new(config: CoordinatorConfig) -> Result<Self> {
        let transport = ReqwestTransport::new(&config)?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Create a coordinator that fetches through a custom [`Transport`].
    ///
    /// # Errors
    ///
    /// Returns an `Err` if the configuration is invalid.
    pub fn with_transport(config: CoordinatorConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        config.validate()?;
        let global_concurrency = config.global_concurrency()?;
        let overrides = config.endpoint_overrides()?;

        Ok(Self {
            queues: Arc::new(DashMap::new()),
            in_flight: Arc::new(DashMap::new()),
            transport,
            config: Arc::new(config),
            global_concurrency,
            overrides: Arc::new(overrides),
            next_id: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Fetch `request`, waiting for its body.
    ///
    /// Shorthand for awaiting [`RequestCoordinator::request`].
    ///
    /// # Errors
    ///
    /// Fails with
    /// - [`ErrorKind::InvalidArgument`] if the request is empty or not UTF-8,
    /// - [`ErrorKind::InvalidUrl`] if it is not an absolute URL with a host,
    /// - [`ErrorKind::Timeout`], [`ErrorKind::HttpStatus`] or
    ///   [`ErrorKind::Network`] if the fetch fails,
    /// - [`ErrorKind::Cancelled`] if the coordinator is reset while the
    ///   fetch waits for a slot.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use gatehouse_lib::{CoordinatorBuilder, Result};
    /// # #[tokio::main]
    /// # async fn main() -> Result<()> {
    /// let coordinator = CoordinatorBuilder::builder()
    ///     .max_concurrency(2usize)
    ///     .build()
    ///     .coordinator()?;
    /// let body = coordinator.get("https://example.com/data.json").await?;
    /// println!("{}", body.text());
    /// # Ok(())
    /// # }
    /// ```
    pub async fn get<T, E>(&self, request: T) -> Result<Body>
    where
        FetchRequest: TryFrom<T, Error = E>,
        ErrorKind: From<E>,
    {
        self.request(request)?.await
    }

    /// Register a fetch of `request` and return a handle to its outcome.
    ///
    /// The request is admitted before this returns: either it joins the
    /// in-flight fetch of the same URL, or a new fetch takes its place in
    /// the endpoint queue. The fetch makes progress whether or not the
    /// returned [`PendingFetch`] is polled.
    ///
    /// # Errors
    ///
    /// Returns an `Err` if the request is not a valid URL, see
    /// [`RequestCoordinator::get`].
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn request<T, E>(&self, request: T) -> Result<PendingFetch>
    where
        FetchRequest: TryFrom<T, Error = E>,
        ErrorKind: From<E>,
    {
        let request = FetchRequest::try_from(request)?;
        let identity = EndpointIdentity::try_from(request.url())?;
        let queue = self.get_or_create_queue(identity);

        // The entry lock is held until the new fetch is registered, so a
        // concurrent request for the same URL either joins or starts it.
        match self.in_flight.entry(request.key().to_owned()) {
            Entry::Occupied(mut occupied) if occupied.get().is_pending() => {
                let entry = occupied.get_mut();
                entry.waiters += 1;
                queue.record_coalesced();
                log::debug!(
                    "Joining in-flight fetch of {} ({} waiter(s))",
                    request,
                    entry.waiters
                );
                Ok(PendingFetch {
                    url: request.into_url(),
                    response: entry.response.clone(),
                    coalesced: true,
                })
            }
            entry => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let response = self.spawn_fetch(&queue, request.url().clone());
                entry.insert(InFlightEntry {
                    id,
                    waiters: 1,
                    response: response.clone(),
                });
                self.spawn_retire(request.key().to_owned(), id, response.clone());

                Ok(PendingFetch {
                    url: request.into_url(),
                    response,
                    coalesced: false,
                })
            }
        }
    }

    /// Submit a fetch of `url` to `queue` and drive it on its own task
    fn spawn_fetch(&self, queue: &EndpointQueue, url: Url) -> SharedResponse {
        let transport = Arc::clone(&self.transport);
        let timeout = self.config.request_timeout;
        let task_url = url.clone();
        let fetch = queue.submit(move || async move { transport.fetch(&task_url, timeout).await });
        let handle = tokio::spawn(fetch);

        async move {
            match handle.await {
                Ok(result) => result.map_err(|e| e.into_error_kind(&url)),
                Err(e) => {
                    log::warn!("Fetch task for {url} did not complete: {e}");
                    Err(ErrorKind::Network {
                        url,
                        detail: join_error_detail(&e).to_string(),
                    })
                }
            }
        }
        .boxed()
        .shared()
    }

    /// Remove the in-flight entry `id` of `key` once its fetch has settled.
    ///
    /// An entry that was replaced in the meantime, by a reset followed by a
    /// new request, is left alone.
    fn spawn_retire(&self, key: String, id: u64, response: SharedResponse) {
        let in_flight = Arc::clone(&self.in_flight);
        tokio::spawn(async move {
            let _ = response.await;
            if in_flight.remove_if(&key, |_, entry| entry.id == id).is_some() {
                log::trace!("Retired in-flight fetch of {key}");
            }
        });
    }

    /// Get the queue for `identity`, creating it on first use.
    ///
    /// When two callers race to create the same queue, the first one wins
    /// and the other receives the existing queue.
    fn get_or_create_queue(&self, identity: EndpointIdentity) -> Arc<EndpointQueue> {
        if let Some(queue) = self.queues.get(&identity) {
            return Arc::clone(&queue);
        }

        let concurrency = self
            .overrides
            .get(&identity)
            .copied()
            .unwrap_or(self.global_concurrency);

        let queue = self.queues.entry(identity.clone()).or_insert_with(|| {
            log::debug!("Creating queue for endpoint {identity} (concurrency {concurrency})");
            Arc::new(EndpointQueue::new(
                identity,
                concurrency,
                self.config.request_timeout,
            ))
        });
        Arc::clone(&queue)
    }

    /// Forget all tracking state.
    ///
    /// The in-flight table is emptied, every queue discards its pending
    /// tasks and all queues are dropped. Discarded fetches fail with
    /// [`ErrorKind::Cancelled`]. Fetches that are already running are not
    /// interrupted; their callers still receive their outcome, but a
    /// request made after the reset always starts a fresh fetch.
    pub fn reset(&self) {
        let in_flight = self.in_flight.len();
        self.in_flight.clear();

        let mut discarded = 0;
        self.queues.retain(|_, queue| {
            discarded += queue.clear();
            false
        });

        log::debug!(
            "Reset coordinator: dropped {in_flight} in-flight fetch(es), discarded {discarded} pending task(s)"
        );
    }

    /// Number of fetches currently tracked as in flight
    #[must_use]
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Number of callers attached to the in-flight fetch of `url`, counting
    /// the one that started it. `None` if `url` is not in flight.
    ///
    /// `url` is matched exactly, like the deduplication itself.
    #[must_use]
    pub fn in_flight_waiters(&self, url: &str) -> Option<usize> {
        self.in_flight
            .get(url)
            .filter(|entry| entry.is_pending())
            .map(|entry| entry.waiters)
    }

    /// Number of endpoints with a queue
    #[must_use]
    pub fn endpoint_count(&self) -> usize {
        self.queues.len()
    }

    /// The queue of `identity`, if one has been created
    #[must_use]
    pub fn endpoint_queue(&self, identity: &EndpointIdentity) -> Option<Arc<EndpointQueue>> {
        self.queues.get(identity).map(|queue| Arc::clone(&queue))
    }

    /// Statistics of one endpoint. Unknown endpoints report empty statistics.
    #[must_use]
    pub fn endpoint_stats(&self, identity: &EndpointIdentity) -> EndpointStats {
        self.queues
            .get(identity)
            .map(|queue| queue.stats())
            .unwrap_or_default()
    }

    /// Statistics of every endpoint with a queue
    #[must_use]
    pub fn all_endpoint_stats(&self) -> EndpointStatsMap {
        self.queues
            .iter()
            .map(|entry| (entry.key().to_string(), entry.value().stats()))
            .collect::<HashMap<_, _>>()
            .into()
    }

    /// The configuration this coordinator was built with
    #[must_use]
    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }
}

/// Describe why a fetch task ended without producing a result
fn join_error_detail(error: &JoinError) -> &'static str {
    if error.is_panic() {
        "fetch task panicked"
    } else {
        "fetch task was cancelled"
    }
}

/// Handle to the outcome of a fetch registered with
/// [`RequestCoordinator::request`].
///
/// Every handle of a coalesced fetch resolves to the same result. Dropping
/// a handle does not cancel the fetch.
#[must_use = "futures do nothing unless awaited"]
#[derive(Clone)]
pub struct PendingFetch {
    url: Url,
    response: SharedResponse,
    coalesced: bool,
}

impl PendingFetch {
    /// The URL being fetched
    pub const fn url(&self) -> &Url {
        &self.url
    }

    /// Whether this handle joined a fetch started by an earlier request
    pub const fn is_coalesced(&self) -> bool {
        self.coalesced
    }
}

impl fmt::Debug for PendingFetch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingFetch")
            .field("url", &self.url.as_str())
            .field("coalesced", &self.coalesced)
            .field("settled", &self.response.peek().is_some())
            .finish()
    }
}

impl Future for PendingFetch {
    type Output = Result<Body>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.response).poll(cx)
    }
}
