//! FIFO admission control for a single endpoint.
//!
//! Admission happens synchronously when a task is submitted, so the order
//! of [`EndpointQueue::submit`] calls is the order in which tasks obtain a
//! running slot. A freed slot is handed directly to the oldest waiter that
//! is still interested; the running count only drops when nobody waits.

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::oneshot;

use super::key::EndpointIdentity;
use super::stats::EndpointStats;
use crate::dispatch::QueueError;

/// Running count and waiters of one queue, guarded together
struct Slots {
    running: usize,
    waiters: VecDeque<oneshot::Sender<Slot>>,
}

impl fmt::Debug for Slots {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slots")
            .field("running", &self.running)
            .field("waiters", &self.waiters.len())
            .finish()
    }
}

#[derive(Debug)]
struct QueueState {
    identity: EndpointIdentity,
    concurrency: usize,
    slots: Mutex<Slots>,
    stats: Mutex<EndpointStats>,
}

/// An occupied running slot. Dropping it frees the slot exactly once.
#[derive(Debug)]
struct Slot {
    state: Arc<QueueState>,
    armed: bool,
}

impl Drop for Slot {
    fn drop(&mut self) {
        if self.armed {
            self.state.release();
        }
    }
}

enum Admission {
    Ready(Slot),
    Queued(oneshot::Receiver<Slot>),
}

impl QueueState {
    fn slots(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn stats(&self) -> MutexGuard<'_, EndpointStats> {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn admit(self: &Arc<Self>) -> Admission {
        let mut slots = self.slots();
        if slots.running < self.concurrency {
            slots.running += 1;
            Admission::Ready(Slot {
                state: Arc::clone(self),
                armed: true,
            })
        } else {
            let (tx, rx) = oneshot::channel();
            slots.waiters.push_back(tx);
            log::trace!(
                "Endpoint {} saturated, {} task(s) waiting",
                self.identity,
                slots.waiters.len()
            );
            Admission::Queued(rx)
        }
    }

    fn release(self: &Arc<Self>) {
        loop {
            let waiter = {
                let mut slots = self.slots();
                match slots.waiters.pop_front() {
                    Some(waiter) => waiter,
                    None => {
                        slots.running -= 1;
                        return;
                    }
                }
            };

            // Hand over without touching the running count
            let slot = Slot {
                state: Arc::clone(self),
                armed: true,
            };
            match waiter.send(slot) {
                Ok(()) => return,
                // The waiter gave up; try the next one
                Err(mut slot) => slot.armed = false,
            }
        }
    }
}

/// A FIFO task queue bound to one [`EndpointIdentity`].
///
/// At most `concurrency` submitted tasks run at the same time. Every running
/// task is raced against the queue timeout; a task that loses the race is
/// dropped and its slot goes to the next waiting task.
#[derive(Debug)]
pub struct EndpointQueue {
    timeout: Duration,
    state: Arc<QueueState>,
}

impl EndpointQueue {
    /// Create a queue for `identity` running at most `concurrency` tasks at
    /// once, each bounded by `timeout`
    #[must_use]
    pub fn new(identity: EndpointIdentity, concurrency: NonZeroUsize, timeout: Duration) -> Self {
        Self {
            timeout,
            state: Arc::new(QueueState {
                identity,
                concurrency: concurrency.get(),
                slots: Mutex::new(Slots {
                    running: 0,
                    waiters: VecDeque::new(),
                }),
                stats: Mutex::new(EndpointStats::default()),
            }),
        }
    }

    /// Submit a task.
    ///
    /// The task's place in line is taken immediately, before the returned
    /// future is first polled. The task is only invoked once it holds a
    /// running slot.
    ///
    /// # Errors
    ///
    /// The returned future resolves to
    /// - [`QueueError::Task`] if the task settles with an error,
    /// - [`QueueError::Timeout`] if it does not settle within the timeout,
    /// - [`QueueError::Cleared`] if the queue is cleared before the task
    ///   obtains a slot.
    pub fn submit<F, Fut, T, E>(
        &self,
        task: F,
    ) -> impl Future<Output = Result<T, QueueError<E>>> + Send + 'static
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        self.state.stats().record_submitted();
        let admission = self.state.admit();
        let state = Arc::clone(&self.state);
        let timeout = self.timeout;

        async move {
            let _slot = match admission {
                Admission::Ready(slot) => slot,
                Admission::Queued(waiter) => {
                    if let Ok(slot) = waiter.await {
                        slot
                    } else {
                        state.stats().record_cancelled();
                        return Err(QueueError::Cleared);
                    }
                }
            };

            let running = state.slots().running;
            state.stats().record_started(running);

            let start_time = Instant::now();
            if let Ok(result) = tokio::time::timeout(timeout, task()).await {
                state
                    .stats()
                    .record_settled(result.is_ok(), start_time.elapsed());
                result.map_err(QueueError::Task)
            } else {
                state.stats().record_timeout();
                log::debug!(
                    "Task on endpoint {} abandoned after {}ms",
                    state.identity,
                    timeout.as_millis()
                );
                Err(QueueError::Timeout(timeout))
            }
        }
    }

    /// Discard every task still waiting for a slot.
    ///
    /// Their futures resolve to [`QueueError::Cleared`]. Running tasks are
    /// left alone and keep their slots until they settle. Returns the number
    /// of discarded tasks.
    pub fn clear(&self) -> usize {
        let drained = std::mem::take(&mut self.state.slots().waiters);
        let discarded = drained.iter().filter(|waiter| !waiter.is_closed()).count();
        if discarded > 0 {
            log::debug!(
                "Cleared {discarded} pending task(s) on endpoint {}",
                self.state.identity
            );
        }
        discarded
    }

    /// The endpoint this queue admits tasks for
    #[must_use]
    pub fn identity(&self) -> &EndpointIdentity {
        &self.state.identity
    }

    /// Maximum number of simultaneously running tasks
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.state.concurrency
    }

    /// Per-task timeout
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Number of tasks currently holding a running slot
    #[must_use]
    pub fn running(&self) -> usize {
        self.state.slots().running
    }

    /// Number of tasks waiting for a slot
    #[must_use]
    pub fn pending(&self) -> usize {
        self.state
            .slots()
            .waiters
            .iter()
            .filter(|waiter| !waiter.is_closed())
            .count()
    }

    /// Get queue statistics
    #[must_use]
    pub fn stats(&self) -> EndpointStats {
        self.state.stats().clone()
    }

    /// Count a request that joined an in-flight fetch on this endpoint
    pub(crate) fn record_coalesced(&self) {
        self.state.stats().record_coalesced();
    }
}
