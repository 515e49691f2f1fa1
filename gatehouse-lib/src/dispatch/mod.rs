//! Per-endpoint admission control and request coalescing.
//!
//! Every fetch is routed to the queue of the endpoint it targets. Queues
//! bound how many fetches run against one endpoint at a time and admit the
//! rest in submission order. Concurrent requests for the same URL share a
//! single fetch.
//!
//! # Architecture
//!
//! - [`EndpointIdentity`]: scheme, host and port a request is routed by
//! - [`EndpointQueue`]: FIFO queue with bounded concurrency and a per-task timeout
//! - [`RequestCoordinator`]: owns the queues and the in-flight table
//! - [`CoordinatorConfig`]: global limits and per-endpoint overrides
//! - [`EndpointStats`]: counters recorded by each queue

mod config;
mod coordinator;
mod endpoint;
mod error;

pub use config::{
    CoordinatorConfig, DEFAULT_MAX_CONCURRENCY, DEFAULT_MAX_REDIRECTS, DEFAULT_REQUEST_TIMEOUT,
    DEFAULT_USER_AGENT, EndpointConfig, EndpointConfigs,
};
pub use coordinator::{PendingFetch, RequestCoordinator};
pub use endpoint::{EndpointIdentity, EndpointQueue, EndpointStats, EndpointStatsMap};
pub use error::QueueError;
