mod key;
mod queue;
mod stats;

pub use key::EndpointIdentity;
pub use queue::EndpointQueue;
pub use stats::{EndpointStats, EndpointStatsMap};
