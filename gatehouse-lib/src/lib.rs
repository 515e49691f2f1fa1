//! `gatehouse` coordinates HTTP fetches.
//!
//! Fetches are routed to a queue per endpoint (scheme, host and port), which
//! bounds how many of them run at the same time and admits the rest in
//! arrival order. Concurrent requests for the same URL are coalesced into a
//! single fetch whose outcome every caller shares.
//!
//! ```no_run
//! use gatehouse_lib::{CoordinatorBuilder, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!   let coordinator = CoordinatorBuilder::default().coordinator()?;
//!   let body = coordinator.get("https://example.com/").await?;
//!   println!("{}", body.text());
//!   Ok(())
//! }
//! ```
//!
//! Requests for the same URL that overlap in time share one fetch:
//!
//! ```no_run
//! use gatehouse_lib::{CoordinatorBuilder, Result};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!   let coordinator = CoordinatorBuilder::builder()
//!       .max_concurrency(2usize)
//!       .request_timeout(Duration::from_secs(5))
//!       .build()
//!       .coordinator()?;
//!
//!   let (a, b) = tokio::join!(
//!       coordinator.get("https://example.com/feed"),
//!       coordinator.get("https://example.com/feed"),
//!   );
//!   assert_eq!(a?, b?);
//!   Ok(())
//! }
//! ```
#![warn(missing_docs)]

#[cfg(doctest)]
doc_comment::doctest!("../../README.md");

mod builder;
mod types;
mod utils;

pub mod dispatch;
pub mod transport;

#[cfg(test)]
pub(crate) mod test_utils;

pub use builder::CoordinatorBuilder;
pub use dispatch::{PendingFetch, RequestCoordinator};
pub use transport::{ReqwestTransport, Transport};
pub use types::*;
