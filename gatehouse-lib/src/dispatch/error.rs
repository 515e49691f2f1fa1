use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::ErrorKind;

/// Errors produced by an [`crate::dispatch::EndpointQueue`] around the task
/// it runs
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError<E> {
    /// The task itself settled with an error
    #[error("{0}")]
    Task(E),

    /// The task did not settle within the queue timeout and was abandoned
    #[error("Task did not settle within {}ms", .0.as_millis())]
    Timeout(Duration),

    /// The queue was cleared while the task was still waiting for a slot
    #[error("Queue was cleared before the task started")]
    Cleared,
}

impl QueueError<ErrorKind> {
    /// Attach the URL of the fetch this task belonged to
    pub(crate) fn into_error_kind(self, url: &Url) -> ErrorKind {
        match self {
            Self::Task(e) => e,
            Self::Timeout(timeout) => ErrorKind::Timeout {
                url: url.clone(),
                timeout,
            },
            Self::Cleared => ErrorKind::Cancelled { url: url.clone() },
        }
    }
}
