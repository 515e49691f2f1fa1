//! The network side of a fetch.
//!
//! The coordinator only needs "GET this URL and give me a body or a
//! classified error". [`Transport`] is that seam; [`ReqwestTransport`] is
//! the implementation used unless a custom one is supplied.

mod reqwest;

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use http::StatusCode;
use url::Url;

pub use self::reqwest::ReqwestTransport;
use crate::{Body, Result};

/// Performs a single fetch.
///
/// Implementations must classify every failure into one of
/// [`crate::ErrorKind::Timeout`], [`crate::ErrorKind::HttpStatus`] or
/// [`crate::ErrorKind::Network`]. Only 2xx responses are successes, see
/// [`is_success_status`].
///
/// `timeout` is the coordinator's request timeout. The coordinator already
/// enforces it around the whole call, so implementations need not apply it
/// a second time.
#[async_trait]
pub trait Transport: Send + Sync + Debug {
    /// Fetch `url`
    async fn fetch(&self, url: &Url, timeout: Duration) -> Result<Body>;
}

/// Whether a received status code counts as a successful fetch
#[must_use]
pub fn is_success_status(status: StatusCode) -> bool {
    status.is_success()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(200, true)]
    #[case(204, true)]
    #[case(299, true)]
    #[case(199, false)]
    #[case(301, false)]
    #[case(404, false)]
    #[case(503, false)]
    fn test_only_2xx_is_success(#[case] code: u16, #[case] expected: bool) {
        let status = StatusCode::from_u16(code).unwrap();
        assert_eq!(is_success_status(status), expected);
    }
}
