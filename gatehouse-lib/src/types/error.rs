use http::StatusCode;
use serde::{Serialize, Serializer};
use std::convert::Infallible;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Possible errors when fetching through `gatehouse_lib`
///
/// Every variant is cheap to clone, because a single settled outcome is
/// handed to every caller that joined the same in-flight request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The input cannot be interpreted as a URL string at all
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The input is a string, but not a well-formed absolute URL
    #[error("Invalid URL format: {input} ({reason})")]
    InvalidUrl {
        /// The offending input
        input: String,
        /// Why the input was rejected
        reason: String,
    },

    /// The fetch did not settle within the configured request timeout
    #[error("Request timeout for {url} ({}ms)", .timeout.as_millis())]
    Timeout {
        /// The requested URL
        url: Url,
        /// The timeout that elapsed
        timeout: Duration,
    },

    /// A response was received, but its status code is outside `200..300`
    #[error("HTTP {} error for {url}: {status_text}", .status.as_u16())]
    HttpStatus {
        /// The requested URL
        url: Url,
        /// The received status code
        status: StatusCode,
        /// The canonical reason phrase of `status`
        status_text: String,
    },

    /// Any other transport failure (DNS, connection refused, reset, ...)
    #[error("Network error for {url}: {detail}")]
    Network {
        /// The requested URL
        url: Url,
        /// Human-readable description of the failure
        detail: String,
    },

    /// The request was still waiting for a free slot when its endpoint
    /// queue was cleared
    #[error("Request for {url} was discarded before it started")]
    Cancelled {
        /// The requested URL
        url: Url,
    },

    /// The coordinator configuration is not usable
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The HTTP transport could not be constructed
    #[error("Failed to build HTTP transport: {0}")]
    BuildTransport(String),

    /// A configuration file could not be read or parsed
    #[error("Failed to read configuration: {0}")]
    ReadConfig(String),
}

impl ErrorKind {
    /// Returns `true` if the fetch ran out of time.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns `true` if the server answered with a non-2xx status code.
    #[must_use]
    pub const fn is_http_status(&self) -> bool {
        matches!(self, Self::HttpStatus { .. })
    }

    /// Returns `true` for transport failures other than timeouts.
    #[must_use]
    pub const fn is_network(&self) -> bool {
        matches!(self, Self::Network { .. })
    }

    /// The URL the failed fetch was issued for, if any.
    ///
    /// Input and configuration errors happen before a URL exists.
    #[must_use]
    pub const fn url(&self) -> Option<&Url> {
        match self {
            Self::Timeout { url, .. }
            | Self::HttpStatus { url, .. }
            | Self::Network { url, .. }
            | Self::Cancelled { url } => Some(url),
            _ => None,
        }
    }

    /// The received status code for [`ErrorKind::HttpStatus`].
    #[must_use]
    pub const fn status(&self) -> Option<StatusCode> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Return more details about the given [`ErrorKind`]
    ///
    /// Which additional information we can extract depends on the underlying
    /// failure.
    #[must_use]
    pub fn details(&self) -> Option<String> {
        match self {
            Self::HttpStatus { status_text, .. } => Some(status_text.clone()),
            Self::Network { detail, .. } => Some(detail.clone()),
            Self::Timeout { timeout, .. } => Some(format!(
                "No response within {}ms. Try increasing the request timeout",
                timeout.as_millis()
            )),
            Self::InvalidUrl { reason, .. } => Some(reason.clone()),
            _ => None,
        }
    }
}

impl Serialize for ErrorKind {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl From<Infallible> for ErrorKind {
    fn from(_: Infallible) -> Self {
        // tautological
        unreachable!()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn url() -> Url {
        Url::parse("https://example.com/data.json").unwrap()
    }

    #[test]
    fn test_display_matches_classification() {
        let timeout = ErrorKind::Timeout {
            url: url(),
            timeout: Duration::from_millis(9000),
        };
        assert_eq!(
            timeout.to_string(),
            "Request timeout for https://example.com/data.json (9000ms)"
        );

        let status = ErrorKind::HttpStatus {
            url: url(),
            status: StatusCode::NOT_FOUND,
            status_text: "Not Found".to_string(),
        };
        assert_eq!(
            status.to_string(),
            "HTTP 404 error for https://example.com/data.json: Not Found"
        );

        let network = ErrorKind::Network {
            url: url(),
            detail: "Connection refused".to_string(),
        };
        assert_eq!(
            network.to_string(),
            "Network error for https://example.com/data.json: Connection refused"
        );
    }

    #[test]
    fn test_predicates() {
        let timeout = ErrorKind::Timeout {
            url: url(),
            timeout: Duration::from_secs(1),
        };
        assert!(timeout.is_timeout());
        assert!(!timeout.is_network());
        assert_eq!(timeout.url(), Some(&url()));
        assert_eq!(timeout.status(), None);

        let status = ErrorKind::HttpStatus {
            url: url(),
            status: StatusCode::BAD_GATEWAY,
            status_text: "Bad Gateway".to_string(),
        };
        assert!(status.is_http_status());
        assert_eq!(status.status(), Some(StatusCode::BAD_GATEWAY));
        assert_eq!(status.details(), Some("Bad Gateway".to_string()));

        let argument = ErrorKind::InvalidArgument("URL must not be empty".to_string());
        assert_eq!(argument.url(), None);
    }

    #[test]
    fn test_serialize_as_display_string() {
        let error = ErrorKind::Cancelled { url: url() };
        let json = serde_json::to_string(&error).unwrap();
        assert_eq!(
            json,
            "\"Request for https://example.com/data.json was discarded before it started\""
        );
    }
}
