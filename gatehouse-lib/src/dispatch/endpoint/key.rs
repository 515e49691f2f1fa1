use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use url::Url;

use crate::ErrorKind;
use crate::types::Result;

/// Default port for `https` URLs without an explicit port
const HTTPS_PORT: u16 = 443;

/// Default port for `http` URLs, and the fallback for schemes without a
/// well-known port
const HTTP_PORT: u16 = 80;

/// A type-safe representation of a network endpoint for admission control.
///
/// Two URLs with the same scheme, host and port share one concurrency
/// budget. The host is normalized to lowercase and the port always carries
/// the scheme default when the URL omits it.
///
/// # Examples
///
/// ```
/// use gatehouse_lib::dispatch::EndpointIdentity;
/// use url::Url;
///
/// let url = Url::parse("https://API.github.com/repos/user/repo").unwrap();
/// let endpoint = EndpointIdentity::try_from(&url).unwrap();
/// assert_eq!(endpoint.to_string(), "https://api.github.com:443");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EndpointIdentity {
    scheme: String,
    host: String,
    port: u16,
}

impl EndpointIdentity {
    /// URL scheme, e.g. `https`
    #[must_use]
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Lowercased host name or IP literal
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Port with the scheme default applied
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }
}

/// Port an endpoint is keyed by.
///
/// `Url::port` hides ports equal to the scheme default, so non-web schemes
/// fall back to their well-known default before using 80. This is not the
/// simpler "443 for `https`, 80 for everything else" rule: `wss://h` keys as
/// port 443 and `ftp://h` as port 21, not 80.
fn effective_port(url: &Url) -> u16 {
    match (url.scheme(), url.port()) {
        (_, Some(port)) => port,
        ("https", None) => HTTPS_PORT,
        ("http", None) => HTTP_PORT,
        (_, None) => url.port_or_known_default().unwrap_or(HTTP_PORT),
    }
}

impl TryFrom<&Url> for EndpointIdentity {
    type Error = ErrorKind;

    fn try_from(url: &Url) -> Result<Self> {
        let host = url
            .host_str()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| ErrorKind::InvalidUrl {
                input: url.to_string(),
                reason: "URL is missing a host".to_string(),
            })?;

        Ok(EndpointIdentity {
            scheme: url.scheme().to_owned(),
            // Normalize to lowercase for consistent lookup
            host: host.to_lowercase(),
            port: effective_port(url),
        })
    }
}

impl TryFrom<Url> for EndpointIdentity {
    type Error = ErrorKind;

    fn try_from(url: Url) -> Result<Self> {
        EndpointIdentity::try_from(&url)
    }
}

impl TryFrom<&str> for EndpointIdentity {
    type Error = ErrorKind;

    fn try_from(input: &str) -> Result<Self> {
        let url = Url::parse(input).map_err(|e| ErrorKind::InvalidUrl {
            input: input.to_owned(),
            reason: e.to_string(),
        })?;
        EndpointIdentity::try_from(&url)
    }
}

impl FromStr for EndpointIdentity {
    type Err = ErrorKind;

    fn from_str(s: &str) -> Result<Self> {
        EndpointIdentity::try_from(s)
    }
}

impl fmt::Display for EndpointIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.scheme, self.host, self.port)
    }
}
