use http::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::path::Path;
use std::time::Duration;

use crate::dispatch::EndpointIdentity;
use crate::{ErrorKind, Result};

/// Default number of concurrent requests per endpoint
pub const DEFAULT_MAX_CONCURRENCY: usize = 3;

/// Default time a fetch may take before it is deemed as failed, 9 seconds
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(9000);

/// Default number of redirects before a request is deemed as failed, 5.
pub const DEFAULT_MAX_REDIRECTS: usize = 5;

/// Default user agent, `gatehouse/<PKG_VERSION>`.
pub const DEFAULT_USER_AGENT: &str = concat!("gatehouse/", env!("CARGO_PKG_VERSION"));

/// Per-endpoint configuration overrides, keyed by `scheme://host:port`
pub type EndpointConfigs = HashMap<String, EndpointConfig>;

/// Configuration of a [`crate::RequestCoordinator`]
///
/// Every field has a default, so an empty TOML document is a valid
/// configuration:
///
/// ```
/// use gatehouse_lib::dispatch::CoordinatorConfig;
/// use std::time::Duration;
///
/// let config = CoordinatorConfig::from_toml_str(r#"
///     max_concurrency = 5
///     request_timeout = "2s 500ms"
///
///     [endpoints."https://api.github.com:443"]
///     concurrency = 1
/// "#).unwrap();
///
/// assert_eq!(config.max_concurrency, 5);
/// assert_eq!(config.request_timeout, Duration::from_millis(2500));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CoordinatorConfig {
    /// Maximum concurrent requests per endpoint
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Time a single fetch may take, including time spent in the transport.
    /// This is the only timeout applied to a fetch.
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,

    /// User agent sent by the default transport
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum number of redirects the default transport follows
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    /// Accept invalid TLS certificates in the default transport
    #[serde(default)]
    pub allow_insecure: bool,

    /// Custom headers sent with every request by the default transport
    #[serde(default)]
    #[serde(deserialize_with = "deserialize_headers")]
    #[serde(serialize_with = "serialize_headers")]
    pub headers: HeaderMap,

    /// Per-endpoint overrides
    #[serde(default)]
    pub endpoints: EndpointConfigs,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            user_agent: default_user_agent(),
            max_redirects: DEFAULT_MAX_REDIRECTS,
            allow_insecure: false,
            headers: HeaderMap::new(),
            endpoints: EndpointConfigs::new(),
        }
    }
}

const fn default_max_concurrency() -> usize {
    DEFAULT_MAX_CONCURRENCY
}

const fn default_request_timeout() -> Duration {
    DEFAULT_REQUEST_TIMEOUT
}

const fn default_max_redirects() -> usize {
    DEFAULT_MAX_REDIRECTS
}

fn default_user_agent() -> String {
    String::from(DEFAULT_USER_AGENT)
}

impl CoordinatorConfig {
    /// Parse a configuration from a TOML document
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::ReadConfig`] if the document is not valid TOML
    /// or contains unknown keys.
    pub fn from_toml_str(input: &str) -> Result<Self> {
        toml::from_str(input).map_err(|e| ErrorKind::ReadConfig(e.to_string()))
    }

    /// Load a configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::ReadConfig`] if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ErrorKind::ReadConfig(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&contents)
    }

    /// Check that the configuration can drive a coordinator
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidConfig`] if a concurrency bound or the
    /// request timeout is zero, or an endpoint key is not a valid URL
    /// authority.
    pub fn validate(&self) -> Result<()> {
        self.global_concurrency()?;
        if self.request_timeout.is_zero() {
            return Err(ErrorKind::InvalidConfig(
                "request timeout must be greater than zero".to_string(),
            ));
        }
        self.endpoint_overrides()?;
        Ok(())
    }

    pub(crate) fn global_concurrency(&self) -> Result<NonZeroUsize> {
        NonZeroUsize::new(self.max_concurrency).ok_or_else(|| {
            ErrorKind::InvalidConfig("max concurrency must be a positive integer".to_string())
        })
    }

    /// Resolve the per-endpoint overrides into their identities
    pub(crate) fn endpoint_overrides(&self) -> Result<HashMap<EndpointIdentity, NonZeroUsize>> {
        let global = self.global_concurrency()?;
        self.endpoints
            .iter()
            .map(|(endpoint, config)| {
                let identity = endpoint.parse::<EndpointIdentity>().map_err(|e| {
                    ErrorKind::InvalidConfig(format!("invalid endpoint '{endpoint}': {e}"))
                })?;
                let concurrency = NonZeroUsize::new(config.effective_concurrency(global.get()))
                    .ok_or_else(|| {
                        ErrorKind::InvalidConfig(format!(
                            "concurrency for endpoint '{endpoint}' must be a positive integer"
                        ))
                    })?;
                Ok((identity, concurrency))
            })
            .collect()
    }
}

/// Configuration for a specific endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EndpointConfig {
    /// Maximum concurrent requests allowed to this endpoint
    pub concurrency: Option<usize>,
}

impl EndpointConfig {
    /// Get the effective maximum concurrency, falling back to the global default
    #[must_use]
    pub fn effective_concurrency(&self, global_concurrency: usize) -> usize {
        self.concurrency.unwrap_or(global_concurrency)
    }
}

/// Custom deserializer for headers from TOML config format
fn deserialize_headers<'de, D>(deserializer: D) -> std::result::Result<HeaderMap, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let map = HashMap::<String, String>::deserialize(deserializer)?;
    let mut header_map = HeaderMap::new();

    for (name, value) in map {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| serde::de::Error::custom(format!("Invalid header name '{name}': {e}")))?;
        let header_value = HeaderValue::from_str(&value).map_err(|e| {
            serde::de::Error::custom(format!("Invalid header value '{value}': {e}"))
        })?;
        header_map.insert(header_name, header_value);
    }

    Ok(header_map)
}

/// Custom serializer for headers to TOML config format
fn serialize_headers<S>(headers: &HeaderMap, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    let map: HashMap<String, String> = headers
        .iter()
        .map(|(name, value)| (name.to_string(), value.to_str().unwrap_or("").to_string()))
        .collect();
    map.serialize(serializer)
}
