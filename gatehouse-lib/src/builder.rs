use std::sync::Arc;
use std::time::Duration;

use http::HeaderMap;
use typed_builder::TypedBuilder;

use crate::dispatch::{
    CoordinatorConfig, DEFAULT_MAX_CONCURRENCY, DEFAULT_MAX_REDIRECTS, DEFAULT_REQUEST_TIMEOUT,
    DEFAULT_USER_AGENT, EndpointConfigs, RequestCoordinator,
};
use crate::{Result, Transport};

/// Builder for [`RequestCoordinator`].
///
/// See crate-level documentation for usage example.
#[derive(TypedBuilder, Debug, Clone)]
#[builder(field_defaults(default, setter(into)))]
#[builder(builder_method(doc = "
Create a builder for building `CoordinatorBuilder`.

On the builder call, call methods with same name as its fields to set their values.

Finally, call `.build()` to create the instance of `CoordinatorBuilder`.
"))]
pub struct CoordinatorBuilder {
    /// Maximum number of fetches running against one endpoint at a time.
    ///
    /// Endpoints listed in [`CoordinatorBuilder::endpoints`] may override it.
    #[builder(default = DEFAULT_MAX_CONCURRENCY)]
    max_concurrency: usize,

    /// Time a fetch may take once it has obtained a running slot.
    ///
    /// Waiting for the slot does not count towards it.
    #[builder(default = DEFAULT_REQUEST_TIMEOUT)]
    request_timeout: Duration,

    /// User-agent sent with every request.
    #[builder(default_code = "String::from(DEFAULT_USER_AGENT)")]
    user_agent: String,

    /// Additional headers sent with every request.
    custom_headers: HeaderMap,

    /// Per-endpoint overrides, keyed by endpoint URL (e.g. `https://example.com`).
    endpoints: EndpointConfigs,

    /// Maximum number of redirects to follow. `0` disables redirects.
    #[builder(default = DEFAULT_MAX_REDIRECTS)]
    max_redirects: usize,

    /// When `true`, accept invalid SSL certificates.
    ///
    /// ## Warning
    ///
    /// You should think very carefully before allowing invalid SSL
    /// certificates. It will accept any certificate for any site to be
    /// trusted including expired and revoked certificates. This introduces
    /// significant vulnerabilities, and should only be used as a last
    /// resort.
    allow_insecure: bool,

    /// Transport to fetch with instead of the default reqwest client.
    ///
    /// When set, the HTTP options above (user-agent, headers, redirects,
    /// certificate validation) are left to the transport.
    #[builder(setter(strip_option))]
    transport: Option<Arc<dyn Transport>>,
}

impl Default for CoordinatorBuilder {
    #[inline]
    fn default() -> Self {
        Self::builder().build()
    }
}

impl From<CoordinatorConfig> for CoordinatorBuilder {
    fn from(config: CoordinatorConfig) -> Self {
        Self::builder()
            .max_concurrency(config.max_concurrency)
            .request_timeout(config.request_timeout)
            .user_agent(config.user_agent)
            .custom_headers(config.headers)
            .endpoints(config.endpoints)
            .max_redirects(config.max_redirects)
            .allow_insecure(config.allow_insecure)
            .build()
    }
}

impl CoordinatorBuilder {
    /// Instantiates a [`RequestCoordinator`].
    ///
    /// # Errors
    ///
    /// Returns an `Err` if:
    /// - A concurrency limit or the request timeout is zero.
    /// - An endpoint override key is not a URL with a host.
    /// - The user-agent is invalid.
    /// - The request client cannot be created.
    ///   See [here](https://docs.rs/reqwest/latest/reqwest/struct.ClientBuilder.html#errors).
    pub fn coordinator(self) -> Result<RequestCoordinator> {
        let Self {
            max_concurrency,
            request_timeout,
            user_agent,
            custom_headers,
            endpoints,
            max_redirects,
            allow_insecure,
            transport,
        } = self;

        let config = CoordinatorConfig {
            max_concurrency,
            request_timeout,
            user_agent,
            max_redirects,
            allow_insecure,
            headers: custom_headers,
            endpoints,
        };

        match transport {
            Some(transport) => RequestCoordinator::with_transport(config, transport),
            None => RequestCoordinator::new(config),
        }
    }
}
