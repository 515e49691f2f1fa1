use std::time::Duration;

use async_trait::async_trait;
use http::header::{self, HeaderValue};
use url::Url;

use super::{Transport, is_success_status};
use crate::dispatch::CoordinatorConfig;
use crate::utils::reqwest::analyze_error_chain;
use crate::{Body, ErrorKind, Result};

// Constants currently not configurable by the user.
/// A timeout for only the connect phase of a request.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// TCP keepalive
/// See <https://tldp.org/HOWTO/TCP-Keepalive-HOWTO/overview.html> for more info
const TCP_KEEPALIVE: Duration = Duration::from_secs(60);

/// [`Transport`] backed by [reqwest](https://github.com/seanmonstar/reqwest).
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a transport from the HTTP related parts of `config`.
    ///
    /// No total request timeout is set on the client; the coordinator's
    /// queue timeout is the one deadline of a fetch.
    ///
    /// # Errors
    ///
    /// Returns an `Err` if:
    /// - The user-agent is invalid.
    /// - The request client cannot be created.
    ///   See [here](https://docs.rs/reqwest/latest/reqwest/struct.ClientBuilder.html#errors).
    pub fn new(config: &CoordinatorConfig) -> Result<Self> {
        let mut headers = config.headers.clone();
        headers.insert(
            header::USER_AGENT,
            HeaderValue::from_str(&config.user_agent).map_err(|e| {
                ErrorKind::InvalidConfig(format!("invalid user agent: {e}"))
            })?,
        );

        let client = reqwest::ClientBuilder::new()
            .gzip(true)
            .default_headers(headers)
            .danger_accept_invalid_certs(config.allow_insecure)
            .connect_timeout(CONNECT_TIMEOUT.min(config.request_timeout))
            .tcp_keepalive(TCP_KEEPALIVE)
            .redirect(redirect_policy(config.max_redirects))
            .build()
            .map_err(|e| ErrorKind::BuildTransport(e.to_string()))?;

        Ok(Self { client })
    }

    /// Wrap an already configured reqwest client
    #[must_use]
    pub const fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

/// Zero disables redirects, so the redirect response itself is reported
fn redirect_policy(max_redirects: usize) -> reqwest::redirect::Policy {
    if max_redirects == 0 {
        reqwest::redirect::Policy::none()
    } else {
        reqwest::redirect::Policy::limited(max_redirects)
    }
}

/// Map a reqwest failure onto the closed error taxonomy
fn classify(url: &Url, timeout: Duration, error: &reqwest::Error) -> ErrorKind {
    if error.is_timeout() {
        return ErrorKind::Timeout {
            url: url.clone(),
            timeout,
        };
    }
    if let Some(status) = error.status() {
        return status_error(url, status);
    }
    ErrorKind::Network {
        url: url.clone(),
        detail: analyze_error_chain(error),
    }
}

fn status_error(url: &Url, status: http::StatusCode) -> ErrorKind {
    ErrorKind::HttpStatus {
        url: url.clone(),
        status,
        status_text: status.canonical_reason().unwrap_or("Unknown").to_string(),
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn fetch(&self, url: &Url, timeout: Duration) -> Result<Body> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| classify(url, timeout, &e))?;

        let status = response.status();
        if !is_success_status(status) {
            return Err(status_error(url, status));
        }

        let final_url = response.url().clone();
        let headers = response.headers().clone();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| classify(url, timeout, &e))?;

        log::trace!("{url} answered {status} with {} bytes", bytes.len());
        Ok(Body::new(final_url, status, headers, &bytes[..]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;
    use pretty_assertions::assert_eq;
    use test_utils::mock_server;

    fn transport() -> ReqwestTransport {
        ReqwestTransport::new(&CoordinatorConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_success_returns_body() {
        let mock_server = mock_server!(StatusCode::OK, set_body_string("hello"));
        let url = Url::parse(&mock_server.uri()).unwrap();

        let body = transport()
            .fetch(&url, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(body.status(), StatusCode::OK);
        assert_eq!(body.text(), "hello");
    }

    #[tokio::test]
    async fn test_non_success_status_is_classified() {
        let mock_server = mock_server!(StatusCode::NOT_FOUND);
        let url = Url::parse(&mock_server.uri()).unwrap();

        let err = transport()
            .fetch(&url, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ErrorKind::HttpStatus {
                url,
                status: StatusCode::NOT_FOUND,
                status_text: "Not Found".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_redirect_status_is_not_success() {
        let config = CoordinatorConfig {
            max_redirects: 0,
            ..CoordinatorConfig::default()
        };
        let mock_server = mock_server!(
            StatusCode::MOVED_PERMANENTLY,
            insert_header("Location", "http://127.0.0.1:1/elsewhere")
        );
        let url = Url::parse(&mock_server.uri()).unwrap();

        let err = ReqwestTransport::new(&config)
            .unwrap()
            .fetch(&url, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::MOVED_PERMANENTLY));
    }

    #[tokio::test]
    async fn test_custom_headers_and_user_agent() {
        use wiremock::matchers::{header, method};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("user-agent", "gatehouse-test"))
            .and(header("x-token", "secret"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&mock_server)
            .await;

        let mut config = CoordinatorConfig {
            user_agent: "gatehouse-test".to_string(),
            ..CoordinatorConfig::default()
        };
        config.headers.insert("x-token", "secret".parse().unwrap());

        let url = Url::parse(&mock_server.uri()).unwrap();
        let result = ReqwestTransport::new(&config)
            .unwrap()
            .fetch(&url, Duration::from_secs(5))
            .await;
        assert!(result.is_ok());
    }

    #[test]
    fn test_invalid_user_agent() {
        let config = CoordinatorConfig {
            user_agent: "bad\nagent".to_string(),
            ..CoordinatorConfig::default()
        };
        assert!(matches!(
            ReqwestTransport::new(&config),
            Err(ErrorKind::InvalidConfig(_))
        ));
    }
}
