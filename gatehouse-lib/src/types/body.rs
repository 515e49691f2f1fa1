use std::borrow::Cow;
use std::sync::Arc;

use http::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

/// The successful result of a fetch.
///
/// The payload is reference counted, so handing the same body to every
/// caller of a coalesced request does not copy it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Body {
    url: Url,
    status: StatusCode,
    headers: HeaderMap,
    bytes: Arc<[u8]>,
}

impl Body {
    /// Create a new body
    pub fn new(url: Url, status: StatusCode, headers: HeaderMap, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            url,
            status,
            headers,
            bytes: bytes.into(),
        }
    }

    /// URL the body was served from, after redirects
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    /// The (successful) status code of the response
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Response headers
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Raw payload
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Payload decoded as UTF-8, replacing invalid sequences
    #[must_use]
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }

    /// Deserialize the payload as JSON
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.bytes)
    }

    /// Payload length in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the payload is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Repo {
        name: String,
        stars: u32,
    }

    fn body(payload: &[u8]) -> Body {
        Body::new(
            Url::parse("https://api.example.com/repo").unwrap(),
            StatusCode::OK,
            HeaderMap::new(),
            payload,
        )
    }

    #[test]
    fn test_json_payload() {
        let body = body(br#"{"name":"gatehouse","stars":42}"#);
        let repo: Repo = body.json().unwrap();
        assert_eq!(
            repo,
            Repo {
                name: "gatehouse".to_string(),
                stars: 42
            }
        );
    }

    #[test]
    fn test_text_is_lossy() {
        let body = body(&[b'o', b'k', 0xff]);
        assert_eq!(body.text(), "ok\u{fffd}");
        assert_eq!(body.len(), 3);
        assert!(!body.is_empty());
    }

    #[test]
    fn test_clones_share_payload() {
        let body = body(b"shared");
        let other = body.clone();
        assert!(std::ptr::eq(body.as_bytes(), other.as_bytes()));
        assert_eq!(body, other);
    }
}
