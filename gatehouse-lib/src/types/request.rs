use std::convert::TryFrom;
use std::fmt::Display;

use url::Url;

use crate::{ErrorKind, Result};

/// A validated fetch request.
///
/// The request remembers the exact string the caller asked for, because
/// in-flight deduplication is keyed on that string rather than on the
/// normalized form of the URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FetchRequest {
    key: String,
    url: Url,
}

impl FetchRequest {
    /// Create a request from an already parsed URL
    #[must_use]
    pub fn new(url: Url) -> Self {
        Self {
            key: url.as_str().to_owned(),
            url,
        }
    }

    /// The exact string used to deduplicate this request
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The parsed URL to fetch
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    /// Consume the request and return the parsed URL
    #[must_use]
    pub fn into_url(self) -> Url {
        self.url
    }

    fn parse(input: &str) -> Result<Self> {
        if input.trim().is_empty() {
            return Err(ErrorKind::InvalidArgument(
                "URL must be a non-empty string".to_string(),
            ));
        }
        let url = Url::parse(input).map_err(|e| ErrorKind::InvalidUrl {
            input: input.to_owned(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            key: input.to_owned(),
            url,
        })
    }
}

impl Display for FetchRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key)
    }
}

impl TryFrom<&str> for FetchRequest {
    type Error = ErrorKind;

    fn try_from(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for FetchRequest {
    type Error = ErrorKind;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl TryFrom<&String> for FetchRequest {
    type Error = ErrorKind;

    fn try_from(s: &String) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<&[u8]> for FetchRequest {
    type Error = ErrorKind;

    fn try_from(bytes: &[u8]) -> Result<Self> {
        let s = std::str::from_utf8(bytes).map_err(|_| {
            ErrorKind::InvalidArgument("URL must be a valid UTF-8 string".to_string())
        })?;
        Self::parse(s)
    }
}

impl TryFrom<Vec<u8>> for FetchRequest {
    type Error = ErrorKind;

    fn try_from(bytes: Vec<u8>) -> Result<Self> {
        Self::try_from(bytes.as_slice())
    }
}

impl From<Url> for FetchRequest {
    fn from(url: Url) -> Self {
        Self::new(url)
    }
}

impl From<&Url> for FetchRequest {
    fn from(url: &Url) -> Self {
        Self::new(url.clone())
    }
}
