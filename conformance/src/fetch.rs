//! HTTP fetch boundary.
//!
//! Every network access the engine makes goes through a [`Fetcher`]: the
//! initial request for the resource under test, the one-time metadata
//! request, and the secondary requests some rules issue. Fetches are bounded
//! by a timeout and a maximum body size; non-2xx statuses are ordinary
//! responses, never errors.

use std::collections::HashMap;
use std::io::Read;
use std::time::{Duration, Instant};

use reqwest::blocking::Client;
use reqwest::header::ACCEPT;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

/// Default cap on response bodies (4 MiB).
pub const DEFAULT_MAX_BYTES: usize = 4 * 1024 * 1024;

/// Response headers in arrival order, looked up case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HeaderList(Vec<(String, String)>);

impl HeaderList {
    /// Creates an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Appends a header, keeping earlier values with the same name.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push((name.into(), value.into()));
    }

    /// First value of the named header.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Every value of the named header, in order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.0
            .iter()
            .filter(move |(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// True when the header is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// All headers in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Number of headers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when no header is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for HeaderList {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(n, v)| (n.into(), v.into()))
                .collect(),
        )
    }
}

/// A completed HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Response headers.
    pub headers: HeaderList,
    /// Body decoded as UTF-8 (lossily).
    pub body: String,
}

impl HttpResponse {
    /// Builds a response from parts.
    #[must_use]
    pub fn new(status: u16, headers: HeaderList, body: impl Into<String>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    /// The `Content-Type` header, if present.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("Content-Type")
    }

    /// True for 2xx statuses.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A GET request to issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// Absolute URI.
    pub uri: String,
    /// `Accept` header value.
    pub accept: Option<String>,
    /// Largest body accepted, in bytes.
    pub max_bytes: usize,
    /// Additional request headers.
    pub headers: Vec<(String, String)>,
}

impl FetchRequest {
    /// A request for `uri` with no `Accept` header and the default size cap.
    #[must_use]
    pub fn get(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            accept: None,
            max_bytes: DEFAULT_MAX_BYTES,
            headers: Vec::new(),
        }
    }

    /// Sets the `Accept` header.
    #[must_use]
    pub fn accept(mut self, accept: impl Into<String>) -> Self {
        self.accept = Some(accept.into());
        self
    }

    /// Sets the body size cap.
    #[must_use]
    pub fn max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Adds a request header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// A fetch that produced no response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The URI could not be parsed.
    #[error("invalid URI `{0}`")]
    InvalidUri(String),

    /// The request or body transfer exceeded the timeout.
    #[error("could not retrieve resource {uri}: timed out")]
    Timeout {
        /// Requested URI.
        uri: String,
    },

    /// The body exceeded the size cap.
    #[error("could not retrieve resource {uri}: body exceeds {limit} bytes")]
    TooLarge {
        /// Requested URI.
        uri: String,
        /// Cap that was exceeded.
        limit: usize,
    },

    /// Connection, TLS or protocol failure.
    #[error("could not retrieve resource {uri}: {message}")]
    Transport {
        /// Requested URI.
        uri: String,
        /// Underlying error.
        message: String,
    },

    /// No response is available for the URI (offline or canned fetchers).
    #[error("could not retrieve resource {uri}: not available offline")]
    Unavailable {
        /// Requested URI.
        uri: String,
    },
}

/// Issues GET requests.
pub trait Fetcher: Send + Sync + std::fmt::Debug {
    /// Performs the request.
    ///
    /// # Errors
    ///
    /// Returns a [`FetchError`] when no complete response within the size and
    /// time bounds could be obtained. HTTP error statuses are not errors.
    fn fetch(&self, request: &FetchRequest) -> Result<HttpResponse, FetchError>;
}

/// Live fetcher over a blocking `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    timeout: Duration,
}

impl HttpFetcher {
    /// Builds a fetcher whose requests time out after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Transport`] when the TLS backend cannot be
    /// initialised.
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Transport {
                uri: String::new(),
                message: e.to_string(),
            })?;
        Ok(Self { client, timeout })
    }

    /// Configured timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, request: &FetchRequest) -> Result<HttpResponse, FetchError> {
        let url = reqwest::Url::parse(&request.uri)
            .map_err(|_| FetchError::InvalidUri(request.uri.clone()))?;
        let started = Instant::now();

        let mut builder = self.client.get(url);
        if let Some(accept) = &request.accept {
            builder = builder.header(ACCEPT, accept);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let classify = |e: reqwest::Error| {
            if e.is_timeout() {
                FetchError::Timeout {
                    uri: request.uri.clone(),
                }
            } else {
                FetchError::Transport {
                    uri: request.uri.clone(),
                    message: e.to_string(),
                }
            }
        };
        let response = builder.send().map_err(classify)?;

        let too_large = || FetchError::TooLarge {
            uri: request.uri.clone(),
            limit: request.max_bytes,
        };
        if response
            .content_length()
            .is_some_and(|len| len > byte_cap(request.max_bytes))
        {
            return Err(too_large());
        }

        let status = response.status().as_u16();
        let headers: HeaderList = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();

        let mut bytes = Vec::new();
        response
            .take(read_limit(request.max_bytes))
            .read_to_end(&mut bytes)
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::TimedOut || started.elapsed() >= self.timeout {
                    FetchError::Timeout {
                        uri: request.uri.clone(),
                    }
                } else {
                    FetchError::Transport {
                        uri: request.uri.clone(),
                        message: e.to_string(),
                    }
                }
            })?;
        if bytes.len() > request.max_bytes {
            return Err(too_large());
        }

        debug!(
            uri = %request.uri,
            status,
            bytes = bytes.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "fetched"
        );
        Ok(HttpResponse {
            status,
            headers,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        })
    }
}

/// Serves canned responses keyed by URI; anything else is unavailable.
///
/// Used for offline runs over captured payloads and in tests.
#[derive(Debug, Clone, Default)]
pub struct StaticFetcher {
    responses: HashMap<String, HttpResponse>,
}

impl StaticFetcher {
    /// Creates an empty fetcher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the response served for `uri`.
    #[must_use]
    pub fn with(mut self, uri: impl Into<String>, response: HttpResponse) -> Self {
        self.responses.insert(uri.into(), response);
        self
    }
}

impl Fetcher for StaticFetcher {
    fn fetch(&self, request: &FetchRequest) -> Result<HttpResponse, FetchError> {
        let response = self
            .responses
            .get(&request.uri)
            .cloned()
            .ok_or_else(|| FetchError::Unavailable {
                uri: request.uri.clone(),
            })?;
        if response.body.len() > request.max_bytes {
            return Err(FetchError::TooLarge {
                uri: request.uri.clone(),
                limit: request.max_bytes,
            });
        }
        Ok(response)
    }
}

fn byte_cap(max_bytes: usize) -> u64 {
    u64::try_from(max_bytes).unwrap_or(u64::MAX)
}

/// Bytes to read so that a body over `max_bytes` is noticed.
fn read_limit(max_bytes: usize) -> u64 {
    byte_cap(max_bytes).saturating_add(1)
}
