//! HTTP fetch seam
//!
//! Every network read made by the product wall goes through the [`Fetcher`]
//! trait. The real implementation is [`HttpFetcher`] (reqwest); the caching
//! interceptor in [`crate::cache`] implements the same trait and wraps it, so
//! callers never know whether a response came from the network or a cache.

use async_trait::async_trait;
use reqwest::header::{CACHE_CONTROL, CONTENT_TYPE, PRAGMA};
use reqwest::Client;
use serde::de::DeserializeOwned;
use thiserror::Error;
use url::Url;

/// Errors that can occur while fetching a resource
#[derive(Debug, Error)]
pub enum FetchError {
    /// HTTP request failed (connection refused, timeout, ...)
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// The request URL could not be resolved against the base URL
    #[error("Invalid request URL '{0}'")]
    InvalidUrl(String),

    /// The server answered with a non-success status
    #[error("HTTP error! status: {status} for {url}")]
    Status { status: u16, url: String },

    /// The response body could not be decoded
    #[error("Failed to parse response body: {0}")]
    ParseError(#[from] serde_json::Error),

    /// The network is not reachable at all
    #[error("Network unavailable: {0}")]
    Unavailable(String),
}

/// HTTP method of a request. Only GET requests are ever cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// An outgoing read request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    /// Absolute URL or a path relative to the fetcher's base URL
    pub url: String,
    /// Ask intermediaries not to serve a stored copy
    pub no_cache: bool,
}

impl Request {
    /// Creates a GET request for the given URL or path
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            no_cache: false,
        }
    }

    /// Creates a POST request for the given URL or path
    pub fn post(url: impl Into<String>) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            no_cache: false,
        }
    }

    /// Marks the request with cache-busting headers
    pub fn no_cache(mut self) -> Self {
        self.no_cache = true;
        self
    }

    /// The key under which the response is stored in a cache
    pub fn key(&self) -> &str {
        &self.url
    }

    /// Path component of the URL, without query string or fragment
    pub fn path(&self) -> String {
        if let Ok(url) = Url::parse(&self.url) {
            return url.path().to_string();
        }
        self.url
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string()
    }

    /// Host of the URL, if the URL is absolute
    pub fn host(&self) -> Option<String> {
        Url::parse(&self.url)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
    }
}

/// Where a response was produced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ServedFrom {
    #[default]
    Network,
    Cache,
    /// The bundled fallback payload, standing in for product data
    Fallback,
}

/// A fully buffered response
///
/// Bodies are owned bytes, so a response can be cloned freely: one copy goes
/// back to the caller while another is written to a cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
    pub served_from: ServedFrom,
}

impl Response {
    /// Creates a 200 response with the given body and content type
    pub fn ok(body: impl Into<Vec<u8>>, content_type: &str) -> Self {
        Self {
            status: 200,
            content_type: Some(content_type.to_string()),
            body: body.into(),
            served_from: ServedFrom::Network,
        }
    }

    /// Creates a 200 JSON response
    pub fn json_body(body: impl Into<Vec<u8>>) -> Self {
        Self::ok(body, "application/json")
    }

    /// Creates an empty response with the given status
    pub fn with_status(status: u16) -> Self {
        Self {
            status,
            content_type: None,
            body: Vec::new(),
            served_from: ServedFrom::Network,
        }
    }

    /// Marks where the response was produced
    pub fn tagged(mut self, served_from: ServedFrom) -> Self {
        self.served_from = served_from;
        self
    }

    /// Whether the status is in the 2xx range
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Turns a non-success status into a [`FetchError::Status`]
    pub fn error_for_status(self, url: &str) -> Result<Self, FetchError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(FetchError::Status {
                status: self.status,
                url: url.to_string(),
            })
        }
    }

    /// Decodes the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, FetchError> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// Anything that can answer a [`Request`]
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError>;
}

/// Fetcher backed by a reqwest client
///
/// Relative request paths are resolved against the base URL given at
/// construction; absolute URLs are fetched as-is.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    http_client: Client,
    base_url: Url,
}

impl HttpFetcher {
    /// Creates a new HttpFetcher rooted at `base_url`
    pub fn new(base_url: &str) -> Result<Self, FetchError> {
        let base_url =
            Url::parse(base_url).map_err(|_| FetchError::InvalidUrl(base_url.to_string()))?;
        Ok(Self {
            http_client: Client::new(),
            base_url,
        })
    }

    /// Returns the base URL relative paths are resolved against
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn resolve(&self, url: &str) -> Result<Url, FetchError> {
        self.base_url
            .join(url)
            .map_err(|_| FetchError::InvalidUrl(url.to_string()))
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
        let url = self.resolve(&request.url)?;

        let mut builder = match request.method {
            Method::Get => self.http_client.get(url),
            Method::Post => self.http_client.post(url),
        };
        if request.no_cache {
            builder = builder
                .header(CACHE_CONTROL, "no-cache")
                .header(PRAGMA, "no-cache");
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await?.to_vec();

        Ok(Response {
            status,
            content_type,
            body,
            served_from: ServedFrom::Network,
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory fetcher used by unit tests across the crate

    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Serves canned responses by exact URL and counts every call
    pub struct StaticFetcher {
        routes: Mutex<HashMap<String, Response>>,
        online: AtomicBool,
        calls: AtomicUsize,
    }

    impl StaticFetcher {
        pub fn new() -> Self {
            Self {
                routes: Mutex::new(HashMap::new()),
                online: AtomicBool::new(true),
                calls: AtomicUsize::new(0),
            }
        }

        pub fn offline() -> Self {
            let fetcher = Self::new();
            fetcher.set_online(false);
            fetcher
        }

        pub fn with_route(self, url: &str, response: Response) -> Self {
            self.routes
                .lock()
                .expect("routes lock")
                .insert(url.to_string(), response);
            self
        }

        pub fn set_online(&self, online: bool) {
            self.online.store(online, Ordering::SeqCst);
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Fetcher for StaticFetcher {
        async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.online.load(Ordering::SeqCst) {
                return Err(FetchError::Unavailable(request.url.clone()));
            }
            Ok(self
                .routes
                .lock()
                .expect("routes lock")
                .get(&request.url)
                .cloned()
                .unwrap_or_else(|| Response::with_status(404)))
        }
    }
}
