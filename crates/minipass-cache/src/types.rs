//! Request and response values passed through the worker.

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Method, StatusCode};
use url::Url;

/// A request intercepted by the worker
#[derive(Debug, Clone)]
pub struct AssetRequest {
    pub url: Url,
    pub method: Method,
    pub headers: HeaderMap,
}

impl AssetRequest {
    /// Create a GET request for the given URL
    pub fn get(url: Url) -> Self {
        Self {
            url,
            method: Method::GET,
            headers: HeaderMap::new(),
        }
    }

    /// Set the Accept header
    pub fn with_accept(mut self, accept: &str) -> Self {
        if let Ok(value) = HeaderValue::from_str(accept) {
            self.headers.insert(reqwest::header::ACCEPT, value);
        }
        self
    }

    /// The Accept header value, if present and valid UTF-8
    pub fn accept(&self) -> Option<&str> {
        self.headers
            .get(reqwest::header::ACCEPT)
            .and_then(|v| v.to_str().ok())
    }
}

/// A response held in or served from the cache.
///
/// Bodies are `Bytes`, so cloning a response for the cache is cheap.
#[derive(Debug, Clone)]
pub struct AssetResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl AssetResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Shorthand for a 200 response with a body
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// Whether the status is in the successful range
    pub fn is_ok(&self) -> bool {
        self.status.is_success()
    }
}
