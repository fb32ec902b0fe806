//! Transport seam between the fetch pipeline and the HTTP client.
//!
//! The pipeline only needs "GET this URL and hand me status, headers and a
//! body stream" plus a cheap existence probe. [`HttpClient`](super::HttpClient)
//! is the production implementation; tests plug in mocks.

use std::fmt;

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream::{self, BoxStream};
use reqwest::header::HeaderMap;

use super::DownloadError;

/// Streamed response body, one chunk per item.
pub type BodyStream = BoxStream<'static, Result<Vec<u8>, DownloadError>>;

/// Status, headers and body of one GET.
pub struct FetchResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers (case-insensitive lookup).
    pub headers: HeaderMap,
    /// Body, consumed by streaming.
    pub body: BodyStream,
}

impl FetchResponse {
    /// Builds a response whose body is already in memory.
    #[must_use]
    pub fn from_bytes(status: u16, headers: HeaderMap, body: Vec<u8>) -> Self {
        Self {
            status,
            headers,
            body: stream::once(async move { Ok(body) }).boxed(),
        }
    }

    /// Whether the status is 2xx.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl fmt::Debug for FetchResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// What the fetch pipeline needs from an HTTP client.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issues a GET. Non-success statuses are returned, not raised.
    ///
    /// # Errors
    ///
    /// Returns a [`DownloadError`] for connection failures, timeouts and
    /// malformed URLs.
    async fn fetch(&self, url: &str) -> Result<FetchResponse, DownloadError>;

    /// Lightweight existence check (no body transfer).
    async fn exists(&self, url: &str) -> bool;
}
