use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream;
use reqwest::header::{CONTENT_DISPOSITION, HeaderMap, HeaderValue};

use crate::download::{DownloadError, FetchResponse, Transport};

/// Scripted reply for one URL.
#[derive(Debug, Clone)]
pub enum MockRoute {
    /// Bare status, empty body.
    Status(u16),
    /// 200 with an optional Content-Disposition and a body.
    Ok {
        disposition: Option<String>,
        body: Vec<u8>,
    },
    /// Transport-level failure (connection refused, timeout...).
    Fail,
    /// 200 whose body errors after the first chunk.
    BrokenBody { first_chunk: Vec<u8> },
}

impl MockRoute {
    pub fn ok(disposition: &str, body: &[u8]) -> Self {
        Self::Ok {
            disposition: Some(disposition.to_string()),
            body: body.to_vec(),
        }
    }
}

/// [`Transport`] returning scripted replies; unknown URLs answer 404.
#[derive(Debug, Default)]
pub struct MockTransport {
    routes: HashMap<String, MockRoute>,
    existing: HashSet<String>,
    delay: Duration,
    calls: Mutex<Vec<String>>,
    probes: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, url: &str, route: MockRoute) -> Self {
        self.routes.insert(url.to_string(), route);
        self
    }

    pub fn existing(mut self, url: &str) -> Self {
        self.existing.insert(url.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn probes(&self) -> Vec<String> {
        self.probes.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn enter(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }

    fn leave(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn fetch(&self, url: &str) -> Result<FetchResponse, DownloadError> {
        self.calls.lock().unwrap().push(url.to_string());
        self.enter().await;
        let route = self.routes.get(url).cloned().unwrap_or(MockRoute::Status(404));
        self.leave();

        match route {
            MockRoute::Status(status) => {
                Ok(FetchResponse::from_bytes(status, HeaderMap::new(), Vec::new()))
            }
            MockRoute::Ok { disposition, body } => {
                let mut headers = HeaderMap::new();
                if let Some(value) = disposition {
                    headers.insert(CONTENT_DISPOSITION, HeaderValue::from_str(&value).unwrap());
                }
                Ok(FetchResponse::from_bytes(200, headers, body))
            }
            MockRoute::Fail => Err(DownloadError::timeout(url)),
            MockRoute::BrokenBody { first_chunk } => {
                let failing_url = url.to_string();
                let body = stream::iter(vec![
                    Ok(first_chunk),
                    Err(DownloadError::timeout(failing_url)),
                ])
                .boxed();
                Ok(FetchResponse {
                    status: 200,
                    headers: HeaderMap::new(),
                    body,
                })
            }
        }
    }

    async fn exists(&self, url: &str) -> bool {
        self.probes.lock().unwrap().push(url.to_string());
        self.enter().await;
        let found = self.existing.contains(url);
        self.leave();
        found
    }
}
