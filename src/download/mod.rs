//! Fetch pipeline: endpoint templates, filename recovery, streamed writes and
//! bounded-concurrency orchestration.
//!
//! # Features
//!
//! - Ordered endpoint-template fallback per ID (first success wins)
//! - Filename recovery from `Content-Disposition` with a `Book_<id>.epub` fallback
//! - Streaming writes in fixed-size chunks, partial files removed on failure
//! - Skip-if-present, checked for both the fallback and the resolved name
//! - Optional range discovery through existence probes
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use idsweep_core::download::{HttpClient, ItemFetcher, LocalStorage, library_templates};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let templates = library_templates("http://192.168.1.5:8080", "Calibre")?;
//! let fetcher = ItemFetcher::new(
//!     Arc::new(HttpClient::new()),
//!     Arc::new(LocalStorage),
//!     templates,
//!     "./books",
//! );
//! let outcome = fetcher.fetch_item(42).await;
//! println!("{}", outcome.kind());
//! # Ok(())
//! # }
//! ```

mod client;
pub mod constants;
mod engine;
mod error;
mod fetcher;
pub mod filename;
mod scanner;
mod storage;
mod template;
mod transport;

pub use client::HttpClient;
pub use engine::{
    DEFAULT_CONCURRENCY, EngineError, FetchEngine, IdRange, MAX_CONCURRENCY, MIN_CONCURRENCY,
    RunStats, RunSummary,
};
pub use error::DownloadError;
pub use fetcher::{FetchOutcome, ItemFetcher};
pub use filename::{BookLabel, resolve_filename, sanitize_filename};
pub use scanner::{ExistenceProbe, RangeBounds, RangeScanner, TemplateProbe};
pub use storage::{LocalStorage, Storage, WriteSink};
pub use template::{
    EndpointTemplate, ID_PLACEHOLDER, TemplateError, library_templates, parse_templates,
};
pub use transport::{BodyStream, FetchResponse, Transport};

// Note: we do NOT define module-local Result aliases.
// Use `Result<T, DownloadError>` explicitly in function signatures.
