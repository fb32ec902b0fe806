//! idsweep core library
//!
//! Walks a dense numeric ID space on a content server, fetches the item behind
//! each ID through an ordered list of endpoint templates, recovers the item's
//! filename from `Content-Disposition` and streams it to disk. Items already on
//! disk are skipped; per-item failures never abort a run.
//!
//! # Architecture
//!
//! Everything lives under [`download`]:
//! - `filename` - header-driven filename recovery and sanitization
//! - `scanner` - optional discovery of the lowest/highest existing IDs
//! - `fetcher` - per-ID template fallback and streamed write
//! - `engine` - bounded-concurrency orchestration over an ID range
//!
//! The HTTP client and the filesystem sit behind the [`download::Transport`]
//! and [`download::Storage`] traits.

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod download;
pub(crate) mod user_agent;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types
pub use download::{
    DEFAULT_CONCURRENCY, DownloadError, EndpointTemplate, EngineError, FetchEngine, FetchOutcome,
    HttpClient, IdRange, ItemFetcher, LocalStorage, RangeBounds, RangeScanner, RunStats,
    RunSummary, TemplateProbe,
};
