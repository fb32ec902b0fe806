//! Fetch orchestrator: walks an ID range with bounded concurrency.
//!
//! The engine dispatches one [`ItemFetcher::fetch_item`] task per ID, from
//! the highest ID down, gated by a semaphore. Per-ID outcomes are tallied in
//! [`RunStats`]; none of them stops the run. Only failing to create the
//! destination directory is fatal, and that happens before any dispatch.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use idsweep_core::download::{
//!     FetchEngine, HttpClient, IdRange, ItemFetcher, LocalStorage, parse_templates,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let templates = parse_templates(&["http://library.local/get/EPUB/{}/Books"])?;
//! let fetcher = ItemFetcher::new(
//!     Arc::new(HttpClient::new()),
//!     Arc::new(LocalStorage),
//!     templates,
//!     "./books",
//! );
//! let engine = FetchEngine::new(4, Duration::from_millis(100))?;
//! let summary = engine.run(Arc::new(fetcher), IdRange::new(200, 1)?).await?;
//! println!("saved {} of {}", summary.saved, summary.total);
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::{self, JoinError, JoinSet};
use tracing::{debug, info, instrument, warn};

use super::DownloadError;
use super::fetcher::{FetchOutcome, ItemFetcher};
use super::scanner::RangeBounds;

/// Minimum allowed concurrency value.
pub const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed concurrency value.
pub const MAX_CONCURRENCY: usize = 25;

/// Default concurrency if not specified.
pub const DEFAULT_CONCURRENCY: usize = 2;

/// Error type for orchestrator setup and run failures.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Invalid concurrency value provided.
    #[error(
        "invalid concurrency value {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"
    )]
    InvalidConcurrency {
        /// The invalid value that was provided.
        value: usize,
    },

    /// Range bounds out of order or below 1.
    #[error("invalid ID range {lowest}..={highest}: need 1 <= lowest <= highest")]
    InvalidRange {
        /// Requested highest ID.
        highest: u64,
        /// Requested lowest ID.
        lowest: u64,
    },

    /// The destination directory could not be created.
    #[error("cannot create destination directory {}: {source}", .path.display())]
    Destination {
        /// The directory that failed.
        path: PathBuf,
        /// Underlying filesystem error.
        #[source]
        source: DownloadError,
    },

    /// Semaphore was closed unexpectedly.
    #[error("semaphore closed unexpectedly")]
    SemaphoreClosed,
}

/// Inclusive ID range, walked from `highest` down to `lowest`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdRange {
    highest: u64,
    lowest: u64,
}

impl IdRange {
    /// Validates `1 <= lowest <= highest`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidRange`] otherwise.
    pub fn new(highest: u64, lowest: u64) -> Result<Self, EngineError> {
        if lowest == 0 || lowest > highest {
            return Err(EngineError::InvalidRange { highest, lowest });
        }
        Ok(Self { highest, lowest })
    }

    /// Highest ID (dispatched first).
    #[must_use]
    pub fn highest(&self) -> u64 {
        self.highest
    }

    /// Lowest ID (dispatched last).
    #[must_use]
    pub fn lowest(&self) -> u64 {
        self.lowest
    }

    /// Number of IDs in the range.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.highest - self.lowest + 1
    }

    /// Always false; a valid range holds at least one ID.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// IDs in dispatch order, highest first.
    pub fn ids(&self) -> impl Iterator<Item = u64> {
        (self.lowest..=self.highest).rev()
    }
}

impl From<RangeBounds> for IdRange {
    fn from(bounds: RangeBounds) -> Self {
        Self {
            highest: bounds.highest,
            lowest: bounds.lowest,
        }
    }
}

/// Live outcome counters for a run.
///
/// Uses atomic counters so spawned tasks can record while a progress
/// display reads.
#[derive(Debug, Default)]
pub struct RunStats {
    saved: AtomicUsize,
    skipped: AtomicUsize,
    not_found: AtomicUsize,
    errors: AtomicUsize,
}

impl RunStats {
    /// Creates a new stats tracker with zero counts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Items written this run.
    #[must_use]
    pub fn saved(&self) -> usize {
        self.saved.load(Ordering::SeqCst)
    }

    /// Items already on disk.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.skipped.load(Ordering::SeqCst)
    }

    /// IDs no template could serve.
    #[must_use]
    pub fn not_found(&self) -> usize {
        self.not_found.load(Ordering::SeqCst)
    }

    /// IDs that failed while writing.
    #[must_use]
    pub fn errors(&self) -> usize {
        self.errors.load(Ordering::SeqCst)
    }

    /// IDs finished so far.
    #[must_use]
    pub fn total(&self) -> usize {
        self.saved() + self.skipped() + self.not_found() + self.errors()
    }

    /// Counts one outcome.
    pub fn record(&self, outcome: &FetchOutcome) {
        let counter = match outcome {
            FetchOutcome::Saved { .. } => &self.saved,
            FetchOutcome::Skipped { .. } => &self.skipped,
            FetchOutcome::NotFound => &self.not_found,
            FetchOutcome::Error { .. } => &self.errors,
        };
        counter.fetch_add(1, Ordering::SeqCst);
    }

    /// Point-in-time copy of the counters.
    #[must_use]
    pub fn summary(&self) -> RunSummary {
        let (saved, skipped, not_found, errors) =
            (self.saved(), self.skipped(), self.not_found(), self.errors());
        RunSummary {
            saved,
            skipped,
            not_found,
            errors,
            total: saved + skipped + not_found + errors,
        }
    }
}

/// Final tally of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RunSummary {
    /// Items written.
    pub saved: usize,
    /// Items already present.
    pub skipped: usize,
    /// IDs with no item on any template.
    pub not_found: usize,
    /// IDs that failed.
    pub errors: usize,
    /// All IDs processed.
    pub total: usize,
}

/// Bounded-concurrency orchestrator over an [`IdRange`].
///
/// # Concurrency Model
///
/// - Each ID runs in its own Tokio task
/// - A semaphore permit is acquired before spawning, so at most
///   `concurrency` fetches are in flight
/// - Permits are released when the task finishes (RAII)
/// - An optional pacing delay spaces out successive dispatches
#[derive(Debug)]
pub struct FetchEngine {
    semaphore: Arc<Semaphore>,
    concurrency: usize,
    pacing: Duration,
}

impl FetchEngine {
    /// Creates an engine.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConcurrency`] if the value is outside
    /// the valid range (1-25).
    #[instrument(level = "debug")]
    pub fn new(concurrency: usize, pacing: Duration) -> Result<Self, EngineError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&concurrency) {
            return Err(EngineError::InvalidConcurrency { value: concurrency });
        }

        debug!(
            concurrency,
            pacing_ms = pacing.as_millis(),
            "creating fetch engine"
        );

        Ok(Self {
            semaphore: Arc::new(Semaphore::new(concurrency)),
            concurrency,
            pacing,
        })
    }

    /// Returns the configured concurrency limit.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Delay between successive dispatches.
    #[must_use]
    pub fn pacing(&self) -> Duration {
        self.pacing
    }

    /// Processes every ID in `range` and returns the tally.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Destination`] if the destination directory
    /// cannot be created, and [`EngineError::SemaphoreClosed`] if the
    /// semaphore is closed. Per-ID failures never error.
    pub async fn run(
        &self,
        fetcher: Arc<ItemFetcher>,
        range: IdRange,
    ) -> Result<RunSummary, EngineError> {
        self.run_with_stats(fetcher, range, Arc::new(RunStats::new()))
            .await
    }

    /// Like [`run`](Self::run), recording into caller-owned `stats` so a
    /// progress display can poll them.
    ///
    /// # Errors
    ///
    /// Same as [`run`](Self::run).
    #[instrument(skip(self, fetcher, stats), fields(highest = range.highest(), lowest = range.lowest()))]
    pub async fn run_with_stats(
        &self,
        fetcher: Arc<ItemFetcher>,
        range: IdRange,
        stats: Arc<RunStats>,
    ) -> Result<RunSummary, EngineError> {
        fetcher
            .prepare_destination()
            .await
            .map_err(|source| EngineError::Destination {
                path: fetcher.destination().to_path_buf(),
                source,
            })?;

        info!(
            ids = range.len(),
            concurrency = self.concurrency,
            destination = %fetcher.destination().display(),
            "starting run"
        );

        // Finished tasks are reaped as dispatch goes, so only in-flight
        // fetches are held here.
        let mut tasks = JoinSet::new();
        let mut in_flight: HashMap<task::Id, u64> = HashMap::new();
        for (index, id) in range.ids().enumerate() {
            if index > 0 && !self.pacing.is_zero() {
                tokio::time::sleep(self.pacing).await;
            }

            // Blocks while `concurrency` fetches are in flight
            let permit = self
                .semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| EngineError::SemaphoreClosed)?;

            reap_finished(&mut tasks, &mut in_flight, &stats);

            let fetcher = Arc::clone(&fetcher);
            let stats = Arc::clone(&stats);
            let handle = tasks.spawn(async move {
                let _permit = permit;
                let outcome = fetcher.fetch_item(id).await;
                report(id, &outcome);
                stats.record(&outcome);
            });
            in_flight.insert(handle.id(), id);
        }

        debug!(task_count = tasks.len(), "waiting for fetches to complete");

        while let Some(joined) = tasks.join_next_with_id().await {
            settle(joined, &mut in_flight, &stats);
        }

        let summary = stats.summary();
        info!(
            saved = summary.saved,
            skipped = summary.skipped,
            not_found = summary.not_found,
            errors = summary.errors,
            total = summary.total,
            "run complete"
        );
        Ok(summary)
    }
}

/// Collects every task that has already finished without waiting.
fn reap_finished(
    tasks: &mut JoinSet<()>,
    in_flight: &mut HashMap<task::Id, u64>,
    stats: &RunStats,
) {
    while let Some(joined) = tasks.try_join_next_with_id() {
        settle(joined, in_flight, stats);
    }
}

/// A panicked fetch counts as an error outcome for its ID.
fn settle(
    joined: Result<(task::Id, ()), JoinError>,
    in_flight: &mut HashMap<task::Id, u64>,
    stats: &RunStats,
) {
    match joined {
        Ok((task_id, ())) => {
            in_flight.remove(&task_id);
        }
        Err(e) => {
            let id = in_flight.remove(&e.id());
            warn!(?id, error = %e, "fetch task panicked");
            stats.record(&FetchOutcome::Error {
                reason: e.to_string(),
            });
        }
    }
}

/// Per-ID status line.
fn report(id: u64, outcome: &FetchOutcome) {
    match outcome {
        FetchOutcome::Saved { path, label } => info!(
            id,
            title = %label.title,
            author = %label.author,
            path = %path.display(),
            "saved"
        ),
        FetchOutcome::Skipped { path } => info!(id, path = %path.display(), "skipped, already present"),
        FetchOutcome::NotFound => warn!(id, "not found on any endpoint"),
        FetchOutcome::Error { reason } => warn!(id, %reason, "failed"),
    }
}
