//! Per-ID fetch pipeline: template fallback, filename recovery, streamed write.
//!
//! [`ItemFetcher::fetch_item`] never fails. Every problem that belongs to a
//! single ID is folded into its [`FetchOutcome`], so one bad item cannot
//! disturb the rest of the run.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::StreamExt;
use tracing::{debug, instrument, warn};

use super::DownloadError;
use super::constants::DEFAULT_CHUNK_SIZE;
use super::filename::{BookLabel, fallback_filename, resolve_filename};
use super::storage::{Storage, WriteSink};
use super::template::EndpointTemplate;
use super::transport::{BodyStream, FetchResponse, Transport};

/// Result of attempting one ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Body written to `path`.
    Saved {
        /// Final destination of the item.
        path: PathBuf,
        /// Display title/author derived from the filename.
        label: BookLabel,
    },
    /// A file was already present at `path`; nothing was written.
    Skipped {
        /// The pre-existing file.
        path: PathBuf,
    },
    /// Every endpoint template was tried without a success response.
    NotFound,
    /// Writing the item failed.
    Error {
        /// Human-readable cause.
        reason: String,
    },
}

impl FetchOutcome {
    /// Short lowercase tag used in logs and summaries.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Saved { .. } => "saved",
            Self::Skipped { .. } => "skipped",
            Self::NotFound => "not_found",
            Self::Error { .. } => "error",
        }
    }
}

/// Fetches single items from an ordered list of endpoint templates.
pub struct ItemFetcher {
    transport: Arc<dyn Transport>,
    storage: Arc<dyn Storage>,
    templates: Vec<EndpointTemplate>,
    destination: PathBuf,
    chunk_size: usize,
}

impl std::fmt::Debug for ItemFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ItemFetcher")
            .field("templates", &self.templates)
            .field("destination", &self.destination)
            .field("chunk_size", &self.chunk_size)
            .finish_non_exhaustive()
    }
}

impl ItemFetcher {
    /// Creates a fetcher writing under `destination`.
    ///
    /// `templates` is tried in order for every ID.
    #[must_use]
    pub fn new(
        transport: Arc<dyn Transport>,
        storage: Arc<dyn Storage>,
        templates: Vec<EndpointTemplate>,
        destination: impl Into<PathBuf>,
    ) -> Self {
        Self {
            transport,
            storage,
            templates,
            destination: destination.into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Sets the maximum bytes handed to storage per write. Zero is raised to one.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Destination directory.
    #[must_use]
    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Creates the destination directory.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Io`] when the directory cannot be created.
    pub async fn prepare_destination(&self) -> Result<(), DownloadError> {
        self.storage.create_dir_all(&self.destination).await
    }

    /// Attempts one ID and reports what happened.
    #[instrument(level = "debug", skip(self))]
    pub async fn fetch_item(&self, id: u64) -> FetchOutcome {
        let placeholder = self.destination.join(fallback_filename(id));
        if self.storage.exists(&placeholder).await {
            return FetchOutcome::Skipped { path: placeholder };
        }

        let Some(response) = self.first_success(id).await else {
            return FetchOutcome::NotFound;
        };

        let filename = resolve_filename(&response.headers, id);
        let path = self.destination.join(&filename);
        if path != placeholder && self.storage.exists(&path).await {
            return FetchOutcome::Skipped { path };
        }

        match self.persist(&path, response.body).await {
            Ok(bytes) => {
                debug!(path = %path.display(), bytes, "item written");
                FetchOutcome::Saved {
                    label: BookLabel::from_filename(&filename),
                    path,
                }
            }
            Err(e) => FetchOutcome::Error {
                reason: e.to_string(),
            },
        }
    }

    async fn first_success(&self, id: u64) -> Option<FetchResponse> {
        for template in &self.templates {
            let url = template.url_for(id);
            match self.transport.fetch(&url).await {
                Ok(response) if response.is_success() => return Some(response),
                Ok(response) => debug!(url, status = response.status, "template miss"),
                Err(e) => debug!(url, error = %e, "template request failed"),
            }
        }
        None
    }

    /// Streams `body` into `path`, removing the file if anything fails.
    async fn persist(&self, path: &Path, body: BodyStream) -> Result<u64, DownloadError> {
        let mut sink = self.storage.open_for_write(path).await?;

        let result = match write_body(sink.as_mut(), body, self.chunk_size).await {
            Ok(bytes) => sink.close().await.map(|()| bytes),
            Err(e) => {
                drop(sink);
                Err(e)
            }
        };

        if let Err(e) = &result {
            debug!(path = %path.display(), error = %e, "removing partial file");
            if let Err(cleanup) = self.storage.remove_file(path).await {
                warn!(path = %path.display(), error = %cleanup, "failed to remove partial file");
            }
        }
        result
    }
}

async fn write_body(
    sink: &mut dyn WriteSink,
    mut body: BodyStream,
    chunk_size: usize,
) -> Result<u64, DownloadError> {
    let mut written = 0u64;
    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        for piece in chunk.chunks(chunk_size) {
            sink.write_chunk(piece).await?;
            written += piece.len() as u64;
        }
    }
    Ok(written)
}
