//! Storage seam: the few filesystem operations the fetch pipeline performs.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};

use super::DownloadError;

/// Destination for one item's bytes.
#[async_trait]
pub trait WriteSink: Send {
    /// Appends a chunk.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Io`] if the write fails.
    async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), DownloadError>;

    /// Flushes and releases the sink.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Io`] if the flush fails.
    async fn close(self: Box<Self>) -> Result<(), DownloadError>;
}

/// Filesystem operations used by the fetcher and orchestrator.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Whether `path` already exists.
    async fn exists(&self, path: &Path) -> bool;

    /// Creates `path` and any missing parents.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Io`] when the directory cannot be created.
    async fn create_dir_all(&self, path: &Path) -> Result<(), DownloadError>;

    /// Creates (or truncates) `path` for writing.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Io`] when the file cannot be opened.
    async fn open_for_write(&self, path: &Path) -> Result<Box<dyn WriteSink>, DownloadError>;

    /// Deletes a file, used to drop partial downloads.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Io`] when removal fails.
    async fn remove_file(&self, path: &Path) -> Result<(), DownloadError>;
}

/// [`Storage`] backed by the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalStorage;

#[async_trait]
impl Storage for LocalStorage {
    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    async fn create_dir_all(&self, path: &Path) -> Result<(), DownloadError> {
        tokio::fs::create_dir_all(path)
            .await
            .map_err(|e| DownloadError::io(path, e))
    }

    async fn open_for_write(&self, path: &Path) -> Result<Box<dyn WriteSink>, DownloadError> {
        let file = File::create(path)
            .await
            .map_err(|e| DownloadError::io(path, e))?;
        Ok(Box::new(FileSink {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
        }))
    }

    async fn remove_file(&self, path: &Path) -> Result<(), DownloadError> {
        tokio::fs::remove_file(path)
            .await
            .map_err(|e| DownloadError::io(path, e))
    }
}

struct FileSink {
    path: PathBuf,
    writer: BufWriter<File>,
}

#[async_trait]
impl WriteSink for FileSink {
    async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), DownloadError> {
        self.writer
            .write_all(chunk)
            .await
            .map_err(|e| DownloadError::io(self.path.clone(), e))
    }

    async fn close(self: Box<Self>) -> Result<(), DownloadError> {
        let mut sink = *self;
        // Ensure all data is flushed to disk
        sink.writer
            .flush()
            .await
            .map_err(|e| DownloadError::io(sink.path.clone(), e))
    }
}
