use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::download::{DownloadError, Storage, WriteSink};

#[derive(Debug, Default)]
struct MemoryState {
    files: HashMap<PathBuf, Vec<u8>>,
    dirs: HashSet<PathBuf>,
    chunk_sizes: Vec<usize>,
}

/// [`Storage`] keeping files in a map, with switchable failures.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    state: Arc<Mutex<MemoryState>>,
    fail_create_dir: bool,
    fail_open: bool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_create_dir() -> Self {
        Self {
            fail_create_dir: true,
            ..Self::default()
        }
    }

    pub fn failing_open() -> Self {
        Self {
            fail_open: true,
            ..Self::default()
        }
    }

    pub fn with_file(self, path: impl Into<PathBuf>, contents: &[u8]) -> Self {
        self.state
            .lock()
            .unwrap()
            .files
            .insert(path.into(), contents.to_vec());
        self
    }

    pub fn file(&self, path: &Path) -> Option<Vec<u8>> {
        self.state.lock().unwrap().files.get(path).cloned()
    }

    pub fn file_count(&self) -> usize {
        self.state.lock().unwrap().files.len()
    }

    pub fn has_dir(&self, path: &Path) -> bool {
        self.state.lock().unwrap().dirs.contains(path)
    }

    pub fn chunk_sizes(&self) -> Vec<usize> {
        self.state.lock().unwrap().chunk_sizes.clone()
    }
}

fn injected(path: &Path) -> DownloadError {
    DownloadError::io(path, std::io::Error::other("injected storage failure"))
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn exists(&self, path: &Path) -> bool {
        let state = self.state.lock().unwrap();
        state.files.contains_key(path) || state.dirs.contains(path)
    }

    async fn create_dir_all(&self, path: &Path) -> Result<(), DownloadError> {
        if self.fail_create_dir {
            return Err(injected(path));
        }
        self.state.lock().unwrap().dirs.insert(path.to_path_buf());
        Ok(())
    }

    async fn open_for_write(&self, path: &Path) -> Result<Box<dyn WriteSink>, DownloadError> {
        if self.fail_open {
            return Err(injected(path));
        }
        self.state
            .lock()
            .unwrap()
            .files
            .insert(path.to_path_buf(), Vec::new());
        Ok(Box::new(MemorySink {
            path: path.to_path_buf(),
            state: Arc::clone(&self.state),
        }))
    }

    async fn remove_file(&self, path: &Path) -> Result<(), DownloadError> {
        self.state.lock().unwrap().files.remove(path);
        Ok(())
    }
}

struct MemorySink {
    path: PathBuf,
    state: Arc<Mutex<MemoryState>>,
}

#[async_trait]
impl WriteSink for MemorySink {
    async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), DownloadError> {
        let mut state = self.state.lock().unwrap();
        state.chunk_sizes.push(chunk.len());
        state
            .files
            .entry(self.path.clone())
            .or_default()
            .extend_from_slice(chunk);
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<(), DownloadError> {
        Ok(())
    }
}
