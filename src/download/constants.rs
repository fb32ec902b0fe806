//! Constants for the download module (timeouts, pacing, range defaults).

use std::time::Duration;

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default per-request deadline (5 minutes, books can be large).
pub const REQUEST_TIMEOUT_SECS: u64 = 300;

/// Bytes written to the sink per chunk while streaming a body.
pub const DEFAULT_CHUNK_SIZE: usize = 8192;

/// Pause between successive dispatches in the orchestrator.
pub const DEFAULT_PACING: Duration = Duration::from_millis(100);

/// Highest ID assumed when the range is not discovered.
pub const DEFAULT_HIGHEST_ID: u64 = 18_460;

/// Lowest ID in any range.
pub const DEFAULT_LOWEST_ID: u64 = 1;

/// Maximum stem length of a resolved filename, in characters.
pub const MAX_STEM_CHARS: usize = 240;

/// Maximum length of a resolved filename in bytes (common filesystem limit).
pub const MAX_FILENAME_BYTES: usize = 255;

/// Library name used with `--server` when none is given.
pub const DEFAULT_LIBRARY: &str = "Library";
