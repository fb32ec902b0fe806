//! CLI argument definitions using clap derive macros.
//!
//! Every run setting is optional here so the config file can supply it;
//! [`crate::config::RunConfig::resolve`] applies the precedence.

use std::path::PathBuf;

use clap::Parser;

/// Sweep a numeric ID range on a content server and save every item found.
///
/// Each ID is fetched through the endpoint templates in order; the first
/// success is saved under the filename the server advertises. Items already
/// present in the destination are skipped.
#[derive(Parser, Debug)]
#[command(name = "idsweep")]
#[command(author, version, about)]
pub struct Args {
    /// Directory where items are saved
    #[arg(short = 'd', long = "dest", value_name = "DIR")]
    pub dest: Option<PathBuf>,

    /// Highest ID to fetch (the probe ceiling with --discover)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub highest: Option<u64>,

    /// Lowest ID to fetch
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub lowest: Option<u64>,

    /// Maximum concurrent fetches (1-25)
    #[arg(short = 'c', long, value_parser = clap::value_parser!(u8).range(1..=25))]
    pub concurrency: Option<u8>,

    /// Discover the lowest and highest existing IDs before fetching
    #[arg(long)]
    pub discover: bool,

    /// Endpoint template with one `{}` ID placeholder (repeatable, in preference order)
    #[arg(short = 't', long = "template", value_name = "URL")]
    pub templates: Vec<String>,

    /// Server base URL; builds EPUB then MOBI templates when no --template is given
    #[arg(long, value_name = "URL")]
    pub server: Option<String>,

    /// Library name appended to server templates
    #[arg(long)]
    pub library: Option<String>,

    /// Bytes per streamed write (1 to 16 MiB)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=16_777_216))]
    pub chunk_size: Option<u32>,

    /// Per-request timeout in seconds (1-3600)
    #[arg(long = "timeout", value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub timeout_secs: Option<u64>,

    /// Delay between successive dispatches in milliseconds (0 to disable, max 60000)
    #[arg(long, value_parser = clap::value_parser!(u64).range(0..=60_000))]
    pub pacing_ms: Option<u64>,

    /// Print the run summary as JSON on stdout
    #[arg(long)]
    pub json: bool,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Disable colored log output
    #[arg(long)]
    pub no_color: bool,
}
