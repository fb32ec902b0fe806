//! CLI entry point for idsweep.

use std::io::{self, IsTerminal};
use std::sync::Arc;
use std::sync::atomic::Ordering;

use anyhow::{Context, Result, bail};
use clap::Parser;
use idsweep_core::download::{
    ExistenceProbe, FetchEngine, HttpClient, IdRange, ItemFetcher, LocalStorage, RangeScanner,
    RunStats, Storage, TemplateProbe, Transport,
};
use tracing::{debug, info};

mod cli;
mod config;
mod progress;
mod terminal;

use cli::Args;
use config::RunConfig;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    let dumb_terminal = terminal::is_dumb_terminal();
    let no_color = terminal::should_disable_color(
        args.no_color,
        terminal::no_color_env_requested(),
        dumb_terminal,
    );
    terminal::init_tracing(
        terminal::default_log_level(args.quiet, args.verbose),
        no_color,
    );
    debug!(?args, "CLI arguments parsed");

    let loaded = config::load_default_file_config()?;
    if let (Some(path), Some(_)) = (&loaded.path, &loaded.config) {
        debug!(path = %path.display(), "loaded config file");
    }
    let run = RunConfig::resolve(&args, loaded.config.as_ref(), config::home_dir().as_deref())?;
    debug!(?run, "run configuration resolved");

    let transport: Arc<dyn Transport> = Arc::new(HttpClient::new_with_timeouts(
        run.connect_timeout_secs,
        run.request_timeout_secs,
    ));
    let storage: Arc<dyn Storage> = Arc::new(LocalStorage);

    let range = if run.discover {
        discover_range(Arc::clone(&transport), &run).await?
    } else {
        run.range()?
    };

    let fetcher = Arc::new(
        ItemFetcher::new(
            transport,
            storage,
            run.templates.clone(),
            run.destination.clone(),
        )
        .with_chunk_size(run.chunk_size),
    );
    let engine = FetchEngine::new(run.concurrency, run.pacing)?;

    let stats = Arc::new(RunStats::new());
    let use_spinner =
        terminal::should_use_spinner(io::stderr().is_terminal(), args.quiet, dumb_terminal);
    let (spinner, stop) = progress::spawn_progress_ui(use_spinner, Arc::clone(&stats), range.len());

    let result = engine.run_with_stats(fetcher, range, stats).await;

    stop.store(true, Ordering::SeqCst);
    if let Some(handle) = spinner {
        let _ = handle.await;
    }

    let summary = result.context("run aborted")?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }

    Ok(())
}

async fn discover_range(transport: Arc<dyn Transport>, run: &RunConfig) -> Result<IdRange> {
    info!(ceiling = run.highest, "discovering ID range");
    let probe: Arc<dyn ExistenceProbe> =
        Arc::new(TemplateProbe::new(transport, run.templates.clone()));
    let scanner = RangeScanner::new(probe, run.concurrency);

    let Some(bounds) = scanner.discover_bounds(run.highest).await else {
        bail!("no items found at or below ID {}", run.highest);
    };
    info!(lowest = bounds.lowest, highest = bounds.highest, "using discovered range");
    Ok(IdRange::from(bounds))
}
