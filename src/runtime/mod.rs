//! Wiring of each subcommand: settings, shared handles, threads, shutdown.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use tracing::info;

use crate::cleanup::{CleanupHandle, CleanupManager};
use crate::cli::{Cli, Command};
use crate::config::{self, Settings};
use crate::pipeline::{CommandFetcher, Downloader, DownloaderOptions, OnsetPeakDetector};
use crate::schedule::CancelToken;
use crate::timing::TimingStore;

mod analyze;
mod control;
mod feed;
mod play;
mod process;
mod run;
mod settings;

pub fn run(cli: Cli) -> anyhow::Result<()> {
    let settings = settings::load_settings(cli.config.as_deref());

    match cli.command {
        Command::Config => print_config(&settings, cli.config.as_deref()),
        Command::Run { list } => run::run(&settings, &list, stop_token()?),
        Command::Feed { list } => feed::run(&settings, &list, stop_token()?),
        Command::Process => process::run(&settings, stop_token()?),
        Command::Play => play::run(&settings, stop_token()?),
        Command::Control => control::run(&settings, stop_token()?),
        Command::Analyze => analyze::run(&settings, stop_token()?),
    }
}

fn print_config(settings: &Settings, path: Option<&Path>) -> anyhow::Result<()> {
    let source = path.map(Path::to_path_buf).or_else(config::resolve_config_path);
    match source {
        Some(p) => println!("# config file: {}", p.display()),
        None => println!("# config file: none"),
    }
    print!("{}", toml::to_string_pretty(settings).context("failed to serialize settings")?);
    Ok(())
}

/// Token cancelled on Ctrl-C.
fn stop_token() -> anyhow::Result<CancelToken> {
    let token = CancelToken::new();
    let handler = token.clone();
    ctrlc::set_handler(move || {
        info!("stop requested");
        handler.cancel();
    })
    .context("failed to install Ctrl-C handler")?;
    Ok(token)
}

fn cleanup_manager(status_files: Vec<std::path::PathBuf>) -> CleanupHandle {
    CleanupManager::with_status_files(status_files).into_handle()
}

/// Sweep what is left and remove status files.
fn shutdown_cleanup(settings: &Settings, cleanup: &CleanupHandle) {
    let mut manager = cleanup.lock().unwrap_or_else(|e| e.into_inner());
    manager.shutdown(
        settings.cleanup.attempts,
        Duration::from_millis(settings.cleanup.retry_wait_ms),
    );
}

fn timing_store(settings: &Settings) -> TimingStore {
    TimingStore::new(
        &settings.paths.timing_table,
        Duration::from_millis(settings.timing.reload_interval_ms),
    )
}

fn detector(settings: &Settings) -> OnsetPeakDetector {
    OnsetPeakDetector {
        target_ratio: settings.pipeline.fallback_ratio,
        ..OnsetPeakDetector::default()
    }
}

fn build_downloader(settings: &Settings, cleanup: CleanupHandle) -> Downloader {
    Downloader::new(
        Box::new(CommandFetcher::new(settings.fetch.clone())),
        Box::new(detector(settings)),
        timing_store(settings),
        cleanup,
        DownloaderOptions::from_settings(settings),
    )
}
