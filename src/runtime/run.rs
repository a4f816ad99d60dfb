use std::path::Path;
use std::thread;
use std::time::Duration;

use anyhow::{Context, anyhow};
use tracing::{info, warn};

use crate::config::Settings;
use crate::library::load_track_list;
use crate::pipeline::{Artifact, Job, Player, RodioEngine, abandon_queued};
use crate::schedule::CancelToken;

use super::{build_downloader, cleanup_manager, shutdown_cleanup};

/// Both roles in one process over in-memory queues.
pub fn run(settings: &Settings, list: &Path, token: CancelToken) -> anyhow::Result<()> {
    let items = load_track_list(list)
        .with_context(|| format!("cannot read track list {}", list.display()))?;
    info!(songs = items.len(), list = %list.display(), "starting pipeline");

    let cleanup = cleanup_manager(Vec::new());
    if settings.cleanup.adopt_orphans {
        cleanup
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .adopt_orphans(&settings.paths.artifact_dir);
    }

    let (job_tx, job_rx) = crossbeam_channel::unbounded::<Job>();
    let (art_tx, art_rx) = crossbeam_channel::unbounded::<Artifact>();
    let leftovers = art_rx.clone();
    for item in items {
        job_tx.send(Job::Fetch(item))?;
    }
    job_tx.send(Job::Finish)?;
    drop(job_tx);

    let mut downloader = build_downloader(settings, cleanup.clone());
    let completion = downloader.completion();

    let downloader_token = token.clone();
    let downloader_thread = thread::Builder::new()
        .name("downloader".into())
        .spawn(move || downloader.run(&job_rx, &art_tx, &downloader_token))
        .context("failed to spawn downloader")?;

    let player_token = token.clone();
    let player_cleanup = cleanup.clone();
    let tick = Duration::from_millis(settings.pipeline.player_tick_ms);
    let pop_wait = Duration::from_millis(settings.pipeline.pop_wait_ms);
    let player_thread = thread::Builder::new()
        .name("player".into())
        .spawn(move || {
            // The output stream stays on this thread.
            let engine = match RodioEngine::open() {
                Ok(e) => e,
                Err(e) => {
                    player_token.cancel();
                    return Err(e);
                }
            };
            let mut player = Player::new(engine, player_cleanup, tick, pop_wait);
            Ok(player.run(&art_rx, &completion, &player_token))
        })
        .context("failed to spawn player")?;

    let played = player_thread
        .join()
        .map_err(|_| anyhow!("player thread panicked"))?;
    // The player may stop first (Ctrl-C, no audio device); the downloader
    // follows the same token.
    if played.is_err() {
        token.cancel();
    }
    let produced = downloader_thread
        .join()
        .map_err(|_| anyhow!("downloader thread panicked"))?;

    // Clips still queued when playback stopped early die with this process.
    let unplayed = abandon_queued(&leftovers, &cleanup);
    if unplayed > 0 {
        info!(unplayed, "discarding queued clips");
    }
    shutdown_cleanup(settings, &cleanup);
    let played = played.context("playback failed")?;
    info!(produced, played, "pipeline finished");
    if produced > played {
        warn!(skipped = produced - played, "stopped before every clip was played");
    }
    Ok(())
}
