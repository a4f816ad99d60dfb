use std::time::Duration;

use anyhow::Context;
use tracing::info;

use crate::config::Settings;
use crate::pipeline::{Artifact, NeverDrained, Player, RodioEngine};
use crate::queue::DurableQueue;
use crate::schedule::CancelToken;

use super::{cleanup_manager, shutdown_cleanup};

/// Standalone Player over the durable play queue.
pub fn run(settings: &Settings, token: CancelToken) -> anyhow::Result<()> {
    let queue = DurableQueue::new(&settings.paths.play_queue);
    let status = settings.paths.currently_playing.clone();

    let cleanup = cleanup_manager(vec![
        queue.path().to_path_buf(),
        queue.lock_path(),
        status.clone(),
    ]);
    if settings.cleanup.adopt_orphans {
        let queued: Vec<Artifact> = queue.peek_records()?;
        let keep: Vec<_> = queued.into_iter().map(|a| a.file_path).collect();
        cleanup
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .adopt_orphans_except(&settings.paths.artifact_dir, &keep);
    }

    let engine = RodioEngine::open().context("cannot start audio output")?;
    let mut player = Player::new(
        engine,
        cleanup.clone(),
        Duration::from_millis(settings.pipeline.player_tick_ms),
        Duration::from_millis(settings.pipeline.pop_wait_ms),
    )
    .with_status_file(&status);

    info!(queue = %queue.path().display(), "playing clips");
    let played = player.run(&queue, &NeverDrained, &token);
    info!(played, "player stopped");

    shutdown_cleanup(settings, &cleanup);
    Ok(())
}
