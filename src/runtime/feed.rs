use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use tracing::info;

use crate::config::Settings;
use crate::library::load_track_list;
use crate::queue::{BufferFiller, DurableQueue};
use crate::schedule::CancelToken;

/// Buffer-filling loop over the durable song queue.
pub fn run(settings: &Settings, list: &Path, token: CancelToken) -> anyhow::Result<()> {
    let items = load_track_list(list)
        .with_context(|| format!("cannot read track list {}", list.display()))?;
    let queue = DurableQueue::new(&settings.paths.song_queue);
    info!(
        songs = items.len(),
        queue = %queue.path().display(),
        depth = settings.buffer.depth,
        "feeding song queue"
    );

    let filler = BufferFiller::new(
        queue,
        settings.buffer.depth,
        Duration::from_millis(settings.buffer.interval_ms),
    );
    let summary = filler.run(items, &token);
    info!(
        enqueued = summary.enqueued,
        completed = summary.completed,
        "feeder stopped"
    );
    Ok(())
}
