use tracing::info;

use crate::config::Settings;
use crate::queue::DurableQueue;
use crate::schedule::CancelToken;

use super::{build_downloader, cleanup_manager, shutdown_cleanup};

/// Downloader role between the durable song and play queues. Files carry no
/// end-of-work marker, so this runs until stopped.
pub fn run(settings: &Settings, token: CancelToken) -> anyhow::Result<()> {
    let songs = DurableQueue::new(&settings.paths.song_queue);
    let clips = DurableQueue::new(&settings.paths.play_queue);
    info!(
        from = %songs.path().display(),
        to = %clips.path().display(),
        "processing songs"
    );

    let cleanup = cleanup_manager(Vec::new());
    let mut downloader = build_downloader(settings, cleanup.clone());
    downloader.run(&songs, &clips, &token);

    shutdown_cleanup(settings, &cleanup);
    Ok(())
}
