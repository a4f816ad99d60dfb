use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::cleanup::CleanupHandle;
use crate::persist::replace_file;
use crate::queue::{Inbox, Pop};
use crate::schedule::CancelToken;

use super::downloader::Completion;
use super::engine::PlaybackEngine;
use super::types::Artifact;

/// Tells the Player whether more artifacts can still arrive.
pub trait Upstream {
    fn drained(&self) -> bool;
}

/// Upstream of a standalone Player: nothing is observable, so never drained.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverDrained;

impl Upstream for NeverDrained {
    fn drained(&self) -> bool {
        false
    }
}

impl Upstream for Completion {
    fn drained(&self) -> bool {
        self.is_done()
    }
}

/// Hand every artifact still waiting in `inbox` to cleanup. For in-memory
/// queues that die with the process; a file queue keeps its clips for the
/// next Player instead. Returns how many were taken.
pub fn abandon_queued(inbox: &impl Inbox<Artifact>, cleanup: &CleanupHandle) -> usize {
    let mut abandoned = 0;
    loop {
        match inbox.pop(Duration::ZERO) {
            Ok(Pop::Item(artifact)) => {
                debug!(path = %artifact.file_path.display(), "dropping unplayed clip");
                cleanup
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .mark(&artifact.file_path);
                abandoned += 1;
            }
            Ok(Pop::Empty | Pop::Closed) => break,
            Err(e) => {
                warn!("failed to drain artifact queue: {e}");
                break;
            }
        }
    }
    abandoned
}

/// Consumer role: plays artifacts in order and hands finished ones to cleanup.
pub struct Player<E: PlaybackEngine> {
    engine: E,
    cleanup: CleanupHandle,
    tick: Duration,
    pop_wait: Duration,
    status_file: Option<PathBuf>,
    current: Option<Artifact>,
}

impl<E: PlaybackEngine> Player<E> {
    pub fn new(engine: E, cleanup: CleanupHandle, tick: Duration, pop_wait: Duration) -> Self {
        Self {
            engine,
            cleanup,
            tick,
            pop_wait,
            status_file: None,
            current: None,
        }
    }

    /// Also record the clip being played in `path`.
    pub fn with_status_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.status_file = Some(path.into());
        self
    }

    pub fn current(&self) -> Option<&Artifact> {
        self.current.as_ref()
    }

    /// Play until the queue is empty and `upstream` is drained, or until
    /// `token` is cancelled. Returns how many clips started playing.
    pub fn run(&mut self, inbox: &impl Inbox<Artifact>, upstream: &impl Upstream, token: &CancelToken) -> usize {
        let mut played = 0;
        while !token.is_cancelled() {
            if !self.engine.is_busy() {
                self.finish_current();

                // Upstream first: once it reports drained, every artifact is
                // already visible in the queue.
                if upstream.drained() && inbox.is_empty() {
                    info!(played, "playback complete");
                    break;
                }

                match inbox.pop(self.pop_wait) {
                    Ok(Pop::Item(artifact)) => {
                        if self.start(artifact) {
                            played += 1;
                        }
                    }
                    Ok(Pop::Empty) => {}
                    Ok(Pop::Closed) => {
                        info!(played, "artifact queue closed");
                        break;
                    }
                    Err(e) => warn!("failed to read artifact queue: {e}"),
                }
            }

            if !token.sleep(self.tick) {
                break;
            }
        }

        if let Some(artifact) = self.current.take() {
            self.engine.stop();
            self.engine.unload();
            self.mark(&artifact);
        }
        played
    }

    fn start(&mut self, artifact: Artifact) -> bool {
        if let Err(e) = self.engine.load(&artifact.file_path) {
            warn!(path = %artifact.file_path.display(), "cannot play clip: {e}");
            self.mark(&artifact);
            return false;
        }
        self.engine.play();
        info!(title = %artifact.source_title, "now playing");

        if let Some(status) = &self.status_file {
            let line = format!("{}|{}\n", artifact.file_path.display(), artifact.source_title);
            if let Err(e) = replace_file(status, line.as_bytes()) {
                debug!(path = %status.display(), "failed to write status file: {e}");
            }
        }
        self.current = Some(artifact);
        true
    }

    fn finish_current(&mut self) {
        let Some(artifact) = self.current.take() else {
            return;
        };
        self.engine.stop();
        self.engine.unload();
        debug!(title = %artifact.source_title, "finished");
        let mut cleanup = self.cleanup.lock().unwrap_or_else(|e| e.into_inner());
        cleanup.mark(&artifact.file_path);
        cleanup.sweep();
    }

    fn mark(&self, artifact: &Artifact) {
        self.cleanup
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .mark(&artifact.file_path);
    }
}
