//! Chorus timings for what the remote player is about to play.
//!
//! Each pass reads the current track and the next few queued ones from the
//! remote player. Tracks the timing table does not know yet are searched,
//! downloaded and analyzed, and their chorus bounds are recorded under the
//! remote player's own track id, which is the key the [`Controller`] looks
//! them up by.
//!
//! [`Controller`]: crate::controller::Controller

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::cleanup::{self, CleanupHandle};
use crate::config::{AnalyzerSettings, Settings};
use crate::controller::Backoff;
use crate::error::{Error, Result};
use crate::library::probe_tags;
use crate::pipeline::{AudioFetcher, ChorusDetector, Pcm, locate_chorus};
use crate::remote::{RemoteError, RemoteQueue, RemoteTrack};
use crate::schedule::CancelToken;
use crate::timing::{TimingStore, TrackTiming};

#[derive(Debug, Clone)]
pub struct AnalyzerOptions {
    pub scratch_dir: PathBuf,
    pub lookahead: usize,
    pub fallback_ratio: f64,
    pub chorus_span_ms: u64,
    pub poll: Duration,
}

impl AnalyzerOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            scratch_dir: settings.paths.scratch_dir.clone(),
            lookahead: settings.analyzer.lookahead,
            fallback_ratio: settings.pipeline.fallback_ratio,
            chorus_span_ms: settings.pipeline.chorus_span_ms,
            poll: Duration::from_millis(settings.analyzer.poll_ms),
        }
    }
}

/// Outcome of one pass over the remote queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    /// Nothing is loaded on the player.
    Idle,
    /// `recorded` new rows out of `seen` tracks.
    Done { seen: usize, recorded: usize },
}

pub struct QueueAnalyzer<Q: RemoteQueue> {
    remote: Q,
    fetcher: Box<dyn AudioFetcher>,
    detector: Box<dyn ChorusDetector>,
    timings: TimingStore,
    cleanup: CleanupHandle,
    options: AnalyzerOptions,
    backoff: Backoff,
}

impl<Q: RemoteQueue> QueueAnalyzer<Q> {
    pub fn new(
        remote: Q,
        fetcher: Box<dyn AudioFetcher>,
        detector: Box<dyn ChorusDetector>,
        timings: TimingStore,
        cleanup: CleanupHandle,
        options: AnalyzerOptions,
        settings: &AnalyzerSettings,
    ) -> Self {
        Self {
            remote,
            fetcher,
            detector,
            timings,
            cleanup,
            options,
            backoff: Backoff::new(
                settings.max_failures,
                Duration::from_millis(settings.error_backoff_ms),
                Duration::from_millis(settings.cooldown_ms),
            ),
        }
    }

    /// Pass after pass until `token` is cancelled. A failed or empty read of
    /// the queue waits out the backoff instead of the poll interval.
    pub fn run(&mut self, token: &CancelToken) {
        info!(lookahead = self.options.lookahead, "queue analyzer started");
        loop {
            let wait = match self.pass(token) {
                Ok(Pass::Done { seen, recorded }) => {
                    self.backoff.success();
                    if recorded > 0 {
                        info!(seen, recorded, "queue analyzed");
                    }
                    self.options.poll
                }
                Ok(Pass::Idle) => {
                    let wait = self.backoff.failure();
                    debug!(retry_in_ms = wait.as_millis() as u64, "nothing loaded on the player");
                    wait
                }
                Err(e) => {
                    let wait = self.backoff.failure();
                    warn!(retry_in_ms = wait.as_millis() as u64, "cannot read player queue: {e}");
                    wait
                }
            };
            if !token.sleep(wait) {
                break;
            }
        }
        info!("queue analyzer stopped");
    }

    /// Analyze the current track and the next `lookahead` ones. A track that
    /// fails is logged and left for a later pass.
    pub fn pass(&mut self, token: &CancelToken) -> std::result::Result<Pass, RemoteError> {
        let tracks = self.remote.lookahead(self.options.lookahead)?;
        if tracks.is_empty() {
            return Ok(Pass::Idle);
        }

        let mut recorded = 0;
        for track in &tracks {
            if token.is_cancelled() {
                break;
            }
            match self.analyze(track) {
                Ok(true) => recorded += 1,
                Ok(false) => {}
                Err(e) => warn!(track = %track.name, track_id = %track.track_id, "analysis failed: {e}"),
            }
        }
        Ok(Pass::Done {
            seen: tracks.len(),
            recorded,
        })
    }

    /// Record chorus bounds for `track` unless the table already has them.
    /// Returns whether a row was written.
    pub fn analyze(&mut self, track: &RemoteTrack) -> Result<bool> {
        if self.timings.get(&track.track_id).is_some() {
            debug!(track_id = %track.track_id, "already analyzed");
            return Ok(false);
        }

        let query = track.query();
        let hit = self
            .fetcher
            .search(&query)?
            .ok_or_else(|| Error::NoMatch(query.clone()))?;
        info!(track = %track.name, title = %hit.title, "analyzing queued track");

        let raw = self.fetcher.download(&hit, &self.options.scratch_dir)?;
        let result = self.record(track, &raw);
        cleanup::discard(&self.cleanup, &raw);
        result
    }

    fn record(&mut self, track: &RemoteTrack, raw: &Path) -> Result<bool> {
        let pcm = Pcm::decode_file(raw)?;
        let onset = locate_chorus(self.detector.as_ref(), &pcm, self.options.fallback_ratio);

        // The player's own length wins; the download may be a different cut.
        let duration_ms = Some(track.duration_ms)
            .filter(|&ms| ms > 0)
            .or_else(|| {
                probe_tags(raw)
                    .duration
                    .map(|d| d.as_millis() as u64)
                    .filter(|&ms| ms > 0)
            })
            .unwrap_or_else(|| pcm.duration_ms());
        let start = onset.min(duration_ms);
        let end = start.saturating_add(self.options.chorus_span_ms).min(duration_ms);

        let row = TrackTiming::new(&track.track_id, &track.name, &track.artist, duration_ms)
            .with_chorus(start, end);
        let written = self.timings.append(row)?;
        if written {
            info!(track_id = %track.track_id, start_ms = start, end_ms = end, "chorus recorded");
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests;
