use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::cleanup::{self, CleanupHandle};
use crate::config::Settings;
use crate::error::{Error, Result};
use crate::library::probe_tags;
use crate::queue::{Inbox, Outbox, Pop};
use crate::schedule::CancelToken;
use crate::timing::{TimingStore, TrackTiming};

use super::detect::{ChorusDetector, locate_chorus};
use super::extract::{ClipSpec, unique_artifact_path, write_wav};
use super::fetch::AudioFetcher;
use super::pcm::Pcm;
use super::types::{Artifact, Job, SearchHit, WorkItem};

/// Set once the Downloader loop has returned; everything it will ever
/// produce is on the output queue by then.
#[derive(Debug, Clone, Default)]
pub struct Completion(Arc<AtomicBool>);

impl Completion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_done(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_done(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Where the Downloader reads from and writes to, and how it cuts clips.
#[derive(Debug, Clone)]
pub struct DownloaderOptions {
    pub artifact_dir: PathBuf,
    pub scratch_dir: PathBuf,
    pub clip: ClipSpec,
    pub fallback_ratio: f64,
    pub chorus_span_ms: u64,
    pub pop_wait: Duration,
}

impl DownloaderOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        let p = &settings.pipeline;
        Self {
            artifact_dir: settings.paths.artifact_dir.clone(),
            scratch_dir: settings.paths.scratch_dir.clone(),
            clip: ClipSpec {
                pre_roll_ms: p.pre_roll_ms,
                window_ms: p.window_ms,
                fade_ms: p.fade_ms,
                headroom_db: p.normalize_headroom_db,
            },
            fallback_ratio: p.fallback_ratio,
            chorus_span_ms: p.chorus_span_ms,
            pop_wait: Duration::from_millis(p.pop_wait_ms),
        }
    }
}

/// Producer role: work items in, chorus clips out.
pub struct Downloader {
    fetcher: Box<dyn AudioFetcher>,
    detector: Box<dyn ChorusDetector>,
    timings: TimingStore,
    cleanup: CleanupHandle,
    options: DownloaderOptions,
    completion: Completion,
}

impl Downloader {
    pub fn new(
        fetcher: Box<dyn AudioFetcher>,
        detector: Box<dyn ChorusDetector>,
        timings: TimingStore,
        cleanup: CleanupHandle,
        options: DownloaderOptions,
    ) -> Self {
        Self {
            fetcher,
            detector,
            timings,
            cleanup,
            options,
            completion: Completion::new(),
        }
    }

    /// Flag a consumer can watch to learn that this Downloader has finished.
    pub fn completion(&self) -> Completion {
        self.completion.clone()
    }

    /// Take jobs from `inbox` until `Finish`, a closed queue, or `token`.
    ///
    /// A failing item is logged and dropped; the loop carries on with the next.
    pub fn run(&mut self, inbox: &impl Inbox<Job>, outbox: &impl Outbox<Artifact>, token: &CancelToken) -> usize {
        let mut produced = 0;
        while !token.is_cancelled() {
            match inbox.pop(self.options.pop_wait) {
                Ok(Pop::Item(Job::Fetch(item))) => match self.process(&item) {
                    Ok(artifact) => {
                        let path = artifact.file_path.clone();
                        match outbox.push(artifact) {
                            Ok(()) => produced += 1,
                            Err(e) => {
                                warn!(item = %item, "could not hand off clip: {e}");
                                self.discard(&path);
                            }
                        }
                    }
                    Err(e) => warn!(item = %item, "dropping item: {e}"),
                },
                Ok(Pop::Item(Job::Finish)) => {
                    info!("no more work");
                    break;
                }
                Ok(Pop::Closed) => {
                    debug!("intake closed");
                    break;
                }
                Ok(Pop::Empty) => {}
                Err(e) => {
                    warn!("failed to read intake queue: {e}");
                    if !token.sleep(self.options.pop_wait) {
                        break;
                    }
                }
            }
        }
        self.completion.mark_done();
        info!(produced, "downloader stopped");
        produced
    }

    /// Fetch, analyze and cut one item. The raw download is gone when this
    /// returns, whatever the outcome.
    pub fn process(&mut self, item: &WorkItem) -> Result<Artifact> {
        let query = item.query();
        let hit = self
            .fetcher
            .search(&query)?
            .ok_or_else(|| Error::NoMatch(query.clone()))?;
        info!(item = %item, title = %hit.title, "found");

        let raw = self.fetcher.download(&hit, &self.options.scratch_dir)?;
        debug!(path = %raw.display(), "downloaded");

        let result = self.extract(item, &hit, &raw);
        self.discard(&raw);
        result
    }

    fn extract(&mut self, item: &WorkItem, hit: &SearchHit, raw: &Path) -> Result<Artifact> {
        let pcm = Pcm::decode_file(raw)?;
        let duration_ms = pcm.duration_ms();

        let cached = hit
            .track_id
            .as_deref()
            .and_then(|id| self.timings.get(id))
            .and_then(|row| row.chorus_start_ms);

        let onset = match cached {
            Some(ms) => {
                debug!(onset_ms = ms, "reusing recorded chorus start");
                ms
            }
            None => locate_chorus(self.detector.as_ref(), &pcm, self.options.fallback_ratio),
        };

        let clip = self.options.clip.render(&pcm, onset);
        if clip.frames() == 0 {
            return Err(Error::Audio(format!(
                "onset {onset} ms leaves nothing to cut from a {duration_ms} ms track"
            )));
        }

        std::fs::create_dir_all(&self.options.artifact_dir)?;
        let path = unique_artifact_path(&self.options.artifact_dir, &hit.title);
        if let Err(e) = write_wav(&path, &clip) {
            self.discard(&path);
            return Err(e);
        }
        info!(path = %path.display(), onset_ms = onset, "clip written");

        if cached.is_none()
            && let Some(track_id) = &hit.track_id
        {
            self.record_timing(track_id, item, hit, raw, duration_ms, onset);
        }

        Ok(Artifact {
            file_path: path,
            source_title: hit.title.clone(),
        })
    }

    fn record_timing(
        &mut self,
        track_id: &str,
        item: &WorkItem,
        hit: &SearchHit,
        raw: &Path,
        duration_ms: u64,
        onset: u64,
    ) {
        let tags = probe_tags(raw);
        let name = tags.title.unwrap_or_else(|| item.song_name.clone());
        let artist = tags
            .artist
            .or_else(|| hit.artist.clone())
            .unwrap_or_else(|| item.artist.clone());
        let end = onset.saturating_add(self.options.chorus_span_ms).min(duration_ms);

        let row = TrackTiming::new(track_id, name, artist, duration_ms).with_chorus(onset, end);
        if let Err(e) = self.timings.append(row) {
            warn!(track_id, "failed to record chorus timing: {e}");
        }
    }

    fn discard(&self, path: &Path) {
        cleanup::discard(&self.cleanup, path);
    }
}
