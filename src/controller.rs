//! Per-track playback policy for a remote player.
//!
//! Each poll reads what the remote player is doing. When a new track shows up,
//! the number of copies queued right behind it picks the [`PlaybackMode`]
//! and those copies are skipped away. Until the next track, the mode decides
//! when to seek to the chorus and when to skip ahead, using bounds from the
//! [`TimingStore`].

mod backoff;
mod mode;
mod session;

use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::ControllerSettings;
use crate::remote::{NowPlaying, RemoteError, RemotePlayback};
use crate::schedule::CancelToken;
use crate::timing::TimingStore;

pub use backoff::Backoff;
pub use mode::{PlaybackMode, leading_duplicates};
pub use session::PlaybackSession;

/// What one poll did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Nothing playing, or paused.
    Idle,
    /// A new track was picked up in this mode.
    Entered(PlaybackMode),
    /// Seeked to the chorus after the entry seek had not happened.
    Seeked,
    /// Skipped to the next track.
    Skipped,
    /// Still inside the part being played.
    Playing,
}

pub struct Controller<R: RemotePlayback> {
    remote: R,
    timings: TimingStore,
    session: PlaybackSession,
    backoff: Backoff,
    poll: Duration,
    settle: Duration,
    full_song_tail_ms: u64,
}

impl<R: RemotePlayback> Controller<R> {
    pub fn new(remote: R, timings: TimingStore, settings: &ControllerSettings) -> Self {
        Self {
            remote,
            timings,
            session: PlaybackSession::default(),
            backoff: Backoff::new(
                settings.max_failures,
                Duration::from_millis(settings.error_backoff_ms),
                Duration::from_millis(settings.cooldown_ms),
            ),
            poll: Duration::from_millis(settings.poll_ms),
            settle: Duration::from_millis(settings.settle_ms),
            full_song_tail_ms: settings.full_song_tail_ms,
        }
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    pub fn session(&self) -> &PlaybackSession {
        &self.session
    }

    /// Poll until `token` is cancelled. A failed poll is logged and retried
    /// after the backoff delay.
    pub fn run(&mut self, token: &CancelToken) {
        info!("controller started");
        loop {
            let wait = match self.tick() {
                Ok(_) => {
                    self.backoff.success();
                    self.poll
                }
                Err(e) => {
                    let wait = self.backoff.failure();
                    warn!(retry_in_ms = wait.as_millis() as u64, "remote player error: {e}");
                    wait
                }
            };
            if !token.sleep(wait) {
                break;
            }
        }
        info!("controller stopped");
    }

    /// One poll of the remote player.
    pub fn tick(&mut self) -> Result<Tick, RemoteError> {
        let Some(now) = self.remote.now_playing()? else {
            debug!("nothing playing");
            return Ok(Tick::Idle);
        };

        if self.session.awaiting_resume && self.session.is_current(&now.track_id) {
            self.remote.resume()?;
            self.session.awaiting_resume = false;
        }
        if !now.is_playing {
            return Ok(Tick::Idle);
        }

        if self.session.is_current(&now.track_id) {
            return self.steady(&now);
        }

        // Steady-state rules start with the next poll, once the entry
        // actions have taken effect.
        let mode = self.enter(&now)?;
        Ok(Tick::Entered(mode))
    }

    /// Pick the mode for a newly seen track and run its entry actions.
    fn enter(&mut self, now: &NowPlaying) -> Result<PlaybackMode, RemoteError> {
        let mode = self.evaluate_mode(&now.track_id);
        info!(track = %now.name, track_id = %now.track_id, %mode, "new track");

        self.session = PlaybackSession::start(&now.track_id, mode);
        self.session.awaiting_resume = true;
        if let Err(e) = self.timings.reload(true) {
            warn!("failed to reload timing table: {e}");
        }

        if mode == PlaybackMode::ChorusOnly
            && let Some(start) = self.timings.lookup(&now.track_id).start_ms
        {
            match self.remote.seek(start) {
                Ok(()) => {
                    thread::sleep(self.settle);
                    self.session.chorus_skipped = true;
                    debug!(start_ms = start, "jumped to chorus");
                }
                Err(e) => warn!("seek to chorus failed, retrying next poll: {e}"),
            }
        }

        self.remote.resume()?;
        self.session.awaiting_resume = false;
        Ok(mode)
    }

    /// Count the copies of `track_id` queued right behind it and skip them.
    /// Anything going wrong falls back to chorus-only.
    fn evaluate_mode(&self, track_id: &str) -> PlaybackMode {
        let upcoming = match self.remote.upcoming() {
            Ok(Some(upcoming)) => upcoming,
            Ok(None) => {
                debug!("upcoming queue unavailable");
                return PlaybackMode::ChorusOnly;
            }
            Err(e) => {
                warn!("cannot read upcoming queue: {e}");
                return PlaybackMode::ChorusOnly;
            }
        };

        let k = leading_duplicates(track_id, &upcoming);
        if k > 0
            && let Err(e) = self.drop_duplicates(k)
        {
            warn!(duplicates = k, "failed to clear duplicates: {e}");
            return PlaybackMode::ChorusOnly;
        }
        PlaybackMode::for_duplicates(k)
    }

    /// Pause, then skip `k` times. Resuming is left to the caller.
    fn drop_duplicates(&self, k: usize) -> Result<(), RemoteError> {
        debug!(duplicates = k, "removing queued duplicates");
        self.remote.pause()?;
        thread::sleep(self.settle);
        for _ in 0..k {
            self.remote.skip_next()?;
            thread::sleep(self.settle);
        }
        Ok(())
    }

    fn steady(&mut self, now: &NowPlaying) -> Result<Tick, RemoteError> {
        let bounds = self.timings.lookup(&now.track_id);

        match self.session.mode {
            PlaybackMode::FullSong => {
                if now.progress_ms >= now.duration_ms.saturating_sub(self.full_song_tail_ms) {
                    return self.skip("song finished");
                }
            }
            PlaybackMode::StartToChorus => {
                if let Some((_, end)) = bounds.known()
                    && now.progress_ms >= end
                {
                    return self.skip("reached chorus end");
                }
            }
            PlaybackMode::ChorusOnly => {
                if let Some((start, end)) = bounds.known() {
                    if !self.session.chorus_skipped {
                        self.remote.seek(start)?;
                        self.session.chorus_skipped = true;
                        info!(start_ms = start, "jumped to chorus");
                        return Ok(Tick::Seeked);
                    }
                    if now.progress_ms >= end {
                        return self.skip("chorus finished");
                    }
                }
            }
        }
        Ok(Tick::Playing)
    }

    fn skip(&mut self, reason: &str) -> Result<Tick, RemoteError> {
        self.remote.skip_next()?;
        info!(reason, "skipped to next track");
        self.session.release();
        Ok(Tick::Skipped)
    }
}
