use super::mode::PlaybackMode;

/// State kept for the track currently being shaped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaybackSession {
    /// `None` until a track is seen, and again after the controller skipped.
    pub current_track_id: Option<String>,
    pub mode: PlaybackMode,
    /// The seek to the chorus has happened.
    pub chorus_skipped: bool,
    /// Paused during entry and not resumed yet.
    pub awaiting_resume: bool,
}

impl PlaybackSession {
    /// Fresh session for a newly detected track.
    pub fn start(track_id: impl Into<String>, mode: PlaybackMode) -> Self {
        Self {
            current_track_id: Some(track_id.into()),
            mode,
            chorus_skipped: false,
            awaiting_resume: false,
        }
    }

    pub fn is_current(&self, track_id: &str) -> bool {
        self.current_track_id.as_deref() == Some(track_id)
    }

    /// Forget the track so the next poll treats whatever plays as new.
    pub fn release(&mut self) {
        self.current_track_id = None;
    }
}
