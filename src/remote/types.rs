use thiserror::Error;

/// Snapshot of what the remote player is doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NowPlaying {
    pub track_id: String,
    pub name: String,
    pub is_playing: bool,
    pub progress_ms: u64,
    pub duration_ms: u64,
}

/// A track as the remote player's own catalogue describes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTrack {
    pub track_id: String,
    pub name: String,
    /// First listed artist; empty when the player gives none.
    pub artist: String,
    /// 0 when the player does not report a length.
    pub duration_ms: u64,
}

impl RemoteTrack {
    /// Free-text query handed to the search service.
    pub fn query(&self) -> String {
        format!("{} {}", self.name, self.artist).trim().to_string()
    }
}

/// A call to the remote player failed. Always worth retrying later.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("D-Bus call failed: {0}")]
    Bus(#[from] zbus::Error),

    #[error("unexpected reply from player: {0}")]
    Protocol(String),
}

/// Transport commands and snapshots of a remote player.
pub trait RemotePlayback {
    /// Current track, or `None` when nothing is loaded.
    fn now_playing(&self) -> Result<Option<NowPlaying>, RemoteError>;

    /// Track ids queued after the current one, nearest first, or `None` when
    /// the player does not expose its queue.
    fn upcoming(&self) -> Result<Option<Vec<String>>, RemoteError>;

    fn pause(&self) -> Result<(), RemoteError>;

    fn resume(&self) -> Result<(), RemoteError>;

    /// Jump to `position_ms` in the current track.
    fn seek(&self, position_ms: u64) -> Result<(), RemoteError>;

    fn skip_next(&self) -> Result<(), RemoteError>;
}

/// Read access to what the remote player is about to play.
pub trait RemoteQueue {
    /// The current track followed by up to `depth` queued tracks, nearest
    /// first. Empty when nothing is loaded; just the current track when the
    /// player does not expose its queue.
    fn lookahead(&self, depth: usize) -> Result<Vec<RemoteTrack>, RemoteError>;
}
