use std::fmt;

/// How much of a track to play.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PlaybackMode {
    /// From the start to the end of the chorus.
    StartToChorus,
    /// Only the chorus. Also the fallback when the queue cannot be read.
    #[default]
    ChorusOnly,
    /// The whole track.
    FullSong,
}

impl PlaybackMode {
    /// Mode for a track queued `k` extra times right behind itself.
    pub fn for_duplicates(k: usize) -> Self {
        match k {
            0 => PlaybackMode::StartToChorus,
            1 => PlaybackMode::ChorusOnly,
            _ => PlaybackMode::FullSong,
        }
    }
}

impl fmt::Display for PlaybackMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PlaybackMode::StartToChorus => "start-to-chorus",
            PlaybackMode::ChorusOnly => "chorus-only",
            PlaybackMode::FullSong => "full-song",
        };
        f.write_str(s)
    }
}

/// Entries at the front of `upcoming` equal to `current`. The first other
/// track ends the run; repeats after it do not count.
pub fn leading_duplicates(current: &str, upcoming: &[String]) -> usize {
    upcoming.iter().take_while(|id| id.as_str() == current).count()
}
