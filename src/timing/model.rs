use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// One row of the timing table. Column order is the on-disk header order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackTiming {
    pub track_id: String,
    pub track_name: String,
    pub artist: String,
    pub duration_ms: u64,
    pub chorus_start_ms: Option<u64>,
    pub chorus_end_ms: Option<u64>,
    pub last_processed: DateTime<Local>,
}

impl TrackTiming {
    pub fn new(
        track_id: impl Into<String>,
        track_name: impl Into<String>,
        artist: impl Into<String>,
        duration_ms: u64,
    ) -> Self {
        Self {
            track_id: track_id.into(),
            track_name: track_name.into(),
            artist: artist.into(),
            duration_ms,
            chorus_start_ms: None,
            chorus_end_ms: None,
            last_processed: Local::now(),
        }
    }

    pub fn with_chorus(mut self, start_ms: u64, end_ms: u64) -> Self {
        self.chorus_start_ms = Some(start_ms);
        self.chorus_end_ms = Some(end_ms);
        self
    }
}
