use std::fs::File;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::error::Result;
use crate::persist::replace_file;

use super::model::TrackTiming;

/// Chorus bounds for one track; both absent on a cache miss.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChorusBounds {
    pub start_ms: Option<u64>,
    pub end_ms: Option<u64>,
}

impl ChorusBounds {
    /// Both bounds, if the row carried both.
    pub fn known(&self) -> Option<(u64, u64)> {
        self.start_ms.zip(self.end_ms)
    }
}

/// In-memory copy of the timing table with a staleness window.
#[derive(Debug)]
pub struct TimingStore {
    path: PathBuf,
    reload_interval: Duration,
    rows: Vec<TrackTiming>,
    loaded_at: Option<Instant>,
}

impl TimingStore {
    pub fn new(path: impl Into<PathBuf>, reload_interval: Duration) -> Self {
        Self {
            path: path.into(),
            reload_interval,
            rows: Vec::new(),
            loaded_at: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-read the table when forced, never loaded, or stale.
    ///
    /// A missing table is an empty store. Returns whether a read happened.
    pub fn reload(&mut self, force: bool) -> Result<bool> {
        let stale = match self.loaded_at {
            None => true,
            Some(at) => at.elapsed() >= self.reload_interval,
        };
        if !force && !stale {
            return Ok(false);
        }

        self.rows = read_table(&self.path)?;
        self.loaded_at = Some(Instant::now());
        debug!(path = %self.path.display(), rows = self.rows.len(), "timing table loaded");
        Ok(true)
    }

    /// Bounds for `track_id`, or both absent. Never fails: a table that
    /// cannot be read is logged and treated as a miss.
    pub fn lookup(&mut self, track_id: &str) -> ChorusBounds {
        if let Err(e) = self.reload(false) {
            warn!(path = %self.path.display(), "failed to read timing table: {e}");
        }
        self.find(track_id)
            .map(|row| ChorusBounds {
                start_ms: row.chorus_start_ms,
                end_ms: row.chorus_end_ms,
            })
            .unwrap_or_default()
    }

    /// Full row for `track_id`, subject to the same staleness rules as `lookup`.
    pub fn get(&mut self, track_id: &str) -> Option<TrackTiming> {
        if let Err(e) = self.reload(false) {
            warn!(path = %self.path.display(), "failed to read timing table: {e}");
        }
        self.find(track_id).cloned()
    }

    /// Append `row` and persist the table.
    ///
    /// Rows are never replaced: if `track_id` is already present the call is
    /// a logged no-op and returns `Ok(false)`.
    pub fn append(&mut self, row: TrackTiming) -> Result<bool> {
        self.reload(true)?;
        if self.find(&row.track_id).is_some() {
            info!(track_id = %row.track_id, "timing already recorded, keeping existing row");
            return Ok(false);
        }

        self.rows.push(row);
        if let Err(e) = write_table(&self.path, &self.rows) {
            self.rows.pop();
            return Err(e);
        }
        Ok(true)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    fn find(&self, track_id: &str) -> Option<&TrackTiming> {
        self.rows.iter().find(|r| r.track_id == track_id)
    }
}

fn read_table(path: &Path) -> Result<Vec<TrackTiming>> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut reader = csv::Reader::from_reader(file);
    let mut rows: Vec<TrackTiming> = Vec::new();
    for record in reader.deserialize() {
        let row: TrackTiming = record?;
        // First row wins if the file was edited by hand.
        if !rows.iter().any(|r| r.track_id == row.track_id) {
            rows.push(row);
        }
    }
    Ok(rows)
}

fn write_table(path: &Path, rows: &[TrackTiming]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer.serialize(row)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| std::io::Error::other(e.to_string()))?;
    replace_file(path, &bytes)?;
    Ok(())
}
