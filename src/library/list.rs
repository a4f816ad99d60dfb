use std::fs::File;
use std::path::Path;

use serde::Deserialize;
use tracing::warn;

use crate::error::Result;
use crate::pipeline::WorkItem;

#[derive(Debug, Deserialize)]
struct Row {
    song_name: String,
    #[serde(default)]
    artist: String,
}

/// Read a `song_name,artist` CSV into work items, in file order.
///
/// Rows without a song name are skipped with a warning.
pub fn load_track_list(path: &Path) -> Result<Vec<WorkItem>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(File::open(path)?);

    let mut items = Vec::new();
    for (i, row) in reader.deserialize::<Row>().enumerate() {
        let row = row?;
        if row.song_name.is_empty() {
            warn!(line = i + 2, "track list row without a song name, skipping");
            continue;
        }
        items.push(WorkItem::new(row.song_name, row.artist));
    }
    Ok(items)
}
