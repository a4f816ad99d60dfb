//! Values that travel through the pipeline queues.

use std::fmt;
use std::path::PathBuf;

use crate::queue::Record;

/// One song to fetch, as listed in the source track list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub song_name: String,
    pub artist: String,
}

impl WorkItem {
    pub fn new(song_name: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            song_name: song_name.into(),
            artist: artist.into(),
        }
    }

    /// Free-text query handed to the search service.
    pub fn query(&self) -> String {
        format!("{} {}", self.song_name, self.artist)
    }
}

impl fmt::Display for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} by {}", self.song_name, self.artist)
    }
}

impl Record for WorkItem {
    fn to_record(&self) -> String {
        format!("{}|{}", self.song_name, self.artist)
    }

    fn from_record(line: &str) -> Option<Self> {
        let (name, artist) = line.split_once('|')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        Some(Self::new(name, artist.trim()))
    }
}

/// Message on the Downloader's intake queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Job {
    Fetch(WorkItem),
    /// Sentinel: no more work will follow. Only in-memory queues carry it;
    /// a file queue refuses it, and a file-fed Downloader stops on its token.
    Finish,
}

impl Record for Job {
    fn to_record(&self) -> String {
        match self {
            Job::Fetch(item) => item.to_record(),
            // No line form; `push_record` refuses it.
            Job::Finish => String::new(),
        }
    }

    fn from_record(line: &str) -> Option<Self> {
        WorkItem::from_record(line).map(Job::Fetch)
    }
}

/// An extracted clip waiting to be played.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub file_path: PathBuf,
    pub source_title: String,
}

impl Record for Artifact {
    fn to_record(&self) -> String {
        format!("{}|{}", self.file_path.display(), self.source_title)
    }

    fn from_record(line: &str) -> Option<Self> {
        let (path, title) = match line.split_once('|') {
            Some((p, t)) => (p.trim(), t.trim().to_string()),
            // Bare path lines carry no title; fall back to the file stem.
            None => {
                let p = line.trim();
                let stem = std::path::Path::new(p)
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or(p)
                    .to_string();
                (p, stem)
            }
        };
        if path.is_empty() {
            return None;
        }
        Some(Self {
            file_path: PathBuf::from(path),
            source_title: title,
        })
    }
}

/// What the search service resolved a query to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    /// Opaque handle the fetcher downloads from (URL, video id, ...).
    pub locator: String,
    pub title: String,
    pub artist: Option<String>,
    /// Key for timing-table rows; rows are only written when present.
    pub track_id: Option<String>,
}
