//! Deferred deletion of transient files.
//!
//! Clips and raw downloads are handed here once nothing needs them. A file
//! that cannot be removed yet (still open by the audio backend, permissions)
//! stays pending and is retried on the next sweep.

use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::library::find_orphan_clips;

pub type CleanupHandle = Arc<Mutex<CleanupManager>>;

/// Result of one sweep.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub removed: Vec<PathBuf>,
    pub failed: Vec<PathBuf>,
}

#[derive(Debug, Default)]
pub struct CleanupManager {
    pending: Vec<PathBuf>,
    status_files: Vec<PathBuf>,
}

impl CleanupManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Files removed on shutdown whatever the sweeps achieved.
    pub fn with_status_files(status_files: Vec<PathBuf>) -> Self {
        Self {
            pending: Vec::new(),
            status_files,
        }
    }

    pub fn into_handle(self) -> CleanupHandle {
        Arc::new(Mutex::new(self))
    }

    /// Queue `path` for deletion. Marking twice is a no-op.
    pub fn mark(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        if !self.pending.iter().any(|p| p == path) {
            debug!(path = %path.display(), "marked for cleanup");
            self.pending.push(path.to_path_buf());
        }
    }

    pub fn pending(&self) -> &[PathBuf] {
        &self.pending
    }

    /// Try to delete every pending file.
    pub fn sweep(&mut self) -> SweepReport {
        self.sweep_with(remove_if_present)
    }

    /// Sweep using `remove` as the deletion primitive.
    pub fn sweep_with(&mut self, mut remove: impl FnMut(&Path) -> io::Result<()>) -> SweepReport {
        let mut report = SweepReport::default();
        let mut still_pending = Vec::new();
        for path in self.pending.drain(..) {
            match remove(&path) {
                Ok(()) => {
                    info!(path = %path.display(), "cleaned up");
                    report.removed.push(path);
                }
                Err(e) => {
                    debug!(path = %path.display(), "cleanup deferred: {e}");
                    report.failed.push(path.clone());
                    still_pending.push(path);
                }
            }
        }
        self.pending = still_pending;
        report
    }

    /// Mark clips a previous run left in `dir`. Returns how many were found.
    pub fn adopt_orphans(&mut self, dir: &Path) -> usize {
        self.adopt_orphans_except(dir, &[])
    }

    /// Like [`adopt_orphans`](Self::adopt_orphans), but clips whose file
    /// name matches one in `keep` (still queued for playback) are left alone.
    pub fn adopt_orphans_except(&mut self, dir: &Path, keep: &[PathBuf]) -> usize {
        let orphans: Vec<PathBuf> = find_orphan_clips(dir)
            .into_iter()
            .filter(|p| !keep.iter().any(|k| k.file_name() == p.file_name()))
            .collect();
        let count = orphans.len();
        for path in orphans {
            self.mark(path);
        }
        if count > 0 {
            info!(dir = %dir.display(), count, "adopted leftover clips");
        }
        count
    }

    /// Sweep up to `attempts` times, `wait` apart, then remove the status
    /// files unconditionally. Returns whatever is still pending.
    pub fn shutdown(&mut self, attempts: u32, wait: Duration) -> Vec<PathBuf> {
        self.shutdown_with(attempts, wait, remove_if_present)
    }

    pub fn shutdown_with(
        &mut self,
        attempts: u32,
        wait: Duration,
        mut remove: impl FnMut(&Path) -> io::Result<()>,
    ) -> Vec<PathBuf> {
        for attempt in 1..=attempts.max(1) {
            self.sweep_with(&mut remove);
            if self.pending.is_empty() {
                break;
            }
            if attempt < attempts {
                thread::sleep(wait);
            }
        }

        for path in &self.status_files {
            if let Err(e) = remove(path) {
                warn!(path = %path.display(), "failed to remove status file: {e}");
            }
        }

        if !self.pending.is_empty() {
            warn!(left = self.pending.len(), "some files could not be cleaned up");
        }
        self.pending.clone()
    }
}

/// Delete `path` now, or leave it to the manager behind `cleanup`.
pub fn discard(cleanup: &CleanupHandle, path: &Path) {
    if let Err(e) = remove_if_present(path) {
        debug!(path = %path.display(), "deferring removal: {e}");
        cleanup.lock().unwrap_or_else(|e| e.into_inner()).mark(path);
    }
}

/// Delete `path`; a file that is already gone counts as deleted.
pub fn remove_if_present(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
