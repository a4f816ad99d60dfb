use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};
use crate::persist::replace_file;

/// A value that can live on one line of a [`DurableQueue`] file.
///
/// Fields are joined with `|`; the delimiter itself is not escaped, so
/// values containing `|` do not round-trip. A value encoding to an empty line
/// has no file form and is refused by [`DurableQueue::push_record`].
pub trait Record: Sized {
    fn to_record(&self) -> String;
    fn from_record(line: &str) -> Option<Self>;
}

/// File-backed FIFO, one record per line.
///
/// Meant for exactly one producer and one consumer per file. Appends and
/// read-rewrite cycles are serialized through an advisory lock on a sibling
/// `.lock` file, so a producer appending while the consumer rewrites cannot
/// lose a record.
#[derive(Debug, Clone)]
pub struct DurableQueue {
    path: PathBuf,
}

impl DurableQueue {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one line. The write is flushed before returning so the
    /// consumer's next read sees it.
    pub fn enqueue(&self, record: &str) -> Result<()> {
        let line = record.replace(['\n', '\r'], " ");
        self.locked(|| {
            let mut f = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)?;
            writeln!(f, "{line}")?;
            f.flush()?;
            Ok(())
        })
    }

    /// Remove and return the first record, or `None` when the queue is empty.
    pub fn dequeue(&self) -> Result<Option<String>> {
        self.locked(|| {
            let lines = self.read_lines()?;
            let Some((first, rest)) = lines.split_first() else {
                return Ok(None);
            };

            let mut remaining = String::new();
            for line in rest {
                remaining.push_str(line);
                remaining.push('\n');
            }
            replace_file(&self.path, remaining.as_bytes())?;
            debug!(queue = %self.path.display(), left = rest.len(), "dequeued record");
            Ok(Some(first.clone()))
        })
    }

    /// Number of queued records. A missing file is an empty queue.
    pub fn len(&self) -> Result<usize> {
        Ok(self.read_lines()?.len())
    }

    /// Every record that parses as `T`, oldest first, without consuming any.
    pub fn peek_records<T: Record>(&self) -> Result<Vec<T>> {
        Ok(self
            .read_lines()?
            .iter()
            .filter_map(|l| T::from_record(l))
            .collect())
    }

    /// Append `item`. Values without a line form are refused rather than
    /// written as a blank line that every reader would skip.
    pub fn push_record<T: Record>(&self, item: &T) -> Result<()> {
        let line = item.to_record();
        if line.trim().is_empty() {
            return Err(Error::Unrecordable(std::any::type_name::<T>()));
        }
        self.enqueue(&line)
    }

    /// Dequeue records until one parses as `T`. Unparseable lines are
    /// consumed and reported through `on_skip`.
    pub fn pop_record<T: Record>(&self, mut on_skip: impl FnMut(&str)) -> Result<Option<T>> {
        while let Some(line) = self.dequeue()? {
            match T::from_record(&line) {
                Some(item) => return Ok(Some(item)),
                None => on_skip(&line),
            }
        }
        Ok(None)
    }

    /// Sidecar file the advisory lock is taken on.
    pub fn lock_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "queue".into());
        name.push(".lock");
        self.path.with_file_name(name)
    }

    fn locked<R>(&self, f: impl FnOnce() -> Result<R>) -> Result<R> {
        let lock = File::options()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.lock_path())?;
        lock.lock()?;
        // Released when `lock` is closed.
        f()
    }

    fn read_lines(&self) -> Result<Vec<String>> {
        let text = match fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        Ok(text
            .lines()
            .map(|l| l.trim_end().to_string())
            .filter(|l| !l.is_empty())
            .collect())
    }
}
