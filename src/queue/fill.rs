use std::iter::Peekable;
use std::time::Duration;

use tracing::{info, warn};

use crate::error::Result;
use crate::schedule::CancelToken;

use super::durable::{DurableQueue, Record};

/// How a fill run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FillSummary {
    /// Records written by this run.
    pub enqueued: usize,
    /// `true` when the source ran dry and the queue drained; `false` when stopped.
    pub completed: bool,
}

/// Keeps a durable queue topped up to a target depth from a finite source.
#[derive(Debug, Clone)]
pub struct BufferFiller {
    queue: DurableQueue,
    depth: usize,
    interval: Duration,
}

impl BufferFiller {
    pub fn new(queue: DurableQueue, depth: usize, interval: Duration) -> Self {
        Self {
            queue,
            depth,
            interval,
        }
    }

    pub fn queue(&self) -> &DurableQueue {
        &self.queue
    }

    /// Enqueue from `source` until the queue holds `depth` records or the
    /// source runs out. An item leaves the source only once it is on disk.
    pub fn fill_pass<I, T>(&self, source: &mut Peekable<I>) -> Result<usize>
    where
        I: Iterator<Item = T>,
        T: Record,
    {
        let mut added = 0;
        let mut current = self.queue.len()?;
        while current < self.depth {
            let Some(item) = source.peek() else {
                break;
            };
            self.queue.push_record(item)?;
            info!(record = %item.to_record(), depth = current + 1, "queued");
            source.next();
            added += 1;
            current = self.queue.len()?;
        }
        Ok(added)
    }

    /// Fill, sleep, repeat until the source is exhausted and the consumer has
    /// drained the queue, or until `token` is cancelled.
    pub fn run<I, T>(&self, source: I, token: &CancelToken) -> FillSummary
    where
        I: IntoIterator<Item = T>,
        T: Record,
    {
        let mut source = source.into_iter().peekable();
        let mut enqueued = 0;

        loop {
            if token.is_cancelled() {
                return FillSummary {
                    enqueued,
                    completed: false,
                };
            }

            match self.fill_pass(&mut source) {
                Ok(n) => enqueued += n,
                Err(e) => warn!(queue = %self.queue.path().display(), "fill pass failed: {e}"),
            }

            let exhausted = source.peek().is_none();
            let depth = match self.queue.len() {
                Ok(n) => Some(n),
                Err(e) => {
                    warn!(queue = %self.queue.path().display(), "cannot read queue depth: {e}");
                    None
                }
            };
            if exhausted && depth == Some(0) {
                info!(enqueued, "source exhausted and queue drained");
                return FillSummary {
                    enqueued,
                    completed: true,
                };
            }

            if !token.sleep(self.interval) {
                return FillSummary {
                    enqueued,
                    completed: false,
                };
            }
        }
    }
}
