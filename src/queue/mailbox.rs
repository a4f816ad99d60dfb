use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use tracing::warn;

use crate::error::{Error, Result};
use crate::schedule::FILE_POLL;

use super::durable::{DurableQueue, Record};

/// Outcome of a bounded-wait pop.
#[derive(Debug, PartialEq, Eq)]
pub enum Pop<T> {
    Item(T),
    /// Nothing arrived within the wait.
    Empty,
    /// No producer is left; nothing will ever arrive.
    Closed,
}

/// Consuming end of a queue.
pub trait Inbox<T>: Send {
    /// Wait at most `wait` for the next item.
    fn pop(&self, wait: Duration) -> Result<Pop<T>>;

    fn is_empty(&self) -> bool;
}

/// Producing end of a queue.
pub trait Outbox<T>: Send {
    fn push(&self, item: T) -> Result<()>;
}

impl<T: Send> Inbox<T> for Receiver<T> {
    fn pop(&self, wait: Duration) -> Result<Pop<T>> {
        match self.recv_timeout(wait) {
            Ok(item) => Ok(Pop::Item(item)),
            Err(RecvTimeoutError::Timeout) => Ok(Pop::Empty),
            Err(RecvTimeoutError::Disconnected) => Ok(Pop::Closed),
        }
    }

    fn is_empty(&self) -> bool {
        Receiver::is_empty(self)
    }
}

impl<T: Send> Outbox<T> for Sender<T> {
    fn push(&self, item: T) -> Result<()> {
        self.send(item).map_err(|_| Error::QueueClosed)
    }
}

impl<T: Record> Inbox<T> for DurableQueue {
    fn pop(&self, wait: Duration) -> Result<Pop<T>> {
        let deadline = Instant::now() + wait;
        loop {
            let popped = self.pop_record::<T>(|line| {
                warn!(queue = %self.path().display(), "dropping malformed record {line:?}");
            })?;
            if let Some(item) = popped {
                return Ok(Pop::Item(item));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(Pop::Empty);
            }
            thread::sleep(FILE_POLL.min(deadline - now));
        }
    }

    fn is_empty(&self) -> bool {
        // An unreadable file has nothing we can hand out.
        self.len().map(|n| n == 0).unwrap_or(true)
    }
}

/// Fails with [`Error::Unrecordable`] for values without a line form, such as
/// the `Job::Finish` sentinel.
impl<T: Record + Send> Outbox<T> for DurableQueue {
    fn push(&self, item: T) -> Result<()> {
        self.push_record(&item)
    }
}
