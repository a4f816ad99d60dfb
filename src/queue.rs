//! Work queues between roles.
//!
//! Roles talk through [`Inbox`]/[`Outbox`] so the same loop can run over an
//! in-memory channel (one process) or a [`DurableQueue`] file (one process
//! per role).

mod durable;
mod fill;
mod mailbox;

pub use durable::{DurableQueue, Record};
pub use fill::{BufferFiller, FillSummary};
pub use mailbox::{Inbox, Outbox, Pop};
