//! Chorus timing cache.
//!
//! A CSV table mapping remote track ids to chorus bounds. The pipeline is the
//! only writer; the controller (possibly in another process) reads it through
//! a copy that is at most one reload interval stale.

mod model;
mod store;

pub use model::TrackTiming;
pub use store::{ChorusBounds, TimingStore};

#[cfg(test)]
mod tests;
