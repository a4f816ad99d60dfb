//! Track sources and audio-file discovery.

mod list;
mod scan;
mod tags;

pub use list::load_track_list;
pub use scan::{CLIP_PREFIX, find_orphan_clips};
pub use tags::{TagInfo, probe_tags};

#[cfg(test)]
mod tests;
