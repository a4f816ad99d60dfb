//! Download → analyze → extract → play.
//!
//! Two roles joined by queues: the [`Downloader`] turns [`Job`]s into chorus
//! clips ([`Artifact`]s), the [`Player`] plays them in order. The queues are
//! either in-memory channels (both roles in one process) or durable files
//! (roles in separate processes); see [`crate::queue`].

mod detect;
mod downloader;
mod engine;
mod extract;
mod fetch;
mod pcm;
mod player;
mod types;

pub use detect::{ChorusDetector, OnsetPeakDetector, fallback_onset, locate_chorus};
pub use downloader::{Completion, Downloader, DownloaderOptions};
pub use engine::{PlaybackEngine, RodioEngine};
pub use extract::{ClipSpec, apply_fades, normalize_peak, safe_title, unique_artifact_path, write_wav};
pub use fetch::{AudioFetcher, CommandFetcher, parse_search_line};
pub use pcm::Pcm;
pub use player::{NeverDrained, Player, Upstream, abandon_queued};
pub use types::{Artifact, Job, SearchHit, WorkItem};

#[cfg(test)]
mod tests;
