//! Remote control of the player whose queue is being shaped.
//!
//! The controller only sees [`RemotePlayback`] and the queue analyzer only
//! sees [`RemoteQueue`]; [`MprisRemote`] implements both over the D-Bus
//! session bus.

mod mpris;
mod types;

pub use mpris::{MprisRemote, last_segment, now_playing_from, remote_track_from, upcoming_after};
pub use types::{NowPlaying, RemoteError, RemotePlayback, RemoteQueue, RemoteTrack};
