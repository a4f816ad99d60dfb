use std::collections::HashMap;

use async_io::block_on;
use tracing::debug;
use zbus::proxy::CacheProperties;
use zbus::{Connection, fdo, proxy};
use zvariant::{ObjectPath, OwnedObjectPath, OwnedValue, Value};

use crate::error::Error;

use super::types::{NowPlaying, RemoteError, RemotePlayback, RemoteQueue, RemoteTrack};

const MPRIS_PATH: &str = "/org/mpris/MediaPlayer2";

#[proxy(
    interface = "org.mpris.MediaPlayer2.Player",
    default_path = "/org/mpris/MediaPlayer2"
)]
trait MediaPlayer {
    fn pause(&self) -> zbus::Result<()>;

    fn play(&self) -> zbus::Result<()>;

    fn next(&self) -> zbus::Result<()>;

    fn set_position(&self, track_id: &ObjectPath<'_>, position: i64) -> zbus::Result<()>;

    #[zbus(property)]
    fn metadata(&self) -> zbus::Result<HashMap<String, OwnedValue>>;

    #[zbus(property)]
    fn position(&self) -> zbus::Result<i64>;

    #[zbus(property)]
    fn playback_status(&self) -> zbus::Result<String>;
}

#[proxy(
    interface = "org.mpris.MediaPlayer2.TrackList",
    default_path = "/org/mpris/MediaPlayer2"
)]
trait TrackList {
    fn get_tracks_metadata(
        &self,
        track_ids: &[OwnedObjectPath],
    ) -> zbus::Result<Vec<HashMap<String, OwnedValue>>>;

    #[zbus(property)]
    fn tracks(&self) -> zbus::Result<Vec<OwnedObjectPath>>;
}

/// [`RemotePlayback`] for an MPRIS player on the session bus.
pub struct MprisRemote {
    player: MediaPlayerProxy<'static>,
    tracks: TrackListProxy<'static>,
}

impl MprisRemote {
    /// Connect to `bus_name` (for example `org.mpris.MediaPlayer2.spotify`)
    /// and check that it answers.
    pub fn connect(bus_name: &str) -> crate::error::Result<Self> {
        block_on(async {
            let conn = Connection::session().await.map_err(|e| {
                Error::startup(
                    format!("cannot reach the D-Bus session bus: {e}"),
                    "Run inside a desktop session or export DBUS_SESSION_BUS_ADDRESS.",
                )
            })?;

            let player = MediaPlayerProxy::builder(&conn)
                .destination(bus_name.to_string())?
                .path(MPRIS_PATH)?
                .cache_properties(CacheProperties::No)
                .build()
                .await?;
            let tracks = TrackListProxy::builder(&conn)
                .destination(bus_name.to_string())?
                .path(MPRIS_PATH)?
                .cache_properties(CacheProperties::No)
                .build()
                .await?;

            let status = player.playback_status().await.map_err(|e| {
                Error::startup(
                    format!("player {bus_name} did not answer: {e}"),
                    "Start the player first, or point controller.player_bus_name \
                     (REFRAIN__CONTROLLER__PLAYER_BUS_NAME) at a running MPRIS player.",
                )
            })?;
            debug!(bus_name, status = %status, "connected to player");

            Ok::<_, Error>(Self { player, tracks })
        })
    }

    async fn read_lookahead(&self, depth: usize) -> Result<Vec<RemoteTrack>, RemoteError> {
        let metadata = self.player.metadata().await?;
        let Some(current) = remote_track_from(&metadata) else {
            return Ok(Vec::new());
        };
        let mut tracks = vec![current];
        if depth == 0 {
            return Ok(tracks);
        }

        let paths = match self.tracks.tracks().await {
            Ok(p) => p,
            Err(e) if unsupported(&e) => {
                debug!("player has no track list: {e}");
                return Ok(tracks);
            }
            Err(e) => return Err(e.into()),
        };
        let current_path = metadata.get("mpris:trackid").and_then(value_str);
        let start = current_path
            .and_then(|cur| paths.iter().position(|p| p.as_str() == cur))
            .map_or(0, |i| i + 1);
        let next: Vec<OwnedObjectPath> = paths.into_iter().skip(start).take(depth).collect();
        if next.is_empty() {
            return Ok(tracks);
        }

        match self.tracks.get_tracks_metadata(&next).await {
            Ok(upcoming) => tracks.extend(upcoming.iter().filter_map(remote_track_from)),
            Err(e) if unsupported(&e) => debug!("player cannot describe queued tracks: {e}"),
            Err(e) => return Err(e.into()),
        }
        Ok(tracks)
    }

    fn current_trackid(&self) -> Result<Option<OwnedObjectPath>, RemoteError> {
        let metadata = block_on(self.player.metadata())?;
        Ok(metadata
            .get("mpris:trackid")
            .and_then(|v| value_str(v))
            .and_then(|s| OwnedObjectPath::try_from(s.to_string()).ok()))
    }
}

fn value_str(v: &OwnedValue) -> Option<&str> {
    match &**v {
        Value::Str(s) => Some(s.as_str()),
        Value::ObjectPath(p) => Some(p.as_str()),
        _ => None,
    }
}

/// First string of an `as` value such as `xesam:artist`, or a plain string.
fn value_first_str(v: &OwnedValue) -> Option<&str> {
    match &**v {
        Value::Array(items) => items.iter().find_map(|item| match item {
            Value::Str(s) => Some(s.as_str()),
            _ => None,
        }),
        Value::Str(s) => Some(s.as_str()),
        _ => None,
    }
}

fn value_u64(v: &OwnedValue) -> Option<u64> {
    match &**v {
        Value::I64(n) => u64::try_from(*n).ok(),
        Value::U64(n) => Some(*n),
        Value::I32(n) => u64::try_from(*n).ok(),
        Value::U32(n) => Some(u64::from(*n)),
        _ => None,
    }
}

/// Final `/`-separated segment of a track path (`/com/spotify/track/abc` → `abc`).
pub fn last_segment(path: &str) -> &str {
    path.rsplit('/').find(|s| !s.is_empty()).unwrap_or(path)
}

/// Build a snapshot from MPRIS `Metadata`, `PlaybackStatus` and `Position` (µs).
pub fn now_playing_from(
    metadata: &HashMap<String, OwnedValue>,
    status: &str,
    position_us: i64,
) -> Option<NowPlaying> {
    if status == "Stopped" {
        return None;
    }
    let track_id = last_segment(metadata.get("mpris:trackid").and_then(value_str)?).to_string();
    if track_id.is_empty() || track_id == "NoTrack" {
        return None;
    }

    Some(NowPlaying {
        name: metadata
            .get("xesam:title")
            .and_then(value_str)
            .unwrap_or_default()
            .to_string(),
        is_playing: status == "Playing",
        progress_ms: u64::try_from(position_us).unwrap_or(0) / 1000,
        duration_ms: metadata
            .get("mpris:length")
            .and_then(value_u64)
            .unwrap_or(0)
            / 1000,
        track_id,
    })
}

/// Describe a track from its MPRIS metadata. Tracks without an id or a
/// title cannot be looked up and yield `None`.
pub fn remote_track_from(metadata: &HashMap<String, OwnedValue>) -> Option<RemoteTrack> {
    let track_id = last_segment(metadata.get("mpris:trackid").and_then(value_str)?).to_string();
    if track_id.is_empty() || track_id == "NoTrack" {
        return None;
    }
    let name = metadata.get("xesam:title").and_then(value_str)?.trim();
    if name.is_empty() {
        return None;
    }

    Some(RemoteTrack {
        name: name.to_string(),
        artist: metadata
            .get("xesam:artist")
            .and_then(value_first_str)
            .unwrap_or_default()
            .trim()
            .to_string(),
        duration_ms: metadata
            .get("mpris:length")
            .and_then(value_u64)
            .unwrap_or(0)
            / 1000,
        track_id,
    })
}

/// Ids queued after `current` in an MPRIS track list. The list includes the
/// current track; when it cannot be found the whole list is upcoming.
pub fn upcoming_after(tracks: &[String], current: Option<&str>) -> Vec<String> {
    let start = current
        .and_then(|cur| tracks.iter().position(|t| t == cur))
        .map_or(0, |i| i + 1);
    tracks[start..]
        .iter()
        .map(|t| last_segment(t).to_string())
        .collect()
}

/// The player answered, but does not implement what was asked.
fn unsupported(e: &zbus::Error) -> bool {
    match e {
        zbus::Error::FDO(err) => matches!(
            **err,
            fdo::Error::UnknownInterface(_)
                | fdo::Error::UnknownProperty(_)
                | fdo::Error::UnknownMethod(_)
                | fdo::Error::NotSupported(_)
        ),
        zbus::Error::InterfaceNotFound => true,
        zbus::Error::MethodError(name, _, _) => name.as_str().contains(".Unknown"),
        _ => false,
    }
}

impl RemotePlayback for MprisRemote {
    fn now_playing(&self) -> Result<Option<NowPlaying>, RemoteError> {
        block_on(async {
            let status = self.player.playback_status().await?;
            let metadata = self.player.metadata().await?;
            let position = self.player.position().await?;
            Ok::<_, RemoteError>(now_playing_from(&metadata, &status, position))
        })
    }

    fn upcoming(&self) -> Result<Option<Vec<String>>, RemoteError> {
        let tracks = match block_on(self.tracks.tracks()) {
            Ok(t) => t,
            Err(e) if unsupported(&e) => {
                debug!("player has no track list: {e}");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        let tracks: Vec<String> = tracks.iter().map(|p| p.as_str().to_string()).collect();
        let current = self.current_trackid()?;
        Ok(Some(upcoming_after(&tracks, current.as_ref().map(|p| p.as_str()))))
    }

    fn pause(&self) -> Result<(), RemoteError> {
        Ok(block_on(self.player.pause())?)
    }

    fn resume(&self) -> Result<(), RemoteError> {
        Ok(block_on(self.player.play())?)
    }

    fn seek(&self, position_ms: u64) -> Result<(), RemoteError> {
        let trackid = self
            .current_trackid()?
            .ok_or_else(|| RemoteError::Protocol("no track to seek in".into()))?;
        let position = i64::try_from(position_ms.saturating_mul(1000))
            .map_err(|_| RemoteError::Protocol(format!("position {position_ms} ms out of range")))?;
        Ok(block_on(self.player.set_position(&trackid, position))?)
    }

    fn skip_next(&self) -> Result<(), RemoteError> {
        Ok(block_on(self.player.next())?)
    }
}

impl RemoteQueue for MprisRemote {
    fn lookahead(&self, depth: usize) -> Result<Vec<RemoteTrack>, RemoteError> {
        block_on(self.read_lookahead(depth))
    }
}
