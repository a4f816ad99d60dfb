use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::schedule;

/// Top-level settings loaded from `config.toml`.
///
/// File format: TOML
/// Default path (Linux/XDG): `$XDG_CONFIG_HOME/refrain/config.toml` or `~/.config/refrain/config.toml`
///
/// Precedence (highest wins):
/// 1) Environment variables (prefix `REFRAIN__`, `__` as nested separator)
/// 2) Config file (if present)
/// 3) Struct defaults
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub paths: PathSettings,
    pub pipeline: PipelineSettings,
    pub fetch: FetchSettings,
    pub buffer: BufferSettings,
    pub controller: ControllerSettings,
    pub analyzer: AnalyzerSettings,
    pub timing: TimingSettings,
    pub cleanup: CleanupSettings,
}

/// Where queues, tables and clips live. Relative paths resolve against the
/// process working directory.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PathSettings {
    /// Durable queue of `song|artist` work items (written by `feed`).
    pub song_queue: PathBuf,
    /// Durable queue of finished clips (written by `process`).
    pub play_queue: PathBuf,
    /// Status file naming the clip the standalone player is on.
    pub currently_playing: PathBuf,
    /// CSV table of chorus timings.
    pub timing_table: PathBuf,
    /// Directory extracted clips are written to.
    pub artifact_dir: PathBuf,
    /// Directory raw downloads land in before analysis.
    pub scratch_dir: PathBuf,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            song_queue: "song_queue.txt".into(),
            play_queue: "play_queue.txt".into(),
            currently_playing: "currently_playing.txt".into(),
            timing_table: "chorus_timings.csv".into(),
            artifact_dir: ".".into(),
            scratch_dir: "downloads".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// How long a role blocks on an empty queue before re-checking for stop (ms).
    pub pop_wait_ms: u64,
    /// Player idle-check cadence (ms).
    pub player_tick_ms: u64,
    /// Audio kept before the detected onset (ms).
    pub pre_roll_ms: u64,
    /// Total clip length including pre-roll (ms).
    pub window_ms: u64,
    /// Fade-in and fade-out length (ms).
    pub fade_ms: u64,
    /// Peak level clips are normalized to (dBFS, <= 0).
    pub normalize_headroom_db: f32,
    /// Fraction of the track used as onset when detection finds nothing.
    pub fallback_ratio: f64,
    /// Length of the chorus recorded in the timing table (ms).
    pub chorus_span_ms: u64,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            pop_wait_ms: schedule::POP_WAIT.as_millis() as u64,
            player_tick_ms: schedule::PLAYER_TICK.as_millis() as u64,
            pre_roll_ms: 20_000,
            window_ms: 60_000,
            fade_ms: 500,
            normalize_headroom_db: -0.1,
            fallback_ratio: 0.3,
            chorus_span_ms: 60_000,
        }
    }
}

/// External downloader used to resolve and fetch audio.
///
/// The defaults speak yt-dlp. `{query}`, `{locator}` and `{dir}` are
/// substituted in the argument templates.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FetchSettings {
    pub program: String,
    pub search_args: Vec<String>,
    pub download_args: Vec<String>,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            program: "yt-dlp".to_string(),
            search_args: vec![
                "--no-warnings".into(),
                "--skip-download".into(),
                "--print".into(),
                "%(id)s\t%(title)s\t%(uploader)s".into(),
                "ytsearch1:{query}".into(),
            ],
            download_args: vec![
                "--no-warnings".into(),
                "--quiet".into(),
                "-x".into(),
                "--audio-format".into(),
                "mp3".into(),
                "-o".into(),
                "{dir}/%(id)s.%(ext)s".into(),
                "--print".into(),
                "after_move:filepath".into(),
                "https://www.youtube.com/watch?v={locator}".into(),
            ],
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BufferSettings {
    /// Target backlog kept in the song queue.
    pub depth: usize,
    /// Pause between fill passes (ms).
    pub interval_ms: u64,
}

impl Default for BufferSettings {
    fn default() -> Self {
        Self {
            depth: 5,
            interval_ms: schedule::FILL_INTERVAL.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ControllerSettings {
    /// MPRIS bus name of the player to drive.
    pub player_bus_name: String,
    pub poll_ms: u64,
    /// Pause after each transport command so the player catches up (ms).
    pub settle_ms: u64,
    /// Remaining time at which a full song is skipped (ms).
    pub full_song_tail_ms: u64,
    /// Sleep after a failed poll (ms).
    pub error_backoff_ms: u64,
    /// Sleep once `max_failures` polls in a row failed (ms).
    pub cooldown_ms: u64,
    pub max_failures: u32,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            player_bus_name: "org.mpris.MediaPlayer2.spotify".to_string(),
            poll_ms: schedule::CONTROLLER_POLL.as_millis() as u64,
            settle_ms: 100,
            full_song_tail_ms: 2000,
            error_backoff_ms: 5000,
            cooldown_ms: 30_000,
            max_failures: 3,
        }
    }
}

/// Chorus analysis of the remote player's queue. Talks to
/// `controller.player_bus_name`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AnalyzerSettings {
    /// Queued tracks analyzed ahead of the current one.
    pub lookahead: usize,
    pub poll_ms: u64,
    /// Sleep after a failed or empty read of the queue (ms).
    pub error_backoff_ms: u64,
    /// Sleep once `max_failures` reads in a row failed (ms).
    pub cooldown_ms: u64,
    pub max_failures: u32,
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        Self {
            lookahead: 2,
            poll_ms: schedule::ANALYZER_POLL.as_millis() as u64,
            error_backoff_ms: 5000,
            cooldown_ms: 30_000,
            max_failures: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimingSettings {
    /// Staleness window of the in-memory copy of the timing table (ms).
    pub reload_interval_ms: u64,
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            reload_interval_ms: 5000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CleanupSettings {
    /// Sweeps attempted on shutdown.
    pub attempts: u32,
    /// Wait between shutdown sweeps (ms).
    pub retry_wait_ms: u64,
    /// Mark leftover clips from a previous run for deletion on start.
    pub adopt_orphans: bool,
}

impl Default for CleanupSettings {
    fn default() -> Self {
        Self {
            attempts: 3,
            retry_wait_ms: 1000,
            adopt_orphans: true,
        }
    }
}
