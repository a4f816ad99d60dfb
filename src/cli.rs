use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Chorus-focused playback: fetch, analyze and play the part of the song you came for.
#[derive(Parser, Debug)]
#[command(name = "refrain", version, about)]
pub struct Cli {
    /// Config file to load instead of `$XDG_CONFIG_HOME/refrain/config.toml`
    #[arg(short, long, global = true, env = "REFRAIN_CONFIG_PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch, cut and play every song of a track list in this process
    Run {
        /// CSV with `song_name,artist` columns
        list: PathBuf,
    },
    /// Keep the durable song queue topped up from a track list
    Feed {
        /// CSV with `song_name,artist` columns
        list: PathBuf,
    },
    /// Turn queued songs into chorus clips on the play queue
    Process,
    /// Play clips from the play queue until stopped
    Play,
    /// Shape playback of a remote MPRIS player by queued duplicates
    Control,
    /// Record chorus timings for the remote player's current and next tracks
    Analyze,
    /// Print the effective configuration as TOML
    Config,
}
