//! Crate error types.
//!
//! `Error` covers everything that can abort a single unit of work (one
//! pipeline item, one store reload, one queue operation). Long-running loops
//! log these and move on; only `Error::Startup` is meant to reach the
//! operator.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("timing table error: {0}")]
    Csv(#[from] csv::Error),

    #[error("WAV write error: {0}")]
    Wav(#[from] hound::Error),

    #[error("decode error: {0}")]
    Decode(#[from] rodio::decoder::DecoderError),

    #[error("configuration error: {0}")]
    Config(#[from] ::config::ConfigError),

    #[error("D-Bus error: {0}")]
    Bus(#[from] zbus::Error),

    /// The search service had nothing for the query.
    #[error("no match for {0:?}")]
    NoMatch(String),

    /// An external program (downloader, detector) misbehaved.
    #[error("{program} failed: {detail}")]
    External { program: String, detail: String },

    /// Decoded audio was unusable (empty, zero channels, ...).
    #[error("unusable audio: {0}")]
    Audio(String),

    /// The value has no line form, so a queue file cannot carry it.
    #[error("{0} cannot be written to a queue file")]
    Unrecordable(&'static str),

    /// The other end of an in-memory queue went away.
    #[error("queue closed")]
    QueueClosed,

    #[error("playback engine error: {0}")]
    Engine(String),

    /// Setup failed before any loop started; `hint` tells the operator what to try.
    #[error("{message}\n\n{hint}")]
    Startup { message: String, hint: String },
}

impl Error {
    pub fn external(program: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::External {
            program: program.into(),
            detail: detail.into(),
        }
    }

    pub fn startup(message: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::Startup {
            message: message.into(),
            hint: hint.into(),
        }
    }
}
