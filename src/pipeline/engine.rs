//! Audio output for the Player role.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink};

use crate::error::{Error, Result};

/// What the Player drives. Implementations are created on the Player thread
/// and never leave it.
pub trait PlaybackEngine {
    /// Prepare `path` for playback, replacing anything loaded before.
    /// Loaded audio starts paused.
    fn load(&mut self, path: &Path) -> Result<()>;

    fn play(&mut self);

    /// `true` while loaded audio is still producing sound.
    fn is_busy(&self) -> bool;

    fn stop(&mut self);

    /// Release the loaded file so it can be deleted.
    fn unload(&mut self);
}

/// [`PlaybackEngine`] on the default output device.
pub struct RodioEngine {
    stream: OutputStream,
    sink: Option<Sink>,
}

impl RodioEngine {
    pub fn open() -> Result<Self> {
        let mut stream = OutputStreamBuilder::open_default_stream()
            .map_err(|e| Error::Engine(format!("no audio output device: {e}")))?;
        // rodio logs to stderr when the stream is dropped.
        stream.log_on_drop(false);
        Ok(Self { stream, sink: None })
    }
}

impl PlaybackEngine for RodioEngine {
    fn load(&mut self, path: &Path) -> Result<()> {
        self.unload();
        let file = File::open(path)?;
        let source = Decoder::new(BufReader::new(file))?;

        let sink = Sink::connect_new(self.stream.mixer());
        sink.append(source);
        sink.pause();
        self.sink = Some(sink);
        Ok(())
    }

    fn play(&mut self) {
        if let Some(sink) = &self.sink {
            sink.play();
        }
    }

    fn is_busy(&self) -> bool {
        self.sink.as_ref().is_some_and(|s| !s.empty())
    }

    fn stop(&mut self) {
        if let Some(sink) = &self.sink {
            sink.stop();
        }
    }

    fn unload(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
    }
}
