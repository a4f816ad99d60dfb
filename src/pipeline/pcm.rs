//! Decoded audio held in memory.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use rodio::{Decoder, Source};

use crate::error::{Error, Result};

/// Interleaved f32 samples in [-1.0, 1.0].
#[derive(Debug, Clone, PartialEq)]
pub struct Pcm {
    pub samples: Vec<f32>,
    pub channels: u16,
    pub sample_rate: u32,
}

impl Pcm {
    pub fn new(samples: Vec<f32>, channels: u16, sample_rate: u32) -> Result<Self> {
        if channels == 0 || sample_rate == 0 {
            return Err(Error::Audio(format!(
                "{channels} channel(s) at {sample_rate} Hz"
            )));
        }
        Ok(Self {
            samples,
            channels,
            sample_rate,
        })
    }

    /// Decode a whole file with rodio's decoders.
    pub fn decode_file(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let decoder = Decoder::new(BufReader::new(file))?;
        let channels = u16::from(decoder.channels());
        let sample_rate = u32::from(decoder.sample_rate());
        let samples: Vec<f32> = decoder.collect();
        if samples.is_empty() {
            return Err(Error::Audio(format!("{} decoded to nothing", path.display())));
        }
        Self::new(samples, channels, sample_rate)
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn duration_ms(&self) -> u64 {
        self.frames() as u64 * 1000 / self.sample_rate as u64
    }

    fn frame_at_ms(&self, ms: u64) -> usize {
        let frame = ms as u128 * self.sample_rate as u128 / 1000;
        (frame as usize).min(self.frames())
    }

    /// Average the channels of each frame.
    pub fn to_mono(&self) -> Vec<f32> {
        let ch = self.channels as usize;
        if ch == 1 {
            return self.samples.clone();
        }
        self.samples
            .chunks_exact(ch)
            .map(|frame| frame.iter().sum::<f32>() / ch as f32)
            .collect()
    }

    /// Copy of `[start_ms, end_ms)`, clamped to the buffer.
    pub fn slice_ms(&self, start_ms: u64, end_ms: u64) -> Pcm {
        let ch = self.channels as usize;
        let start = self.frame_at_ms(start_ms);
        let end = self.frame_at_ms(end_ms).max(start);
        Pcm {
            samples: self.samples[start * ch..end * ch].to_vec(),
            channels: self.channels,
            sample_rate: self.sample_rate,
        }
    }

    /// Largest absolute sample value.
    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0f32, |m, s| m.max(s.abs()))
    }
}
