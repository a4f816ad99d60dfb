//! Chorus clip extraction and artifact naming.

use std::path::{Path, PathBuf};

use hound::{SampleFormat, WavSpec, WavWriter};

use crate::error::Result;
use crate::library::CLIP_PREFIX;

use super::pcm::Pcm;

/// Shape of an extracted clip.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipSpec {
    /// How much audio before the onset the clip starts with.
    pub pre_roll_ms: u64,
    /// Total clip length.
    pub window_ms: u64,
    pub fade_ms: u64,
    /// Target peak in dBFS; non-positive.
    pub headroom_db: f32,
}

impl Default for ClipSpec {
    fn default() -> Self {
        Self {
            pre_roll_ms: 20_000,
            window_ms: 60_000,
            fade_ms: 500,
            headroom_db: -0.1,
        }
    }
}

impl ClipSpec {
    /// Clip bounds for an onset, clamped to `[0, track_ms]`.
    pub fn clip_window(&self, onset_ms: u64, track_ms: u64) -> (u64, u64) {
        let start = onset_ms.saturating_sub(self.pre_roll_ms).min(track_ms);
        let post_roll = self.window_ms.saturating_sub(self.pre_roll_ms);
        let end = onset_ms.saturating_add(post_roll).min(track_ms).max(start);
        (start, end)
    }

    /// Cut the clip for `onset_ms` out of `pcm`, fade both ends and
    /// normalize its peak.
    pub fn render(&self, pcm: &Pcm, onset_ms: u64) -> Pcm {
        let (start, end) = self.clip_window(onset_ms, pcm.duration_ms());
        let mut clip = pcm.slice_ms(start, end);
        apply_fades(&mut clip, self.fade_ms);
        normalize_peak(&mut clip, self.headroom_db);
        clip
    }
}

/// Linear fade-in and fade-out of `fade_ms` each, shortened to half the clip
/// when the clip is too short for both.
pub fn apply_fades(pcm: &mut Pcm, fade_ms: u64) {
    let frames = pcm.frames();
    let fade = ((fade_ms as u128 * pcm.sample_rate as u128 / 1000) as usize).min(frames / 2);
    if fade == 0 {
        return;
    }

    let ch = pcm.channels as usize;
    for i in 0..fade {
        let gain = i as f32 / fade as f32;
        for c in 0..ch {
            pcm.samples[i * ch + c] *= gain;
            pcm.samples[(frames - 1 - i) * ch + c] *= gain;
        }
    }
}

/// Scale so the loudest sample sits at `headroom_db` dBFS. Silence is left alone.
pub fn normalize_peak(pcm: &mut Pcm, headroom_db: f32) {
    let peak = pcm.peak();
    if peak <= f32::EPSILON {
        return;
    }
    let gain = 10f32.powf(headroom_db / 20.0) / peak;
    for s in &mut pcm.samples {
        *s *= gain;
    }
}

/// Write `pcm` as 16-bit integer WAV.
pub fn write_wav(path: &Path, pcm: &Pcm) -> Result<()> {
    let spec = WavSpec {
        channels: pcm.channels,
        sample_rate: pcm.sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec)?;
    for s in &pcm.samples {
        writer.write_sample((s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)?;
    }
    writer.finalize()?;
    Ok(())
}

/// Keep alphanumerics, spaces, `-` and `_`; drop trailing whitespace.
pub fn safe_title(title: &str) -> String {
    let kept: String = title
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect();
    let kept = kept.trim_end();
    if kept.is_empty() {
        "untitled".to_string()
    } else {
        kept.to_string()
    }
}

/// `dir/chorus_<safe title>.wav`, with `_2`, `_3`, ... appended until the
/// name is free.
pub fn unique_artifact_path(dir: &Path, title: &str) -> PathBuf {
    let base = format!("{CLIP_PREFIX}{}", safe_title(title));
    let first = dir.join(format!("{base}.wav"));
    if !first.exists() {
        return first;
    }
    (2u32..)
        .map(|n| dir.join(format!("{base}_{n}.wav")))
        .find(|p| !p.exists())
        .unwrap_or(first)
}
