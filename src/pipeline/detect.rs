//! Chorus onset estimation.
//!
//! The pipeline only relies on the [`ChorusDetector`] contract: mono samples
//! and a sample rate in, an onset offset in milliseconds (or nothing) out.

use tracing::debug;

use super::pcm::Pcm;

/// Estimates where the chorus starts.
pub trait ChorusDetector: Send {
    /// Onset of the chorus in ms from the start, or `None` when nothing
    /// stood out.
    fn detect(&self, mono: &[f32], sample_rate: u32) -> Option<u64>;
}

/// Onset used when the detector has no answer: a fixed share of the track.
pub fn fallback_onset(duration_ms: u64, ratio: f64) -> u64 {
    (duration_ms as f64 * ratio) as u64
}

/// Onset from `detector`, or the fallback share of the track when it has
/// no answer.
pub fn locate_chorus(detector: &dyn ChorusDetector, pcm: &Pcm, fallback_ratio: f64) -> u64 {
    detector
        .detect(&pcm.to_mono(), pcm.sample_rate)
        .unwrap_or_else(|| {
            debug!("no chorus detected, using fallback onset");
            fallback_onset(pcm.duration_ms(), fallback_ratio)
        })
}

/// Energy-novelty peak picker.
///
/// Builds an onset-strength envelope from the rise in frame energy, keeps
/// local maxima that clear the surrounding average by `delta`, and returns
/// the peak closest to `target_ratio` of the track.
#[derive(Debug, Clone)]
pub struct OnsetPeakDetector {
    pub frame_len: usize,
    pub hop: usize,
    /// Frames on each side a peak must dominate.
    pub window: usize,
    /// Minimum frames between two peaks.
    pub wait: usize,
    /// Margin above the local mean, on the normalized envelope.
    pub delta: f32,
    pub target_ratio: f64,
}

impl Default for OnsetPeakDetector {
    fn default() -> Self {
        Self {
            frame_len: 2048,
            hop: 512,
            window: 30,
            wait: 30,
            delta: 0.2,
            target_ratio: 0.3,
        }
    }
}

impl OnsetPeakDetector {
    /// Normalized onset-strength envelope, one value per hop.
    pub fn envelope(&self, mono: &[f32]) -> Vec<f32> {
        if mono.len() < self.frame_len || self.hop == 0 {
            return Vec::new();
        }

        let energies: Vec<f32> = (0..=(mono.len() - self.frame_len) / self.hop)
            .map(|i| {
                let frame = &mono[i * self.hop..i * self.hop + self.frame_len];
                (frame.iter().map(|s| s * s).sum::<f32>() / frame.len() as f32).sqrt()
            })
            .collect();

        let mut env: Vec<f32> = Vec::with_capacity(energies.len());
        env.push(0.0);
        for pair in energies.windows(2) {
            env.push((pair[1] - pair[0]).max(0.0));
        }

        let max = env.iter().cloned().fold(0.0f32, f32::max);
        if max > 0.0 {
            for v in &mut env {
                *v /= max;
            }
        }
        env
    }

    /// Indices of envelope peaks.
    pub fn peaks(&self, env: &[f32]) -> Vec<usize> {
        let mut peaks = Vec::new();
        let mut last: Option<usize> = None;
        for i in 0..env.len() {
            let lo = i.saturating_sub(self.window);
            let hi = (i + self.window + 1).min(env.len());
            let around = &env[lo..hi];

            let local_max = around.iter().cloned().fold(0.0f32, f32::max);
            let local_mean = around.iter().sum::<f32>() / around.len() as f32;
            let spaced = last.is_none_or(|l| i > l + self.wait);

            if env[i] > 0.0 && env[i] >= local_max && env[i] >= local_mean + self.delta && spaced {
                peaks.push(i);
                last = Some(i);
            }
        }
        peaks
    }
}

impl ChorusDetector for OnsetPeakDetector {
    fn detect(&self, mono: &[f32], sample_rate: u32) -> Option<u64> {
        if sample_rate == 0 {
            return None;
        }
        let env = self.envelope(mono);
        let peaks = self.peaks(&env);

        let duration_ms = mono.len() as f64 * 1000.0 / sample_rate as f64;
        let target = duration_ms * self.target_ratio;
        let to_ms = |frame: usize| (frame * self.hop) as f64 * 1000.0 / sample_rate as f64;

        peaks
            .into_iter()
            .map(to_ms)
            .min_by(|a, b| (a - target).abs().total_cmp(&(b - target).abs()))
            .map(|ms| ms as u64)
    }
}
