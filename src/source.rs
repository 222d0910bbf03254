//! Signal sources for beatscope
//! Anything that can hand the pipeline a frequency frame and a waveform frame

use std::collections::VecDeque;
use std::f32::consts::PI;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rustfft::{num_complex::Complex, Fft, FftPlanner};

use crate::config::AnalyserConfig;

/// Provider of per-frame analysis arrays.
///
/// `frequency` and `waveform` have the same length, at most [`SignalSource::bin_count`].
/// `now_ms` never decreases between calls.
pub trait SignalSource {
    fn bin_count(&self) -> usize;

    fn fill(&mut self, now_ms: f64, frequency: &mut [u8], waveform: &mut [u8]);
}

// ============================================================================
// Silence
// ============================================================================

/// Zero spectrum and a flat waveform
#[derive(Clone, Debug)]
pub struct SilentSource {
    bins: usize,
}

impl SilentSource {
    pub fn new(bins: usize) -> Self {
        Self { bins }
    }
}

impl SignalSource for SilentSource {
    fn bin_count(&self) -> usize {
        self.bins
    }

    fn fill(&mut self, _now_ms: f64, frequency: &mut [u8], waveform: &mut [u8]) {
        frequency.fill(0);
        waveform.fill(128);
    }
}

// ============================================================================
// Spectrum analyser
// ============================================================================

/// Windowed FFT with temporal smoothing and decibel-to-byte mapping
pub struct SpectrumAnalyser {
    config: AnalyserConfig,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    buffer: Vec<Complex<f32>>,
    smoothed: Vec<f32>,
}

impl SpectrumAnalyser {
    pub fn new(config: AnalyserConfig) -> Self {
        let size = config.fft_size.max(2);
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(size);

        // Blackman window
        let window = (0..size)
            .map(|i| {
                let x = 2.0 * PI * i as f32 / size as f32;
                0.42 - 0.5 * x.cos() + 0.08 * (2.0 * x).cos()
            })
            .collect();

        Self {
            fft,
            window,
            buffer: vec![Complex::new(0.0, 0.0); size],
            smoothed: vec![0.0; size / 2],
            config: AnalyserConfig {
                fft_size: size,
                ..config
            },
        }
    }

    pub fn fft_size(&self) -> usize {
        self.config.fft_size
    }

    pub fn bin_count(&self) -> usize {
        self.config.bin_count()
    }

    /// Analyse the most recent samples (mono, -1..1).
    ///
    /// Fewer than `fft_size` samples are zero padded at the front; extra samples at the front
    /// are ignored.
    pub fn analyse(&mut self, samples: &[f32], frequency: &mut [u8], waveform: &mut [u8]) {
        let size = self.config.fft_size;
        let recent = &samples[samples.len().saturating_sub(size)..];
        let pad = size - recent.len();

        for (i, slot) in self.buffer.iter_mut().enumerate() {
            let sample = if i < pad { 0.0 } else { recent[i - pad] };
            *slot = Complex::new(sample * self.window[i], 0.0);
        }
        self.fft.process(&mut self.buffer);

        let tau = self.config.smoothing.clamp(0.0, 1.0);
        let range = (self.config.max_db - self.config.min_db).max(f32::EPSILON);
        let scale = 1.0 / size as f32;

        for (k, smoothed) in self.smoothed.iter_mut().enumerate() {
            let magnitude = self.buffer[k].norm() * scale;
            *smoothed = tau * *smoothed + (1.0 - tau) * magnitude;
        }

        for (k, out) in frequency.iter_mut().enumerate() {
            *out = match self.smoothed.get(k) {
                Some(&m) if m > 0.0 => {
                    let db = 20.0 * m.log10();
                    (255.0 * (db - self.config.min_db) / range).clamp(0.0, 255.0) as u8
                }
                _ => 0,
            };
        }

        // Time domain: the newest samples, centered at 128
        let start = size.saturating_sub(waveform.len());
        for (i, out) in waveform.iter_mut().enumerate() {
            let idx = start + i;
            let sample = if idx < pad || idx >= size {
                0.0
            } else {
                recent[idx - pad]
            };
            *out = (128.0 + sample * 128.0).clamp(0.0, 255.0) as u8;
        }
    }
}

// ============================================================================
// Simulated groove
// ============================================================================

/// Deterministic drum-and-strum pattern rendered to PCM and run through a [`SpectrumAnalyser`].
///
/// Kick on every beat, a mid-range strum every other beat (off the beat), hats on eighths.
pub struct SimulatedSource {
    analyser: SpectrumAnalyser,
    sample_rate: f64,
    beat_period: f64,
    samples: VecDeque<f32>,
    next_index: u64,
    rng: StdRng,
    // Filter state
    kick_lp: f32,
    strum_lp_wide: f32,
    strum_lp_narrow: f32,
    hat_prev: f32,
}

impl SimulatedSource {
    pub fn new(config: AnalyserConfig, bpm: f32, seed: u64) -> Self {
        let sample_rate = config.sample_rate.max(1) as f64;
        let analyser = SpectrumAnalyser::new(config);
        let size = analyser.fft_size();
        Self {
            analyser,
            sample_rate,
            beat_period: 60.0 / bpm.max(1.0) as f64,
            samples: VecDeque::from(vec![0.0; size]),
            next_index: 0,
            rng: StdRng::seed_from_u64(seed),
            kick_lp: 0.0,
            strum_lp_wide: 0.0,
            strum_lp_narrow: 0.0,
            hat_prev: 0.0,
        }
    }

    /// Synthesize everything up to `now_ms`
    fn advance(&mut self, now_ms: f64) {
        let size = self.analyser.fft_size() as u64;
        let target = (now_ms.max(0.0) / 1000.0 * self.sample_rate) as u64;
        if target <= self.next_index {
            return;
        }
        // Only the last window matters after a long stall
        if target - self.next_index > size {
            self.next_index = target - size;
        }

        while self.next_index < target {
            let sample = self.synth(self.next_index);
            self.samples.pop_front();
            self.samples.push_back(sample);
            self.next_index += 1;
        }
    }

    fn synth(&mut self, index: u64) -> f32 {
        let t = index as f64 / self.sample_rate;
        let period = self.beat_period;

        // Kick: low-passed noise thump plus a falling sine body
        let tk = (t % period) as f32;
        let kick_env = (-8.0 * tk).exp();
        let noise: f32 = self.rng.gen_range(-1.0..1.0);
        self.kick_lp += 0.3 * (noise - self.kick_lp);
        let body = (2.0 * PI * (50.0 * tk + 100.0 * (1.0 - (-30.0 * tk).exp()) / 30.0)).sin();
        let kick = kick_env * (self.kick_lp * 1.6 + body * 0.5);

        // Strum: band-passed noise and a tone, half a beat after every other beat
        let ts = ((t - period * 0.5).rem_euclid(period * 2.0)) as f32;
        let strum_env = (-10.0 * ts).exp();
        let noise: f32 = self.rng.gen_range(-1.0..1.0);
        self.strum_lp_wide += 0.75 * (noise - self.strum_lp_wide);
        self.strum_lp_narrow += 0.25 * (noise - self.strum_lp_narrow);
        let band = self.strum_lp_wide - self.strum_lp_narrow;
        let tone = (2.0 * PI * 330.0 * t as f32).sin();
        let strum = strum_env * (band * 1.2 + tone * 0.2);

        // Hats: differentiated noise on eighths
        let th = (t % (period * 0.5)) as f32;
        let noise: f32 = self.rng.gen_range(-1.0..1.0);
        let hat = (-60.0 * th).exp() * (noise - self.hat_prev) * 0.05;
        self.hat_prev = noise;

        (kick + strum + hat).clamp(-1.0, 1.0)
    }
}

impl SignalSource for SimulatedSource {
    fn bin_count(&self) -> usize {
        self.analyser.bin_count()
    }

    fn fill(&mut self, now_ms: f64, frequency: &mut [u8], waveform: &mut [u8]) {
        self.advance(now_ms);
        let samples = self.samples.make_contiguous();
        self.analyser.analyse(samples, frequency, waveform);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> AnalyserConfig {
        AnalyserConfig {
            fft_size: 256,
            smoothing: 0.0,
            ..AnalyserConfig::default()
        }
    }

    #[test]
    fn silent_source_is_flat() {
        let mut src = SilentSource::new(8);
        let mut f = [9u8; 8];
        let mut w = [9u8; 8];
        src.fill(0.0, &mut f, &mut w);
        assert_eq!(f, [0; 8]);
        assert_eq!(w, [128; 8]);
    }

    #[test]
    fn analyser_finds_a_pure_tone() {
        let config = small();
        let mut analyser = SpectrumAnalyser::new(config.clone());
        let bin = 20;
        let samples: Vec<f32> = (0..256)
            .map(|i| (2.0 * PI * bin as f32 * i as f32 / 256.0).sin() * 0.01)
            .collect();

        let mut f = vec![0u8; 128];
        let mut w = vec![0u8; 128];
        analyser.analyse(&samples, &mut f, &mut w);

        let peak = f
            .iter()
            .enumerate()
            .max_by_key(|&(_, &v)| v)
            .map(|(i, _)| i);
        assert_eq!(peak, Some(bin));
        assert!(f[bin] > 150);
        assert!(f[bin + 10] < 50);
    }

    #[test]
    fn silence_maps_to_zero_bytes() {
        let mut analyser = SpectrumAnalyser::new(small());
        let mut f = vec![7u8; 128];
        let mut w = vec![7u8; 128];
        analyser.analyse(&[], &mut f, &mut w);
        assert!(f.iter().all(|&b| b == 0));
        assert!(w.iter().all(|&b| b == 128));
    }

    #[test]
    fn waveform_holds_newest_samples() {
        let mut analyser = SpectrumAnalyser::new(small());
        let mut samples = vec![0.0f32; 256];
        samples[255] = 0.5;
        let mut f = vec![0u8; 4];
        let mut w = vec![0u8; 4];
        analyser.analyse(&samples, &mut f, &mut w);
        assert_eq!(w, [128, 128, 128, 192]);
    }

    #[test]
    fn smoothing_carries_energy_forward() {
        let config = AnalyserConfig {
            smoothing: 0.8,
            ..small()
        };
        let mut analyser = SpectrumAnalyser::new(config);
        let tone: Vec<f32> = (0..256)
            .map(|i| (2.0 * PI * 10.0 * i as f32 / 256.0).sin() * 0.01)
            .collect();
        let mut f = vec![0u8; 128];
        let mut w = vec![0u8; 128];
        analyser.analyse(&tone, &mut f, &mut w);
        let loud = f[10];
        analyser.analyse(&[], &mut f, &mut w);
        assert!(f[10] > 0 && f[10] < loud);
    }

    #[test]
    fn simulated_source_is_deterministic() {
        let mut a = SimulatedSource::new(AnalyserConfig::default(), 120.0, 3);
        let mut b = SimulatedSource::new(AnalyserConfig::default(), 120.0, 3);
        let n = a.bin_count();
        let (mut fa, mut wa) = (vec![0u8; n], vec![0u8; n]);
        let (mut fb, mut wb) = (vec![0u8; n], vec![0u8; n]);
        for frame in 0..10 {
            let now = frame as f64 * 33.0;
            a.fill(now, &mut fa, &mut wa);
            b.fill(now, &mut fb, &mut wb);
        }
        assert_eq!(fa, fb);
        assert_eq!(wa, wb);
        assert!(fa.iter().any(|&v| v > 0));
    }
}
