//! Audio feature extraction for beatscope
//! Band energies, smoothed volume and edge-triggered beat/guitar detection

use tracing::trace;

use crate::config::AnalysisConfig;

/// Receives trigger notifications from the [`FeatureExtractor`].
///
/// Called synchronously from inside [`FeatureExtractor::ingest`], at most once per kind per frame.
pub trait FeatureListener {
    /// A bass transient crossed the adaptive cutoff. `intensity` is in 0..1.
    fn on_beat(&mut self, intensity: f32);

    /// Mid-range energy jumped by `delta` since the previous frame, reaching `energy`.
    fn on_guitar(&mut self, energy: f32, delta: f32);
}

/// Listener that ignores everything
impl FeatureListener for () {
    fn on_beat(&mut self, _intensity: f32) {}
    fn on_guitar(&mut self, _energy: f32, _delta: f32) {}
}

/// What a single `ingest` call fired
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Triggers {
    /// Beat intensity if a beat fired this frame
    pub beat: Option<f32>,
    /// (energy, delta) if a guitar transient fired this frame
    pub guitar: Option<(f32, f32)>,
}

/// Smoothed per-frame audio features.
///
/// Only the extractor mutates this; everything else reads it.
#[derive(Clone, Debug, PartialEq)]
pub struct FeatureState {
    // Band energies of the latest frame (0.0-1.0)
    pub bass: f32,
    pub mid: f32,
    pub treble: f32,

    /// Exponentially smoothed overall level
    pub volume_level: f32,

    // Impacts: raised by triggers, decayed every frame
    pub beat_impact: f32,
    pub guitar_impact: f32,

    // Beat hysteresis
    pub bass_cutoff: f32,
    pub beat_hold: u32,
    pub beat_active: bool,

    pub last_mid_energy: f32,
}

impl FeatureState {
    fn new(config: &AnalysisConfig) -> Self {
        Self {
            bass: 0.0,
            mid: 0.0,
            treble: 0.0,
            volume_level: 0.0,
            beat_impact: 0.0,
            guitar_impact: 0.0,
            bass_cutoff: config.beat_threshold,
            beat_hold: 0,
            beat_active: false,
            last_mid_energy: 0.0,
        }
    }
}

/// Mean of `bins[start..end]` normalized to 0..1. Out-of-range or empty ranges read as silence.
pub fn band_energy(bins: &[u8], start: usize, end: usize) -> f32 {
    let end = end.min(bins.len());
    let start = start.min(end);
    let sum: u64 = bins[start..end].iter().map(|&b| b as u64).sum();
    let count = (end - start).max(1);
    (sum as f64 / (count as f64 * 255.0)) as f32
}

/// Mean of every `stride`-th bin, normalized to 0..1
pub fn sampled_level(bins: &[u8], stride: usize) -> f32 {
    let stride = stride.max(1);
    let (sum, count) = bins
        .iter()
        .step_by(stride)
        .fold((0u64, 0usize), |(s, c), &b| (s + b as u64, c + 1));
    (sum as f64 / (count.max(1) as f64 * 255.0)) as f32
}

/// Converts raw frequency frames into [`FeatureState`] and trigger notifications
pub struct FeatureExtractor {
    config: AnalysisConfig,
    state: FeatureState,
    /// Timestamp of the last beat trigger (ms)
    last_beat_ms: Option<f64>,
}

impl FeatureExtractor {
    pub fn new(config: AnalysisConfig) -> Self {
        let state = FeatureState::new(&config);
        Self {
            config,
            state,
            last_beat_ms: None,
        }
    }

    pub fn state(&self) -> &FeatureState {
        &self.state
    }

    /// Forget all history (e.g. when a new track starts)
    pub fn reset(&mut self) {
        self.state = FeatureState::new(&self.config);
        self.last_beat_ms = None;
    }

    /// Process one frame.
    ///
    /// `frequency` holds byte magnitudes per bin. The waveform is accepted to keep the frame
    /// contract in one place; none of the current features read it. `now_ms` must not go
    /// backwards.
    pub fn ingest<L>(
        &mut self,
        frequency: &[u8],
        _waveform: &[u8],
        now_ms: f64,
        listener: &mut L,
    ) -> Triggers
    where
        L: FeatureListener + ?Sized,
    {
        let n = frequency.len();
        let bass_end = (n as f32 * self.config.bass_band_end) as usize;
        let mid_end = (n as f32 * self.config.mid_band_end) as usize;

        let bass = band_energy(frequency, 0, bass_end);
        let mid = band_energy(frequency, bass_end, mid_end);
        let treble = band_energy(frequency, mid_end, n);

        let instant = sampled_level(frequency, self.config.volume_stride);
        let s = self.config.volume_smoothing;
        self.state.volume_level = self.state.volume_level * s + instant * (1.0 - s);

        self.state.bass = bass;
        self.state.mid = mid;
        self.state.treble = treble;

        // Impacts only fall between triggers
        self.state.beat_impact *= self.config.impact_decay;
        self.state.guitar_impact *= self.config.impact_decay;

        let beat = self.detect_beat(bass, now_ms);
        if let Some(intensity) = beat {
            trace!(bass, intensity, cutoff = self.state.bass_cutoff, "beat");
            listener.on_beat(intensity);
        }

        let guitar = self.detect_guitar(mid);
        if let Some((energy, delta)) = guitar {
            trace!(energy, delta, "guitar");
            listener.on_guitar(energy, delta);
        }

        Triggers { beat, guitar }
    }

    /// Adaptive-cutoff beat detector with hold frames
    fn detect_beat(&mut self, bass: f32, now_ms: f64) -> Option<f32> {
        let threshold = self.config.beat_threshold;
        let gap_open = self
            .last_beat_ms
            .map_or(true, |last| now_ms - last >= self.config.min_beat_gap_ms);

        if bass > self.state.bass_cutoff && bass > threshold && gap_open {
            let intensity = (bass * self.config.beat_gain).min(1.0);
            self.state.beat_impact = intensity;
            self.state.bass_cutoff = bass * self.config.cutoff_boost;
            self.state.beat_hold = self.config.beat_hold_frames;
            self.state.beat_active = true;
            self.last_beat_ms = Some(now_ms);
            return Some(intensity);
        }

        if self.state.beat_hold > 0 {
            self.state.beat_hold -= 1;
        } else {
            self.state.beat_active = false;
            self.state.bass_cutoff = (self.state.bass_cutoff * self.config.beat_peak_decay).max(threshold);
        }
        None
    }

    /// Rising-edge detector on mid-band energy
    fn detect_guitar(&mut self, mid: f32) -> Option<(f32, f32)> {
        let delta = mid - self.state.last_mid_energy;
        self.state.last_mid_energy = mid;

        if delta > self.config.guitar_delta_threshold && mid > self.config.guitar_floor {
            self.state.guitar_impact = (mid * self.config.guitar_gain).min(1.0);
            Some((mid, delta))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[derive(Default)]
    struct Recorder {
        beats: Vec<f32>,
        guitars: Vec<(f32, f32)>,
    }

    impl FeatureListener for Recorder {
        fn on_beat(&mut self, intensity: f32) {
            self.beats.push(intensity);
        }
        fn on_guitar(&mut self, energy: f32, delta: f32) {
            self.guitars.push((energy, delta));
        }
    }

    fn frame_with_bass(level: u8, len: usize) -> Vec<u8> {
        let mut bins = vec![0u8; len];
        for b in bins.iter_mut().take(len / 10) {
            *b = level;
        }
        bins
    }

    #[test]
    fn band_energy_guards_empty_ranges() {
        assert_eq!(band_energy(&[], 0, 10), 0.0);
        assert_eq!(band_energy(&[255, 255], 1, 1), 0.0);
        assert_eq!(band_energy(&[255, 255], 0, 2), 1.0);
        assert_eq!(sampled_level(&[], 4), 0.0);
    }

    #[test]
    fn sampled_level_uses_stride() {
        let bins = [255, 0, 255, 0];
        assert_eq!(sampled_level(&bins, 2), 1.0);
        assert_eq!(sampled_level(&bins, 1), 0.5);
        assert_eq!(sampled_level(&bins, 0), 0.5);
    }

    #[test]
    fn levels_hold_for_very_long_spectra() {
        // 255 * 17M overflows a u32 sum
        let bins = vec![255u8; 17_000_000];
        assert_abs_diff_eq!(band_energy(&bins, 0, bins.len()), 1.0, epsilon = 1e-4);
        assert_abs_diff_eq!(sampled_level(&bins, 1), 1.0, epsilon = 1e-4);
    }

    #[test]
    fn full_bass_fires_on_first_frame() {
        let mut fx = FeatureExtractor::new(AnalysisConfig::default());
        let mut rec = Recorder::default();
        let bins = frame_with_bass(255, 1024);

        let t = fx.ingest(&bins, &[], 0.0, &mut rec);

        assert_abs_diff_eq!(fx.state().bass, 1.0);
        assert_eq!(t.beat, Some(1.0));
        assert_eq!(rec.beats, vec![1.0]);
        assert!(fx.state().beat_active);
        assert_eq!(fx.state().beat_hold, AnalysisConfig::default().beat_hold_frames);
        assert_abs_diff_eq!(fx.state().bass_cutoff, 1.1, epsilon = 1e-6);
    }

    #[test]
    fn min_gap_suppresses_fast_retrigger() {
        let config = AnalysisConfig {
            beat_hold_frames: 0,
            beat_peak_decay: 0.5,
            ..AnalysisConfig::default()
        };
        let mut fx = FeatureExtractor::new(config);
        let mut rec = Recorder::default();

        fx.ingest(&frame_with_bass(160, 100), &[], 0.0, &mut rec);
        // Cutoff collapses immediately, only the gap stands in the way
        fx.ingest(&frame_with_bass(0, 100), &[], 16.0, &mut rec);
        fx.ingest(&frame_with_bass(160, 100), &[], 50.0, &mut rec);
        assert_eq!(rec.beats.len(), 1);

        fx.ingest(&frame_with_bass(160, 100), &[], 150.0, &mut rec);
        assert_eq!(rec.beats.len(), 2);
    }

    #[test]
    fn guitar_fires_on_rising_mid_edge_only() {
        let mut fx = FeatureExtractor::new(AnalysisConfig::default());
        let mut rec = Recorder::default();

        let mut bins = vec![0u8; 100];
        for b in &mut bins[10..50] {
            *b = 200;
        }

        fx.ingest(&bins, &[], 0.0, &mut rec);
        fx.ingest(&bins, &[], 33.0, &mut rec);

        assert_eq!(rec.guitars.len(), 1);
        let (energy, delta) = rec.guitars[0];
        assert_abs_diff_eq!(energy, 200.0 / 255.0, epsilon = 1e-6);
        assert_abs_diff_eq!(delta, energy, epsilon = 1e-6);
        assert_abs_diff_eq!(fx.state().last_mid_energy, energy, epsilon = 1e-6);
    }

    #[test]
    fn quiet_mid_jump_below_floor_is_ignored() {
        let mut fx = FeatureExtractor::new(AnalysisConfig::default());
        let mut rec = Recorder::default();
        let mut bins = vec![0u8; 100];
        for b in &mut bins[10..50] {
            *b = 70; // ~0.27, above the delta threshold but under the floor
        }
        fx.ingest(&bins, &[], 0.0, &mut rec);
        assert!(rec.guitars.is_empty());
    }

    #[test]
    fn impacts_decay_between_triggers() {
        let mut fx = FeatureExtractor::new(AnalysisConfig::default());
        fx.ingest(&frame_with_bass(255, 200), &[], 0.0, &mut ());
        let mut last = fx.state().beat_impact;
        for i in 1..20 {
            fx.ingest(&frame_with_bass(0, 200), &[], i as f64 * 33.0, &mut ());
            let now = fx.state().beat_impact;
            assert!(now < last);
            last = now;
        }
    }

    #[test]
    fn empty_frames_are_silence() {
        let mut fx = FeatureExtractor::new(AnalysisConfig::default());
        let t = fx.ingest(&[], &[], 0.0, &mut ());
        assert_eq!(t, Triggers::default());
        assert_eq!(fx.state().volume_level, 0.0);
    }

    #[test]
    fn reset_restores_initial_cutoff() {
        let mut fx = FeatureExtractor::new(AnalysisConfig::default());
        fx.ingest(&frame_with_bass(255, 100), &[], 0.0, &mut ());
        fx.reset();
        assert_eq!(fx.state().bass_cutoff, AnalysisConfig::default().beat_threshold);
        assert_eq!(fx.state().beat_hold, 0);
    }
}
