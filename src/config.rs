//! Configuration System for beatscope
//! Every tunable constant of the analysis, simulation and rendering pipeline

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use tracing::warn;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to access config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

// ============================================================================
// Effect mode
// ============================================================================

/// Visualization variant. Exactly one renders per frame.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub enum EffectMode {
    #[default]
    ParticleBurst,
    ConcentricRings,
    Kaleidoscope,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown effect mode `{0}`")]
pub struct UnknownMode(pub String);

impl EffectMode {
    pub const ALL: [EffectMode; 3] = [
        EffectMode::ParticleBurst,
        EffectMode::ConcentricRings,
        EffectMode::Kaleidoscope,
    ];

    /// Stable identifier used by the CLI, config files and UI
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ParticleBurst => "particle-burst",
            Self::ConcentricRings => "concentric-rings",
            Self::Kaleidoscope => "kaleidoscope",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::ParticleBurst => "Particle Burst",
            Self::ConcentricRings => "Concentric Rings",
            Self::Kaleidoscope => "Kaleidoscope",
        }
    }

    /// Parse a mode name; anything unrecognized becomes the default mode
    pub fn parse_or_default(name: &str) -> Self {
        name.parse().unwrap_or_else(|err: UnknownMode| {
            let fallback = Self::default();
            warn!("{}, falling back to {}", err, fallback);
            fallback
        })
    }
}

impl FromStr for EffectMode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "particle-burst" | "particle_burst" | "starburst" => Ok(Self::ParticleBurst),
            "concentric-rings" | "concentric_rings" | "circular" => Ok(Self::ConcentricRings),
            "kaleidoscope" => Ok(Self::Kaleidoscope),
            _ => Err(UnknownMode(s.to_string())),
        }
    }
}

impl fmt::Display for EffectMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for EffectMode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EffectMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(Self::parse_or_default(&name))
    }
}

// ============================================================================
// Analysis
// ============================================================================

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Fraction of bins counted as bass
    pub bass_band_end: f32,
    /// Upper edge of the mid ("guitar") band as a fraction of bins
    pub mid_band_end: f32,
    /// Sample every n-th bin for the volume estimate (1 = all bins)
    pub volume_stride: usize,
    /// volume = volume * s + instant * (1 - s)
    pub volume_smoothing: f32,
    /// Per-frame multiplier on beat/guitar impact
    pub impact_decay: f32,

    // Beat detection
    pub beat_threshold: f32,
    pub beat_peak_decay: f32,
    pub beat_hold_frames: u32,
    pub cutoff_boost: f32,
    pub beat_gain: f32,
    pub min_beat_gap_ms: f64,

    // Guitar detection
    pub guitar_delta_threshold: f32,
    pub guitar_floor: f32,
    pub guitar_gain: f32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            bass_band_end: 0.1,
            mid_band_end: 0.5,
            volume_stride: 1,
            volume_smoothing: 0.95,
            impact_decay: 0.95,
            beat_threshold: 0.45,
            beat_peak_decay: 0.98,
            beat_hold_frames: 30,
            cutoff_boost: 1.1,
            beat_gain: 1.5,
            min_beat_gap_ms: 100.0,
            guitar_delta_threshold: 0.2,
            guitar_floor: 0.3,
            guitar_gain: 1.2,
        }
    }
}

// ============================================================================
// Particles
// ============================================================================

/// Shape of one particle batch (beat or guitar)
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(default)]
pub struct BurstConfig {
    /// count = base_count + intensity * count_scale
    pub base_count: f32,
    pub count_scale: f32,
    pub min_speed: f32,
    pub max_speed: f32,
    pub speed_multiplier: f32,
    pub min_size: f32,
    pub max_size: f32,
    pub size_multiplier: f32,
    /// Hue band in degrees
    pub hue_min: f32,
    pub hue_max: f32,
    pub saturation_min: f32,
    pub saturation_max: f32,
    pub lightness_min: f32,
    pub lightness_max: f32,
}

impl BurstConfig {
    pub fn beat() -> Self {
        Self {
            base_count: 15.0,
            count_scale: 60.0,
            min_speed: 2.0,
            max_speed: 8.0,
            speed_multiplier: 1.2,
            min_size: 2.0,
            max_size: 6.0,
            size_multiplier: 1.5,
            hue_min: 180.0,
            hue_max: 240.0,
            saturation_min: 90.0,
            saturation_max: 100.0,
            lightness_min: 65.0,
            lightness_max: 85.0,
        }
    }

    pub fn guitar() -> Self {
        Self {
            base_count: 5.0,
            count_scale: 20.0,
            speed_multiplier: 1.8,
            size_multiplier: 0.9,
            hue_min: 280.0,
            hue_max: 340.0,
            saturation_min: 95.0,
            saturation_max: 95.0,
            lightness_min: 75.0,
            lightness_max: 75.0,
            ..Self::beat()
        }
    }
}

impl Default for BurstConfig {
    fn default() -> Self {
        Self::beat()
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(default)]
pub struct ParticleConfig {
    pub beat: BurstConfig,
    pub guitar: BurstConfig,
    /// Guitar batches only spawn above this impact
    pub guitar_spawn_threshold: f32,
    /// Guitar batch intensity = impact * this
    pub guitar_intensity_scale: f32,

    // Line (ray) particles on strong beats
    pub line_threshold: f32,
    pub line_base_count: f32,
    pub line_count_scale: f32,
    pub line_min_length: f32,
    pub line_max_length: f32,

    // Physics
    pub friction: f32,
    pub gravity: f32,
    pub min_decay: f32,
    pub max_decay: f32,
    pub max_life: f32,

    /// Hard cap on pool size
    pub max_particles: usize,
    /// Pool is pruned down to this many newest particles when the cap is exceeded
    pub prune_to: usize,
}

impl Default for ParticleConfig {
    fn default() -> Self {
        Self {
            beat: BurstConfig::beat(),
            guitar: BurstConfig::guitar(),
            guitar_spawn_threshold: 0.6,
            guitar_intensity_scale: 0.5,
            line_threshold: 0.7,
            line_base_count: 3.0,
            line_count_scale: 6.0,
            line_min_length: 40.0,
            line_max_length: 120.0,
            friction: 0.99,
            gravity: 0.05,
            min_decay: 0.01,
            max_decay: 0.03,
            max_life: 1.0,
            max_particles: 300,
            prune_to: 200,
        }
    }
}

// ============================================================================
// Effects
// ============================================================================

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(default)]
pub struct BurstSceneConfig {
    /// Background hue advances by timestamp / hue_period_ms degrees
    pub hue_period_ms: f32,
    pub pulse_threshold: f32,
    pub streak_threshold: f32,
    /// Particles drawn per frame (newest first win)
    pub max_rendered: usize,
}

impl Default for BurstSceneConfig {
    fn default() -> Self {
        Self {
            hue_period_ms: 50.0,
            pulse_threshold: 0.1,
            streak_threshold: 0.4,
            max_rendered: 200,
        }
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(default)]
pub struct RingsConfig {
    pub base_rings: usize,
    /// Extra rings at full volume
    pub volume_rings: f32,
    /// Ring-width offset per unit of beat intensity
    pub beat_width: f32,
    pub width_decay: f32,
    pub mirror_threshold: f32,
}

impl Default for RingsConfig {
    fn default() -> Self {
        Self {
            base_rings: 5,
            volume_rings: 10.0,
            beat_width: 30.0,
            width_decay: 0.9,
            mirror_threshold: 0.6,
        }
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(default)]
pub struct KaleidoscopeConfig {
    pub base_segments: usize,
    /// Extra segments at full volume
    pub volume_segments: f32,
    /// Rotation added every frame
    pub base_spin: f32,
    /// Rotation added every frame per unit of guitar impact
    pub guitar_spin: f32,
    /// Rotation kick on a guitar trigger, per unit of impact
    pub guitar_kick: f32,
    /// Rotation kick on a beat trigger, per unit of intensity
    pub beat_kick: f32,
    pub edge_threshold: f32,
    /// Segment hue advances by timestamp / hue_period_ms degrees
    pub hue_period_ms: f32,
}

impl Default for KaleidoscopeConfig {
    fn default() -> Self {
        Self {
            base_segments: 8,
            volume_segments: 8.0,
            base_spin: 0.002,
            guitar_spin: 0.01,
            guitar_kick: 0.05,
            beat_kick: 0.02,
            edge_threshold: 0.2,
            hue_period_ms: 50.0,
        }
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(default)]
pub struct IntroConfig {
    pub duration_ms: f64,
    pub shockwaves: usize,
    /// Phase delay between shockwaves
    pub stagger: f32,
    /// Intensity of the burst seeded when the intro starts in particle mode
    pub seed_intensity: f32,
}

impl Default for IntroConfig {
    fn default() -> Self {
        Self {
            duration_ms: 3000.0,
            shockwaves: 3,
            stagger: 0.2,
            seed_intensity: 0.8,
        }
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(default)]
pub struct EffectsConfig {
    /// Render-level multiplier on beat/guitar impact
    pub impact_decay: f32,
    /// Guitar impact = min(1, energy * guitar_gain)
    pub guitar_gain: f32,
    pub background: [u8; 3],
    pub burst: BurstSceneConfig,
    pub rings: RingsConfig,
    pub kaleidoscope: KaleidoscopeConfig,
    pub intro: IntroConfig,
}

impl Default for EffectsConfig {
    fn default() -> Self {
        Self {
            impact_decay: 0.95,
            guitar_gain: 1.2,
            background: [0, 0, 0],
            burst: BurstSceneConfig::default(),
            rings: RingsConfig::default(),
            kaleidoscope: KaleidoscopeConfig::default(),
            intro: IntroConfig::default(),
        }
    }
}

// ============================================================================
// Acquisition / frame loop
// ============================================================================

/// Spectrum analyser behind the simulated source
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(default)]
pub struct AnalyserConfig {
    pub fft_size: usize,
    pub sample_rate: u32,
    pub smoothing: f32,
    pub min_db: f32,
    pub max_db: f32,
}

impl AnalyserConfig {
    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }
}

impl Default for AnalyserConfig {
    fn default() -> Self {
        Self {
            fft_size: 2048,
            sample_rate: 44_100,
            smoothing: 0.8,
            min_db: -100.0,
            max_db: -30.0,
        }
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(default)]
pub struct FrameConfig {
    pub target_fps: f32,
    pub width: u32,
    pub height: u32,
}

impl FrameConfig {
    pub fn frame_interval_ms(&self) -> f64 {
        1000.0 / self.target_fps.max(1.0) as f64
    }
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            target_fps: 30.0,
            width: 1280,
            height: 720,
        }
    }
}

// ============================================================================
// Main App Configuration
// ============================================================================

#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub default_mode: EffectMode,
    pub analysis: AnalysisConfig,
    pub particles: ParticleConfig,
    pub effects: EffectsConfig,
    pub analyser: AnalyserConfig,
    pub frame: FrameConfig,
}

impl AppConfig {
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let a = &self.analysis;
        if !(a.bass_band_end > 0.0 && a.bass_band_end < a.mid_band_end && a.mid_band_end <= 1.0) {
            return Err(invalid(
                "analysis.bass_band_end",
                "band edges must satisfy 0 < bass_band_end < mid_band_end <= 1",
            ));
        }
        for (field, value) in [
            ("analysis.volume_smoothing", a.volume_smoothing),
            ("analysis.impact_decay", a.impact_decay),
            ("analysis.beat_peak_decay", a.beat_peak_decay),
            ("effects.impact_decay", self.effects.impact_decay),
            ("effects.rings.width_decay", self.effects.rings.width_decay),
            ("particles.friction", self.particles.friction),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(invalid(field, format!("{value} is outside (0, 1]")));
            }
        }

        let p = &self.particles;
        if p.max_particles == 0 {
            return Err(invalid("particles.max_particles", "must be at least 1"));
        }
        if p.prune_to > p.max_particles {
            return Err(invalid(
                "particles.prune_to",
                format!("{} exceeds max_particles {}", p.prune_to, p.max_particles),
            ));
        }
        if !(p.min_decay > 0.0 && p.min_decay <= p.max_decay) {
            return Err(invalid(
                "particles.min_decay",
                "decay range must satisfy 0 < min_decay <= max_decay",
            ));
        }
        if p.max_life <= 0.0 {
            return Err(invalid("particles.max_life", "must be positive"));
        }

        let fft = self.analyser.fft_size;
        if fft < 32 || !fft.is_power_of_two() {
            return Err(invalid(
                "analyser.fft_size",
                format!("{fft} is not a power of two >= 32"),
            ));
        }
        if self.analyser.min_db >= self.analyser.max_db {
            return Err(invalid("analyser.min_db", "must be below max_db"));
        }

        if !(self.frame.target_fps > 0.0) {
            return Err(invalid("frame.target_fps", "must be positive"));
        }
        if self.effects.intro.duration_ms <= 0.0 {
            return Err(invalid("effects.intro.duration_ms", "must be positive"));
        }
        Ok(())
    }
}
