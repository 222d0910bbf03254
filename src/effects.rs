//! Effect Engine for beatscope
//! Mode state machine, trigger reactions, per-frame simulation and the intro override

use egui::Pos2;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info};

use crate::audio::{FeatureListener, FeatureState};
use crate::config::{EffectMode, EffectsConfig, IntroConfig, ParticleConfig};
use crate::particles::{BurstKind, ParticlePool};
use crate::render::{self, Scene};
use crate::surface::Surface;

// ============================================================================
// State
// ============================================================================

/// Impact scalars the renderer reads. Raised by triggers, decayed once per rendered frame.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct VisualImpacts {
    pub beat: f32,
    pub guitar: f32,
}

/// Per-mode persistent fields
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ModeState {
    /// Concentric rings: transient width offset set by beats
    pub ring_width: f32,
    /// Kaleidoscope: accumulated rotation in radians
    pub rotation: f32,
}

/// Derived from the surface size
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Geometry {
    pub width: u32,
    pub height: u32,
    pub center: Pos2,
    /// Distance from the center to a corner
    pub max_radius: f32,
}

impl Geometry {
    pub fn new(width: u32, height: u32) -> Self {
        let cx = width as f32 / 2.0;
        let cy = height as f32 / 2.0;
        Self {
            width,
            height,
            center: Pos2::new(cx, cy),
            max_radius: (cx * cx + cy * cy).sqrt(),
        }
    }
}

// ============================================================================
// Intro
// ============================================================================

/// One expanding ring of the intro
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Shockwave {
    pub radius: f32,
    pub alpha: f32,
}

/// Everything needed to draw one intro frame
#[derive(Clone, Debug, PartialEq)]
pub struct IntroFrame {
    /// 0 at start, 1 when finished
    pub phase: f32,
    pub flash_radius: f32,
    pub flash_alpha: f32,
    pub shockwaves: Vec<Shockwave>,
}

impl IntroFrame {
    pub fn is_finished(&self) -> bool {
        self.phase >= 1.0
    }
}

/// Time-bounded override that replaces the selected mode while it runs
#[derive(Clone, Debug, PartialEq)]
pub struct IntroSequence {
    start_ms: f64,
    config: IntroConfig,
}

impl IntroSequence {
    pub fn new(start_ms: f64, config: IntroConfig) -> Self {
        Self { start_ms, config }
    }

    /// Progress in 0..=1, purely from the timestamp
    pub fn phase(&self, now_ms: f64) -> f32 {
        let elapsed = (now_ms - self.start_ms).max(0.0);
        (elapsed / self.config.duration_ms.max(f64::EPSILON)).min(1.0) as f32
    }

    pub fn frame(&self, now_ms: f64, max_radius: f32) -> IntroFrame {
        let phase = self.phase(now_ms);
        let eased = ease_out(phase);

        let stagger = self.config.stagger.max(0.0);
        let shockwaves = (0..self.config.shockwaves)
            .filter_map(|k| {
                let delay = k as f32 * stagger;
                if phase < delay || delay >= 1.0 {
                    return None;
                }
                let local = ((phase - delay) / (1.0 - delay)).min(1.0);
                Some(Shockwave {
                    radius: max_radius * 1.2 * ease_out(local),
                    alpha: (1.0 - local) * 0.8,
                })
            })
            .collect();

        IntroFrame {
            phase,
            flash_radius: max_radius * eased,
            flash_alpha: 1.0 - phase,
            shockwaves,
        }
    }
}

fn ease_out(t: f32) -> f32 {
    let inv = 1.0 - t.clamp(0.0, 1.0);
    1.0 - inv * inv
}

// ============================================================================
// Engine
// ============================================================================

/// Owns the active mode, its state and the particle pool
pub struct EffectEngine {
    config: EffectsConfig,
    mode: EffectMode,
    state: ModeState,
    impacts: VisualImpacts,
    pool: ParticlePool,
    volume_level: f32,
    frequency: Vec<u8>,
    geometry: Geometry,
    intro: Option<IntroSequence>,
    rng: StdRng,
}

impl EffectEngine {
    pub fn new(config: EffectsConfig, particles: ParticleConfig, mode: EffectMode) -> Self {
        Self::with_rng(config, particles, mode, StdRng::from_entropy())
    }

    /// Deterministic engine for tests and reproducible renders
    pub fn with_seed(
        config: EffectsConfig,
        particles: ParticleConfig,
        mode: EffectMode,
        seed: u64,
    ) -> Self {
        Self::with_rng(config, particles, mode, StdRng::seed_from_u64(seed))
    }

    fn with_rng(
        config: EffectsConfig,
        particles: ParticleConfig,
        mode: EffectMode,
        rng: StdRng,
    ) -> Self {
        Self {
            config,
            mode,
            state: ModeState::default(),
            impacts: VisualImpacts::default(),
            pool: ParticlePool::new(particles),
            volume_level: 0.0,
            frequency: Vec::new(),
            geometry: Geometry::new(0, 0),
            intro: None,
            rng,
        }
    }

    pub fn mode(&self) -> EffectMode {
        self.mode
    }

    pub fn mode_state(&self) -> &ModeState {
        &self.state
    }

    pub fn impacts(&self) -> VisualImpacts {
        self.impacts
    }

    pub fn pool(&self) -> &ParticlePool {
        &self.pool
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn intro_active(&self) -> bool {
        self.intro.is_some()
    }

    /// Switch modes. Entering a mode runs its reset; re-selecting the active mode does nothing.
    pub fn set_mode(&mut self, mode: EffectMode) {
        if mode == self.mode {
            return;
        }
        debug!(from = %self.mode, to = %mode, "effect mode switch");
        self.mode = mode;

        match mode {
            EffectMode::ParticleBurst => self.pool.clear(),
            EffectMode::ConcentricRings => {}
            EffectMode::Kaleidoscope => self.state.rotation = 0.0,
        }
    }

    /// Track the surface size. Same size is a no-op.
    pub fn resize(&mut self, width: u32, height: u32) {
        if self.geometry.width == width && self.geometry.height == height {
            return;
        }
        debug!(width, height, "effect geometry resized");
        self.geometry = Geometry::new(width, height);
    }

    /// Begin the intro override at `now_ms`
    pub fn start_intro(&mut self, now_ms: f64) {
        info!(duration_ms = self.config.intro.duration_ms, "intro started");
        self.pool.clear();
        if self.mode == EffectMode::ParticleBurst {
            let center = self.geometry.center;
            self.pool.spawn_burst(
                BurstKind::Beat,
                self.config.intro.seed_intensity,
                center,
                &mut self.rng,
            );
        }
        self.intro = Some(IntroSequence::new(now_ms, self.config.intro.clone()));
    }

    /// Per-frame simulation step, run after the extractor has ingested the frame
    pub fn update(&mut self, features: &FeatureState, frequency: &[u8]) {
        self.frequency.clear();
        self.frequency.extend_from_slice(frequency);
        self.volume_level = features.volume_level;

        match self.mode {
            EffectMode::ParticleBurst => self.pool.update(),
            EffectMode::ConcentricRings => {}
            EffectMode::Kaleidoscope => {
                let k = &self.config.kaleidoscope;
                self.state.rotation += k.base_spin + self.impacts.guitar * k.guitar_spin;
            }
        }
    }

    /// Paint the current frame. Zero-size surfaces are skipped.
    pub fn render<S: Surface + ?Sized>(&mut self, surface: &mut S, timestamp_ms: f64) {
        if !surface.is_drawable() {
            return;
        }
        self.resize(surface.width(), surface.height());

        let scene = Scene {
            center: self.geometry.center,
            max_radius: self.geometry.max_radius,
            volume: self.volume_level,
            beat: self.impacts.beat,
            guitar: self.impacts.guitar,
            frequency: &self.frequency,
            timestamp_ms,
            background: self.config.background,
        };

        if let Some(intro) = &self.intro {
            let frame = intro.frame(timestamp_ms, self.geometry.max_radius);
            render::draw_intro(surface, &scene, &frame);
            if frame.is_finished() {
                info!("intro finished");
                self.intro = None;
            }
        } else {
            match self.mode {
                EffectMode::ParticleBurst => render::draw_particle_burst(
                    surface,
                    &scene,
                    self.pool.particles(),
                    &self.config.burst,
                    &mut self.rng,
                ),
                EffectMode::ConcentricRings => render::draw_concentric_rings(
                    surface,
                    &scene,
                    self.state.ring_width,
                    &self.config.rings,
                ),
                EffectMode::Kaleidoscope => render::draw_kaleidoscope(
                    surface,
                    &scene,
                    self.state.rotation,
                    &self.config.kaleidoscope,
                ),
            }
        }

        let decay = self.config.impact_decay;
        self.impacts.beat *= decay;
        self.impacts.guitar *= decay;
        self.state.ring_width *= self.config.rings.width_decay;
    }
}

impl FeatureListener for EffectEngine {
    /// `intensity` arrives already amplified and clamped by the extractor
    fn on_beat(&mut self, intensity: f32) {
        let intensity = intensity.clamp(0.0, 1.0);
        self.impacts.beat = intensity;

        match self.mode {
            EffectMode::ParticleBurst => {
                let center = self.geometry.center;
                self.pool
                    .spawn_burst(BurstKind::Beat, intensity, center, &mut self.rng);
                self.pool.spawn_lines(intensity, center, &mut self.rng);
            }
            EffectMode::ConcentricRings => {
                self.state.ring_width = self.config.rings.beat_width * intensity;
            }
            EffectMode::Kaleidoscope => {
                self.state.rotation += self.config.kaleidoscope.beat_kick * intensity;
            }
        }
    }

    fn on_guitar(&mut self, energy: f32, _delta: f32) {
        let impact = (energy * self.config.guitar_gain).clamp(0.0, 1.0);
        self.impacts.guitar = impact;

        match self.mode {
            EffectMode::ParticleBurst => {
                let particles = self.pool.config();
                if impact > particles.guitar_spawn_threshold {
                    let intensity = impact * particles.guitar_intensity_scale;
                    let center = self.geometry.center;
                    self.pool
                        .spawn_burst(BurstKind::Guitar, intensity, center, &mut self.rng);
                }
            }
            EffectMode::ConcentricRings => {}
            EffectMode::Kaleidoscope => {
                self.state.rotation += self.config.kaleidoscope.guitar_kick * impact;
            }
        }
    }
}
