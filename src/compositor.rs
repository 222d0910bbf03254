//! Compositor for beatscope
//! Owns the whole pipeline and runs one ingest -> update -> render cycle per executed frame

use tracing::debug;

use crate::audio::{FeatureExtractor, FeatureState, Triggers};
use crate::config::{AppConfig, EffectMode};
use crate::effects::EffectEngine;
use crate::source::SignalSource;
use crate::surface::{PixelSurface, Surface};

/// Target-fps gate for a host that calls back faster than it should render
#[derive(Clone, Debug)]
pub struct FrameThrottle {
    interval_ms: f64,
    last_ms: Option<f64>,
}

impl FrameThrottle {
    pub fn new(target_fps: f32) -> Self {
        Self {
            interval_ms: 1000.0 / target_fps.max(1.0) as f64,
            last_ms: None,
        }
    }

    pub fn interval_ms(&self) -> f64 {
        self.interval_ms
    }

    /// True when a frame should run at `now_ms`. The remainder of the elapsed time is carried
    /// over so the average rate does not drift below the target.
    pub fn should_render(&mut self, now_ms: f64) -> bool {
        let Some(last) = self.last_ms else {
            self.last_ms = Some(now_ms);
            return true;
        };

        let elapsed = now_ms - last;
        if elapsed < self.interval_ms {
            return false;
        }
        self.last_ms = Some(now_ms - elapsed % self.interval_ms);
        true
    }
}

/// Frame pipeline context: extractor, effect engine, surface and throttle
pub struct Compositor {
    extractor: FeatureExtractor,
    engine: EffectEngine,
    surface: PixelSurface,
    throttle: FrameThrottle,

    // Per-frame source buffers, reused between frames
    frequency: Vec<u8>,
    waveform: Vec<u8>,

    frames_rendered: u64,
    pending_intro: bool,
}

impl Compositor {
    pub fn new(config: &AppConfig) -> Self {
        let engine = EffectEngine::new(
            config.effects.clone(),
            config.particles.clone(),
            config.default_mode,
        );
        Self::with_engine(config, engine)
    }

    /// Deterministic particle spawning, for headless renders and tests
    pub fn with_seed(config: &AppConfig, seed: u64) -> Self {
        let engine = EffectEngine::with_seed(
            config.effects.clone(),
            config.particles.clone(),
            config.default_mode,
            seed,
        );
        Self::with_engine(config, engine)
    }

    fn with_engine(config: &AppConfig, mut engine: EffectEngine) -> Self {
        let (width, height) = (config.frame.width, config.frame.height);
        engine.resize(width, height);
        Self {
            extractor: FeatureExtractor::new(config.analysis.clone()),
            engine,
            surface: PixelSurface::new(width, height),
            throttle: FrameThrottle::new(config.frame.target_fps),
            frequency: Vec::new(),
            waveform: Vec::new(),
            frames_rendered: 0,
            pending_intro: false,
        }
    }

    /// Host callback. Pulls from `source` and renders unless throttled; returns whether a
    /// frame ran.
    pub fn frame<S: SignalSource + ?Sized>(&mut self, now_ms: f64, source: &mut S) -> bool {
        if !self.throttle.should_render(now_ms) {
            return false;
        }
        self.step(now_ms, source);
        true
    }

    /// Pull from `source` and render, ignoring the throttle. Offline renders drive time
    /// themselves and use this directly.
    pub fn step<S: SignalSource + ?Sized>(&mut self, now_ms: f64, source: &mut S) -> Triggers {
        let bins = source.bin_count();
        let mut frequency = std::mem::take(&mut self.frequency);
        let mut waveform = std::mem::take(&mut self.waveform);
        frequency.resize(bins, 0);
        waveform.resize(bins, 128);

        source.fill(now_ms, &mut frequency, &mut waveform);
        let triggers = self.process(now_ms, &frequency, &waveform);

        self.frequency = frequency;
        self.waveform = waveform;
        triggers
    }

    /// Run one unthrottled cycle on caller-provided buffers
    pub fn process(&mut self, now_ms: f64, frequency: &[u8], waveform: &[u8]) -> Triggers {
        if std::mem::take(&mut self.pending_intro) {
            self.engine.start_intro(now_ms);
        }
        let triggers = self
            .extractor
            .ingest(frequency, waveform, now_ms, &mut self.engine);
        self.engine.update(self.extractor.state(), frequency);
        self.engine.render(&mut self.surface, now_ms);
        self.frames_rendered += 1;
        triggers
    }

    /// Idempotent: the same size keeps the current pixels
    pub fn resize(&mut self, width: u32, height: u32) {
        if self.surface.width() == width && self.surface.height() == height {
            return;
        }
        debug!(width, height, "surface resized");
        self.surface.resize(width, height);
        self.engine.resize(width, height);
    }

    pub fn set_mode(&mut self, mode: EffectMode) {
        self.engine.set_mode(mode);
    }

    /// Select a mode by name; unknown names select the default mode
    pub fn set_mode_str(&mut self, name: &str) -> EffectMode {
        let mode = EffectMode::parse_or_default(name);
        self.set_mode(mode);
        mode
    }

    pub fn start_intro(&mut self, now_ms: f64) {
        self.engine.start_intro(now_ms);
    }

    /// Start the intro on the next executed frame, after any resize before it
    pub fn queue_intro(&mut self) {
        self.pending_intro = true;
    }

    pub fn mode(&self) -> EffectMode {
        self.engine.mode()
    }

    pub fn surface(&self) -> &PixelSurface {
        &self.surface
    }

    pub fn features(&self) -> &FeatureState {
        self.extractor.state()
    }

    pub fn engine(&self) -> &EffectEngine {
        &self.engine
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }
}
