//! beatscope
//! Audio-reactive visuals: band energies and beat/guitar triggers driving particle bursts,
//! concentric rings and a kaleidoscope on a software surface

pub mod audio;
pub mod color;
pub mod compositor;
pub mod config;
pub mod effects;
pub mod export;
pub mod particles;
pub mod render;
pub mod source;
pub mod surface;

pub use audio::{FeatureExtractor, FeatureListener, FeatureState, Triggers};
pub use color::Color;
pub use compositor::{Compositor, FrameThrottle};
pub use config::{AppConfig, ConfigError, EffectMode};
pub use effects::EffectEngine;
pub use export::{ExportError, PngSequenceWriter};
pub use particles::{Particle, ParticlePool};
pub use source::{SignalSource, SilentSource, SimulatedSource, SpectrumAnalyser};
pub use surface::{PixelSurface, Surface};
