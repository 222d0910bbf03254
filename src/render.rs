//! Effect Renderer for beatscope
//! Per-mode drawing routines over a [`Surface`]

use std::f32::consts::TAU;

use egui::{Pos2, Vec2};
use rand::Rng;

use crate::color::Color;
use crate::config::{BurstSceneConfig, KaleidoscopeConfig, RingsConfig};
use crate::effects::IntroFrame;
use crate::particles::Particle;
use crate::surface::{BlendMode, Gradient, Paint, Surface};

/// Read-only frame inputs shared by every mode
#[derive(Clone, Copy, Debug)]
pub struct Scene<'a> {
    pub center: Pos2,
    pub max_radius: f32,
    pub volume: f32,
    pub beat: f32,
    pub guitar: f32,
    pub frequency: &'a [u8],
    pub timestamp_ms: f64,
    pub background: [u8; 3],
}

impl Scene<'_> {
    /// Normalized bin value; missing bins read as silence
    fn bin(&self, index: usize) -> f32 {
        self.frequency.get(index).copied().unwrap_or(0) as f32 / 255.0
    }

    /// Bin lookup that wraps around the spectrum
    fn bin_wrapped(&self, index: usize) -> f32 {
        if self.frequency.is_empty() {
            return 0.0;
        }
        self.bin(index % self.frequency.len())
    }

    /// Hue that cycles with time
    fn time_hue(&self, period_ms: f32) -> f32 {
        ((self.timestamp_ms / period_ms.max(1.0) as f64) % 360.0) as f32
    }

    fn begin<S: Surface + ?Sized>(&self, surface: &mut S) {
        surface.set_blend(BlendMode::SourceOver);
        surface.clear(Color::from_rgb8(self.background));
    }
}

fn dir(angle: f32) -> Vec2 {
    Vec2::new(angle.cos(), angle.sin())
}

// ============================================================================
// Particle burst
// ============================================================================

pub fn draw_particle_burst<S, R>(
    surface: &mut S,
    scene: &Scene<'_>,
    particles: &[Particle],
    config: &BurstSceneConfig,
    rng: &mut R,
) where
    S: Surface + ?Sized,
    R: Rng + ?Sized,
{
    scene.begin(surface);
    let c = scene.center;
    let hue1 = scene.time_hue(config.hue_period_ms);
    let hue2 = hue1 + 60.0;

    // Animated background
    let background = Gradient::new()
        .stop(0.0, Color::hsla(hue1, 70.0, 5.0, 1.0))
        .stop(1.0, Color::hsla(hue2, 80.0, 10.0, 0.8));
    surface.fill_rect(surface.bounds(), &Paint::radial(c, scene.max_radius, background));

    // Beat pulse
    if scene.beat > config.pulse_threshold {
        let radius = scene.max_radius * 0.5 * (1.0 + scene.beat * 0.5);
        let pulse = Gradient::new()
            .stop(0.0, Color::hsla(hue1, 80.0, 50.0, scene.beat * 0.3))
            .stop(1.0, Color::TRANSPARENT);
        surface.fill_circle(c, radius, &Paint::radial(c, radius, pulse));
    }

    // Glowing particles, newest only
    surface.set_blend(BlendMode::Lighter);
    let skip = particles.len().saturating_sub(config.max_rendered);
    let scale = 1.2 + scene.volume * 1.5;
    for p in &particles[skip..] {
        if p.is_line {
            draw_line_particle(surface, p);
        } else {
            draw_blob(surface, p, scale, rng);
        }
    }
    surface.set_blend(BlendMode::SourceOver);

    // Radial streaks on strong beats
    if scene.beat > config.streak_threshold {
        let count = (4.0 + scene.beat * 8.0) as usize;
        let max_len = scene.max_radius * (0.2 + scene.beat * 0.8);
        let width = 2.0 + scene.beat * 3.0;
        for i in 0..count {
            let angle = i as f32 / count as f32 * TAU;
            let length = max_len * (0.5 + rng.gen::<f32>() * 0.5);
            let color = Color::hsla(hue1 + i as f32 * 30.0, 100.0, 70.0, scene.beat);
            surface.stroke_line(c, c + dir(angle) * length, width, &color.into());
        }
    }
}

fn draw_blob<S, R>(surface: &mut S, p: &Particle, scale: f32, rng: &mut R)
where
    S: Surface + ?Sized,
    R: Rng + ?Sized,
{
    let glow = Gradient::new()
        .stop(0.0, Color::hsla(p.hue, p.saturation, p.lightness, p.life * 1.2))
        .stop(1.0, Color::hsla(p.hue, p.saturation, p.lightness, 0.0));
    surface.fill_circle(
        p.pos,
        p.size * scale,
        &Paint::radial(p.pos, p.size * 2.0, glow),
    );

    // Occasional sparkle core
    if p.size > 3.0 && rng.gen::<f32>() > 0.7 {
        let core = Color::hsla(p.hue, p.saturation, 95.0, p.life * 0.9);
        surface.fill_circle(p.pos, p.size * 0.7 * scale, &core.into());
    }
}

fn draw_line_particle<S: Surface + ?Sized>(surface: &mut S, p: &Particle) {
    let tail = p.tail();
    let ramp = Gradient::new()
        .stop(0.0, Color::hsla(p.hue, p.saturation, p.lightness, 0.0))
        .stop(1.0, Color::hsla(p.hue, p.saturation, p.lightness, p.life));
    surface.stroke_line(tail, p.pos, p.size, &Paint::linear(tail, p.pos, ramp));
}

// ============================================================================
// Concentric rings
// ============================================================================

pub fn draw_concentric_rings<S>(
    surface: &mut S,
    scene: &Scene<'_>,
    ring_width: f32,
    config: &RingsConfig,
) where
    S: Surface + ?Sized,
{
    scene.begin(surface);
    let c = scene.center;
    let count = config.base_rings + (scene.volume * config.volume_rings).max(0.0) as usize;
    let max_radius = scene.max_radius * (0.8 + scene.beat * 0.2);

    let backdrop = Gradient::new()
        .stop(0.0, Color::rgba(99.0, 102.0, 241.0, 0.5 + scene.volume * 0.5))
        .stop(1.0, Color::TRANSPARENT);
    surface.fill_rect(surface.bounds(), &Paint::radial(c, max_radius, backdrop));

    if count == 0 {
        return;
    }
    let half_bins = scene.frequency.len() / 2;

    for i in 0..count {
        let ratio = i as f32 / count as f32;
        let radius = max_radius * ratio * (0.8 + scene.beat * 0.2);

        let freq_index = (ratio * half_bins as f32) as usize;
        let f = scene.bin(freq_index);

        let line_width = (1.0 + f * 5.0) * (1.0 + scene.volume * 3.0);
        let hue = (180 + freq_index) as f32 % 360.0;
        let saturation = 80.0 + f * 20.0;
        let lightness = 50.0 + f * 20.0;
        let alpha = 0.6 + f * 0.4;

        let color = Color::hsla(hue, saturation, lightness, alpha);
        surface.stroke_circle(c, radius + ring_width * (1.0 - ratio), line_width, &color.into());

        // Mirrored ring on guitar hits
        if scene.guitar > config.mirror_threshold && i % 2 == 0 {
            let mirror = Color::hsla(hue + 180.0, saturation, lightness, alpha * 0.7);
            surface.stroke_circle(
                c,
                radius * (1.0 + scene.guitar * 0.1),
                line_width * 0.5,
                &mirror.into(),
            );
        }
    }
}

// ============================================================================
// Kaleidoscope
// ============================================================================

pub fn draw_kaleidoscope<S>(
    surface: &mut S,
    scene: &Scene<'_>,
    rotation: f32,
    config: &KaleidoscopeConfig,
) where
    S: Surface + ?Sized,
{
    scene.begin(surface);
    let c = scene.center;

    let segments =
        (config.base_segments + (scene.volume * config.volume_segments).max(0.0) as usize).max(1);
    let step = TAU / segments as f32;
    let max_radius = scene.max_radius * (0.7 + scene.beat * 0.3);
    let base_hue = scene.time_hue(config.hue_period_ms);

    for i in 0..segments {
        let start = i as f32 * step + rotation;
        let end = start + step;

        let f1 = scene.bin_wrapped(i);
        let f2 = scene.bin_wrapped(i * 5);
        let hue1 = base_hue + i as f32 * 30.0;
        let hue2 = hue1 + 180.0;

        let ramp = Gradient::new()
            .stop(0.0, Color::hsla(hue1, 100.0, 50.0 + f1 * 30.0, 0.7 + f1 * 0.3))
            .stop(1.0, Color::hsla(hue2, 100.0, 50.0 + f2 * 30.0, 0.1 + f2 * 0.3));
        let paint = Paint::linear(c, c + dir(start) * max_radius, ramp);
        surface.fill_sector(c, max_radius, start, end, &paint);

        if scene.beat > config.edge_threshold {
            let edge = Color::hsla(hue1, 100.0, 70.0, scene.beat);
            surface.stroke_sector(c, max_radius, start, end, 2.0 * scene.beat, &edge.into());
        }
    }

    // Pulsing core
    let core_radius = 50.0 + scene.volume * 100.0 + scene.beat * 50.0;
    let core = Gradient::new()
        .stop(0.0, Color::rgba(255.0, 255.0, 255.0, 0.8 + scene.beat * 0.2))
        .stop(0.5, Color::rgba(200.0, 220.0, 255.0, 0.2 + scene.volume * 0.3))
        .stop(1.0, Color::rgba(100.0, 150.0, 255.0, 0.0));
    surface.set_blend(BlendMode::Lighter);
    surface.fill_circle(c, core_radius, &Paint::radial(c, core_radius, core));
    surface.set_blend(BlendMode::SourceOver);
}

// ============================================================================
// Intro
// ============================================================================

pub fn draw_intro<S: Surface + ?Sized>(surface: &mut S, scene: &Scene<'_>, frame: &IntroFrame) {
    scene.begin(surface);
    let c = scene.center;

    surface.set_blend(BlendMode::Lighter);
    if frame.flash_radius > 0.0 && frame.flash_alpha > 0.0 {
        let flash = Gradient::new()
            .stop(0.0, Color::WHITE.with_alpha(frame.flash_alpha))
            .stop(0.4, Color::hsla(200.0, 100.0, 70.0, frame.flash_alpha * 0.6))
            .stop(1.0, Color::TRANSPARENT);
        surface.fill_circle(
            c,
            frame.flash_radius,
            &Paint::radial(c, frame.flash_radius, flash),
        );
    }

    for (k, wave) in frame.shockwaves.iter().enumerate() {
        let color = Color::hsla(200.0 + k as f32 * 40.0, 100.0, 70.0, wave.alpha);
        let width = 1.0 + 4.0 * wave.alpha;
        surface.stroke_circle(c, wave.radius, width, &color.into());
    }
    surface.set_blend(BlendMode::SourceOver);
}
