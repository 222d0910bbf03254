//! Particle Pool for beatscope
//! Transient burst particles spawned by beat/guitar triggers, with a hard population cap

use std::f32::consts::TAU;

use egui::{Pos2, Vec2};
use rand::Rng;

use crate::config::{BurstConfig, ParticleConfig};

/// Which trigger produced a batch
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BurstKind {
    Beat,
    Guitar,
}

/// Individual particle data
#[derive(Clone, Debug, PartialEq)]
pub struct Particle {
    pub pos: Pos2,
    pub vel: Vec2,
    pub size: f32,
    pub life: f32,
    pub max_life: f32,
    /// Life lost per frame
    pub decay: f32,
    pub hue: f32,
    pub saturation: f32,
    pub lightness: f32,
    /// Ray particle: drawn as a line trailing `length` behind `pos`
    pub is_line: bool,
    pub angle: f32,
    pub length: f32,
}

impl Particle {
    /// Remaining life as a fraction of the initial life
    pub fn life_fraction(&self) -> f32 {
        if self.max_life <= 0.0 {
            return 0.0;
        }
        (self.life / self.max_life).clamp(0.0, 1.0)
    }

    /// Tail of a line particle (the end nearer the burst origin)
    pub fn tail(&self) -> Pos2 {
        let dir = Vec2::new(self.angle.cos(), self.angle.sin());
        self.pos - dir * self.length
    }
}

/// Owns every live particle. Oldest particles sit at the front.
pub struct ParticlePool {
    particles: Vec<Particle>,
    config: ParticleConfig,
}

impl ParticlePool {
    pub fn new(config: ParticleConfig) -> Self {
        Self {
            particles: Vec::with_capacity(config.max_particles),
            config,
        }
    }

    pub fn config(&self) -> &ParticleConfig {
        &self.config
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn clear(&mut self) {
        self.particles.clear();
    }

    /// Spawn one radial batch at `origin`. Returns how many particles were created.
    pub fn spawn_burst<R: Rng + ?Sized>(
        &mut self,
        kind: BurstKind,
        intensity: f32,
        origin: Pos2,
        rng: &mut R,
    ) -> usize {
        let intensity = intensity.clamp(0.0, 1.0);
        let style = match kind {
            BurstKind::Beat => &self.config.beat,
            BurstKind::Guitar => &self.config.guitar,
        };
        let count = (style.base_count + intensity * style.count_scale).max(0.0) as usize;

        let mut batch = Vec::with_capacity(count);
        for _ in 0..count {
            let angle = rng.gen::<f32>() * TAU;
            let speed = sample(rng, style.min_speed, style.max_speed)
                * style.speed_multiplier
                * intensity;
            let size =
                sample(rng, style.min_size, style.max_size) * style.size_multiplier * intensity;

            batch.push(Particle {
                pos: origin,
                vel: Vec2::new(angle.cos(), angle.sin()) * speed,
                size,
                angle,
                length: 0.0,
                is_line: false,
                ..self.fresh(style, rng)
            });
        }

        self.push_batch(batch)
    }

    /// Spawn ray particles for a strong beat. Below the line threshold nothing is spawned.
    pub fn spawn_lines<R: Rng + ?Sized>(&mut self, intensity: f32, origin: Pos2, rng: &mut R) -> usize {
        let intensity = intensity.clamp(0.0, 1.0);
        if intensity <= self.config.line_threshold {
            return 0;
        }
        let count =
            (self.config.line_base_count + intensity * self.config.line_count_scale) as usize;
        let style = &self.config.beat;

        let mut batch = Vec::with_capacity(count);
        for _ in 0..count {
            let angle = rng.gen::<f32>() * TAU;
            let dir = Vec2::new(angle.cos(), angle.sin());
            let length = sample(rng, self.config.line_min_length, self.config.line_max_length)
                * intensity;
            let speed = sample(rng, style.min_speed, style.max_speed)
                * style.speed_multiplier
                * intensity;

            batch.push(Particle {
                pos: origin + dir * length,
                vel: dir * speed,
                size: (1.0 + intensity * 2.0).max(1.0),
                angle,
                length,
                is_line: true,
                ..self.fresh(style, rng)
            });
        }

        self.push_batch(batch)
    }

    /// Advance one frame: integrate, apply friction, age, then drop dead particles
    pub fn update(&mut self) {
        let friction = self.config.friction;
        let gravity = self.config.gravity;

        for p in &mut self.particles {
            p.pos += p.vel;
            if !p.is_line {
                p.vel.y += gravity;
            }
            p.vel *= friction;
            p.life -= p.decay;
        }

        self.particles.retain(|p| p.life > 0.0);
    }

    /// Shared fields of a newly spawned particle
    fn fresh<R: Rng + ?Sized>(&self, style: &BurstConfig, rng: &mut R) -> Particle {
        let max_life = self.config.max_life;
        Particle {
            pos: Pos2::ZERO,
            vel: Vec2::ZERO,
            size: 0.0,
            life: max_life,
            max_life,
            decay: sample(rng, self.config.min_decay, self.config.max_decay),
            hue: sample(rng, style.hue_min, style.hue_max),
            saturation: sample(rng, style.saturation_min, style.saturation_max),
            lightness: sample(rng, style.lightness_min, style.lightness_max),
            is_line: false,
            angle: 0.0,
            length: 0.0,
        }
    }

    fn push_batch(&mut self, batch: Vec<Particle>) -> usize {
        let added = batch.len();
        self.particles.extend(batch);
        self.enforce_cap();
        added
    }

    /// Over the cap, keep only the newest `prune_to` particles
    fn enforce_cap(&mut self) {
        if self.particles.len() <= self.config.max_particles {
            return;
        }
        let keep = self.config.prune_to.min(self.config.max_particles);
        let excess = self.particles.len() - keep;
        self.particles.drain(..excess);
    }
}

/// Uniform sample in `[min, max)`, tolerating an empty or inverted range
fn sample<R: Rng + ?Sized>(rng: &mut R, min: f32, max: f32) -> f32 {
    if max <= min {
        return min;
    }
    min + rng.gen::<f32>() * (max - min)
}
