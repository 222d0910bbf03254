use beatscope::config::ParticleConfig;
use beatscope::particles::{BurstKind, ParticlePool};
use egui::Pos2;
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

#[test]
fn every_particle_dies_within_its_lifetime_bound() {
    let config = ParticleConfig::default();
    let bound = (config.max_life / config.min_decay).ceil() as usize + 1;
    let mut pool = ParticlePool::new(config);
    let mut rng = StdRng::seed_from_u64(11);

    pool.spawn_burst(BurstKind::Beat, 1.0, Pos2::new(100.0, 100.0), &mut rng);
    pool.spawn_lines(1.0, Pos2::new(100.0, 100.0), &mut rng);
    pool.spawn_burst(BurstKind::Guitar, 0.5, Pos2::new(100.0, 100.0), &mut rng);
    assert!(!pool.is_empty());
    assert!(pool.particles().iter().all(|p| p.life == p.max_life));

    let mut frames = 0;
    while !pool.is_empty() {
        pool.update();
        frames += 1;
        assert!(frames <= bound, "particles outlived {bound} frames");
    }
}

proptest! {
    #[test]
    fn pool_never_exceeds_cap(
        seed in any::<u64>(),
        bursts in prop::collection::vec((any::<bool>(), 0.0f32..=1.0, 0usize..4), 1..60)
    ) {
        let config = ParticleConfig::default();
        let cap = config.max_particles;
        let mut pool = ParticlePool::new(config);
        let mut rng = StdRng::seed_from_u64(seed);
        let origin = Pos2::new(50.0, 50.0);

        for (beat, intensity, updates) in bursts {
            let kind = if beat { BurstKind::Beat } else { BurstKind::Guitar };
            pool.spawn_burst(kind, intensity, origin, &mut rng);
            prop_assert!(pool.len() <= cap);
            pool.spawn_lines(intensity, origin, &mut rng);
            prop_assert!(pool.len() <= cap);
            for _ in 0..updates {
                pool.update();
                prop_assert!(pool.len() <= cap);
            }
        }
    }

    #[test]
    fn small_caps_are_respected(cap in 1usize..40, seed in any::<u64>()) {
        let config = ParticleConfig {
            max_particles: cap,
            prune_to: cap / 2,
            ..ParticleConfig::default()
        };
        let mut pool = ParticlePool::new(config);
        let mut rng = StdRng::seed_from_u64(seed);
        for _ in 0..10 {
            pool.spawn_burst(BurstKind::Beat, 1.0, Pos2::ZERO, &mut rng);
            prop_assert!(pool.len() <= cap);
        }
    }
}
