use approx::assert_abs_diff_eq;
use beatscope::config::{AnalysisConfig, EffectsConfig, IntroConfig, ParticleConfig};
use beatscope::effects::IntroSequence;
use beatscope::{EffectEngine, EffectMode, FeatureExtractor, FeatureListener, FeatureState, PixelSurface};

fn engine(mode: EffectMode) -> EffectEngine {
    let mut e =
        EffectEngine::with_seed(EffectsConfig::default(), ParticleConfig::default(), mode, 7);
    e.resize(160, 120);
    e
}

fn quiet_features() -> FeatureState {
    FeatureExtractor::new(AnalysisConfig::default()).state().clone()
}

#[test]
fn mode_entry_resets_run_once_per_switch() {
    let features = quiet_features();
    let mut e = engine(EffectMode::ParticleBurst);

    e.on_beat(0.9);
    let spawned = e.pool().len();
    assert!(spawned > 0);

    // Entering the kaleidoscope resets its rotation but leaves the pool alone
    e.set_mode(EffectMode::Kaleidoscope);
    assert_eq!(e.mode_state().rotation, 0.0);
    assert_eq!(e.pool().len(), spawned);

    for _ in 0..5 {
        e.update(&features, &[]);
    }
    let spun = e.mode_state().rotation;
    assert!(spun > 0.0);

    // Re-selecting is not an entry
    e.set_mode(EffectMode::Kaleidoscope);
    assert_abs_diff_eq!(e.mode_state().rotation, spun);

    e.set_mode(EffectMode::ParticleBurst);
    assert!(e.pool().is_empty());

    e.on_beat(0.5);
    let refilled = e.pool().len();
    assert!(refilled > 0);
    e.set_mode(EffectMode::ParticleBurst);
    e.update(&features, &[]);
    assert!(e.pool().len() <= refilled);
    assert!(!e.pool().is_empty());
}

#[test]
fn beats_drive_each_mode_differently() {
    let mut burst = engine(EffectMode::ParticleBurst);
    let mut rings = engine(EffectMode::ConcentricRings);
    let mut kaleido = engine(EffectMode::Kaleidoscope);

    for e in [&mut burst, &mut rings, &mut kaleido] {
        e.on_beat(1.0);
        assert_eq!(e.impacts().beat, 1.0);
    }

    assert!(!burst.pool().is_empty());
    assert_abs_diff_eq!(rings.mode_state().ring_width, 30.0);
    assert!(rings.pool().is_empty());
    assert_abs_diff_eq!(kaleido.mode_state().rotation, 0.02);
    assert!(kaleido.pool().is_empty());
}

#[test]
fn intro_fades_out_while_expanding() {
    let intro = IntroSequence::new(0.0, IntroConfig::default());
    let r = 200.0;
    let start = intro.frame(0.0, r);
    let middle = intro.frame(1500.0, r);
    let end = intro.frame(3000.0, r);

    assert!(start.flash_alpha > middle.flash_alpha);
    assert!(middle.flash_alpha > end.flash_alpha);
    assert!(start.flash_radius < middle.flash_radius);
    assert!(middle.flash_radius < end.flash_radius);
    assert!(!middle.is_finished());
    assert!(end.is_finished());
    assert_abs_diff_eq!(end.flash_radius, r);
}

#[test]
fn normal_rendering_resumes_after_the_intro() {
    let features = quiet_features();
    let mut e = engine(EffectMode::ConcentricRings);
    let mut surface = PixelSurface::new(160, 120);

    e.start_intro(0.0);
    for t in [0.0, 1500.0] {
        e.update(&features, &[]);
        e.render(&mut surface, t);
        assert!(e.intro_active());
    }

    e.update(&features, &[]);
    e.render(&mut surface, 3000.0);
    assert!(!e.intro_active());

    // Mode effects apply again on the following frame
    e.on_beat(1.0);
    e.update(&features, &[]);
    e.render(&mut surface, 3033.0);
    assert!(!e.intro_active());
    assert!(e.mode_state().ring_width > 0.0);
}
