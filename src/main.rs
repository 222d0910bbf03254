//! beatscope
//! Live viewer and offline PNG-sequence renderer

mod cli;
mod logging;
mod viewer;

use std::path::Path;

use anyhow::Context;
use beatscope::{AppConfig, Compositor, PngSequenceWriter, SignalSource, SilentSource, SimulatedSource};
use clap::Parser;
use eframe::egui;
use tracing::info;

use crate::cli::{Args, Command};
use crate::viewer::ViewerApp;

const EXPORT_QUEUE_DEPTH: usize = 8;

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logging::init(args.verbose)?;

    let config = args.resolve_config()?;
    info!(mode = %config.default_mode, fps = config.frame.target_fps, "configuration loaded");

    match &args.command {
        Some(Command::Render { frames, out }) => render_offline(&config, &args, *frames, out),
        Some(Command::DumpConfig { out }) => {
            config
                .save(out)
                .with_context(|| format!("failed to write {}", out.display()))?;
            info!(path = %out.display(), "configuration written");
            Ok(())
        }
        None => run_viewer(config, &args),
    }
}

fn make_source(config: &AppConfig, args: &Args) -> Box<dyn SignalSource> {
    if args.silent {
        Box::new(SilentSource::new(config.analyser.bin_count()))
    } else {
        Box::new(SimulatedSource::new(
            config.analyser.clone(),
            args.bpm,
            args.seed.unwrap_or(0),
        ))
    }
}

fn run_viewer(config: AppConfig, args: &Args) -> anyhow::Result<()> {
    let compositor = match args.seed {
        Some(seed) => Compositor::with_seed(&config, seed),
        None => Compositor::new(&config),
    };
    let source = make_source(&config, args);
    let intro = !args.no_intro;

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([config.frame.width as f32 + 220.0, config.frame.height as f32])
            .with_title("beatscope")
            .with_min_inner_size([480.0, 320.0]),
        ..Default::default()
    };

    eframe::run_native(
        "beatscope",
        options,
        Box::new(move |cc| Box::new(ViewerApp::new(cc, compositor, source, intro))),
    )
    .map_err(|err| anyhow::anyhow!("viewer failed: {err}"))
}

/// Step the pipeline at exact frame intervals and write every frame
fn render_offline(config: &AppConfig, args: &Args, frames: u64, out: &Path) -> anyhow::Result<()> {
    let mut compositor = Compositor::with_seed(config, args.seed.unwrap_or(0));
    let mut source = make_source(config, args);
    let mut writer = PngSequenceWriter::new(out, EXPORT_QUEUE_DEPTH)
        .with_context(|| format!("failed to start export into {}", out.display()))?
        .with_total(frames);
    info!(dir = %writer.dir().display(), frames, "rendering offline");

    if !args.no_intro {
        compositor.start_intro(0.0);
    }

    let interval = config.frame.frame_interval_ms();
    let mut beats = 0u64;
    for index in 0..frames {
        let now = index as f64 * interval;
        let triggers = compositor.step(now, source.as_mut());
        if triggers.beat.is_some() {
            beats += 1;
        }
        writer
            .push(compositor.surface().to_rgba8())
            .with_context(|| format!("failed to export frame {index}"))?;
    }

    let written = writer.finish().context("export did not finish")?;
    info!(frames = written, beats, dir = %out.display(), "render complete");
    Ok(())
}
