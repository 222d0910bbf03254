//! Command line for beatscope

use std::path::PathBuf;

use anyhow::Context;
use beatscope::{AppConfig, EffectMode};
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "beatscope",
    version,
    about = "Audio-reactive visualizer with particle, ring and kaleidoscope effects"
)]
pub struct Args {
    /// JSON configuration file
    #[arg(long, short, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Effect mode: particle-burst, concentric-rings or kaleidoscope
    #[arg(long, value_name = "MODE")]
    pub mode: Option<String>,

    /// Target frame rate
    #[arg(long, value_name = "FPS")]
    pub fps: Option<f32>,

    #[arg(long, value_name = "PX")]
    pub width: Option<u32>,

    #[arg(long, value_name = "PX")]
    pub height: Option<u32>,

    /// Tempo of the simulated groove
    #[arg(long, default_value_t = 120.0, value_name = "BPM")]
    pub bpm: f32,

    /// Feed silence instead of the simulated groove
    #[arg(long)]
    pub silent: bool,

    /// Seed for the groove and particle spawning
    #[arg(long, value_name = "N")]
    pub seed: Option<u64>,

    /// Skip the startup intro
    #[arg(long)]
    pub no_intro: bool,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Render frames offline to a PNG sequence
    Render {
        /// Number of frames to write
        #[arg(long, default_value_t = 150)]
        frames: u64,

        /// Output directory
        #[arg(long, value_name = "DIR")]
        out: PathBuf,
    },

    /// Write the effective configuration as JSON
    DumpConfig {
        #[arg(value_name = "FILE")]
        out: PathBuf,
    },
}

impl Args {
    /// Config file (or defaults) with the command line overrides applied
    pub fn resolve_config(&self) -> anyhow::Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) => AppConfig::load(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None => AppConfig::default(),
        };

        if let Some(mode) = &self.mode {
            config.default_mode = EffectMode::parse_or_default(mode);
        }
        if let Some(fps) = self.fps {
            config.frame.target_fps = fps;
        }
        if let Some(width) = self.width {
            config.frame.width = width;
        }
        if let Some(height) = self.height {
            config.frame.height = height;
        }

        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}
