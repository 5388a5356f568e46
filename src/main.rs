//! Jellytris: a falling-block puzzle whose pieces are soft mass-spring bodies.

mod app;
mod body;
mod game;
mod grid;
mod input;
mod line_clear;
mod particle;
mod pieces;
mod render;
mod spring;
mod theme;
mod ui;
mod vector;
mod world;

use anyhow::{Context, Result};
use app::App;
use clap::{Parser, ValueEnum};
use line_clear::SamplingMode;
use pieces::Material;
use std::path::PathBuf;
use vector::Vector2;
use world::PhysicsConfig;

/// Everything the session needs, collapsed from the CLI.
#[derive(Debug, Clone)]
pub struct GameConfig {
    pub cols: usize,
    pub rows: usize,
    pub cell_size: f64,
    pub physics: PhysicsConfig,
    pub material: Material,
    pub lock_delay_ms: u64,
    pub sampling: SamplingMode,
    pub seed: u32,
    pub initial_level: u32,
    pub relaxed: bool,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            cols: 10,
            rows: 20,
            cell_size: 40.0,
            physics: PhysicsConfig::default(),
            material: Material::default(),
            lock_delay_ms: 500,
            sampling: SamplingMode::Particles,
            seed: 0x1234_5678,
            initial_level: 1,
            relaxed: false,
        }
    }
}

impl GameConfig {
    fn from_args(args: &Args) -> Self {
        let defaults = Self::default();
        Self {
            cols: args.cols,
            rows: args.rows,
            cell_size: args.cell_size,
            physics: PhysicsConfig {
                gravity: Vector2::new(0.0, args.gravity),
                sub_steps: args.sub_steps,
                ..defaults.physics
            },
            material: Material {
                stiffness: args.stiffness,
                damping: args.damping,
                ..defaults.material
            },
            lock_delay_ms: args.lock_delay_ms,
            sampling: if args.dense_sampling {
                SamplingMode::Springs
            } else {
                SamplingMode::Particles
            },
            seed: args.seed.unwrap_or(defaults.seed),
            initial_level: args.initial_level,
            relaxed: args.relaxed,
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    if let Some(path) = &args.log_file {
        init_logging(path, args.log_level)?;
    }
    let theme = match theme::Theme::load(args.theme.as_deref(), args.palette) {
        Ok(t) => t,
        Err(e) => {
            log::warn!("theme not loaded, using defaults: {e}");
            theme::Theme::default()
        }
    };
    let config = GameConfig::from_args(&args);
    let mut app = App::new(args, config, theme)?;
    app.run()?;
    Ok(())
}

/// The terminal belongs to the UI, so log records only go to a file.
fn init_logging(path: &std::path::Path, level: log::LevelFilter) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("cannot create log file {}", path.display()))?;
    env_logger::Builder::new()
        .filter_level(level)
        .target(env_logger::Target::Pipe(Box::new(file)))
        .try_init()
        .context("logger already initialised")?;
    Ok(())
}

/// Falling-block puzzle with soft-body pieces in the terminal.
#[derive(Debug, Parser)]
#[command(
    name = "jellytris",
    version,
    about = "Falling-block puzzle in the terminal where every piece is a wobbly mass-spring body.",
    long_about = "Jellytris is a terminal puzzle game in which each piece is a soft body: point masses \
        joined by springs, integrated with Verlet steps.\n\n\
        When the settled mass covers every column of a row, that row is cleared and only the \
        part of each body inside it is cut away; the rest keeps wobbling and falls.\n\n\
        CONTROLS (normal):\n  Left/Right  Move    Up        Rotate CW   Down       Soft drop\n  Enter/Space Hard drop   P          Pause      Q / Esc    Quit\n\n\
        CONTROLS (vim):\n  h/l         Move    k or i     Rotate CW   u          Rotate CCW\n  j           Soft drop  Space      Hard drop  p          Pause   q  Quit"
)]
pub struct Args {
    /// Game mode: endless (play until game over), timed (score in time limit), or clear40 (clear N lines).
    #[arg(short, long, default_value = "endless")]
    pub mode: GameMode,

    /// Path to theme file (btop-style theme[key]=\"value\"). Uses One Dark if not set.
    #[arg(short, long, value_name = "FILE")]
    pub theme: Option<PathBuf>,

    /// Colour palette: normal (theme), high-contrast, or colorblind.
    #[arg(long, default_value = "normal")]
    pub palette: Palette,

    /// Board width in cells.
    #[arg(long, default_value = "10", value_name = "COLS")]
    pub cols: usize,

    /// Board height in cells.
    #[arg(long, default_value = "20", value_name = "ROWS")]
    pub rows: usize,

    /// Cell edge length in world units.
    #[arg(long, default_value = "40.0", value_name = "UNITS")]
    pub cell_size: f64,

    /// Downward gravity in world units per second squared.
    #[arg(long, default_value = "500.0", value_name = "ACCEL")]
    pub gravity: f64,

    /// Physics sub-steps per frame. More sub-steps make stiff pieces steadier.
    #[arg(long, default_value = "8", value_name = "N")]
    pub sub_steps: u32,

    /// Spring stiffness of new pieces.
    #[arg(long, default_value = "3000.0", value_name = "K")]
    pub stiffness: f64,

    /// Spring damping of new pieces, applied to the relative displacement per sub-step.
    #[arg(long, default_value = "2400.0", value_name = "C")]
    pub damping: f64,

    /// Time a piece rests on the floor before it settles.
    #[arg(long, default_value = "500", value_name = "MS")]
    pub lock_delay_ms: u64,

    /// Also sample points along springs when deciding which cells are filled.
    #[arg(long)]
    pub dense_sampling: bool,

    /// Seed for the piece bag.
    #[arg(long, value_name = "N")]
    pub seed: Option<u32>,

    /// Physics frames per second (fixed time step).
    #[arg(long, default_value = "60.0", value_name = "RATE")]
    pub fps: f64,

    /// In mode 'clear40': goal lines.
    #[arg(long, default_value = "40", value_name = "N")]
    pub clear_lines: u32,

    /// In mode 'timed': time limit in seconds.
    #[arg(long, default_value = "180", value_name = "SECS")]
    pub time_limit: u32,

    /// Initial level. Affects starting fall speed when not relaxed.
    #[arg(long, default_value = "1", value_name = "N")]
    pub initial_level: u32,

    /// Relaxed mode: fall speed does not increase with level.
    #[arg(long)]
    pub relaxed: bool,

    /// Disable the line-clear flash.
    #[arg(long)]
    pub no_animation: bool,

    /// Write log records to this file.
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Log level used with --log-file (error, warn, info, debug, trace).
    #[arg(long, default_value = "info", value_name = "LEVEL")]
    pub log_level: log::LevelFilter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Palette {
    #[default]
    Normal,

    #[value(alias = "highcontrast", alias = "contrast")]
    HighContrast,

    #[value(alias = "colourblind")]
    Colorblind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum GameMode {
    #[default]
    Endless,
    Timed,
    #[value(name = "clear40")]
    Clear,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_map_into_config() {
        let args = Args::parse_from([
            "jellytris",
            "--cols",
            "12",
            "--sub-steps",
            "4",
            "--dense-sampling",
            "--seed",
            "7",
        ]);
        let config = GameConfig::from_args(&args);
        assert_eq!(config.cols, 12);
        assert_eq!(config.rows, 20);
        assert_eq!(config.physics.sub_steps, 4);
        assert_eq!(config.physics.gravity, Vector2::new(0.0, 500.0));
        assert_eq!(config.sampling, SamplingMode::Springs);
        assert_eq!(config.seed, 7);
    }

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }
}
