// SPDX-License-Identifier: GPL-3.0-only

use clap::{Args, Parser, Subcommand};
use depth_plane::constants::{APP_NAME, LOG_FILE_NAME};
use depth_plane::errors::AppResult;
use depth_plane::{Config, Roi, SourceKind, YRotationSource};
use std::path::PathBuf;
use std::process::ExitCode;

mod cli;

#[derive(Parser)]
#[command(name = "depth-plane")]
#[command(about = "Measure the orientation of a planar surface seen by a depth sensor")]
#[command(version = env!("GIT_VERSION"))]
#[command(subcommand_required = false)]
struct Cli {
    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Options applied on top of the config file
#[derive(Args)]
struct Overrides {
    /// Config file (default: ~/.config/depth-plane/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Frame source
    #[arg(long, global = true, value_enum)]
    source: Option<SourceKind>,

    /// Directory of recorded depth frames (implies --source images)
    #[arg(long, global = true)]
    input: Option<PathBuf>,

    /// Restart recorded frames when they run out
    #[arg(long = "loop", global = true)]
    loop_playback: bool,

    /// Region of interest as x,y,width,height
    #[arg(long, global = true)]
    roi: Option<Roi>,

    /// Tilt of the synthetic plane about the vertical axis, in degrees
    #[arg(long, global = true, allow_negative_numbers = true)]
    tilt: Option<f64>,

    /// Normal used for the Y-rotation readout
    #[arg(long, global = true, value_enum)]
    y_rotation: Option<YRotationSource>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run in terminal mode (renders frames and angles to the terminal)
    Terminal,

    /// Run without a display, printing one line per frame
    Run {
        /// Stop after this many frames
        #[arg(short = 'n', long, value_parser = clap::value_parser!(u64).range(1..))]
        frames: Option<u64>,

        /// Print each frame report as a JSON line
        #[arg(long)]
        json: bool,
    },

    /// Analyse a single recorded depth frame (16-bit PNG or raw .z16)
    Analyze {
        /// Depth frame to analyse
        file: PathBuf,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration
    Config {
        /// Write it to the config file instead
        #[arg(long)]
        write: bool,
    },
}

impl Overrides {
    fn config_path(&self) -> Option<PathBuf> {
        self.config.clone().or_else(Config::default_path)
    }

    fn load(&self) -> AppResult<Config> {
        let mut config = match self.config_path() {
            Some(path) => Config::load(&path)?,
            None => Config::default(),
        };

        if let Some(input) = &self.input {
            config.input_dir = Some(input.clone());
            config.source = SourceKind::Images;
        }
        if let Some(source) = self.source {
            config.source = source;
        }
        if self.loop_playback {
            config.loop_playback = true;
        }
        if let Some(roi) = self.roi {
            config.roi = roi;
        }
        if let Some(tilt) = self.tilt {
            config.synthetic.tilt_y_deg = tilt;
        }
        if let Some(y_rotation) = self.y_rotation {
            config.y_rotation = y_rotation;
        }
        Ok(config)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let terminal_mode = matches!(cli.command, None | Some(Commands::Terminal));
    init_logging(terminal_mode);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> AppResult<()> {
    let config = cli.overrides.load()?;

    match cli.command {
        None | Some(Commands::Terminal) => {
            config.validate()?;
            depth_plane::terminal::run(&config)
        }
        Some(Commands::Run { frames, json }) => {
            config.validate()?;
            cli::run_headless(&config, frames, json).map(|_| ())
        }
        Some(Commands::Analyze { file, json }) => cli::analyze(&config, &file, json),
        Some(Commands::Config { write }) => {
            config.validate()?;
            cli::show_config(&config, cli.overrides.config_path().as_deref(), write)
        }
    }
}

/// Initialize logging
///
/// Set RUST_LOG environment variable to control log level
/// Examples: RUST_LOG=debug, RUST_LOG=depth_plane=trace, RUST_LOG=info
///
/// The terminal viewer owns stdout, so its logs go to a file in the cache
/// folder instead.
fn init_logging(terminal_mode: bool) {
    let default_level = if terminal_mode { "warn" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    if terminal_mode {
        let log_file = dirs::cache_dir()
            .map(|dir| dir.join(APP_NAME))
            .and_then(|dir| {
                std::fs::create_dir_all(&dir).ok()?;
                std::fs::File::create(dir.join(LOG_FILE_NAME)).ok()
            });

        match log_file {
            Some(file) => tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::sync::Mutex::new(file))
                .with_ansi(false)
                .with_target(true)
                .with_level(true)
                .init(),
            None => tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::sink)
                .init(),
        }
        return;
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_options_parse_after_subcommand() {
        let cli = Cli::try_parse_from([
            "depth-plane",
            "run",
            "--frames",
            "5",
            "--roi",
            "10,20,30,40",
            "--tilt",
            "-15",
            "--y-rotation",
            "fitted",
        ])
        .unwrap();

        assert_eq!(cli.overrides.roi, Some(Roi::new(10, 20, 30, 40)));
        assert_eq!(cli.overrides.tilt, Some(-15.0));
        assert_eq!(cli.overrides.y_rotation, Some(YRotationSource::Fitted));
        assert!(matches!(
            cli.command,
            Some(Commands::Run {
                frames: Some(5),
                json: false
            })
        ));
    }

    #[test]
    fn test_input_implies_image_source() {
        let cli = Cli::try_parse_from([
            "depth-plane",
            "--config",
            "/nonexistent/depth-plane.json",
            "--input",
            "/tmp/frames",
        ])
        .unwrap();
        let config = cli.overrides.load().unwrap();
        assert_eq!(config.source, SourceKind::Images);
        assert_eq!(config.input_dir, Some(PathBuf::from("/tmp/frames")));
    }

    #[test]
    fn test_zero_frame_limit_is_rejected() {
        assert!(Cli::try_parse_from(["depth-plane", "run", "--frames", "0"]).is_err());
        assert!(Cli::try_parse_from(["depth-plane", "run", "-n", "1"]).is_ok());
    }

    #[test]
    fn test_bad_roi_is_a_parse_error() {
        assert!(Cli::try_parse_from(["depth-plane", "--roi", "1,2,3"]).is_err());
    }
}
