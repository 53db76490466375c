// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "camera-swap")]
#[command(about = "Camera interception engine: simulate a host and manage settings")]
#[command(version = env!("GIT_VERSION"))]
struct Cli {
    /// Log engine internals at debug level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Camera API generation to drive
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ApiArg {
    Legacy,
    Modern,
}

#[derive(Subcommand)]
enum Commands {
    /// Drive a simulated camera app against the synthetic renderer
    Simulate {
        /// Camera API generation the simulated app uses
        #[arg(short, long, value_enum, default_value = "legacy")]
        api: ApiArg,

        /// Replacement media file (default: the media id from the settings)
        #[arg(short, long)]
        media: Option<PathBuf>,

        /// How long to preview, in seconds
        #[arg(short, long, default_value = "3")]
        duration: u64,

        /// Frames per second of the synthetic renderer
        #[arg(long, default_value = "30")]
        fps: u32,

        /// Preview width reported for the app's targets
        #[arg(long, default_value = "1280")]
        width: u32,

        /// Preview height reported for the app's targets
        #[arg(long, default_value = "720")]
        height: u32,

        /// Where to write the final still capture (default: ~/Pictures/camera-swap/capture_TIMESTAMP.jpg)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Inspect or edit the settings file
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Print the current settings as JSON
    Show,

    /// Print the settings file location
    Path,

    /// Change one setting
    Set {
        /// Setting name, e.g. enabled, media_id, param_throttle_ms
        key: String,

        /// New value; "none" clears media_id
        value: String,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    camera_swap::logging::init(cli.verbose);

    match cli.command {
        Commands::Simulate {
            api,
            media,
            duration,
            fps,
            width,
            height,
            output,
        } => cli::simulate(cli::SimulateOptions {
            api,
            media,
            duration,
            fps,
            width,
            height,
            output,
        }),
        Commands::Settings { action } => match action {
            SettingsAction::Show => cli::show_settings(),
            SettingsAction::Path => cli::settings_path(),
            SettingsAction::Set { key, value } => cli::set_setting(&key, &value),
        },
    }
}
