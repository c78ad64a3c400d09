//! CLI argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "usbasp")]
#[command(
    author,
    version,
    about = "USBasp command core bench",
    long_about = "Replays USBasp control transfers against an emulated AVR target, \
                  running the same dispatcher and streaming handlers as the firmware."
)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options of the replay command
#[derive(clap::Args, Debug, Clone)]
pub struct ReplayArgs {
    /// Transcript of control transfers, one per line
    pub transcript: PathBuf,

    /// Target and board description (TOML format)
    #[arg(short, long)]
    pub target: Option<PathBuf>,

    /// Preload the target flash with this image
    #[arg(long)]
    pub flash_image: Option<PathBuf>,

    /// Write the target flash to this file after the replay
    #[arg(long)]
    pub dump_flash: Option<PathBuf>,

    /// Write the target EEPROM to this file after the replay
    #[arg(long)]
    pub dump_eeprom: Option<PathBuf>,

    /// Do not fail when the device stalls a transfer
    #[arg(long)]
    pub allow_stalls: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Replay a transcript against the emulated target
    Replay(ReplayArgs),

    /// List vendor requests and SCK options
    Functions,
}
