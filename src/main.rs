//! usbasp - bench for the USBasp command core
//!
//! Runs the firmware's command dispatcher and streaming handlers against an
//! emulated AVR target. A transcript of control transfers is fed through a
//! loopback transport that chunks data stages the way the USB driver does,
//! and the replies are printed as they come back.

mod cli;
mod commands;
mod config;
mod error;
mod script;

use clap::Parser;
use cli::{Cli, Commands};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logger, RUST_LOG still wins over -v
    let default_filter = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    match cli.command {
        Commands::Replay(args) => commands::run_replay(&args)?,
        Commands::Functions => commands::list_functions(),
    }

    Ok(())
}
