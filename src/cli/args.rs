use std::path::PathBuf;

use clap::Parser;

use crate::Commands;

/// Main CLI application arguments and command structure
#[derive(Parser, Debug)]
#[clap(
    version,
    about = "Notes with attached links, fed from the clipboard"
)]
pub struct Cli {
    /// Path to the configuration file
    #[clap(short = 'c', long, value_parser)]
    pub config: Option<PathBuf>,

    /// Path to the notes directory
    #[clap(long, value_parser)]
    pub notes_dir: Option<PathBuf>,

    /// Directory for sidebar state
    #[clap(long, value_parser)]
    pub app_data_dir: Option<PathBuf>,

    /// Verbose output mode
    #[clap(short, long)]
    pub verbose: bool,

    /// Subcommands for the linknotes application
    #[clap(subcommand)]
    pub command: Commands,
}
