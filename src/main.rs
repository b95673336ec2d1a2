use std::{process::ExitCode, sync::Arc};

use clap::Parser;
use log::{error, info};

use linknotes::{App, Cli, Commands, Config, EventBus, FileNoteStore, Result};

pub fn initialize_logger(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp_secs()
        .format_module_path(true)
        .init();

    info!("Logger initialized");
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(notes_dir) = cli.notes_dir {
        config.notes_dir = notes_dir;
    }
    if let Some(app_data_dir) = cli.app_data_dir {
        config.app_data_dir = app_data_dir;
    }

    let bus = EventBus::default();
    let mut storage = FileNoteStore::new(&config);
    storage.initialize()?;
    if matches!(cli.command, Commands::Watch { .. }) {
        storage.watch(bus.clone())?;
    }

    let app = App::new(Arc::new(storage), bus, config, cli.config, cli.verbose);
    app.run(cli.command).await
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    initialize_logger(cli.verbose);

    info!("Application starting up");
    match run(cli).await {
        Ok(()) => {
            info!("Application shutting down");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            eprintln!("{} {}", console::style("error:").red().bold(), e);
            ExitCode::FAILURE
        }
    }
}
