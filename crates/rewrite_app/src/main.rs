mod cli;
mod commands;
mod logging;
mod settings;

use clap::Parser;
use log::LevelFilter;

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();
    if let Some(destination) = cli.log.destination() {
        let level = if cli.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        };
        logging::initialize(destination, level);
    }

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(commands::run(cli))
}
