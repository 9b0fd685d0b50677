mod catalog;
mod cli;
mod config;
mod download;
mod error;
mod fetcher;
mod logging;

use anyhow::{Error, Result};
use clap::Parser;
use cli::{command, Cli, Commands};

#[tokio::main]
async fn main() -> Result<(), Error> {
    logging::init_logging()?;
    let cli = Cli::parse();

    let result = match &cli.command {
        Commands::Download { selection, output } => command::download(selection, output).await,
        Commands::List { selection } => command::list(selection).await,
    };

    match result {
        Ok(message) => println!("{}", message),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }

    Ok(())
}
