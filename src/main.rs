mod api;
mod cli;
mod console;
mod format;
mod model;
mod orchestrator;
mod preferences;
mod projector;
mod text_summary;
mod transport;
mod validate;

#[cfg(test)]
mod testing;

use anyhow::Result;
use clap::Parser;
use env_logger::Env;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn"))
        .format_timestamp(None)
        .init();

    let args = cli::Cli::parse();
    cli::run(args).await
}
