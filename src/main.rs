use clap::Parser;
use tracing_subscriber::EnvFilter;

mod app;
mod cli;
mod collector;
mod config;
mod db;
mod error;
mod growth;
mod import;
mod models;
mod monitor;
mod report;
mod services;

use app::App;
use cli::Cli;
use config::Config;
use error::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let app = App::new(config).await?;
    app.run(cli.command).await
}
