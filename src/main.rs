//! Logo Shelf - Searchable logo library backed by a zip archive
//!
//! Imports an archive of vector logos, caches it, and serves synonym-aware
//! search over names and keywords from the command line.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use logo_shelf::cli::{commands, Cli, Commands};
use logo_shelf::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose { "logo_shelf=debug" } else { "logo_shelf=info" };
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).compact())
        .with(EnvFilter::from_default_env().add_directive(level.parse()?))
        .init();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let mut config = match cli.config {
        Some(ref path) => Config::load_from(path)?,
        None => Config::load(),
    };
    if let Some(ref dir) = cli.data_dir {
        config.archive.cache_dir = Some(dir.clone());
    }
    if cli.no_worker {
        config.archive.use_worker = false;
    }

    match cli.command {
        Commands::Import(args) => commands::import(config, &args).await?,
        Commands::Search(args) => commands::search(config, &args).await?,
        Commands::Show(args) => commands::show(config, &args).await?,
        Commands::Favorite(args) => commands::favorite(config, &args).await?,
        Commands::Stats(args) => commands::stats(config, &args).await?,
        Commands::Config(args) => commands::config(&config, &config_path, &args)?,
    }

    Ok(())
}
