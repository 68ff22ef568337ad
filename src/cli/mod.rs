//! CLI module - Command line interface definitions and handlers

pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::search::{FilterMode, SortMode};

/// Logo Shelf - Searchable library of vector logos from a zip archive
///
/// Imports an archive once, keeps it cached, and answers synonym-aware
/// searches over file names and keyword metadata.
#[derive(Parser, Debug)]
#[command(name = "logo-shelf")]
#[command(author = "Ryan Cashmoney <tunclon@proton.me>")]
#[command(version)]
#[command(about = "Searchable logo library backed by a zip archive", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbose output
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Config file (default: platform config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Data directory for the archive cache and preferences
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Decompress in-process instead of on a worker thread
    #[arg(long, global = true)]
    pub no_worker: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Import a zip archive, replacing the cached one
    Import(ImportArgs),

    /// Search the cached archive
    Search(SearchArgs),

    /// Print the contents of one asset
    Show(ShowArgs),

    /// Mark or unmark a favorite
    Favorite(FavoriteArgs),

    /// Summary of the cached archive and index
    Stats(StatsArgs),

    /// Show or generate configuration
    Config(ConfigArgs),
}

#[derive(Debug, Clone, Parser)]
pub struct ImportArgs {
    /// Path to the zip archive
    #[arg(required = true)]
    pub archive: PathBuf,

    /// Keyword metadata to install alongside (JSON)
    #[arg(long, short)]
    pub keywords: Option<PathBuf>,

    /// Synonym thesaurus to install alongside (JSON)
    #[arg(long, short)]
    pub thesaurus: Option<PathBuf>,
}

#[derive(Debug, Clone, Parser)]
pub struct SearchArgs {
    /// Query text; empty lists everything
    pub query: Vec<String>,

    /// Keyword presence filter
    #[arg(long, short, value_enum, default_value = "any")]
    pub filter: FilterArg,

    /// Order for ties and for the empty query
    #[arg(long, short, value_enum, default_value = "name")]
    pub sort: SortArg,

    /// Maximum results to print (0 = all)
    #[arg(long, short, default_value = "50")]
    pub limit: usize,

    /// Output format
    #[arg(long, value_enum, default_value = "human")]
    pub output: OutputFormat,
}

impl SearchArgs {
    pub fn query_text(&self) -> String {
        self.query.join(" ")
    }
}

#[derive(Debug, Clone, Parser)]
pub struct ShowArgs {
    /// Asset file name, e.g. Acme.svg
    #[arg(required = true)]
    pub name: String,

    /// Print the archive entry as stored instead of the insert-ready markup
    #[arg(long, short)]
    pub raw: bool,

    /// Count the view as a use (affects --sort recent)
    #[arg(long)]
    pub mark_used: bool,
}

#[derive(Debug, Clone, Parser)]
pub struct FavoriteArgs {
    /// Asset file name
    #[arg(required = true)]
    pub name: String,

    /// Remove from favorites instead of toggling
    #[arg(long, conflicts_with = "on")]
    pub off: bool,

    /// Add to favorites instead of toggling
    #[arg(long)]
    pub on: bool,
}

#[derive(Debug, Clone, Parser)]
pub struct StatsArgs {
    /// Output format
    #[arg(long, value_enum, default_value = "human")]
    pub output: OutputFormat,
}

#[derive(Debug, Clone, Parser)]
pub struct ConfigArgs {
    /// Print a commented sample config
    #[arg(long)]
    pub sample: bool,

    /// Write the current config to the default path
    #[arg(long)]
    pub init: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human readable (default)
    Human,
    /// JSON output
    Json,
}

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum FilterArg {
    /// All assets
    #[default]
    Any,
    /// Only assets with keyword metadata
    With,
    /// Only assets without keyword metadata
    Without,
}

impl From<FilterArg> for FilterMode {
    fn from(arg: FilterArg) -> Self {
        match arg {
            FilterArg::Any => FilterMode::Any,
            FilterArg::With => FilterMode::WithKeywords,
            FilterArg::Without => FilterMode::WithoutKeywords,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum SortArg {
    /// Alphabetical
    #[default]
    Name,
    /// Most recently used first
    Recent,
    /// Favorites first
    Favorites,
}

impl From<SortArg> for SortMode {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Name => SortMode::Name,
            SortArg::Recent => SortMode::Recent,
            SortArg::Favorites => SortMode::Favorites,
        }
    }
}
