//! Command handlers - Drive an [`AssetLibrary`] from the command line

use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use colored::Colorize;
use parking_lot::Mutex;
use serde::Serialize;

use crate::cli::{
    ConfigArgs, FavoriteArgs, ImportArgs, OutputFormat, SearchArgs, ShowArgs, StatsArgs,
};
use crate::config::{generate_sample_config, Config};
use crate::core::{AssetLibrary, KEYWORDS_FILE, THESAURUS_FILE};
use crate::insert::normalize_svg;
use crate::render::{ContentHandle, RenderScheduler, ResultView, Tile, YieldClock};
use crate::search::{Asset, KeywordMap, SearchHit, Thesaurus};

/// Install optional metadata, then ingest and cache the archive
pub async fn import(config: Config, args: &ImportArgs) -> Result<()> {
    let data_dir = config.data_dir();
    fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create {}", data_dir.display()))?;

    if let Some(ref path) = args.thesaurus {
        let thesaurus = Thesaurus::load(path)
            .with_context(|| format!("Invalid thesaurus: {}", path.display()))?;
        install(path, &data_dir.join(THESAURUS_FILE))?;
        println!("  {} thesaurus: {} terms", "✓".green(), thesaurus.len());
    }
    if let Some(ref path) = args.keywords {
        let keywords = KeywordMap::load(path)
            .with_context(|| format!("Invalid keywords: {}", path.display()))?;
        install(path, &data_dir.join(KEYWORDS_FILE))?;
        println!("  {} keywords: {} files", "✓".green(), keywords.len());
    }

    let buffer = fs::read(&args.archive)
        .with_context(|| format!("Failed to read {}", args.archive.display()))?;
    let archive_name = args
        .archive
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| args.archive.display().to_string());

    let library = AssetLibrary::open(config);
    let report = library.import(buffer, &archive_name).await?;

    println!(
        "{} Imported {} ({} assets, {} duplicates skipped, {} other entries ignored)",
        "✓".bright_green().bold(),
        archive_name.cyan(),
        report.stats.total,
        report.stats.duplicates,
        report.stats.ignored
    );
    Ok(())
}

fn install(from: &Path, to: &Path) -> Result<()> {
    fs::copy(from, to)
        .with_context(|| format!("Failed to copy {} to {}", from.display(), to.display()))?;
    Ok(())
}

async fn restored(config: Config) -> Result<AssetLibrary> {
    let library = AssetLibrary::open(config);
    if library.restore().await?.is_none() {
        bail!("No archive imported yet; run `logo-shelf import <archive.zip>` first");
    }
    Ok(library)
}

/// Prints tiles as they are materialized
struct TerminalView {
    query: String,
}

impl ResultView for TerminalView {
    fn begin(&mut self, _generation: u64, total: usize) {
        if total == 0 {
            println!("No logos match {:?}", self.query);
        }
    }

    fn append(&mut self, _generation: u64, tiles: Vec<Tile>) {
        for tile in tiles {
            print_asset(tile.asset());
        }
    }

    fn finish(&mut self, _generation: u64) {}

    fn hydrated(&mut self, _asset: &Asset, _handle: ContentHandle) {}
}

fn print_asset(asset: &Asset) {
    let star = if asset.is_favorite { "★".yellow() } else { " ".normal() };
    let keywords = if asset.has_keywords {
        asset.keywords.join(", ").dimmed().to_string()
    } else {
        String::new()
    };
    println!("{} {:<40} {}", star, asset.name.bold(), keywords);
}

#[derive(Serialize)]
struct JsonHit<'a> {
    name: &'a str,
    score: u32,
    favorite: bool,
    keywords: &'a [String],
}

pub async fn search(config: Config, args: &SearchArgs) -> Result<()> {
    let render = config.render.clone();
    let library = restored(config).await?;
    let query = args.query_text();

    let hits = library.search(&query, args.filter.into(), args.sort.into());
    let total = hits.len();
    let shown: Arc<[SearchHit]> = if args.limit > 0 && total > args.limit {
        hits[..args.limit].into()
    } else {
        hits
    };

    match args.output {
        OutputFormat::Json => {
            let rows: Vec<JsonHit> = shown
                .iter()
                .map(|hit| JsonHit {
                    name: &hit.asset.name,
                    score: hit.score,
                    favorite: hit.asset.is_favorite,
                    keywords: &hit.asset.keywords,
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        OutputFormat::Human => {
            let view = Arc::new(Mutex::new(TerminalView { query }));
            let scheduler = RenderScheduler::new(
                view,
                Arc::clone(library.hydrator()),
                Arc::new(YieldClock),
                &render,
            );
            scheduler.render(Arc::clone(&shown)).await;
            if shown.len() < total {
                println!("{}", format!("... {} more", total - shown.len()).dimmed());
            }
        }
    }
    Ok(())
}

pub async fn show(config: Config, args: &ShowArgs) -> Result<()> {
    let library = restored(config).await?;
    let content = library.content(&args.name).await?;

    if args.raw {
        println!("{}", content);
    } else {
        println!("{}", normalize_svg(&content));
    }
    if args.mark_used {
        library.mark_used(&args.name);
    }
    Ok(())
}

pub async fn favorite(config: Config, args: &FavoriteArgs) -> Result<()> {
    let library = restored(config).await?;
    if library.find(&args.name).is_none() {
        bail!("No asset named {:?} in the archive", args.name);
    }

    let favorite = if args.on {
        library.set_favorite(&args.name, true);
        true
    } else if args.off {
        library.set_favorite(&args.name, false);
        false
    } else {
        library.toggle_favorite(&args.name)
    };

    if favorite {
        println!("{} {} added to favorites", "★".yellow(), args.name.bold());
    } else {
        println!("  {} removed from favorites", args.name.bold());
    }
    Ok(())
}

pub async fn stats(config: Config, args: &StatsArgs) -> Result<()> {
    let library = AssetLibrary::open(config);
    library.restore().await?;
    let stats = library.stats();

    if let OutputFormat::Json = args.output {
        let json = serde_json::json!({
            "archive": stats.archive,
            "ingest": stats.ingest,
            "index": stats.index,
            "decoder": format!("{:?}", stats.decoder),
        });
        println!("{}", serde_json::to_string_pretty(&json)?);
        return Ok(());
    }

    println!("{}", "Logo Shelf".bright_cyan().bold());
    match stats.archive {
        Some(ref archive) => {
            println!("  Archive:     {}", archive.name.cyan());
            println!(
                "  Size:        {}",
                humansize::format_size(archive.size, humansize::BINARY)
            );
            println!(
                "  Imported:    {}",
                archive.updated_at.format("%Y-%m-%d %H:%M:%S UTC")
            );
            println!("  Fingerprint: {}", archive.fingerprint.dimmed());
        }
        None => println!("  Archive:     {}", "none".dimmed()),
    }
    if let Some(ingest) = stats.ingest {
        println!(
            "  Entries:     {} ({} duplicates, {} ignored)",
            ingest.total, ingest.duplicates, ingest.ignored
        );
    }
    println!(
        "  Indexed:     {} assets, {} with keywords, {} favorites",
        stats.index.assets, stats.index.with_keywords, stats.index.favorites
    );
    println!("  Prefixes:    {}", stats.index.prefixes);
    println!("  Decoder:     {:?}", stats.decoder);
    Ok(())
}

pub fn config(config: &Config, path: &Path, args: &ConfigArgs) -> Result<()> {
    if args.sample {
        print!("{}", generate_sample_config());
        return Ok(());
    }
    if args.init {
        config.save_to(path)?;
        println!("{} Wrote {}", "✓".green(), path.display());
        return Ok(());
    }

    println!("# {}", path.display());
    print!("{}", toml::to_string_pretty(config)?);
    Ok(())
}
