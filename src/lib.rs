//! Logo Shelf Library
//!
//! Searchable library of vector logos shipped as a single zip archive.
//! Imports the archive once, persists it, and answers synonym-aware
//! searches over file names and keyword metadata.
//!
//! # Features
//!
//! - **Lazy Decompression**: Entries are inflated on first use, on a worker
//!   thread when one is available and in-process otherwise
//! - **Prefix Index**: Per-keystroke queries with synonym expansion and a
//!   bounded result cache
//! - **Incremental Rendering**: Result tiles arrive in frame-paced batches and
//!   a newer query cancels the older pass
//! - **Serialized Insertion**: One FIFO queue in front of the host document,
//!   with cascading placement
//!
//! # Example
//!
//! ```no_run
//! use logo_shelf::{AssetLibrary, Config, FilterMode, SortMode};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let library = AssetLibrary::open(Config::load());
//!     library.import(std::fs::read("logos.zip")?, "logos.zip").await?;
//!
//!     let hits = library.search("blue bird", FilterMode::Any, SortMode::Name);
//!     println!("Found {} logos", hits.len());
//!     Ok(())
//! }
//! ```

pub mod archive;
pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod insert;
pub mod render;
pub mod search;

// Re-export commonly used types
pub use archive::{
    ArchiveMetadata, ArchivePersistence, AssetArchiveStore, CacheStore, DecoderKind,
    FileCacheStore, IngestReport, IngestStats, MemoryCacheStore,
};
pub use config::Config;
pub use core::{AssetLibrary, LibraryStats};
pub use error::{Result, ShelfError};
pub use insert::{Bounds, HostDocument, InsertReceipt, InsertionCoordinator};
pub use render::{ContentHandle, Hydrator, RenderOutcome, RenderScheduler, ResultView, Tile};
pub use search::{
    Asset, FilterMode, KeywordMap, PreferenceStore, SearchHit, SearchIndex, SortMode, Thesaurus,
};
