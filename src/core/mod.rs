//! Core module - The library context and its summary types.

mod library;

pub use library::{AssetLibrary, KEYWORDS_FILE, PREFERENCES_FILE, THESAURUS_FILE};

use crate::archive::{ArchiveMetadata, DecoderKind, IngestStats};
use crate::search::IndexStats;

/// Snapshot of the open library
#[derive(Debug, Clone)]
pub struct LibraryStats {
    /// Persisted archive description, if one is loaded
    pub archive: Option<ArchiveMetadata>,
    /// Counters from the last successful ingest
    pub ingest: Option<IngestStats>,
    pub index: IndexStats,
    pub decoder: DecoderKind,
    /// Content handles currently alive
    pub live_handles: usize,
}
