//! AssetLibrary - The owned context tying archive, index and preferences together
//!
//! One instance per open library; tests build as many as they like. Every
//! archive load replaces the asset list and its index in one step.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use tracing::{info, warn};

use super::LibraryStats;
use crate::archive::{
    ArchiveMetadata, ArchivePersistence, AssetArchiveStore, CacheStore, FileCacheStore,
    IngestReport, IngestStats, IngestedItem,
};
use crate::config::Config;
use crate::error::{Result, ShelfError};
use crate::insert::{InsertReceipt, InsertionCoordinator};
use crate::render::Hydrator;
use crate::search::{
    Asset, FilterMode, KeywordMap, PreferenceStore, SearchHit, SearchIndex, SortMode, Thesaurus,
};

/// File names looked up in the data directory by [`AssetLibrary::open`]
pub const THESAURUS_FILE: &str = "wordnet-synonyms.json";
pub const KEYWORDS_FILE: &str = "keywords.json";
pub const PREFERENCES_FILE: &str = "preferences.json";

pub struct AssetLibrary {
    config: Config,
    store: Arc<AssetArchiveStore>,
    persistence: ArchivePersistence,
    hydrator: Arc<Hydrator>,
    thesaurus: Arc<Thesaurus>,
    keywords: RwLock<KeywordMap>,
    prefs: Mutex<PreferenceStore>,
    items: RwLock<Vec<IngestedItem>>,
    index: RwLock<SearchIndex>,
    metadata: RwLock<Option<ArchiveMetadata>>,
    ingest_stats: RwLock<Option<IngestStats>>,
    /// One import or restore at a time, from ingest through persistence
    loading: tokio::sync::Mutex<()>,
}

impl AssetLibrary {
    pub fn new(
        config: Config,
        cache: Arc<dyn CacheStore>,
        prefs: PreferenceStore,
        thesaurus: Thesaurus,
        keywords: KeywordMap,
    ) -> Self {
        let store = Arc::new(AssetArchiveStore::new(&config.archive));
        let thesaurus = Arc::new(thesaurus);
        Self {
            hydrator: Arc::new(Hydrator::new(Arc::clone(&store))),
            index: RwLock::new(SearchIndex::empty(Arc::clone(&thesaurus), config.search.clone())),
            persistence: ArchivePersistence::new(cache),
            store,
            thesaurus,
            keywords: RwLock::new(keywords),
            prefs: Mutex::new(prefs),
            items: RwLock::new(Vec::new()),
            metadata: RwLock::new(None),
            ingest_stats: RwLock::new(None),
            loading: tokio::sync::Mutex::new(()),
            config,
        }
    }

    /// Library backed by files in `config.data_dir()`
    pub fn open(config: Config) -> Self {
        let dir = config.data_dir();
        let thesaurus = load_optional(&dir.join(THESAURUS_FILE), Thesaurus::load);
        let keywords = load_optional(&dir.join(KEYWORDS_FILE), KeywordMap::load);
        let prefs = PreferenceStore::open(&dir.join(PREFERENCES_FILE));
        let cache: Arc<dyn CacheStore> = Arc::new(FileCacheStore::new(&dir));

        info!(
            "Library at {} ({} synonyms, {} keyword entries)",
            dir.display(),
            thesaurus.len(),
            keywords.len()
        );
        Self::new(config, cache, prefs, thesaurus, keywords)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &Arc<AssetArchiveStore> {
        &self.store
    }

    pub fn hydrator(&self) -> &Arc<Hydrator> {
        &self.hydrator
    }

    /// Ingest a freshly imported archive and persist it for next time
    pub async fn import(&self, buffer: Vec<u8>, archive_name: &str) -> Result<IngestReport> {
        let buffer: Arc<[u8]> = buffer.into();
        let _loading = self.loading.lock().await;
        let report = self.load(Arc::clone(&buffer)).await?;

        let metadata = ArchiveMetadata::describe(archive_name, &buffer, report.stats.total);
        self.persistence.persist(&buffer, metadata.clone()).await;
        *self.metadata.write() = Some(metadata);
        Ok(report)
    }

    /// Reload the persisted archive, if any
    pub async fn restore(&self) -> Result<Option<ArchiveMetadata>> {
        let _loading = self.loading.lock().await;
        let Some(record) = self.persistence.read().await else {
            return Ok(None);
        };
        self.load(record.buffer.into()).await?;
        *self.metadata.write() = Some(record.metadata.clone());
        Ok(Some(record.metadata))
    }

    async fn load(&self, buffer: Arc<[u8]>) -> Result<IngestReport> {
        match self.store.ingest(buffer).await {
            Ok(report) => {
                self.replace(report.items.clone());
                *self.ingest_stats.write() = Some(report.stats);
                Ok(report)
            }
            Err(e) => {
                warn!("Archive load failed: {}", e);
                self.replace(Vec::new());
                *self.ingest_stats.write() = None;
                *self.metadata.write() = None;
                Err(e)
            }
        }
    }

    /// Swap in a new asset generation; hydrated content of the old one is released
    fn replace(&self, items: Vec<IngestedItem>) {
        let index = self.build_index(&items);
        *self.items.write() = items;
        *self.index.write() = index;
        self.hydrator.release_all();
    }

    fn build_index(&self, items: &[IngestedItem]) -> SearchIndex {
        let keywords = self.keywords.read();
        let prefs = self.prefs.lock();
        let assets = items
            .iter()
            .enumerate()
            .map(|(id, item)| {
                let mut asset = Asset::new(id, &item.name, keywords.keywords_for(&item.name).to_vec());
                asset.is_favorite = prefs.is_favorite(&item.name);
                asset.last_used_at = prefs.last_used(&item.name);
                asset
            })
            .collect();
        SearchIndex::build(assets, Arc::clone(&self.thesaurus), self.config.search.clone())
    }

    /// Replace keyword metadata and rebuild the index over the same archive
    pub fn set_keywords(&self, keywords: KeywordMap) {
        *self.keywords.write() = keywords;
        let items = self.items.read().clone();
        self.replace(items);
    }

    pub fn search(&self, query: &str, filter: FilterMode, sort: SortMode) -> Arc<[SearchHit]> {
        self.index.read().query(query, filter, sort)
    }

    pub fn find(&self, name: &str) -> Option<Arc<Asset>> {
        self.index.read().find(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.index.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.read().is_empty()
    }

    /// Raw text of one asset
    pub async fn content(&self, name: &str) -> Result<Arc<str>> {
        self.store.content(name).await
    }

    pub fn set_favorite(&self, name: &str, favorite: bool) -> bool {
        self.prefs.lock().set_favorite(name, favorite);
        self.index.write().set_favorite(name, favorite)
    }

    /// Flip the favorite flag; returns the new state
    pub fn toggle_favorite(&self, name: &str) -> bool {
        let favorite = !self.prefs.lock().is_favorite(name);
        self.set_favorite(name, favorite);
        favorite
    }

    pub fn mark_used(&self, name: &str) {
        let now = Utc::now();
        self.prefs.lock().mark_used(name, now);
        self.index.write().set_last_used(name, now);
    }

    /// Queue an insert of `name`; success counts as a use
    pub async fn insert(
        &self,
        coordinator: &InsertionCoordinator,
        name: &str,
    ) -> Result<InsertReceipt> {
        let asset = self
            .find(name)
            .ok_or_else(|| ShelfError::NotFound(name.to_string()))?;
        let receipt = coordinator.insert(asset).await?;
        self.mark_used(name);
        Ok(receipt)
    }

    pub fn stats(&self) -> LibraryStats {
        LibraryStats {
            archive: self.metadata.read().clone(),
            ingest: *self.ingest_stats.read(),
            index: self.index.read().stats(),
            decoder: self.store.decoder_kind(),
            live_handles: self.hydrator.live_handles(),
        }
    }
}

fn load_optional<T: Default>(path: &Path, load: impl FnOnce(&Path) -> Result<T>) -> T {
    if !path.exists() {
        return T::default();
    }
    load(path).unwrap_or_else(|e| {
        warn!("Ignoring {}: {}", path.display(), e);
        T::default()
    })
}
