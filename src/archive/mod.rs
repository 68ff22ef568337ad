//! Archive module - Ingests a zip of assets and serves their contents lazily
//!
//! Decompression runs on an offloaded worker when one can be started. Any
//! worker failure switches the store, once and for the rest of the session,
//! to in-process decompression over the same buffer; callers only notice
//! the latency.

mod cache;
mod catalog;
mod decoder;
mod worker;

pub use cache::{
    fingerprint, ArchiveMetadata, ArchivePersistence, ArchiveRecord, CacheStore, FileCacheStore,
    MemoryCacheStore, ARCHIVE_SLOT,
};
pub use catalog::{base_name, IngestReport, IngestStats, IngestedItem, ZipCatalog};
pub use decoder::{ArchiveDecoder, DecoderKind, InlineDecoder};
pub use worker::WorkerDecoder;

#[cfg(test)]
pub(crate) use catalog::tests::zip_of;

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::config::ArchiveConfig;
use crate::error::{Result, ShelfError};

type ContentCell = Arc<OnceCell<Arc<str>>>;

/// Owns the current archive buffer and its decoder session
pub struct AssetArchiveStore {
    extension: String,
    decoder: RwLock<Arc<dyn ArchiveDecoder>>,
    /// Serializes the switch to in-process decoding
    fallback: tokio::sync::Mutex<()>,
    /// Held for writing while the archive is swapped, for reading while a
    /// content lookup is in flight
    session: tokio::sync::RwLock<()>,
    buffer: RwLock<Option<Arc<[u8]>>>,
    contents: Mutex<HashMap<String, ContentCell>>,
    decompressions: AtomicUsize,
}

impl AssetArchiveStore {
    /// Worker-backed when configured and startable, in-process otherwise
    pub fn new(config: &ArchiveConfig) -> Self {
        if config.use_worker {
            match WorkerDecoder::spawn(&config.extension) {
                Ok(worker) => return Self::with_decoder(Arc::new(worker), &config.extension),
                Err(e) => warn!("Falling back to in-process decompression: {}", e),
            }
        }
        Self::inline(&config.extension)
    }

    pub fn inline(extension: &str) -> Self {
        Self::with_decoder(Arc::new(InlineDecoder::new(extension)), extension)
    }

    pub fn with_decoder(decoder: Arc<dyn ArchiveDecoder>, extension: &str) -> Self {
        Self {
            extension: extension.to_string(),
            decoder: RwLock::new(decoder),
            fallback: tokio::sync::Mutex::new(()),
            session: tokio::sync::RwLock::new(()),
            buffer: RwLock::new(None),
            contents: Mutex::new(HashMap::new()),
            decompressions: AtomicUsize::new(0),
        }
    }

    pub fn decoder_kind(&self) -> DecoderKind {
        self.decoder.read().kind()
    }

    /// Number of entry decompressions performed so far
    pub fn decompressions(&self) -> usize {
        self.decompressions.load(Ordering::Relaxed)
    }

    fn current_decoder(&self) -> Arc<dyn ArchiveDecoder> {
        Arc::clone(&self.decoder.read())
    }

    /// Enumerate a new archive, replacing the previous one wholesale
    pub async fn ingest(&self, buffer: Arc<[u8]>) -> Result<IngestReport> {
        let _session = self.session.write().await;
        self.contents.lock().clear();
        *self.buffer.write() = Some(Arc::clone(&buffer));

        let result = match self.current_decoder().load(Arc::clone(&buffer)).await {
            Err(ShelfError::WorkerUnavailable(reason)) => {
                let inline = self.fall_back(&reason, false).await?;
                inline.load(buffer).await
            }
            other => other,
        };

        match result {
            Ok(report) => {
                info!(
                    "Archive ingested: {} assets, {} duplicates, {} ignored",
                    report.stats.total, report.stats.duplicates, report.stats.ignored
                );
                Ok(report)
            }
            Err(e) => {
                *self.buffer.write() = None;
                Err(e)
            }
        }
    }

    /// Decompressed text of one asset, memoized; concurrent callers share one decompression.
    ///
    /// A lookup issued while an ingest is running waits for it and reads the
    /// new archive.
    pub async fn content(&self, name: &str) -> Result<Arc<str>> {
        let _session = self.session.read().await;
        let cell: ContentCell = {
            let mut contents = self.contents.lock();
            Arc::clone(contents.entry(name.to_string()).or_default())
        };

        let text = cell.get_or_try_init(|| self.decompress(name)).await?;
        Ok(Arc::clone(text))
    }

    async fn decompress(&self, name: &str) -> Result<Arc<str>> {
        self.decompressions.fetch_add(1, Ordering::Relaxed);
        debug!("Decompressing {}", name);

        let text = match self.current_decoder().content(name).await {
            Err(ShelfError::WorkerUnavailable(reason)) => {
                let inline = self.fall_back(&reason, true).await?;
                inline.content(name).await?
            }
            other => other?,
        };
        Ok(Arc::from(text))
    }

    /// Swap in the in-process decoder, reloading the current buffer if asked
    async fn fall_back(&self, reason: &str, reload: bool) -> Result<Arc<dyn ArchiveDecoder>> {
        let _guard = self.fallback.lock().await;

        let current = self.current_decoder();
        if current.kind() == DecoderKind::InProcess {
            return Ok(current);
        }

        warn!("Archive worker failed ({}); decompressing in-process from now on", reason);
        let inline: Arc<dyn ArchiveDecoder> = Arc::new(InlineDecoder::new(&self.extension));
        if reload {
            let buffer = self.buffer.read().clone();
            if let Some(buffer) = buffer {
                inline.load(buffer).await?;
            }
        }
        *self.decoder.write() = Arc::clone(&inline);
        Ok(inline)
    }

    /// Forget the loaded archive and all memoized contents
    pub async fn reset(&self) {
        let _session = self.session.write().await;
        self.contents.lock().clear();
        *self.buffer.write() = None;
        if let Err(e) = self.current_decoder().reset().await {
            debug!("Decoder reset failed: {}", e);
        }
    }
}
