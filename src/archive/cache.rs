//! Persistent archive slot - one named record holding the last imported buffer.
//!
//! Later writes overwrite earlier ones. `ArchivePersistence` never lets a
//! storage failure reach its caller: writes become best-effort and failed
//! reads look like an empty slot.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Result, ShelfError};

/// Slot name used by the library
pub const ARCHIVE_SLOT: &str = "archive";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveMetadata {
    /// Original archive file name
    pub name: String,
    /// Buffer size in bytes
    pub size: u64,
    /// Assets accepted at ingest
    pub count: usize,
    pub updated_at: DateTime<Utc>,
    /// Short blake3 of the buffer
    pub fingerprint: String,
}

impl ArchiveMetadata {
    pub fn describe(name: impl Into<String>, buffer: &[u8], count: usize) -> Self {
        Self {
            name: name.into(),
            size: buffer.len() as u64,
            count,
            updated_at: Utc::now(),
            fingerprint: fingerprint(buffer),
        }
    }
}

/// 16 hex chars of blake3, enough to tell archives apart
pub fn fingerprint(buffer: &[u8]) -> String {
    hex::encode(&blake3::hash(buffer).as_bytes()[..8])
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveRecord {
    pub buffer: Vec<u8>,
    pub metadata: ArchiveMetadata,
}

/// Durable key/value slots
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, slot: &str) -> Result<Option<ArchiveRecord>>;
    async fn put(&self, slot: &str, record: ArchiveRecord) -> Result<()>;
}

/// One bincode file per slot under a directory
pub struct FileCacheStore {
    dir: PathBuf,
}

impl FileCacheStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn slot_path(&self, slot: &str) -> PathBuf {
        self.dir.join(format!("{slot}.bin"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl CacheStore for FileCacheStore {
    async fn get(&self, slot: &str) -> Result<Option<ArchiveRecord>> {
        let path = self.slot_path(slot);
        let data = match tokio::fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ShelfError::StorageUnavailable(e.to_string())),
        };
        let record: ArchiveRecord = tokio::task::spawn_blocking(move || bincode::deserialize(&data))
            .await
            .map_err(|e| ShelfError::StorageUnavailable(e.to_string()))??;
        Ok(Some(record))
    }

    async fn put(&self, slot: &str, record: ArchiveRecord) -> Result<()> {
        let dir = self.dir.clone();
        let path = self.slot_path(slot);
        tokio::task::spawn_blocking(move || -> Result<()> {
            let data = bincode::serialize(&record)?;
            std::fs::create_dir_all(&dir)
                .and_then(|_| std::fs::write(&path, data))
                .map_err(|e| ShelfError::StorageUnavailable(e.to_string()))
        })
        .await
        .map_err(|e| ShelfError::StorageUnavailable(e.to_string()))?
    }
}

/// Slots kept in memory only
#[derive(Default)]
pub struct MemoryCacheStore {
    slots: Mutex<HashMap<String, ArchiveRecord>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, slot: &str) -> Result<Option<ArchiveRecord>> {
        Ok(self.slots.lock().get(slot).cloned())
    }

    async fn put(&self, slot: &str, record: ArchiveRecord) -> Result<()> {
        self.slots.lock().insert(slot.to_string(), record);
        Ok(())
    }
}

/// Best-effort access to the archive slot
#[derive(Clone)]
pub struct ArchivePersistence {
    store: Arc<dyn CacheStore>,
    slot: String,
}

impl ArchivePersistence {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self {
            store,
            slot: ARCHIVE_SLOT.to_string(),
        }
    }

    /// Returns whether the write landed
    pub async fn persist(&self, buffer: &[u8], metadata: ArchiveMetadata) -> bool {
        let record = ArchiveRecord {
            buffer: buffer.to_vec(),
            metadata,
        };
        match self.store.put(&self.slot, record).await {
            Ok(()) => {
                info!("Archive cached ({} bytes)", buffer.len());
                true
            }
            Err(e) => {
                warn!("Archive not cached: {}", e);
                false
            }
        }
    }

    pub async fn read(&self) -> Option<ArchiveRecord> {
        match self.store.get(&self.slot).await {
            Ok(Some(record)) => {
                debug!(
                    "Cached archive {} ({} assets)",
                    record.metadata.name, record.metadata.count
                );
                Some(record)
            }
            Ok(None) => None,
            Err(e) => {
                warn!("Archive cache unreadable: {}", e);
                None
            }
        }
    }
}
