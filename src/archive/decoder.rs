//! Decoder sessions: where archive enumeration and decompression run.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::catalog::{IngestReport, ZipCatalog};
use crate::error::{Result, ShelfError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderKind {
    /// Dedicated worker thread
    Offloaded,
    /// On the calling task
    InProcess,
}

/// A load/content/reset session over one archive buffer
#[async_trait]
pub trait ArchiveDecoder: Send + Sync {
    fn kind(&self) -> DecoderKind;

    /// Enumerate a new buffer, replacing any previously loaded one
    async fn load(&self, buffer: Arc<[u8]>) -> Result<IngestReport>;

    /// Decompress the entry with this base name
    async fn content(&self, name: &str) -> Result<String>;

    /// Drop the loaded buffer
    async fn reset(&self) -> Result<()>;
}

/// Decompresses on the caller's task
pub struct InlineDecoder {
    extension: String,
    catalog: Mutex<Option<ZipCatalog>>,
}

impl InlineDecoder {
    pub fn new(extension: impl Into<String>) -> Self {
        Self {
            extension: extension.into(),
            catalog: Mutex::new(None),
        }
    }
}

#[async_trait]
impl ArchiveDecoder for InlineDecoder {
    fn kind(&self) -> DecoderKind {
        DecoderKind::InProcess
    }

    async fn load(&self, buffer: Arc<[u8]>) -> Result<IngestReport> {
        let mut slot = self.catalog.lock();
        *slot = None;
        let (catalog, report) = ZipCatalog::open(buffer, &self.extension)?;
        *slot = Some(catalog);
        Ok(report)
    }

    async fn content(&self, name: &str) -> Result<String> {
        match self.catalog.lock().as_mut() {
            Some(catalog) => catalog.read(name),
            None => Err(ShelfError::NotFound(format!("{name} (no archive loaded)"))),
        }
    }

    async fn reset(&self) -> Result<()> {
        *self.catalog.lock() = None;
        Ok(())
    }
}
