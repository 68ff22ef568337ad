//! Lazy hydration of tile images.
//!
//! A tile becomes renderable once its SVG is decompressed and registered as
//! a revocable content handle. Repeated visibility triggers for the same
//! asset join one in-flight hydration. All handles are revoked together when
//! the asset set is replaced.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::OnceCell;
use tracing::{debug, info};
use uuid::Uuid;

use crate::archive::AssetArchiveStore;
use crate::error::{Result, ShelfError};
use crate::search::Asset;

/// Transient reference to decompressed content; dead once revoked
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentHandle {
    pub id: Uuid,
    pub asset: String,
}

impl ContentHandle {
    pub fn uri(&self) -> String {
        format!("blob:logo-shelf/{}", self.id)
    }
}

/// Live handle table; `revoke_all` starts a new generation
#[derive(Default)]
pub struct HandleRegistry {
    live: Mutex<Generation>,
}

#[derive(Default)]
struct Generation {
    id: u64,
    handles: HashMap<Uuid, Arc<str>>,
}

impl HandleRegistry {
    pub fn generation(&self) -> u64 {
        self.live.lock().id
    }

    /// Register `content` unless the registry moved past `generation`
    pub fn create(&self, generation: u64, asset: &str, content: Arc<str>) -> Option<ContentHandle> {
        let mut live = self.live.lock();
        if live.id != generation {
            return None;
        }
        let handle = ContentHandle {
            id: Uuid::new_v4(),
            asset: asset.to_string(),
        };
        live.handles.insert(handle.id, content);
        Some(handle)
    }

    /// Content behind a handle, `None` after revocation
    pub fn resolve(&self, handle: &ContentHandle) -> Option<Arc<str>> {
        self.live.lock().handles.get(&handle.id).cloned()
    }

    /// Returns how many handles were released
    pub fn revoke_all(&self) -> usize {
        let mut live = self.live.lock();
        live.id += 1;
        let count = live.handles.len();
        live.handles.clear();
        count
    }

    pub fn live_count(&self) -> usize {
        self.live.lock().handles.len()
    }
}

type HandleCell = Arc<OnceCell<ContentHandle>>;

pub struct Hydrator {
    store: Arc<AssetArchiveStore>,
    registry: HandleRegistry,
    cells: Mutex<HashMap<String, HandleCell>>,
}

impl Hydrator {
    pub fn new(store: Arc<AssetArchiveStore>) -> Self {
        Self {
            store,
            registry: HandleRegistry::default(),
            cells: Mutex::new(HashMap::new()),
        }
    }

    /// Handle for an already hydrated asset
    pub fn ready(&self, name: &str) -> Option<ContentHandle> {
        self.cells
            .lock()
            .get(name)
            .and_then(|cell| cell.get().cloned())
    }

    /// Decompress and register once, however many callers ask.
    ///
    /// Fails with `Superseded` when `release_all` runs while the content is
    /// still being decompressed; nothing is registered in that case.
    pub async fn hydrate(&self, asset: &Asset) -> Result<ContentHandle> {
        let (cell, generation): (HandleCell, u64) = {
            let mut cells = self.cells.lock();
            let cell = Arc::clone(cells.entry(asset.name.clone()).or_default());
            (cell, self.registry.generation())
        };

        let handle = cell
            .get_or_try_init(|| async {
                let content = self.store.content(&asset.name).await?;
                let handle = self
                    .registry
                    .create(generation, &asset.name, content)
                    .ok_or_else(|| {
                        ShelfError::Superseded(format!("{} (asset set replaced)", asset.name))
                    })?;
                debug!("Hydrated {}", asset.name);
                Ok::<_, ShelfError>(handle)
            })
            .await?;
        Ok(handle.clone())
    }

    pub fn resolve(&self, handle: &ContentHandle) -> Option<Arc<str>> {
        self.registry.resolve(handle)
    }

    /// Revoke every handle; call whenever the asset set is replaced
    pub fn release_all(&self) {
        let released = {
            // Cells and generation change together so `hydrate` never pairs
            // an old cell with the new generation
            let mut cells = self.cells.lock();
            cells.clear();
            self.registry.revoke_all()
        };
        if released > 0 {
            info!("Released {} content handles", released);
        }
    }

    pub fn live_handles(&self) -> usize {
        self.registry.live_count()
    }
}
