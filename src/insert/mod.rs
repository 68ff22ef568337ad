//! Insert module - Serialized host document mutations
//!
//! The host API is not reentrant, so every insert goes through one FIFO
//! queue drained by a single actor task. A failing insert is reported to its
//! own caller and the queue moves on.

mod host;
mod placement;
mod svg;

pub use host::{Bounds, Coercion, HostDocument};
pub use placement::{CascadeTracker, ContextCache};
pub use svg::normalize_svg;

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::archive::AssetArchiveStore;
use crate::config::InsertConfig;
use crate::error::{Result, ShelfError};
use crate::search::Asset;

/// What a successful insert did
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsertReceipt {
    pub asset: String,
    pub bounds: Bounds,
    /// Took over the single selected shape's box
    pub replaced: bool,
    /// Succeeded after forcing the context selection
    pub retried: bool,
}

struct InsertJob {
    asset: Arc<Asset>,
    reply: oneshot::Sender<Result<InsertReceipt>>,
}

/// Handle to the insertion queue
pub struct InsertionCoordinator {
    jobs: mpsc::UnboundedSender<InsertJob>,
    actor: JoinHandle<()>,
}

impl InsertionCoordinator {
    /// Start the queue actor on the current runtime
    pub fn spawn(
        host: Arc<dyn HostDocument>,
        store: Arc<AssetArchiveStore>,
        config: InsertConfig,
    ) -> Self {
        let (jobs, rx) = mpsc::unbounded_channel();
        let actor = InsertActor::new(host, store, config);
        let actor = tokio::spawn(actor.run(rx));
        Self { jobs, actor }
    }

    /// Queue an insert and wait for its own outcome
    pub async fn insert(&self, asset: Arc<Asset>) -> Result<InsertReceipt> {
        let (reply, outcome) = oneshot::channel();
        self.jobs
            .send(InsertJob { asset, reply })
            .map_err(|_| ShelfError::HostFatal("insertion queue closed".into()))?;
        outcome
            .await
            .map_err(|_| ShelfError::HostFatal("insertion dropped".into()))?
    }

    /// Stop accepting inserts and wait for queued ones to finish
    pub async fn shutdown(self) {
        drop(self.jobs);
        if let Err(e) = self.actor.await {
            warn!("Insertion queue ended abnormally: {}", e);
        }
    }
}

struct InsertActor {
    host: Arc<dyn HostDocument>,
    store: Arc<AssetArchiveStore>,
    config: InsertConfig,
    normalized: HashMap<String, (Arc<str>, Arc<str>)>,
    cascade: CascadeTracker,
    context: ContextCache,
    svg_supported: Option<bool>,
}

impl InsertActor {
    fn new(host: Arc<dyn HostDocument>, store: Arc<AssetArchiveStore>, config: InsertConfig) -> Self {
        Self {
            host,
            store,
            cascade: CascadeTracker::new(config.clone()),
            context: ContextCache::new(config.context_ttl()),
            config,
            normalized: HashMap::new(),
            svg_supported: None,
        }
    }

    async fn run(mut self, mut jobs: mpsc::UnboundedReceiver<InsertJob>) {
        while let Some(InsertJob { asset, reply }) = jobs.recv().await {
            let result = self.insert(&asset).await;
            match &result {
                Ok(receipt) => info!(
                    "Inserted {} at ({:.0}, {:.0}){}",
                    receipt.asset,
                    receipt.bounds.left,
                    receipt.bounds.top,
                    if receipt.retried { " after retry" } else { "" }
                ),
                Err(e) => warn!("Insert of {} failed: {}", asset.name, e),
            }
            let _ = reply.send(result);
        }
        debug!("Insertion queue closed");
    }

    async fn insert(&mut self, asset: &Asset) -> Result<InsertReceipt> {
        if !*self
            .svg_supported
            .get_or_insert_with(|| self.host.supports_svg())
        {
            return Err(ShelfError::HostFatal("host cannot insert SVG images".into()));
        }

        let svg = self.svg_for(asset).await?;
        let (bounds, replaced) = self.placement().await?;

        let retried = match self
            .host
            .set_selected_data(&svg, Coercion::XmlSvg, bounds)
            .await
        {
            Ok(()) => false,
            Err(e) if e.is_selection_error() => {
                let context = self.context_id().await?;
                debug!("Selection invalid ({}); forcing context {}", e, context);
                self.host.select_context(&context).await?;
                self.host
                    .set_selected_data(&svg, Coercion::XmlSvg, bounds)
                    .await?;
                true
            }
            Err(e) => return Err(e),
        };

        Ok(InsertReceipt {
            asset: asset.name.clone(),
            bounds,
            replaced,
            retried,
        })
    }

    /// Normalized SVG, computed once per decompressed content
    async fn svg_for(&mut self, asset: &Asset) -> Result<Arc<str>> {
        let raw = self.store.content(&asset.name).await?;
        if let Some((source, svg)) = self.normalized.get(&asset.name) {
            // A re-imported archive hands out new content
            if Arc::ptr_eq(source, &raw) {
                return Ok(Arc::clone(svg));
            }
        }
        let svg: Arc<str> = Arc::from(normalize_svg(&raw));
        self.normalized
            .insert(asset.name.clone(), (raw, Arc::clone(&svg)));
        Ok(svg)
    }

    async fn placement(&mut self) -> Result<(Bounds, bool)> {
        if self.config.replace_selection {
            match self.host.selected_shapes().await {
                Ok(shapes) if shapes.len() == 1 => return Ok((shapes[0], true)),
                Ok(_) => {}
                Err(e) => debug!("Selection unreadable, cascading instead: {}", e),
            }
        }

        let context = self.context_id().await?;
        Ok((self.cascade.next(&context, Instant::now()), false))
    }

    async fn context_id(&mut self) -> Result<String> {
        let now = Instant::now();
        if let Some(id) = self.context.get(now) {
            return Ok(id.to_string());
        }
        let id = self.host.active_context().await?;
        self.context.set(id.clone(), now);
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::zip_of;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct MockHost {
        unsupported: bool,
        selection: Mutex<Vec<Bounds>>,
        context: Mutex<String>,
        scripted: Mutex<VecDeque<Result<()>>>,
        inserted: Mutex<Vec<(String, Bounds)>>,
        forced: Mutex<Vec<String>>,
        context_reads: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        delay: Option<Duration>,
    }

    #[async_trait]
    impl HostDocument for MockHost {
        fn supports_svg(&self) -> bool {
            !self.unsupported
        }

        async fn set_selected_data(&self, data: &str, _coercion: Coercion, bounds: Bounds) -> Result<()> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let scripted = self.scripted.lock().pop_front();
            match scripted {
                Some(Err(e)) => Err(e),
                _ => {
                    self.inserted.lock().push((data.to_string(), bounds));
                    Ok(())
                }
            }
        }

        async fn selected_shapes(&self) -> Result<Vec<Bounds>> {
            Ok(self.selection.lock().clone())
        }

        async fn active_context(&self) -> Result<String> {
            self.context_reads.fetch_add(1, Ordering::SeqCst);
            Ok(self.context.lock().clone())
        }

        async fn select_context(&self, id: &str) -> Result<()> {
            self.forced.lock().push(id.to_string());
            Ok(())
        }
    }

    fn host() -> MockHost {
        MockHost {
            context: Mutex::new("slide-1".into()),
            ..MockHost::default()
        }
    }

    async fn store() -> Arc<AssetArchiveStore> {
        let store = Arc::new(AssetArchiveStore::inline("svg"));
        store
            .ingest(zip_of(&[
                ("Acme.svg", "<?xml version=\"1.0\"?><svg viewBox=\"0 0 1 1\"/>"),
                ("Beta.svg", "<svg xmlns=\"http://www.w3.org/2000/svg\"/>"),
            ]))
            .await
            .unwrap();
        store
    }

    fn asset(id: usize, name: &str) -> Arc<Asset> {
        Arc::new(Asset::new(id, name, vec![]))
    }

    #[tokio::test(start_paused = true)]
    async fn test_cascade_positions_then_repeat() {
        let host = Arc::new(host());
        let config = InsertConfig {
            max_steps: 3,
            ..InsertConfig::default()
        };
        let base = (config.base_left, config.step);
        let coordinator = InsertionCoordinator::spawn(host.clone(), store().await, config);

        let mut lefts = Vec::new();
        for _ in 0..4 {
            let receipt = coordinator.insert(asset(0, "Acme.svg")).await.unwrap();
            assert!(!receipt.replaced);
            lefts.push(receipt.bounds.left);
        }
        assert_eq!(
            lefts,
            vec![base.0, base.0 + base.1, base.0 + 2.0 * base.1, base.0]
        );

        let inserted = host.inserted.lock();
        assert_eq!(
            inserted[0].0,
            "<svg xmlns=\"http://www.w3.org/2000/svg\" viewBox=\"0 0 1 1\"/>"
        );
        // One host round-trip for the context while the identity is fresh
        assert_eq!(host.context_reads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_and_context_ttl() {
        let host = Arc::new(host());
        let config = InsertConfig::default();
        let idle = config.idle_reset() + Duration::from_millis(1);
        let coordinator = InsertionCoordinator::spawn(host.clone(), store().await, config.clone());

        coordinator.insert(asset(0, "Acme.svg")).await.unwrap();
        let second = coordinator.insert(asset(0, "Acme.svg")).await.unwrap();
        assert_eq!(second.bounds.left, config.base_left + config.step);

        tokio::time::advance(idle).await;
        let after_idle = coordinator.insert(asset(0, "Acme.svg")).await.unwrap();
        assert_eq!(after_idle.bounds.left, config.base_left);
        assert_eq!(host.context_reads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_replaces_single_selection() {
        let host = host();
        let selected = Bounds {
            left: 300.0,
            top: 200.0,
            width: 50.0,
            height: 40.0,
        };
        host.selection.lock().push(selected);
        let host = Arc::new(host);
        let coordinator =
            InsertionCoordinator::spawn(host.clone(), store().await, InsertConfig::default());

        let receipt = coordinator.insert(asset(1, "Beta.svg")).await.unwrap();
        assert!(receipt.replaced);
        assert_eq!(receipt.bounds, selected);

        host.selection.lock().push(selected);
        let receipt = coordinator.insert(asset(1, "Beta.svg")).await.unwrap();
        assert!(!receipt.replaced, "two selected shapes fall back to the cascade");
    }

    #[tokio::test]
    async fn test_selection_error_retried_once() {
        let host = host();
        host.scripted
            .lock()
            .push_back(Err(ShelfError::HostSelection("invalid selection".into())));
        let host = Arc::new(host);
        let coordinator =
            InsertionCoordinator::spawn(host.clone(), store().await, InsertConfig::default());

        let receipt = coordinator.insert(asset(0, "Acme.svg")).await.unwrap();
        assert!(receipt.retried);
        assert_eq!(*host.forced.lock(), vec!["slide-1".to_string()]);
        assert_eq!(host.inserted.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_second_selection_error_surfaces() {
        let host = host();
        {
            let mut scripted = host.scripted.lock();
            scripted.push_back(Err(ShelfError::HostSelection("invalid".into())));
            scripted.push_back(Err(ShelfError::HostSelection("still invalid".into())));
        }
        let host = Arc::new(host);
        let coordinator =
            InsertionCoordinator::spawn(host.clone(), store().await, InsertConfig::default());

        let result = coordinator.insert(asset(0, "Acme.svg")).await;
        assert!(matches!(result, Err(ShelfError::HostSelection(_))));
        assert_eq!(host.forced.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_fatal_error_not_retried_and_queue_continues() {
        let host = host();
        host.scripted
            .lock()
            .push_back(Err(ShelfError::HostFatal("boom".into())));
        let host = Arc::new(host);
        let coordinator =
            InsertionCoordinator::spawn(host.clone(), store().await, InsertConfig::default());

        let (first, second, missing) = tokio::join!(
            coordinator.insert(asset(0, "Acme.svg")),
            coordinator.insert(asset(1, "Beta.svg")),
            coordinator.insert(asset(2, "Ghost.svg")),
        );
        assert!(matches!(first, Err(ShelfError::HostFatal(_))));
        assert!(second.is_ok());
        assert!(matches!(missing, Err(ShelfError::NotFound(_))));
        assert!(host.forced.lock().is_empty());
    }

    #[tokio::test]
    async fn test_one_mutation_in_flight() {
        let host = Arc::new(MockHost {
            delay: Some(Duration::from_millis(5)),
            ..host()
        });
        let coordinator = Arc::new(InsertionCoordinator::spawn(
            host.clone(),
            store().await,
            InsertConfig::default(),
        ));

        let calls: Vec<_> = (0..6)
            .map(|i| {
                let coordinator = Arc::clone(&coordinator);
                let name = if i % 2 == 0 { "Acme.svg" } else { "Beta.svg" };
                tokio::spawn(async move { coordinator.insert(asset(i % 2, name)).await })
            })
            .collect();
        for call in calls {
            call.await.unwrap().unwrap();
        }

        assert_eq!(host.max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(host.inserted.lock().len(), 6);
    }

    #[tokio::test]
    async fn test_unsupported_host() {
        let host = Arc::new(MockHost {
            unsupported: true,
            ..host()
        });
        let coordinator =
            InsertionCoordinator::spawn(host.clone(), store().await, InsertConfig::default());
        let result = coordinator.insert(asset(0, "Acme.svg")).await;
        assert!(matches!(result, Err(ShelfError::HostFatal(_))));
        coordinator.shutdown().await;
    }
}
