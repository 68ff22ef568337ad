//! Render module - Incremental, cancellable materialization of result tiles
//!
//! Results are pushed to the view in fixed-size batches, one batch per
//! frame, so a large result set never monopolizes the caller. Every render
//! takes a new generation; an older pass notices at its next batch and stops.

mod hydrate;

pub use hydrate::{ContentHandle, HandleRegistry, Hydrator};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::{interval, Interval, MissedTickBehavior};
use tracing::{debug, warn};

use crate::config::RenderConfig;
use crate::error::{Result, ShelfError};
use crate::search::{Asset, SearchHit};

/// Paces batches across frames
#[async_trait]
pub trait FrameClock: Send + Sync {
    async fn next_frame(&self);
}

/// Fixed-rate frames
pub struct IntervalClock {
    ticks: tokio::sync::Mutex<Interval>,
}

impl IntervalClock {
    pub fn new(period: Duration) -> Self {
        let mut ticks = interval(period);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self {
            ticks: tokio::sync::Mutex::new(ticks),
        }
    }
}

#[async_trait]
impl FrameClock for IntervalClock {
    async fn next_frame(&self) {
        self.ticks.lock().await.tick().await;
    }
}

/// Yields to the runtime between batches without waiting
pub struct YieldClock;

#[async_trait]
impl FrameClock for YieldClock {
    async fn next_frame(&self) {
        tokio::task::yield_now().await;
    }
}

/// One grid cell
#[derive(Debug, Clone, PartialEq)]
pub enum Tile {
    Ready {
        asset: Arc<Asset>,
        handle: ContentHandle,
    },
    /// Not hydrated yet; the view should observe it for visibility
    Placeholder { asset: Arc<Asset> },
}

impl Tile {
    pub fn asset(&self) -> &Arc<Asset> {
        match self {
            Tile::Ready { asset, .. } | Tile::Placeholder { asset } => asset,
        }
    }
}

/// Where tiles end up
pub trait ResultView: Send {
    /// A new pass starts; previous tiles are discarded
    fn begin(&mut self, generation: u64, total: usize);
    fn append(&mut self, generation: u64, tiles: Vec<Tile>);
    fn finish(&mut self, generation: u64);
    /// A placeholder became renderable
    fn hydrated(&mut self, asset: &Asset, handle: ContentHandle);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    Completed { rendered: usize },
    /// A newer render started; this one stopped early
    Superseded { rendered: usize },
}

pub struct RenderScheduler<V: ResultView> {
    generation: AtomicU64,
    batch_size: usize,
    lookahead_px: u32,
    clock: Arc<dyn FrameClock>,
    view: Arc<Mutex<V>>,
    hydrator: Arc<Hydrator>,
}

impl<V: ResultView> RenderScheduler<V> {
    pub fn new(
        view: Arc<Mutex<V>>,
        hydrator: Arc<Hydrator>,
        clock: Arc<dyn FrameClock>,
        config: &RenderConfig,
    ) -> Self {
        Self {
            generation: AtomicU64::new(0),
            batch_size: config.batch_size.max(1),
            lookahead_px: config.lookahead_px,
            clock,
            view,
            hydrator,
        }
    }

    /// Paced by `config.frame_interval_ms`
    pub fn with_interval(view: Arc<Mutex<V>>, hydrator: Arc<Hydrator>, config: &RenderConfig) -> Self {
        let clock = Arc::new(IntervalClock::new(config.frame_interval()));
        Self::new(view, hydrator, clock, config)
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Abort whatever pass is running without starting a new one
    pub fn invalidate(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Margin beyond the visible area within which placeholders hydrate
    pub fn lookahead_px(&self) -> u32 {
        self.lookahead_px
    }

    /// Render `hits`, one batch per frame, until done or superseded
    pub async fn render(&self, hits: Arc<[SearchHit]>) -> RenderOutcome {
        let generation = self.invalidate();
        {
            // Generation checks happen under the view lock so a stale pass
            // can never write after a newer `begin`
            let mut view = self.view.lock();
            if !self.is_current(generation) {
                return RenderOutcome::Superseded { rendered: 0 };
            }
            view.begin(generation, hits.len());
        }

        let mut rendered = 0;
        for batch in hits.chunks(self.batch_size) {
            let tiles: Vec<Tile> = batch
                .iter()
                .map(|hit| match self.hydrator.ready(&hit.asset.name) {
                    Some(handle) => Tile::Ready {
                        asset: Arc::clone(&hit.asset),
                        handle,
                    },
                    None => Tile::Placeholder {
                        asset: Arc::clone(&hit.asset),
                    },
                })
                .collect();
            let count = tiles.len();
            {
                let mut view = self.view.lock();
                if !self.is_current(generation) {
                    debug!("Render {} superseded after {} tiles", generation, rendered);
                    return RenderOutcome::Superseded { rendered };
                }
                view.append(generation, tiles);
            }
            rendered += count;

            self.clock.next_frame().await;
        }

        {
            let mut view = self.view.lock();
            if !self.is_current(generation) {
                return RenderOutcome::Superseded { rendered };
            }
            view.finish(generation);
        }
        debug!("Render {} complete: {} tiles", generation, rendered);
        RenderOutcome::Completed { rendered }
    }

    /// A placeholder entered the lookahead margin
    pub async fn on_visible(&self, asset: &Asset) -> Result<ContentHandle> {
        match self.hydrator.hydrate(asset).await {
            Ok(handle) => {
                self.view.lock().hydrated(asset, handle.clone());
                Ok(handle)
            }
            Err(e @ ShelfError::Superseded(_)) => {
                debug!("Hydration of {} dropped: {}", asset.name, e);
                Err(e)
            }
            Err(e) => {
                warn!("Could not hydrate {}: {}", asset.name, e);
                Err(e)
            }
        }
    }

    /// Visibility report for a placeholder `distance_px` outside the visible
    /// area (0 when on screen). Hydrates once it is within the lookahead margin.
    pub async fn observe(&self, asset: &Asset, distance_px: u32) -> Result<Option<ContentHandle>> {
        if distance_px > self.lookahead_px {
            return Ok(None);
        }
        self.on_visible(asset).await.map(Some)
    }

    /// Drop every hydrated handle and stop the running pass
    pub fn release(&self) {
        self.invalidate();
        self.hydrator.release_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::{zip_of, AssetArchiveStore};

    #[derive(Default)]
    struct RecordingView {
        generation: u64,
        tiles: Vec<Tile>,
        finished: Vec<u64>,
        hydrated: Vec<String>,
        appends: usize,
    }

    impl ResultView for RecordingView {
        fn begin(&mut self, generation: u64, _total: usize) {
            self.generation = generation;
            self.tiles.clear();
        }

        fn append(&mut self, generation: u64, tiles: Vec<Tile>) {
            assert_eq!(generation, self.generation, "stale pass wrote to the view");
            self.appends += 1;
            self.tiles.extend(tiles);
        }

        fn finish(&mut self, generation: u64) {
            self.finished.push(generation);
        }

        fn hydrated(&mut self, asset: &Asset, _handle: ContentHandle) {
            self.hydrated.push(asset.name.clone());
        }
    }

    fn hits(count: usize) -> Arc<[SearchHit]> {
        (0..count)
            .map(|i| SearchHit {
                asset: Arc::new(Asset::new(i, format!("Logo{i:03}.svg"), vec![])),
                score: 0,
            })
            .collect::<Vec<_>>()
            .into()
    }

    async fn scheduler(
        batch_size: usize,
    ) -> (
        Arc<RenderScheduler<RecordingView>>,
        Arc<Mutex<RecordingView>>,
        Arc<AssetArchiveStore>,
    ) {
        scheduler_with(RenderConfig {
            batch_size,
            ..RenderConfig::default()
        })
        .await
    }

    async fn scheduler_with(
        config: RenderConfig,
    ) -> (
        Arc<RenderScheduler<RecordingView>>,
        Arc<Mutex<RecordingView>>,
        Arc<AssetArchiveStore>,
    ) {
        let store = Arc::new(AssetArchiveStore::inline("svg"));
        store
            .ingest(zip_of(&[("Logo000.svg", "<svg>0</svg>"), ("Logo001.svg", "<svg>1</svg>")]))
            .await
            .unwrap();
        let view = Arc::new(Mutex::new(RecordingView::default()));
        let scheduler = RenderScheduler::new(
            Arc::clone(&view),
            Arc::new(Hydrator::new(Arc::clone(&store))),
            Arc::new(YieldClock),
            &config,
        );
        (Arc::new(scheduler), view, store)
    }

    #[tokio::test]
    async fn test_renders_in_batches() {
        let (scheduler, view, _) = scheduler(4).await;
        let outcome = scheduler.render(hits(10)).await;

        assert_eq!(outcome, RenderOutcome::Completed { rendered: 10 });
        let view = view.lock();
        assert_eq!(view.appends, 3);
        assert_eq!(view.tiles.len(), 10);
        assert_eq!(view.finished, vec![1]);
        assert!(view.tiles.iter().all(|t| matches!(t, Tile::Placeholder { .. })));
    }

    #[tokio::test]
    async fn test_newer_render_supersedes_older() {
        let (scheduler, view, _) = scheduler(2).await;

        let first = tokio::spawn({
            let scheduler = Arc::clone(&scheduler);
            async move { scheduler.render(hits(200)).await }
        });
        tokio::task::yield_now().await;

        let second = scheduler.render(hits(3)).await;
        let first = first.await.unwrap();

        assert!(matches!(first, RenderOutcome::Superseded { rendered } if rendered < 200));
        assert_eq!(second, RenderOutcome::Completed { rendered: 3 });
        let view = view.lock();
        assert_eq!(view.tiles.len(), 3);
        assert_eq!(view.finished, vec![scheduler.generation()]);
    }

    #[tokio::test]
    async fn test_visibility_hydrates_once_and_later_renders_are_ready() {
        let (scheduler, view, store) = scheduler(8).await;
        let results = hits(2);
        scheduler.render(Arc::clone(&results)).await;

        let asset = &results[0].asset;
        let (a, b) = tokio::join!(scheduler.on_visible(asset), scheduler.on_visible(asset));
        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(store.decompressions(), 1);
        assert_eq!(view.lock().hydrated, vec!["Logo000.svg", "Logo000.svg"]);

        scheduler.render(results).await;
        let view = view.lock();
        assert!(matches!(view.tiles[0], Tile::Ready { .. }));
        assert!(matches!(view.tiles[1], Tile::Placeholder { .. }));
    }

    #[tokio::test]
    async fn test_release_revokes_and_invalidates() {
        let (scheduler, _view, _) = scheduler(8).await;
        let results = hits(1);
        let handle = scheduler.on_visible(&results[0].asset).await.unwrap();
        let before = scheduler.generation();

        scheduler.release();
        assert!(scheduler.generation() > before);
        assert!(scheduler.hydrator.resolve(&handle).is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_parallel_renders_never_write_stale_tiles() {
        let (scheduler, view, _) = scheduler(1).await;

        let passes: Vec<_> = (0..8)
            .map(|_| {
                let scheduler = Arc::clone(&scheduler);
                tokio::spawn(async move { scheduler.render(hits(200)).await })
            })
            .collect();
        for pass in passes {
            // A stale append panics inside RecordingView
            pass.await.unwrap();
        }

        let view = view.lock();
        assert_eq!(view.generation, scheduler.generation());
        assert_eq!(view.finished.last(), Some(&scheduler.generation()));
        assert!(view.finished.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(view.tiles.len(), 200);
    }

    #[tokio::test]
    async fn test_observe_hydrates_only_within_lookahead() {
        let (scheduler, view, store) = scheduler_with(RenderConfig {
            lookahead_px: 100,
            ..RenderConfig::default()
        })
        .await;
        assert_eq!(scheduler.lookahead_px(), 100);
        let results = hits(1);
        let asset = &results[0].asset;

        assert!(scheduler.observe(asset, 101).await.unwrap().is_none());
        assert_eq!(store.decompressions(), 0);

        let handle = scheduler.observe(asset, 100).await.unwrap().unwrap();
        assert_eq!(store.decompressions(), 1);
        assert_eq!(scheduler.hydrator.resolve(&handle).as_deref(), Some("<svg>0</svg>"));
        assert_eq!(view.lock().hydrated, vec!["Logo000.svg"]);
    }
}
