pub mod runner;
pub mod store;
pub mod tiers;

pub use runner::run_bounded;
pub use store::FrameStore;
pub use tiers::{build_tiers, factor_list, LoadPlan};

use crate::decoder::worker::decode_source;
use crate::decoder::{Bitmap, DecodeTarget, SourceProvider};
use crate::error::{ScrollFrameError, ScrollFrameResult};
use smol::LocalExecutor;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

/// Completed/expected frame counts for one loading phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadProgress {
    pub count: usize,
    pub total: usize,
}

impl LoadProgress {
    pub fn new(total: usize) -> Self {
        Self { count: 0, total }
    }

    pub fn advance(&mut self) {
        self.count += 1;
    }

    /// An absent frame no longer counts towards this phase.
    pub fn shrink(&mut self) {
        self.total = self.total.saturating_sub(1);
    }

    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        (self.count as f64 / self.total as f64).clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Blocks `init()`: tier 0, or every frame in flat mode
    Main,
    /// Later tiers, streamed in after `init()` resolved
    Background,
}

/// Callbacks from the loader into whoever owns the load.
///
/// `accepts` is consulted before a frame starts and again before its result is
/// written, so work belonging to a torn-down or superseded load is dropped.
pub trait LoaderHooks {
    fn accepts(&self, generation: u64) -> bool;
    fn on_frame_loaded(&self, phase: Phase, index: usize);
    fn on_frame_absent(&self, phase: Phase, index: usize);
    fn on_frame_error(&self, err: &ScrollFrameError);
}

/// Resolves, decodes and stores frames in bounded batches.
#[derive(Clone)]
pub struct ProgressiveFrameLoader {
    executor: Rc<LocalExecutor<'static>>,
    provider: SourceProvider,
    store: Rc<RefCell<FrameStore>>,
    target: DecodeTarget,
    concurrency: usize,
    generation: u64,
    hooks: Weak<dyn LoaderHooks>,
}

impl ProgressiveFrameLoader {
    pub fn new(
        executor: Rc<LocalExecutor<'static>>,
        provider: SourceProvider,
        store: Rc<RefCell<FrameStore>>,
        target: DecodeTarget,
        concurrency: usize,
        generation: u64,
        hooks: Weak<dyn LoaderHooks>,
    ) -> Self {
        Self {
            executor,
            provider,
            store,
            target,
            concurrency: concurrency.max(1),
            generation,
            hooks,
        }
    }

    fn is_live(&self) -> bool {
        self.hooks
            .upgrade()
            .is_some_and(|hooks| hooks.accepts(self.generation))
    }

    /// Load `indices` with at most `concurrency` frames in flight.
    ///
    /// The first failing frame rejects the batch; frames already in flight keep
    /// running and still land in the store.
    pub async fn load_batch(&self, indices: &[usize], phase: Phase) -> ScrollFrameResult<()> {
        log::debug!("Loading {} frames ({:?} phase)", indices.len(), phase);
        let jobs: Vec<_> = indices
            .iter()
            .map(|&index| {
                let loader = self.clone();
                move || async move { loader.load_frame(index, phase).await }
            })
            .collect();

        run_bounded(&self.executor, jobs, self.concurrency).await?;
        Ok(())
    }

    async fn load_frame(&self, index: usize, phase: Phase) -> ScrollFrameResult<()> {
        if !self.is_live() {
            return Err(ScrollFrameError::Destroyed);
        }

        match self.fetch_frame(index).await {
            Ok(frame) => {
                let Some(hooks) = self.hooks.upgrade() else {
                    return Ok(());
                };
                if !hooks.accepts(self.generation) {
                    log::trace!("Dropping frame {} from a discarded load", index);
                    return Ok(());
                }
                match frame {
                    Some(bitmap) => {
                        self.store.borrow_mut().insert(index, bitmap);
                        hooks.on_frame_loaded(phase, index);
                    }
                    None => {
                        log::debug!("Frame {} is absent, skipping", index);
                        self.store.borrow_mut().mark_absent(index);
                        hooks.on_frame_absent(phase, index);
                    }
                }
                Ok(())
            }
            Err(err) => {
                if let Some(hooks) = self.hooks.upgrade() {
                    if hooks.accepts(self.generation) {
                        log::error!("{}", err);
                        hooks.on_frame_error(&err);
                    }
                }
                Err(err)
            }
        }
    }

    /// `Ok(None)` for an absent frame.
    async fn fetch_frame(&self, index: usize) -> ScrollFrameResult<Option<Bitmap>> {
        let source = self.provider.resolve(index).await?;
        if source.is_absent() {
            return Ok(None);
        }
        decode_source(source, self.target)
            .await
            .map(Some)
            .map_err(|err| ScrollFrameError::load(index, err))
    }
}
