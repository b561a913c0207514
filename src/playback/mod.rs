//! Playback controller: lifecycle, loading orchestration and the public API.

pub mod events;
mod render_loop;

pub use events::{EventKind, EventRegistry, Listener, ListenerId, ListenerOptions, PlaybackEvent};

use crate::config::{Config, ConfigOverrides};
use crate::decoder::{DecodeTarget, ImageSource, SourceProvider};
use crate::error::{ScrollFrameError, ScrollFrameResult};
use crate::loader::{FrameStore, LoadPlan, LoadProgress, LoaderHooks, Phase, ProgressiveFrameLoader};
use crate::ui::overlay::{self, ExitDirection, OverlayPainter};
use crate::ui::{ScrollAxis, ScrollSource, SharedSurface};
use smol::{LocalExecutor, Task};
use std::cell::{Cell, RefCell};
use std::future::Future;
use std::rc::{Rc, Weak};

/// `(scroll_pixels, total_scroll_pixels, total_frames) -> frame`. The result may be
/// fractional; it is rounded and clamped before use.
pub type FrameMapper = Rc<dyn Fn(f64, f64, usize) -> f64>;

/// Maps the scroll range linearly onto `0..total_frames`.
pub fn linear_mapper() -> FrameMapper {
    Rc::new(|pixels, total_pixels, frames| {
        if total_pixels <= 0.0 || frames == 0 {
            return 0.0;
        }
        pixels / total_pixels * (frames - 1) as f64
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Uninitialized,
    Loading,
    ReadyIdle,
    Playing,
    Paused,
    Destroyed,
}

impl PlaybackState {
    /// Frames are drawable.
    pub fn is_ready(self) -> bool {
        matches!(self, Self::ReadyIdle | Self::Playing | Self::Paused)
    }
}

pub(crate) struct Inner {
    this: Weak<Inner>,
    executor: Rc<LocalExecutor<'static>>,
    surface: SharedSurface,
    scroll: Rc<dyn ScrollSource>,
    axis: ScrollAxis,
    mapper: FrameMapper,
    provider: SourceProvider,
    config: Config,
    main_painter: Option<OverlayPainter>,
    background_painter: Option<OverlayPainter>,
    events: EventRegistry,
    store: Rc<RefCell<FrameStore>>,

    state: Cell<PlaybackState>,
    generation: Cell<u64>,
    progressive: Cell<bool>,
    total: Cell<usize>,
    /// Logical frame requested by scroll or `set_frame`
    current: Cell<usize>,
    last_drawn: Cell<Option<usize>>,
    /// Frame whose bitmap is on screen, after fallback
    last_real: Cell<Option<usize>>,
    last_scroll: Cell<Option<(f64, f64)>>,
    /// Frame whose last render attempt failed, so repeats are not reported again
    last_failed: Cell<Option<usize>>,

    main_progress: Cell<LoadProgress>,
    background_progress: Cell<LoadProgress>,
    background_active: Cell<bool>,
    exiting: Cell<bool>,

    tick: RefCell<Option<Task<()>>>,
    paint: RefCell<Option<Task<()>>>,
}

impl Inner {
    fn is_destroyed(&self) -> bool {
        self.state.get() == PlaybackState::Destroyed
    }

    fn ensure_live(&self) -> ScrollFrameResult<()> {
        if self.is_destroyed() {
            return Err(ScrollFrameError::Destroyed);
        }
        Ok(())
    }

    fn loader(&self) -> ProgressiveFrameLoader {
        let (width, height) = self.surface.borrow().size();
        let target = DecodeTarget {
            width,
            height,
            scale_mode: self.config.scale_mode,
        };
        let hooks: Weak<dyn LoaderHooks> = self.this.clone();
        ProgressiveFrameLoader::new(
            self.executor.clone(),
            self.provider.clone(),
            self.store.clone(),
            target,
            self.config.max_concurrent_loads,
            self.generation.get(),
            hooks,
        )
    }

    /// Load the blocking batch and play the overlay exit transition.
    /// Returns the tiers left for the background chain.
    async fn load(&self) -> ScrollFrameResult<Vec<Vec<usize>>> {
        let declared = self.provider.total();
        self.store.borrow_mut().reset(declared);
        self.total.set(declared);
        self.current.set(self.current.get().min(declared.saturating_sub(1)));
        self.last_drawn.set(None);
        self.last_real.set(None);
        self.last_scroll.set(None);
        self.last_failed.set(None);

        let loader = self.loader();
        let plan = LoadPlan::new(declared, &self.config.large);
        self.progressive.set(plan.is_progressive());

        let background = match plan {
            LoadPlan::Flat(indices) => {
                log::info!("Loading {} frames", indices.len());
                self.main_progress.set(LoadProgress::new(indices.len()));
                self.background_progress.set(LoadProgress::default());
                self.paint_main_progress();

                loader.load_batch(&indices, Phase::Main).await?;
                self.ensure_live()?;

                let total = self.store.borrow_mut().compact();
                if total == 0 {
                    return Err(ScrollFrameError::resolution(0, "every source resolved to absent"));
                }
                self.total.set(total);
                self.current.set(self.current.get().min(total - 1));
                Vec::new()
            }
            LoadPlan::Progressive(tiers) => {
                let mut tiers = tiers.into_iter();
                let first = tiers.next().unwrap_or_default();
                let rest: Vec<Vec<usize>> = tiers.filter(|tier| !tier.is_empty()).collect();
                let streamed: usize = rest.iter().map(Vec::len).sum();
                log::info!(
                    "Loading {} of {} frames up front, {} in the background",
                    first.len(),
                    declared,
                    streamed
                );
                self.main_progress.set(LoadProgress::new(first.len()));
                self.background_progress.set(LoadProgress::new(streamed));
                self.paint_main_progress();

                loader.load_batch(&first, Phase::Main).await?;
                self.ensure_live()?;
                rest
            }
        };

        self.cancel_progress_paint();
        self.paint_main_progress();

        self.exiting.set(true);
        let weak = self.this.clone();
        overlay::play_exit_animation(
            &self.surface,
            self.config.exit_animation_frames,
            self.config.frame_interval(),
            ExitDirection::Top,
            move || match weak.upgrade() {
                Some(inner) if !inner.is_destroyed() => {
                    inner.render_frame(true, false);
                    true
                }
                _ => false,
            },
        )
        .await;
        self.exiting.set(false);

        self.ensure_live()?;
        Ok(background)
    }

    fn spawn_background(&self, tiers: Vec<Vec<usize>>) {
        if tiers.is_empty() {
            return;
        }
        self.background_active.set(true);
        let loader = self.loader();
        let weak = self.this.clone();
        self.executor
            .spawn(async move {
                for (tier, indices) in tiers.iter().enumerate() {
                    if let Err(err) = loader.load_batch(indices, Phase::Background).await {
                        if !matches!(err, ScrollFrameError::Destroyed) {
                            log::warn!("Background tier {} stopped: {}", tier + 1, err);
                        }
                        break;
                    }
                }
                if let Some(inner) = weak.upgrade() {
                    inner.finish_background();
                }
            })
            .detach();
    }

    fn finish_background(&self) {
        if !self.background_active.replace(false) {
            return;
        }
        self.cancel_progress_paint();
        if self.state.get().is_ready() {
            let progress = self.background_progress.get();
            log::info!("Background loading settled ({}/{})", progress.count, progress.total);
            // Redraw without the progress strip.
            self.render_frame(true, false);
        }
    }

    fn update_progress(&self, phase: Phase, update: impl FnOnce(&mut LoadProgress)) {
        let cell = match phase {
            Phase::Main => &self.main_progress,
            Phase::Background => &self.background_progress,
        };
        let mut progress = cell.get();
        update(&mut progress);
        cell.set(progress);
        self.schedule_progress_paint();
    }
}

impl LoaderHooks for Inner {
    fn accepts(&self, generation: u64) -> bool {
        !self.is_destroyed() && generation == self.generation.get()
    }

    fn on_frame_loaded(&self, phase: Phase, index: usize) {
        log::trace!("Frame {} loaded ({:?})", index, phase);
        self.update_progress(phase, LoadProgress::advance);
    }

    fn on_frame_absent(&self, phase: Phase, _index: usize) {
        match phase {
            Phase::Main => self.update_progress(phase, LoadProgress::shrink),
            Phase::Background => self.update_progress(phase, LoadProgress::advance),
        }
    }

    fn on_frame_error(&self, err: &ScrollFrameError) {
        self.events.emit(PlaybackEvent::Error(err.clone()));
    }
}

/// Rolls a failed or abandoned `init()` back to `Uninitialized`.
///
/// Also runs when the caller drops the `init()` future before it settles, so a
/// timed-out load leaves the instance retryable with scrolling enabled.
struct LoadGuard<'a> {
    inner: &'a Inner,
    armed: bool,
}

impl LoadGuard<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for LoadGuard<'_> {
    fn drop(&mut self) {
        let inner = self.inner;
        if !self.armed || inner.state.get() != PlaybackState::Loading {
            return;
        }
        log::debug!("Rolling back unfinished initialization");
        inner.generation.set(inner.generation.get() + 1);
        inner.exiting.set(false);
        inner.cancel_progress_paint();
        inner.state.set(PlaybackState::Uninitialized);
        inner.scroll.enable();
    }
}

/// Scroll-driven image sequence player.
///
/// All work runs on the `LocalExecutor` handed to the builder; the caller must keep
/// that executor running (e.g. `smol::block_on(executor.run(...))`) for loading
/// and the render tick to make progress.
pub struct ScrollFrame {
    inner: Rc<Inner>,
}

impl ScrollFrame {
    pub fn builder(executor: Rc<LocalExecutor<'static>>) -> ScrollFrameBuilder {
        ScrollFrameBuilder::new(executor)
    }

    /// Load the blocking batch and play the exit transition.
    ///
    /// Resolves immediately if already initialized. On failure the instance goes
    /// back to `Uninitialized` with scrolling re-enabled, so `init` may be retried.
    pub async fn init(&self) -> ScrollFrameResult<()> {
        let inner = &self.inner;
        match inner.state.get() {
            PlaybackState::Destroyed => return Err(ScrollFrameError::Destroyed),
            PlaybackState::Loading => return Err(ScrollFrameError::AlreadyLoading),
            PlaybackState::Uninitialized => {}
            _ => return Ok(()),
        }

        inner.state.set(PlaybackState::Loading);
        inner.generation.set(inner.generation.get() + 1);
        inner.scroll.disable(inner.config.reset_scroll_on_init);
        let guard = LoadGuard { inner, armed: true };

        match inner.load().await {
            Ok(background) => {
                guard.disarm();
                inner.scroll.enable();
                inner.state.set(PlaybackState::ReadyIdle);
                inner.render_frame(true, false);
                inner.spawn_background(background);
                log::info!("Initialized with {} frames", inner.total.get());
                inner.events.emit(PlaybackEvent::InitComplete);
                Ok(())
            }
            Err(err) => {
                if !inner.is_destroyed() {
                    log::error!("Initialization failed: {}", err);
                }
                // The guard rolls the instance back when it drops.
                Err(err)
            }
        }
    }

    pub fn play(&self) {
        let inner = &self.inner;
        match inner.state.get() {
            PlaybackState::ReadyIdle | PlaybackState::Paused => {
                inner.state.set(PlaybackState::Playing);
                inner.start_ticking();
            }
            PlaybackState::Playing => {}
            state => log::warn!("play() ignored in state {:?}", state),
        }
    }

    pub fn pause(&self) {
        let inner = &self.inner;
        if inner.state.get() == PlaybackState::Playing {
            inner.state.set(PlaybackState::Paused);
            inner.stop_ticking();
        }
    }

    /// Pause and rewind to the first frame.
    pub fn stop(&self) {
        self.pause();
        let inner = &self.inner;
        if inner.state.get().is_ready() {
            inner.current.set(0);
            inner.render_frame(true, true);
        }
    }

    /// Jump to `frame`, clamped to the sequence. Drawn right away once initialized.
    pub fn set_frame(&self, frame: i64) {
        let inner = &self.inner;
        if inner.is_destroyed() {
            return;
        }
        let last = inner.total.get().saturating_sub(1);
        let clamped = frame.clamp(0, last as i64) as usize;
        inner.current.set(clamped);
        if inner.state.get().is_ready() {
            inner.render_frame(false, true);
        }
    }

    /// Host scroll notification: updates the logical frame only. The render tick draws it.
    /// Ignored unless playing.
    pub fn handle_scroll(&self) {
        let inner = &self.inner;
        if inner.state.get() != PlaybackState::Playing {
            return;
        }
        let sample = inner.sample_scroll();
        inner.last_scroll.set(Some((sample.pixels, sample.total)));
        inner.current.set(inner.map_frame(sample));
    }

    pub fn current_frame(&self) -> usize {
        self.inner.current.get()
    }

    pub fn total_frames(&self) -> usize {
        self.inner.total.get()
    }

    pub fn state(&self) -> PlaybackState {
        self.inner.state.get()
    }

    pub fn is_progressive(&self) -> bool {
        self.inner.progressive.get()
    }

    /// Frame index whose bitmap is currently on screen.
    pub fn drawn_frame(&self) -> Option<usize> {
        self.inner.last_real.get()
    }

    pub fn loaded_frames(&self) -> usize {
        self.inner.store.borrow().ready_count()
    }

    pub fn main_progress(&self) -> LoadProgress {
        self.inner.main_progress.get()
    }

    pub fn background_progress(&self) -> LoadProgress {
        self.inner.background_progress.get()
    }

    pub fn is_background_loading(&self) -> bool {
        self.inner.background_active.get()
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn on<F>(&self, kind: EventKind, listener: F, options: ListenerOptions) -> ListenerId
    where
        F: Fn(&PlaybackEvent) + 'static,
    {
        self.inner.events.on(kind, Rc::new(listener), options)
    }

    pub fn off(&self, kind: EventKind, id: ListenerId) -> bool {
        self.inner.events.off(kind, id)
    }

    /// Tear down. Idempotent; later calls on this instance do nothing.
    pub fn destroy(&self) {
        let inner = &self.inner;
        if inner.is_destroyed() {
            return;
        }
        log::info!("Destroying player ({} frames)", inner.total.get());
        inner.state.set(PlaybackState::Destroyed);
        inner.generation.set(inner.generation.get() + 1);
        inner.stop_ticking();
        inner.cancel_progress_paint();
        inner.background_active.set(false);
        inner.store.borrow_mut().reset(0);
        inner.scroll.enable();
    }
}

impl Drop for ScrollFrame {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl std::fmt::Debug for ScrollFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScrollFrame")
            .field("state", &self.state())
            .field("current", &self.current_frame())
            .field("total", &self.total_frames())
            .field("progressive", &self.is_progressive())
            .finish()
    }
}

/// Collects the non-serializable inputs and validates them in `build()`.
pub struct ScrollFrameBuilder {
    executor: Rc<LocalExecutor<'static>>,
    surface: Option<SharedSurface>,
    scroll: Option<Rc<dyn ScrollSource>>,
    axis: Option<ScrollAxis>,
    mapper: Option<FrameMapper>,
    images: Option<Vec<ImageSource>>,
    factory: Option<SourceProvider>,
    config: Config,
    listeners: Vec<(EventKind, Listener)>,
    main_painter: Option<OverlayPainter>,
    background_painter: Option<OverlayPainter>,
}

impl ScrollFrameBuilder {
    pub fn new(executor: Rc<LocalExecutor<'static>>) -> Self {
        Self {
            executor,
            surface: None,
            scroll: None,
            axis: None,
            mapper: None,
            images: None,
            factory: None,
            config: Config::default(),
            listeners: Vec::new(),
            main_painter: None,
            background_painter: None,
        }
    }

    pub fn surface(mut self, surface: SharedSurface) -> Self {
        self.surface = Some(surface);
        self
    }

    pub fn scroll_source(mut self, scroll: Rc<dyn ScrollSource>) -> Self {
        self.scroll = Some(scroll);
        self
    }

    pub fn scroll_axis(mut self, axis: ScrollAxis) -> Self {
        self.axis = Some(axis);
        self
    }

    pub fn frame_mapper<F>(mut self, mapper: F) -> Self
    where
        F: Fn(f64, f64, usize) -> f64 + 'static,
    {
        self.mapper = Some(Rc::new(mapper));
        self
    }

    pub fn linear_mapping(mut self) -> Self {
        self.mapper = Some(linear_mapper());
        self
    }

    pub fn images(mut self, images: Vec<ImageSource>) -> Self {
        self.images = Some(images);
        self
    }

    /// Produce sources on demand for `0..total`. Return `ImageSource::Absent` to skip a frame.
    pub fn image_factory<F, Fut>(mut self, total: usize, factory: F) -> Self
    where
        F: Fn(usize) -> Fut + 'static,
        Fut: Future<Output = anyhow::Result<ImageSource>> + 'static,
    {
        self.factory = Some(SourceProvider::from_factory(total, factory));
        self
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Layer `overrides` on top of the configuration so far.
    pub fn overrides(mut self, overrides: ConfigOverrides) -> Self {
        self.config = self.config.merged(overrides);
        self
    }

    fn listen(mut self, kind: EventKind, listener: Listener) -> Self {
        self.listeners.push((kind, listener));
        self
    }

    pub fn on_frame(self, listener: impl Fn(usize, f64) + 'static) -> Self {
        self.listen(
            EventKind::Frame,
            Rc::new(move |event: &PlaybackEvent| {
                if let PlaybackEvent::Frame { frame, offset } = event {
                    listener(*frame, *offset);
                }
            }),
        )
    }

    pub fn on_complete(self, listener: impl Fn() + 'static) -> Self {
        self.listen(EventKind::Complete, Rc::new(move |_: &PlaybackEvent| listener()))
    }

    pub fn on_init_complete(self, listener: impl Fn() + 'static) -> Self {
        self.listen(EventKind::InitComplete, Rc::new(move |_: &PlaybackEvent| listener()))
    }

    pub fn on_error(self, listener: impl Fn(&ScrollFrameError) + 'static) -> Self {
        self.listen(
            EventKind::Error,
            Rc::new(move |event: &PlaybackEvent| {
                if let PlaybackEvent::Error(err) = event {
                    listener(err);
                }
            }),
        )
    }

    pub fn main_loading(mut self, painter: OverlayPainter) -> Self {
        self.main_painter = Some(painter);
        self
    }

    pub fn background_loading(mut self, painter: OverlayPainter) -> Self {
        self.background_painter = Some(painter);
        self
    }

    pub fn build(self) -> ScrollFrameResult<ScrollFrame> {
        let surface = self
            .surface
            .ok_or_else(|| ScrollFrameError::config("a drawing surface is required"))?;
        let scroll = self
            .scroll
            .ok_or_else(|| ScrollFrameError::config("a scroll source is required"))?;
        let axis = self
            .axis
            .ok_or_else(|| ScrollFrameError::config("scroll axis must be \"x\" or \"y\""))?;
        let mapper = self
            .mapper
            .ok_or_else(|| ScrollFrameError::config("a frame mapper is required"))?;

        let provider = match (self.images, self.factory) {
            (Some(images), None) => SourceProvider::from_list(images),
            (None, Some(factory)) => factory,
            (Some(_), Some(_)) => {
                return Err(ScrollFrameError::config(
                    "provide either an image list or an image factory, not both",
                ))
            }
            (None, None) => {
                return Err(ScrollFrameError::config(
                    "an image list or an image factory with a total is required",
                ))
            }
        };

        let mut config = self.config;
        config.max_concurrent_loads = config.max_concurrent_loads.max(1);
        let total = provider.total();
        config.validate(total)?;

        let events = EventRegistry::new(self.executor.clone());
        for (kind, listener) in self.listeners {
            events.on(kind, listener, ListenerOptions::default());
        }

        log::debug!("Built player for {} frames ({:?})", total, config.scale_mode);

        let inner = Rc::new_cyclic(|this| Inner {
            this: this.clone(),
            executor: self.executor,
            surface,
            scroll,
            axis,
            mapper,
            provider,
            config,
            main_painter: self.main_painter,
            background_painter: self.background_painter,
            events,
            store: Rc::new(RefCell::new(FrameStore::new(total))),
            state: Cell::new(PlaybackState::Uninitialized),
            generation: Cell::new(0),
            progressive: Cell::new(false),
            total: Cell::new(total),
            current: Cell::new(0),
            last_drawn: Cell::new(None),
            last_real: Cell::new(None),
            last_scroll: Cell::new(None),
            last_failed: Cell::new(None),
            main_progress: Cell::new(LoadProgress::default()),
            background_progress: Cell::new(LoadProgress::default()),
            background_active: Cell::new(false),
            exiting: Cell::new(false),
            tick: RefCell::new(None),
            paint: RefCell::new(None),
        });

        Ok(ScrollFrame { inner })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_mapper_spans_the_sequence() {
        let map = linear_mapper();
        assert_eq!(map(0.0, 500.0, 100), 0.0);
        assert_eq!(map(500.0, 500.0, 100), 99.0);
        assert_eq!(map(250.0, 500.0, 101), 50.0);
        assert_eq!(map(10.0, 0.0, 100), 0.0);
    }

    #[test]
    fn ready_states() {
        assert!(PlaybackState::Paused.is_ready());
        assert!(!PlaybackState::Loading.is_ready());
        assert!(!PlaybackState::Destroyed.is_ready());
    }

    #[test]
    fn build_requires_collaborators() {
        let ex = Rc::new(LocalExecutor::new());
        let err = ScrollFrame::builder(ex).build().unwrap_err();
        assert!(matches!(err, ScrollFrameError::Config(_)));
    }
}
