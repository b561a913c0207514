//! Per-tick scroll sampling and frame drawing.

use super::events::PlaybackEvent;
use super::{Inner, PlaybackState};
use crate::decoder::Bitmap;
use crate::error::{ScrollFrameError, ScrollFrameResult};
use crate::ui::{overlay, LoadingParams, ScrollSample};

impl Inner {
    pub(super) fn sample_scroll(&self) -> ScrollSample {
        ScrollSample::read(&*self.scroll, self.axis)
    }

    /// Map a scroll reading to a frame in `[0, total - 1]`.
    pub(super) fn map_frame(&self, sample: ScrollSample) -> usize {
        let total = self.total.get();
        if total == 0 {
            return 0;
        }
        let raw = (self.mapper)(sample.pixels, sample.total, total);
        if !raw.is_finite() {
            return 0;
        }
        raw.round().clamp(0.0, (total - 1) as f64) as usize
    }

    /// Bitmap for `frame` plus the index it actually came from.
    fn lookup(&self, frame: usize) -> ScrollFrameResult<(usize, Bitmap)> {
        let store = self.store.borrow();
        if let Some(bitmap) = store.get(frame) {
            return Ok((frame, bitmap.clone()));
        }
        if !self.progressive.get() {
            return Err(ScrollFrameError::NotPrerendered { index: frame });
        }
        store
            .nearest_at_or_after(frame)
            .map(|(real, bitmap)| (real, bitmap.clone()))
            .ok_or(ScrollFrameError::FrameUnavailable { index: frame })
    }

    /// Draw the current logical frame.
    ///
    /// Without `force` nothing happens when that frame is already on screen.
    /// `emit` controls the `Frame`/`Complete` events; render errors are always
    /// reported and never stop playback.
    pub(super) fn render_frame(&self, force: bool, emit: bool) {
        if self.is_destroyed() {
            return;
        }
        let frame = self.current.get();
        if !force && self.last_drawn.get() == Some(frame) {
            return;
        }

        let (real, bitmap) = match self.lookup(frame) {
            Ok(found) => found,
            Err(err) => {
                // Remember the failure so neither the tick nor forced redraws report it again.
                self.last_drawn.set(Some(frame));
                if self.last_failed.replace(Some(frame)) == Some(frame) {
                    log::trace!("Frame {} still unavailable", frame);
                    return;
                }
                log::warn!("{}", err);
                self.events.emit(PlaybackEvent::Error(err));
                return;
            }
        };
        self.last_failed.set(None);

        {
            let mut surface = self.surface.borrow_mut();
            surface.clear();
            surface.draw_bitmap(&bitmap);
        }
        if real != frame {
            log::trace!("Frame {} not loaded yet, drew {}", frame, real);
        }
        self.last_drawn.set(Some(frame));
        self.last_real.set(Some(real));

        if emit {
            let offset = self.sample_scroll().normalized();
            self.events.emit(PlaybackEvent::Frame { frame, offset });
            if frame + 1 == self.total.get() {
                self.events.emit(PlaybackEvent::Complete);
            }
        }
    }

    /// One animation tick while playing.
    pub(super) fn step(&self) {
        let sample = self.sample_scroll();
        let reading = (sample.pixels, sample.total);
        if self.last_scroll.get() != Some(reading) {
            self.last_scroll.set(Some(reading));
            self.current.set(self.map_frame(sample));
        }
        self.render_frame(false, true);
    }

    pub(super) fn start_ticking(&self) {
        let weak = self.this.clone();
        let interval = self.config.frame_interval();
        let task = self.executor.spawn(async move {
            loop {
                smol::Timer::after(interval).await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                if inner.state.get() != PlaybackState::Playing {
                    break;
                }
                inner.step();
            }
        });
        *self.tick.borrow_mut() = Some(task);
    }

    pub(super) fn stop_ticking(&self) {
        // Dropping the task cancels the pending tick.
        let _ = self.tick.borrow_mut().take();
    }

    fn loading_params(&self, count: usize, total: usize, progress: f64) -> LoadingParams {
        let (width, height) = self.surface.borrow().size();
        LoadingParams {
            progress,
            progress_count: count,
            total,
            width,
            height,
        }
    }

    pub(super) fn paint_main_progress(&self) {
        let progress = self.main_progress.get();
        let params = self.loading_params(progress.count, progress.total, progress.ratio());
        overlay::paint_main_overlay(
            &mut *self.surface.borrow_mut(),
            &params,
            self.main_painter.as_ref(),
        );
    }

    /// Current frame with the background strip on top.
    pub(super) fn paint_background_progress(&self) {
        self.render_frame(true, false);
        let progress = self.background_progress.get();
        let params = self.loading_params(progress.count, progress.total, progress.ratio());
        overlay::paint_background_overlay(
            &mut *self.surface.borrow_mut(),
            &params,
            self.background_painter.as_ref(),
        );
    }

    /// Queue an overlay repaint for the next animation frame.
    ///
    /// Updates that arrive while a repaint is pending are folded into it.
    pub(super) fn schedule_progress_paint(&self) {
        if self
            .paint
            .borrow()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
        {
            return;
        }
        let weak = self.this.clone();
        let interval = self.config.frame_interval();
        let task = self.executor.spawn(async move {
            smol::Timer::after(interval).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            match inner.state.get() {
                PlaybackState::Loading if !inner.exiting.get() => inner.paint_main_progress(),
                PlaybackState::ReadyIdle | PlaybackState::Playing | PlaybackState::Paused
                    if inner.background_active.get() && inner.config.large.show_background_progress =>
                {
                    inner.paint_background_progress()
                }
                _ => {}
            }
        });
        *self.paint.borrow_mut() = Some(task);
    }

    pub(super) fn cancel_progress_paint(&self) {
        let _ = self.paint.borrow_mut().take();
    }
}
