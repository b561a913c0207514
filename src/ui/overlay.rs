//! Loading overlays and the overlay exit transition.

use super::surface::{SharedSurface, Surface};
use crate::util::ease_out_quad;
use image::Rgba;
use std::rc::Rc;
use std::time::Duration;

/// Snapshot of a loading phase handed to overlay painters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadingParams {
    /// Completion ratio in `[0, 1]`
    pub progress: f64,
    pub progress_count: usize,
    /// Frames expected in this phase
    pub total: usize,
    pub width: u32,
    pub height: u32,
}

/// Replacement painter for the blocking or background loading overlay.
pub type OverlayPainter = Rc<dyn Fn(&mut dyn Surface, &LoadingParams)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExitDirection {
    #[default]
    Top,
    Bottom,
}

const BACKDROP: Rgba<u8> = Rgba([0x2a, 0x2a, 0x2a, 0xff]);
const TRACK: Rgba<u8> = Rgba([0x3a, 0x3a, 0x3a, 0xff]);
const FILL: Rgba<u8> = Rgba([0x8a, 0x8a, 0x7a, 0xff]);
const STRIP: Rgba<u8> = Rgba([0, 0, 0, 77]);
const STRIP_FILL: Rgba<u8> = Rgba([255, 255, 255, 191]);

/// Blocking overlay: dark backdrop with a centered progress bar.
pub fn paint_main_overlay(surface: &mut dyn Surface, params: &LoadingParams, custom: Option<&OverlayPainter>) {
    if let Some(paint) = custom {
        paint(surface, params);
        return;
    }

    let (w, h) = surface.size();
    surface.clear();
    surface.fill_rect(0, 0, w, h, BACKDROP);

    let bar_w = (w as f64 * 0.4).round().max(1.0) as u32;
    let bar_h = (h / 60).max(2);
    let x = (w.saturating_sub(bar_w) / 2) as i64;
    let y = (h.saturating_sub(bar_h) / 2) as i64;
    surface.fill_rect(x, y, bar_w, bar_h, TRACK);

    let filled = (bar_w as f64 * params.progress.clamp(0.0, 1.0)).round() as u32;
    if filled > 0 {
        surface.fill_rect(x, y, filled, bar_h, FILL);
    }
}

/// Background overlay: translucent strip along the bottom edge, drawn over the frame.
pub fn paint_background_overlay(
    surface: &mut dyn Surface,
    params: &LoadingParams,
    custom: Option<&OverlayPainter>,
) {
    if let Some(paint) = custom {
        paint(surface, params);
        return;
    }

    let (w, h) = surface.size();
    let strip_h = (h / 80).max(2);
    let y = h.saturating_sub(strip_h) as i64;
    surface.fill_rect(0, y, w, strip_h, STRIP);

    let filled = (w as f64 * params.progress.clamp(0.0, 1.0)).round() as u32;
    if filled > 0 {
        surface.fill_rect(0, y, filled, strip_h, STRIP_FILL);
    }
}

/// Slide and fade whatever is on the surface out over `frames` animation frames.
///
/// Every frame `redraw` paints the content that is revealed underneath; it returns
/// `false` once the surface must no longer be touched, after which the remaining
/// frames still elapse but draw nothing.
pub async fn play_exit_animation<F>(
    surface: &SharedSurface,
    frames: u32,
    interval: Duration,
    direction: ExitDirection,
    mut redraw: F,
) where
    F: FnMut() -> bool,
{
    let (snapshot, height) = {
        let surface = surface.borrow();
        (surface.snapshot(), surface.size().1 as f64)
    };

    for frame in 0..frames {
        smol::Timer::after(interval).await;
        if !redraw() {
            continue;
        }

        let eased = ease_out_quad(frame as f64 / frames as f64);
        let offset = match direction {
            ExitDirection::Top => -height * eased,
            ExitDirection::Bottom => height * eased,
        };
        surface
            .borrow_mut()
            .blend_bitmap(&snapshot, 1.0 - eased, offset.round() as i64);
    }
}
