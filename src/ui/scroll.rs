//! Scroll position sources.

use serde::{Deserialize, Serialize};
use std::cell::Cell;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollAxis {
    X,
    Y,
}

impl std::str::FromStr for ScrollAxis {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "x" => Ok(Self::X),
            "y" => Ok(Self::Y),
            other => Err(format!("scroll axis must be \"x\" or \"y\" (got {:?})", other)),
        }
    }
}

/// Anything with a scroll offset: a scrollable element, a window, a document.
///
/// The host forwards scroll notifications with `ScrollFrame::handle_scroll`.
pub trait ScrollSource {
    /// Current offset along `axis`, in pixels.
    fn offset(&self, axis: ScrollAxis) -> f64;

    /// Largest reachable offset along `axis`.
    fn max_offset(&self, axis: ScrollAxis) -> f64;

    /// Block user scrolling while frames load, optionally jumping back to the origin.
    fn disable(&self, _reset_position: bool) {}

    /// Undo `disable`.
    fn enable(&self) {}
}

/// One reading of a scroll source along the configured axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollSample {
    pub pixels: f64,
    /// Never zero; a source that cannot scroll reports 1
    pub total: f64,
}

impl ScrollSample {
    pub fn read(source: &dyn ScrollSource, axis: ScrollAxis) -> Self {
        let max = source.max_offset(axis);
        Self {
            pixels: source.offset(axis),
            total: if max > 0.0 { max } else { 1.0 },
        }
    }

    /// Offset mapped into `[0, 1]`.
    pub fn normalized(&self) -> f64 {
        (self.pixels / self.total).clamp(0.0, 1.0)
    }
}

/// Host-driven scroll position, e.g. fed from a windowing toolkit or a test.
#[derive(Debug, Default)]
pub struct ScrollPosition {
    x: Cell<f64>,
    y: Cell<f64>,
    max_x: Cell<f64>,
    max_y: Cell<f64>,
    locked: Cell<bool>,
}

impl ScrollPosition {
    pub fn new(max_x: f64, max_y: f64) -> Self {
        Self {
            max_x: Cell::new(max_x.max(0.0)),
            max_y: Cell::new(max_y.max(0.0)),
            ..Default::default()
        }
    }

    /// Move to `offset` (clamped). Ignored while scrolling is disabled.
    pub fn scroll_to(&self, axis: ScrollAxis, offset: f64) -> bool {
        if self.locked.get() {
            return false;
        }
        let (cell, max) = match axis {
            ScrollAxis::X => (&self.x, self.max_x.get()),
            ScrollAxis::Y => (&self.y, self.max_y.get()),
        };
        cell.set(offset.clamp(0.0, max));
        true
    }

    pub fn set_extent(&self, max_x: f64, max_y: f64) {
        self.max_x.set(max_x.max(0.0));
        self.max_y.set(max_y.max(0.0));
        self.x.set(self.x.get().min(self.max_x.get()));
        self.y.set(self.y.get().min(self.max_y.get()));
    }

    pub fn is_locked(&self) -> bool {
        self.locked.get()
    }
}

impl ScrollSource for ScrollPosition {
    fn offset(&self, axis: ScrollAxis) -> f64 {
        match axis {
            ScrollAxis::X => self.x.get(),
            ScrollAxis::Y => self.y.get(),
        }
    }

    fn max_offset(&self, axis: ScrollAxis) -> f64 {
        match axis {
            ScrollAxis::X => self.max_x.get(),
            ScrollAxis::Y => self.max_y.get(),
        }
    }

    fn disable(&self, reset_position: bool) {
        if reset_position {
            self.x.set(0.0);
            self.y.set(0.0);
        }
        self.locked.set(true);
    }

    fn enable(&self) {
        self.locked.set(false);
    }
}
