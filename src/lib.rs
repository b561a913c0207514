//! scrollframe - scroll-driven image sequence playback.
//!
//! Frames are resolved from a list or a factory, decoded off the executor thread,
//! fitted to a drawing surface and shown according to the scroll position. Large
//! sequences load progressively: a sparse first tier blocks `init()`, denser tiers
//! stream in afterwards while the nearest later frame stands in for missing ones.
//!
//! ```no_run
//! use scrollframe::{ImageSource, PixelSurface, ScrollAxis, ScrollFrame, ScrollPosition};
//! use std::rc::Rc;
//!
//! let ex = Rc::new(smol::LocalExecutor::new());
//! let surface = PixelSurface::shared(640, 360);
//! let scroll = Rc::new(ScrollPosition::new(0.0, 4000.0));
//!
//! let player = ScrollFrame::builder(ex.clone())
//!     .surface(surface.clone())
//!     .scroll_source(scroll.clone())
//!     .scroll_axis(ScrollAxis::Y)
//!     .linear_mapping()
//!     .images((0..120).map(|i| ImageSource::from(format!("frames/{:04}.png", i))).collect())
//!     .build()?;
//!
//! smol::block_on(ex.run(async {
//!     player.init().await?;
//!     player.play();
//!     Ok::<_, scrollframe::ScrollFrameError>(())
//! }))?;
//! # Ok::<_, scrollframe::ScrollFrameError>(())
//! ```

pub mod config;
pub mod decoder;
pub mod error;
pub mod loader;
pub mod playback;
pub mod ui;
pub mod util;

pub use config::{Config, ConfigOverrides, LargeConfig, LargeOverrides};
pub use decoder::{Bitmap, DecodeTarget, ImageSource, SourceProvider};
pub use error::{ScrollFrameError, ScrollFrameResult};
pub use loader::{run_bounded, FrameStore, LoadPlan, LoadProgress, ProgressiveFrameLoader};
pub use playback::{
    linear_mapper, EventKind, FrameMapper, ListenerId, ListenerOptions, PlaybackEvent, PlaybackState,
    ScrollFrame, ScrollFrameBuilder,
};
pub use ui::{
    ExitDirection, LoadingParams, OverlayPainter, PixelSurface, ScrollAxis, ScrollPosition, ScrollSource,
    SharedSurface, Surface,
};
pub use util::{Rect, ScaleMode};
