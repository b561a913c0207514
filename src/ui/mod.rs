pub mod overlay;
pub mod scroll;
pub mod surface;

pub use overlay::{ExitDirection, LoadingParams, OverlayPainter};
pub use scroll::{ScrollAxis, ScrollPosition, ScrollSample, ScrollSource};
pub use surface::{PixelSurface, SharedSurface, Surface};
