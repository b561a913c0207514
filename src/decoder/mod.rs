pub mod source;
pub mod worker;

use image::{DynamicImage, RgbaImage};
use std::sync::Arc;

pub use source::{FrameFactory, SourceProvider};

/// Decoded, surface-ready pixels for one frame. Cheap to clone.
pub type Bitmap = Arc<RgbaImage>;

/// What a frame index resolves to before decoding.
#[derive(Clone, Debug)]
pub enum ImageSource {
    /// Already decoded; stored as-is without fitting
    Bitmap(Bitmap),
    /// Decoded image that still has to be fitted to the surface
    Image(Arc<DynamicImage>),
    /// URL (`http://`, `https://`) or filesystem path to fetch and decode
    Locator(String),
    /// This frame intentionally has no content and is skipped
    Absent,
}

impl ImageSource {
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }
}

impl From<DynamicImage> for ImageSource {
    fn from(image: DynamicImage) -> Self {
        Self::Image(Arc::new(image))
    }
}

impl From<RgbaImage> for ImageSource {
    fn from(bitmap: RgbaImage) -> Self {
        Self::Bitmap(Arc::new(bitmap))
    }
}

impl From<String> for ImageSource {
    fn from(locator: String) -> Self {
        Self::Locator(locator)
    }
}

impl From<&str> for ImageSource {
    fn from(locator: &str) -> Self {
        Self::Locator(locator.to_string())
    }
}

/// Target a source is decoded into
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DecodeTarget {
    pub width: u32,
    pub height: u32,
    pub scale_mode: crate::util::ScaleMode,
}
