//! Drawable surface abstraction and the built-in software surface.

use crate::decoder::Bitmap;
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;

/// Surface shared between the controller and its host.
pub type SharedSurface = Rc<RefCell<dyn Surface>>;

/// The small set of 2D operations playback needs.
pub trait Surface {
    fn size(&self) -> (u32, u32);

    /// Reset every pixel to transparent.
    fn clear(&mut self);

    /// Draw `bitmap` stretched over the whole surface.
    fn draw_bitmap(&mut self, bitmap: &Bitmap);

    /// Source-over fill of a rectangle, clipped to the surface.
    fn fill_rect(&mut self, x: i64, y: i64, w: u32, h: u32, color: Rgba<u8>);

    /// Copy of the current contents.
    fn snapshot(&self) -> Bitmap;

    /// Source-over draw of `bitmap` at vertical offset `offset_y` with extra opacity `alpha`.
    fn blend_bitmap(&mut self, bitmap: &Bitmap, alpha: f64, offset_y: i64);
}

/// Source-over blend of one straight-alpha pixel onto another.
#[inline]
fn blend_pixel(dst: &mut Rgba<u8>, src: Rgba<u8>, alpha: f64) {
    let a = (src[3] as f64 / 255.0) * alpha.clamp(0.0, 1.0);
    if a <= 0.0 {
        return;
    }
    let dst_a = dst[3] as f64 / 255.0;
    let out_a = a + dst_a * (1.0 - a);
    if out_a <= 0.0 {
        *dst = Rgba([0, 0, 0, 0]);
        return;
    }
    for c in 0..3 {
        let value = (src[c] as f64 * a + dst[c] as f64 * dst_a * (1.0 - a)) / out_a;
        dst[c] = value.round().clamp(0.0, 255.0) as u8;
    }
    dst[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
}

/// `RgbaImage`-backed surface used by the demo binary and tests.
#[derive(Debug, Clone)]
pub struct PixelSurface {
    pixels: RgbaImage,
    frames_drawn: usize,
}

impl PixelSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            pixels: RgbaImage::new(width, height),
            frames_drawn: 0,
        }
    }

    /// Convenience for handing the surface to a builder while keeping a handle.
    pub fn shared(width: u32, height: u32) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self::new(width, height)))
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> Rgba<u8> {
        *self.pixels.get_pixel(x, y)
    }

    /// Number of `draw_bitmap` calls so far.
    pub fn frames_drawn(&self) -> usize {
        self.frames_drawn
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        self.pixels.save(path.as_ref())?;
        Ok(())
    }
}

impl Surface for PixelSurface {
    fn size(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    fn clear(&mut self) {
        for pixel in self.pixels.pixels_mut() {
            *pixel = Rgba([0, 0, 0, 0]);
        }
    }

    fn draw_bitmap(&mut self, bitmap: &Bitmap) {
        let (w, h) = self.pixels.dimensions();
        if bitmap.dimensions() == (w, h) {
            for (dst, src) in self.pixels.pixels_mut().zip(bitmap.pixels()) {
                blend_pixel(dst, *src, 1.0);
            }
        } else {
            let scaled = imageops::resize(&**bitmap, w, h, FilterType::Triangle);
            imageops::overlay(&mut self.pixels, &scaled, 0, 0);
        }
        self.frames_drawn += 1;
    }

    fn fill_rect(&mut self, x: i64, y: i64, w: u32, h: u32, color: Rgba<u8>) {
        let (sw, sh) = self.pixels.dimensions();
        let x0 = x.clamp(0, sw as i64) as u32;
        let y0 = y.clamp(0, sh as i64) as u32;
        let x1 = (x + w as i64).clamp(0, sw as i64) as u32;
        let y1 = (y + h as i64).clamp(0, sh as i64) as u32;
        for py in y0..y1 {
            for px in x0..x1 {
                blend_pixel(self.pixels.get_pixel_mut(px, py), color, 1.0);
            }
        }
    }

    fn snapshot(&self) -> Bitmap {
        Arc::new(self.pixels.clone())
    }

    fn blend_bitmap(&mut self, bitmap: &Bitmap, alpha: f64, offset_y: i64) {
        let (sw, sh) = self.pixels.dimensions();
        let (bw, bh) = bitmap.dimensions();
        for by in 0..bh {
            let dy = by as i64 + offset_y;
            if dy < 0 || dy >= sh as i64 {
                continue;
            }
            for bx in 0..bw.min(sw) {
                blend_pixel(
                    self.pixels.get_pixel_mut(bx, dy as u32),
                    *bitmap.get_pixel(bx, by),
                    alpha,
                );
            }
        }
    }
}
