use super::{Bitmap, DecodeTarget, ImageSource};
use crate::util::select_fit;
use anyhow::{bail, Context, Result};
use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, RgbaImage};
use std::sync::Arc;
use std::time::Instant;

/// Locators with an http(s) scheme are fetched over the network, everything else is a path.
pub fn is_remote(locator: &str) -> bool {
    let lower = locator.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Fetch and decode a locator. Blocking; call through `smol::unblock`.
pub fn fetch_image(locator: &str) -> Result<DynamicImage> {
    if is_remote(locator) {
        log::debug!("Fetching frame from URL: {}", locator);
        let response = reqwest::blocking::get(locator)?;
        if !response.status().is_success() {
            bail!("HTTP error: {}", response.status());
        }
        let bytes = response.bytes()?;
        image::load_from_memory(&bytes).with_context(|| format!("Image load error: {}", locator))
    } else {
        image::open(locator).with_context(|| format!("Image load error: {}", locator))
    }
}

/// Draw `image` into a fresh transparent surface-sized bitmap using the target scale mode.
///
/// When the placement overflows the surface (cover) only the visible part of the
/// source is cropped and resized, so memory stays bounded by the surface size.
pub fn fit_to_surface(image: &DynamicImage, target: DecodeTarget) -> RgbaImage {
    let mut canvas = RgbaImage::new(target.width, target.height);
    let (nat_w, nat_h) = image.dimensions();
    if nat_w == 0 || nat_h == 0 || target.width == 0 || target.height == 0 {
        return canvas;
    }
    let rect = select_fit(
        target.scale_mode,
        nat_w as f64,
        nat_h as f64,
        target.width as f64,
        target.height as f64,
    );
    let (x, y, w, h) = rect.rounded();

    let left = x.max(0);
    let top = y.max(0);
    let right = (x + w as i64).min(target.width as i64);
    let bottom = (y + h as i64).min(target.height as i64);
    if right <= left || bottom <= top {
        return canvas;
    }
    let (vis_w, vis_h) = ((right - left) as u32, (bottom - top) as u32);

    let scaled = if (vis_w, vis_h) == (w, h) {
        if (w, h) == (nat_w, nat_h) {
            image.to_rgba8()
        } else {
            imageops::resize(image, w, h, FilterType::Triangle)
        }
    } else {
        // Visible window mapped back into source pixels.
        let scale_x = nat_w as f64 / w as f64;
        let scale_y = nat_h as f64 / h as f64;
        let src_right = (((right - x) as f64 * scale_x).ceil() as u32).clamp(1, nat_w);
        let src_bottom = (((bottom - y) as f64 * scale_y).ceil() as u32).clamp(1, nat_h);
        let src_x = (((left - x) as f64 * scale_x).floor() as u32).min(src_right - 1);
        let src_y = (((top - y) as f64 * scale_y).floor() as u32).min(src_bottom - 1);
        let region = image.crop_imm(src_x, src_y, src_right - src_x, src_bottom - src_y);
        if region.dimensions() == (vis_w, vis_h) {
            region.to_rgba8()
        } else {
            imageops::resize(&region, vis_w, vis_h, FilterType::Triangle)
        }
    };

    imageops::replace(&mut canvas, &scaled, left, top);
    canvas
}

/// Turn a resolved, non-absent source into a surface-ready bitmap.
///
/// Decoding and fetching run on the blocking pool so the executor thread stays free
/// for scheduling and drawing.
pub async fn decode_source(source: ImageSource, target: DecodeTarget) -> Result<Bitmap> {
    match source {
        ImageSource::Bitmap(bitmap) => Ok(bitmap),
        ImageSource::Image(image) => {
            let fitted = smol::unblock(move || fit_to_surface(&image, target)).await;
            Ok(Arc::new(fitted))
        }
        ImageSource::Locator(locator) => {
            smol::unblock(move || -> Result<Bitmap> {
                let start = Instant::now();
                let image = fetch_image(&locator)?;
                let fitted = fit_to_surface(&image, target);
                log::trace!("Decoded {} in {:?}", locator, start.elapsed());
                Ok(Arc::new(fitted))
            })
            .await
        }
        ImageSource::Absent => bail!("absent frames have nothing to decode"),
    }
}
