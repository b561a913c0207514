//! Placement math for drawing a source image onto a fixed-size surface.

use serde::{Deserialize, Serialize};

/// How a frame is fitted into the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScaleMode {
    /// Letterbox, preserving aspect ratio, centered
    #[default]
    Contain,
    /// Fill the surface, preserving aspect ratio, cropping the overflow
    Cover,
    /// Stretch to the exact surface size
    Fill,
}

impl std::str::FromStr for ScaleMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "contain" => Ok(Self::Contain),
            "cover" => Ok(Self::Cover),
            "fill" => Ok(Self::Fill),
            other => Err(format!("unknown scale mode: {}", other)),
        }
    }
}

/// Destination rectangle in surface pixels. Offsets may be negative for `Cover`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Rect {
    /// Integer placement used when rasterizing (size never collapses to zero).
    pub fn rounded(&self) -> (i64, i64, u32, u32) {
        (
            self.x.round() as i64,
            self.y.round() as i64,
            self.w.round().max(1.0) as u32,
            self.h.round().max(1.0) as u32,
        )
    }
}

pub fn fit_contain(src_w: f64, src_h: f64, dst_w: f64, dst_h: f64) -> Rect {
    let src_ratio = src_w / src_h;
    let dst_ratio = dst_w / dst_h;
    if src_ratio > dst_ratio {
        let w = dst_w;
        let h = w / src_ratio;
        Rect { x: 0.0, y: (dst_h - h) / 2.0, w, h }
    } else {
        let h = dst_h;
        let w = h * src_ratio;
        Rect { x: (dst_w - w) / 2.0, y: 0.0, w, h }
    }
}

pub fn fit_cover(src_w: f64, src_h: f64, dst_w: f64, dst_h: f64) -> Rect {
    let src_ratio = src_w / src_h;
    let dst_ratio = dst_w / dst_h;
    if src_ratio < dst_ratio {
        let w = dst_w;
        let h = w / src_ratio;
        Rect { x: 0.0, y: (dst_h - h) / 2.0, w, h }
    } else {
        let h = dst_h;
        let w = h * src_ratio;
        Rect { x: (dst_w - w) / 2.0, y: 0.0, w, h }
    }
}

pub fn fit_fill(_src_w: f64, _src_h: f64, dst_w: f64, dst_h: f64) -> Rect {
    Rect { x: 0.0, y: 0.0, w: dst_w, h: dst_h }
}

pub fn select_fit(mode: ScaleMode, src_w: f64, src_h: f64, dst_w: f64, dst_h: f64) -> Rect {
    match mode {
        ScaleMode::Contain => fit_contain(src_w, src_h, dst_w, dst_h),
        ScaleMode::Cover => fit_cover(src_w, src_h, dst_w, dst_h),
        ScaleMode::Fill => fit_fill(src_w, src_h, dst_w, dst_h),
    }
}

pub fn ease_out_quad(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    1.0 - (1.0 - t) * (1.0 - t)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contain_letterboxes_wide_source() {
        let r = fit_contain(200.0, 100.0, 100.0, 100.0);
        assert_eq!(r, Rect { x: 0.0, y: 25.0, w: 100.0, h: 50.0 });
    }

    #[test]
    fn contain_pillarboxes_tall_source() {
        let r = fit_contain(50.0, 100.0, 100.0, 100.0);
        assert_eq!(r, Rect { x: 25.0, y: 0.0, w: 50.0, h: 100.0 });
    }

    #[test]
    fn cover_crops_and_centers() {
        let r = fit_cover(200.0, 100.0, 100.0, 100.0);
        assert_eq!(r, Rect { x: -50.0, y: 0.0, w: 200.0, h: 100.0 });

        let r = fit_cover(100.0, 200.0, 100.0, 100.0);
        assert_eq!(r, Rect { x: 0.0, y: -50.0, w: 100.0, h: 200.0 });
    }

    #[test]
    fn fill_ignores_aspect_ratio() {
        let r = select_fit(ScaleMode::Fill, 13.0, 7.0, 64.0, 48.0);
        assert_eq!(r, Rect { x: 0.0, y: 0.0, w: 64.0, h: 48.0 });
    }

    #[test]
    fn ease_is_clamped() {
        assert_eq!(ease_out_quad(-1.0), 0.0);
        assert_eq!(ease_out_quad(0.5), 0.75);
        assert_eq!(ease_out_quad(2.0), 1.0);
    }

    #[test]
    fn scale_mode_parses_lowercase() {
        assert_eq!("cover".parse::<ScaleMode>(), Ok(ScaleMode::Cover));
        assert!("stretch".parse::<ScaleMode>().is_err());
    }
}
