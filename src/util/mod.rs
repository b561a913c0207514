pub mod fit;

pub use fit::{ease_out_quad, select_fit, Rect, ScaleMode};
