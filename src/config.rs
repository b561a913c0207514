//! Layered playback configuration.
//!
//! `Config` holds the defaults; `ConfigOverrides` carries only the fields a caller
//! wants to change and is merged on top field by field. Both are serde types so
//! overrides can come from a JSON file.

use crate::error::{ScrollFrameError, ScrollFrameResult};
use crate::util::ScaleMode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Progressive ("large") loading settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LargeConfig {
    pub enabled: bool,
    /// Power of two greater than 2
    pub factor: usize,
    pub show_background_progress: bool,
}

impl Default for LargeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            factor: 4,
            show_background_progress: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub scale_mode: ScaleMode,
    pub reset_scroll_on_init: bool,
    pub max_concurrent_loads: usize,
    /// Length of the loading overlay exit transition, in animation frames
    pub exit_animation_frames: u32,
    /// Animation frame cadence of the render loop
    pub frame_interval_ms: u64,
    pub large: LargeConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scale_mode: ScaleMode::Contain,
            reset_scroll_on_init: true,
            max_concurrent_loads: 6,
            exit_animation_frames: 75,
            frame_interval_ms: 16,
            large: LargeConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LargeOverrides {
    pub enabled: Option<bool>,
    pub factor: Option<usize>,
    pub show_background_progress: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigOverrides {
    pub scale_mode: Option<ScaleMode>,
    pub reset_scroll_on_init: Option<bool>,
    pub max_concurrent_loads: Option<usize>,
    pub exit_animation_frames: Option<u32>,
    pub frame_interval_ms: Option<u64>,
    pub large: Option<LargeOverrides>,
}

impl ConfigOverrides {
    pub fn from_json(text: &str) -> ScrollFrameResult<Self> {
        serde_json::from_str(text)
            .map_err(|e| ScrollFrameError::config(format!("invalid config overrides: {}", e)))
    }
}

impl Config {
    /// Apply `overrides` on top of `self`.
    pub fn merged(mut self, overrides: ConfigOverrides) -> Self {
        if let Some(v) = overrides.scale_mode {
            self.scale_mode = v;
        }
        if let Some(v) = overrides.reset_scroll_on_init {
            self.reset_scroll_on_init = v;
        }
        if let Some(v) = overrides.max_concurrent_loads {
            self.max_concurrent_loads = v;
        }
        if let Some(v) = overrides.exit_animation_frames {
            self.exit_animation_frames = v;
        }
        if let Some(v) = overrides.frame_interval_ms {
            self.frame_interval_ms = v;
        }
        if let Some(large) = overrides.large {
            if let Some(v) = large.enabled {
                self.large.enabled = v;
            }
            if let Some(v) = large.factor {
                self.large.factor = v;
            }
            if let Some(v) = large.show_background_progress {
                self.large.show_background_progress = v;
            }
        }
        self
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms.max(1))
    }

    /// Construction-time checks that depend on the declared frame count.
    pub fn validate(&self, total: usize) -> ScrollFrameResult<()> {
        if total <= 1 {
            return Err(ScrollFrameError::config(format!(
                "total frame count must be greater than 1 (got {})",
                total
            )));
        }
        if self.large.enabled {
            let factor = self.large.factor;
            if factor <= 2 {
                return Err(ScrollFrameError::config("large.factor must be greater than 2"));
            }
            if !factor.is_power_of_two() {
                return Err(ScrollFrameError::config(format!(
                    "large.factor must be a power of two (got {})",
                    factor
                )));
            }
            if total < factor * 2 {
                return Err(ScrollFrameError::config(format!(
                    "total frame count {} must be at least large.factor * 2 ({})",
                    total,
                    factor * 2
                )));
            }
        }
        Ok(())
    }
}
