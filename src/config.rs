use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::layout::LayoutConfig;

/// User-configurable parameters.
/// Stored in the platform config directory (`$XDG_CONFIG_HOME/pagechat/` or `%APPDATA%\pagechat\`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the question-answering backend.
    pub backend_url: String,
    /// Quiet period after the last wheel tick before the page changes.
    pub wheel_debounce_ms: u64,
    /// Settle delay after the last resize signal before the page is re-laid out.
    pub settle_delay_ms: u64,
    /// Width changes below this many pixels do not trigger a re-render.
    pub resize_threshold_px: f32,
    /// Fraction of the window width the page may use.
    pub viewport_width_fraction: f32,
    /// Width kept free for the assistant panel while it is open.
    pub panel_margin_px: f32,
    /// Fraction of the window height the page may use.
    pub viewport_height_fraction: f32,
    /// Smallest region (in on-screen pixels, both axes) that is captured.
    pub min_selection_px: f32,
    /// Render width of sidebar thumbnails.
    pub thumbnail_width: u32,
    /// How long transient notices stay on screen.
    pub notice_duration_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: "http://localhost:8000".to_string(),
            wheel_debounce_ms: 50,
            settle_delay_ms: 150,
            resize_threshold_px: 2.0,
            viewport_width_fraction: 0.95,
            panel_margin_px: 480.0,
            viewport_height_fraction: 0.9,
            min_selection_px: crate::capture::MIN_SELECTION_PX,
            thumbnail_width: 110,
            notice_duration_ms: 4000,
        }
    }
}

impl Config {
    /// Load config from the config directory, or return defaults.
    /// `BACKEND_URL` in the environment overrides the stored backend.
    pub fn load() -> Self {
        let path = config_path();
        let mut config = match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    log::warn!("Failed to parse {}: {}, using defaults", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => {
                log::info!(
                    "No config file at {}, using defaults. Creating default config.",
                    path.display()
                );
                let config = Self::default();
                config.save();
                config
            }
        };
        if let Ok(url) = std::env::var("BACKEND_URL") {
            if !url.trim().is_empty() {
                config.backend_url = url;
            }
        }
        config
    }

    pub fn save(&self) {
        let path = config_path();
        match serde_json::to_string_pretty(self) {
            Ok(json) => {
                if let Err(e) = std::fs::write(&path, json) {
                    log::warn!("Failed to write config to {}: {}", path.display(), e);
                }
            }
            Err(e) => {
                log::warn!("Failed to serialize config: {}", e);
            }
        }
    }

    pub fn layout(&self) -> LayoutConfig {
        LayoutConfig {
            viewport_width_fraction: self.viewport_width_fraction,
            panel_margin_px: self.panel_margin_px,
            viewport_height_fraction: self.viewport_height_fraction,
            resize_threshold_px: self.resize_threshold_px,
            settle_delay: Duration::from_millis(self.settle_delay_ms),
        }
    }

    pub fn wheel_debounce(&self) -> Duration {
        Duration::from_millis(self.wheel_debounce_ms)
    }

    pub fn notice_duration(&self) -> Duration {
        Duration::from_millis(self.notice_duration_ms)
    }
}

pub fn config_dir() -> PathBuf {
    let dir = dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pagechat");
    if !dir.exists() {
        std::fs::create_dir_all(&dir).ok();
    }
    dir
}

fn config_path() -> PathBuf {
    config_dir().join("config.json")
}
