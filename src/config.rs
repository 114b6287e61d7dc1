//! Gallery configuration.
//!
//! Every tunable of the ring window, the tiles and the interaction loop
//! lives here so the scene, the window manager and the viewer agree on one
//! set of numbers. Values come from `GalleryConfig::default()`, optionally
//! overridden by a TOML file and `GALLERY_`-prefixed environment variables.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::dataset::GalleryMode;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Invalid value for `{field}`: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

/// Dataset section: what the rings display.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    pub mode: GalleryMode,
    /// Local file paths or URLs (ipfs://, ar://, http(s)://)
    pub items: Vec<String>,
    /// Gateway used to turn `ipfs://` references into fetchable URLs
    pub ipfs_gateway: String,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            mode: GalleryMode::Local,
            items: Vec::new(),
            ipfs_gateway: "https://ipfs.io/".to_string(),
        }
    }
}

/// Tunables for the whole gallery.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GalleryConfig {
    /// World-space distance between two consecutive rings
    pub vertical_offset: f32,
    /// Width of the live ring window (in rings)
    pub visible_rings: i64,
    /// Ring indices are clamped to `[-ring_bound, ring_bound]`
    pub ring_bound: i64,
    /// Image tiles per ring
    pub tiles_per_ring: usize,
    /// Cylinder radius
    pub radius: f32,
    /// Tile height as a fraction of `vertical_offset`
    pub tile_height: f32,
    /// Fraction of each angular slot left empty between tiles
    pub tile_gap: f32,
    /// Camera height when the drag offset is zero
    pub camera_base_y: f32,
    /// Drag pixels per world unit
    pub drag_scale: f32,
    /// Multiplier from per-frame camera movement to scroll speed
    pub scroll_speed_gain: f32,
    /// Scroll speeds below this snap to zero
    pub speed_epsilon: f32,
    /// Rings farther than this from the camera are not animated
    pub animate_distance: f32,
    /// Double-click window
    pub double_click_ms: u64,
    /// Tile scale while hovered
    pub hover_scale: f32,
    /// Hover scale animation length
    pub hover_ms: u64,
    /// Maximum pooled rings kept for reuse (0 disables pooling)
    pub pool_capacity: usize,
    /// Offload window arithmetic to a background thread
    pub use_worker: bool,
    /// Longest a frame waits for a worker reply before planning inline.
    /// 0 never waits.
    pub worker_timeout_ms: u64,
    /// Vertical field of view in degrees
    pub fov_deg: f32,
    pub dataset: DatasetConfig,
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            vertical_offset: 0.5,
            visible_rings: 100,
            ring_bound: 1000,
            tiles_per_ring: 16,
            radius: 3.0,
            tile_height: 0.85,
            tile_gap: 0.08,
            camera_base_y: 0.0,
            drag_scale: 100.0,
            scroll_speed_gain: 10.0,
            speed_epsilon: 1e-4,
            animate_distance: 6.0,
            double_click_ms: 300,
            hover_scale: 1.2,
            hover_ms: 200,
            pool_capacity: 64,
            use_worker: true,
            worker_timeout_ms: 0,
            fov_deg: 75.0,
            dataset: DatasetConfig::default(),
        }
    }
}

impl GalleryConfig {
    /// Load defaults, then an optional TOML file, then `GALLERY_*` env vars.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }
        let settings = builder
            .add_source(
                config::Environment::with_prefix("GALLERY")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let cfg: GalleryConfig = settings.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.vertical_offset > 0.0) {
            return Err(ConfigError::Invalid {
                field: "vertical_offset",
                reason: "must be positive",
            });
        }
        if self.visible_rings < 2 {
            return Err(ConfigError::Invalid {
                field: "visible_rings",
                reason: "must be at least 2",
            });
        }
        if self.ring_bound < 1 {
            return Err(ConfigError::Invalid {
                field: "ring_bound",
                reason: "must be at least 1",
            });
        }
        if self.tiles_per_ring == 0 {
            return Err(ConfigError::Invalid {
                field: "tiles_per_ring",
                reason: "must be non-zero",
            });
        }
        if !(self.radius > 0.0) || !(self.drag_scale > 0.0) {
            return Err(ConfigError::Invalid {
                field: "radius",
                reason: "radius and drag_scale must be positive",
            });
        }
        if !(0.0..1.0).contains(&self.tile_gap) {
            return Err(ConfigError::Invalid {
                field: "tile_gap",
                reason: "must be in [0, 1)",
            });
        }
        Ok(())
    }

    /// Half-width of the hysteresis band.
    pub fn hysteresis(&self) -> i64 {
        self.visible_rings / 4
    }
}
