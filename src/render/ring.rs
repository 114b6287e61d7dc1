//! Ring: one horizontal band of the gallery.
//!
//! A ring places `count` tiles evenly around the cylinder at height
//! `index * vertical_offset`, with one floating indicator in each gap.
//! Adjacent rings are phase-shifted by half a slot and rotate in opposite
//! directions while scrolling.

use std::f32::consts::TAU;
use std::time::{Duration, Instant};

use crate::config::GalleryConfig;
use crate::dataset::{Dataset, GalleryMode};
use crate::net::texture::TextureRegistry;
use crate::render::graph::{MeshId, MeshIds};
use crate::render::indicator::FloatingIndicator;
use crate::render::tile::{ImageTile, TileStyle};

/// Position of a ring along the scroll axis.
pub type RingIndex = i64;

/// Scroll speed to ring rotation divisor
const ROTATION_DIVISOR: f32 = 3.0;

/// Everything needed to build rings of one gallery.
#[derive(Debug, Clone, Copy)]
pub struct RingLayout {
    pub count: usize,
    pub vertical_offset: f32,
    pub style: TileStyle,
    pub double_click: Duration,
}

impl RingLayout {
    pub fn from_config(cfg: &GalleryConfig) -> Self {
        Self {
            count: cfg.tiles_per_ring,
            vertical_offset: cfg.vertical_offset,
            style: TileStyle::from_config(cfg),
            double_click: Duration::from_millis(cfg.double_click_ms),
        }
    }

    pub fn angle_step(&self) -> f32 {
        TAU / self.count.max(1) as f32
    }
}

impl Default for RingLayout {
    fn default() -> Self {
        Self::from_config(&GalleryConfig::default())
    }
}

/// A confirmed double-click on a tile.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub ring_index: RingIndex,
    pub tile_index: usize,
    pub external_id: Option<String>,
    pub url: String,
}

#[derive(Debug, Clone, Copy)]
struct ClickRecord {
    at: Instant,
    slot: usize,
}

pub struct Ring {
    index: RingIndex,
    mode: GalleryMode,
    root: MeshId,
    y: f32,
    angle_offset: f32,
    is_odd: bool,
    frozen: bool,
    rotation: f32,
    last_applied_offset: f32,
    tiles: Vec<ImageTile>,
    indicators: Vec<FloatingIndicator>,
    last_click: Option<ClickRecord>,
    double_click: Duration,
    disposed: bool,
}

impl Ring {
    pub fn new(
        index: RingIndex,
        dataset: &Dataset,
        layout: &RingLayout,
        ids: &mut MeshIds,
        textures: &mut TextureRegistry,
    ) -> Self {
        let step = layout.angle_step();
        let is_odd = index.rem_euclid(2) == 1;

        let mut tiles = Vec::with_capacity(layout.count);
        let mut indicators = Vec::with_capacity(layout.count);
        for slot in 0..layout.count {
            if let Some(item) = dataset.item_for(index, slot) {
                tiles.push(ImageTile::new(
                    slot,
                    layout.count,
                    item.clone(),
                    &layout.style,
                    ids,
                    textures,
                ));
            }
            let seed = (index.rem_euclid(1 << 20) as usize) * layout.count + slot;
            indicators.push(FloatingIndicator::new(slot as f32 * step + step * 0.5, 0.0, seed));
        }

        Self {
            index,
            mode: dataset.mode,
            root: ids.allocate(),
            y: index as f32 * layout.vertical_offset,
            angle_offset: if is_odd { step * 0.5 } else { 0.0 },
            is_odd,
            frozen: false,
            rotation: 0.0,
            last_applied_offset: 0.0,
            tiles,
            indicators,
            last_click: None,
            double_click: layout.double_click,
            disposed: false,
        }
    }

    pub fn index(&self) -> RingIndex {
        self.index
    }

    pub fn mode(&self) -> GalleryMode {
        self.mode
    }

    /// Identity of this ring instance (its scene root).
    pub fn id(&self) -> MeshId {
        self.root
    }

    pub fn y(&self) -> f32 {
        self.y
    }

    pub fn is_odd(&self) -> bool {
        self.is_odd
    }

    pub fn angle_offset(&self) -> f32 {
        self.angle_offset
    }

    pub fn rotation(&self) -> f32 {
        self.rotation
    }

    pub fn tiles(&self) -> &[ImageTile] {
        &self.tiles
    }

    pub fn indicators(&self) -> &[FloatingIndicator] {
        &self.indicators
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// World angle of a ring-local angle.
    pub fn world_angle(&self, local: f32) -> f32 {
        local + self.angle_offset + self.rotation
    }

    /// Per-frame step: materials, hover tweens, indicators, ring rotation.
    pub fn update(
        &mut self,
        scroll_speed: f32,
        dt: f32,
        now: Instant,
        textures: &TextureRegistry,
        ids: &mut MeshIds,
    ) {
        if self.frozen || self.disposed {
            return;
        }
        for tile in &mut self.tiles {
            tile.refresh_material(textures, ids);
            tile.update(now);
        }
        for indicator in &mut self.indicators {
            indicator.update(scroll_speed, dt);
        }

        // Delta-based so rotation integrates without snapping.
        let target = scroll_speed / ROTATION_DIVISOR;
        let direction = if self.is_odd { -1.0 } else { 1.0 };
        self.rotation += (target - self.last_applied_offset) * direction;
        self.last_applied_offset = target;
    }

    pub fn on_mouse_move(&mut self, hit: Option<MeshId>, now: Instant) {
        for tile in &mut self.tiles {
            tile.on_mouse_move(hit, now);
        }
    }

    /// Resolve a click. Returns a selection on the second click on the same
    /// tile within the double-click window. Any other click, including one
    /// that misses this ring, breaks the pair.
    pub fn on_click(&mut self, hit: Option<MeshId>, now: Instant) -> Option<Selection> {
        if self.frozen || self.disposed {
            return None;
        }
        let prev = self.last_click.take();
        let hit = hit?;
        let tile = self.tiles.iter().find(|t| t.owns(hit))?;
        let slot = tile.slot();

        if let Some(prev) = prev {
            if prev.slot == slot && now.saturating_duration_since(prev.at) <= self.double_click {
                log::debug!("Double-click on ring {} tile {}", self.index, slot);
                return Some(Selection {
                    ring_index: self.index,
                    tile_index: slot,
                    external_id: tile.item().external_id.clone(),
                    url: tile.item().url.clone(),
                });
            }
        }

        self.last_click = Some(ClickRecord { at: now, slot });
        None
    }

    pub fn freeze(&mut self) {
        self.set_frozen(true);
    }

    pub fn unfreeze(&mut self) {
        self.set_frozen(false);
    }

    fn set_frozen(&mut self, frozen: bool) {
        self.frozen = frozen;
        for tile in &mut self.tiles {
            tile.set_frozen(frozen);
        }
        for indicator in &mut self.indicators {
            indicator.set_frozen(frozen);
        }
    }

    /// Clear motion state accumulated before the ring was pooled.
    pub fn reset_animation(&mut self) {
        self.rotation = 0.0;
        self.last_applied_offset = 0.0;
        self.last_click = None;
        self.frozen = false;
        for tile in &mut self.tiles {
            tile.reset();
        }
        for indicator in &mut self.indicators {
            indicator.reset();
        }
    }

    /// Release every tile's texture and drop the tile/indicator lists.
    /// Returns false (and does nothing) if already disposed.
    pub fn dispose(&mut self, textures: &mut TextureRegistry) -> bool {
        if self.disposed {
            log::warn!("Ring {} disposed twice", self.index);
            return false;
        }
        for tile in &mut self.tiles {
            tile.dispose(textures);
        }
        self.tiles.clear();
        self.indicators.clear();
        self.disposed = true;
        true
    }
}
