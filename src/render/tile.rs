//! Image tile: one image slot on a ring's cylinder wall.
//!
//! The tile owns its mesh identity and hover animation; its texture lives in
//! the shared `TextureRegistry`. Until the texture arrives the tile shows a
//! placeholder, and a failed load leaves a visible error material.

use std::f32::consts::TAU;
use std::time::{Duration, Instant};

use crate::config::GalleryConfig;
use crate::dataset::DisplayItem;
use crate::net::texture::{TextureRegistry, TextureStatus};
use crate::render::graph::{MeshId, MeshIds};
use crate::render::tween::{easing, Tween, TweenDirection};

pub const PLACEHOLDER_COLOR: [f32; 4] = [0.82, 0.82, 0.86, 1.0];
pub const ERROR_COLOR: [f32; 4] = [0.85, 0.18, 0.22, 1.0];

/// Sizing and hover parameters shared by every tile of a gallery.
#[derive(Debug, Clone, Copy)]
pub struct TileStyle {
    pub radius: f32,
    pub height: f32,
    /// Fraction of each angular slot left empty
    pub gap: f32,
    pub hover_scale: f32,
    pub hover_duration: Duration,
}

impl TileStyle {
    pub fn from_config(cfg: &GalleryConfig) -> Self {
        Self {
            radius: cfg.radius,
            height: cfg.tile_height * cfg.vertical_offset,
            gap: cfg.tile_gap,
            hover_scale: cfg.hover_scale,
            hover_duration: Duration::from_millis(cfg.hover_ms),
        }
    }
}

impl Default for TileStyle {
    fn default() -> Self {
        Self::from_config(&GalleryConfig::default())
    }
}

/// Partial-cylinder segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileGeometry {
    pub radius: f32,
    /// Start angle in radians, local to the ring
    pub theta_start: f32,
    /// Angular width in radians
    pub theta_length: f32,
    pub height: f32,
}

impl TileGeometry {
    /// Segment for `slot` of `count`, centred on the slot angle.
    pub fn for_slot(slot: usize, count: usize, style: &TileStyle) -> Self {
        let step = TAU / count.max(1) as f32;
        let theta_length = step * (1.0 - style.gap);
        Self {
            radius: style.radius,
            theta_start: slot as f32 * step - theta_length * 0.5,
            theta_length,
            height: style.height,
        }
    }

    pub fn center_angle(&self) -> f32 {
        self.theta_start + self.theta_length * 0.5
    }

    /// Arc length along the wall.
    pub fn arc_width(&self) -> f32 {
        self.radius * self.theta_length
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Material {
    Placeholder,
    /// Loaded texture, drawn by a child mesh wrapping the tile
    Textured { child: MeshId },
    Error,
}

pub struct ImageTile {
    slot: usize,
    item: DisplayItem,
    geometry: TileGeometry,
    mesh: MeshId,
    material: Material,
    scale: f32,
    hovered: bool,
    scale_tween: Tween,
    frozen: bool,
    disposed: bool,
}

impl ImageTile {
    pub fn new(
        slot: usize,
        count: usize,
        item: DisplayItem,
        style: &TileStyle,
        ids: &mut MeshIds,
        textures: &mut TextureRegistry,
    ) -> Self {
        textures.acquire(&item.url);
        let scale_tween = Tween::new(1.0, style.hover_scale, style.hover_duration)
            .with_easing(easing::ease_out_quad);
        let mut tile = Self {
            slot,
            item,
            geometry: TileGeometry::for_slot(slot, count, style),
            mesh: ids.allocate(),
            material: Material::Placeholder,
            scale: 1.0,
            hovered: false,
            scale_tween,
            frozen: false,
            disposed: false,
        };
        // Shared textures may already be resident.
        tile.refresh_material(textures, ids);
        tile
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn item(&self) -> &DisplayItem {
        &self.item
    }

    pub fn geometry(&self) -> &TileGeometry {
        &self.geometry
    }

    pub fn mesh(&self) -> MeshId {
        self.mesh
    }

    pub fn material(&self) -> Material {
        self.material
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn is_hovered(&self) -> bool {
        self.hovered
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Id that hit-testing reports for this tile: the textured child when
    /// present, the tile mesh otherwise.
    pub fn pick_id(&self) -> MeshId {
        match self.material {
            Material::Textured { child } => child,
            _ => self.mesh,
        }
    }

    /// True if `hit` is this tile's mesh or its direct child.
    pub fn owns(&self, hit: MeshId) -> bool {
        match self.material {
            Material::Textured { child } if child == hit => true,
            _ => self.mesh == hit,
        }
    }

    /// Swap the placeholder once the shared texture has settled.
    pub fn refresh_material(&mut self, textures: &TextureRegistry, ids: &mut MeshIds) {
        if self.disposed || self.material != Material::Placeholder {
            return;
        }
        match textures.status(&self.item.url) {
            TextureStatus::Ready => {
                self.material = Material::Textured {
                    child: ids.allocate(),
                };
            }
            TextureStatus::Failed => {
                log::warn!("Tile {} falls back to error material: {}", self.slot, self.item.url);
                self.material = Material::Error;
            }
            TextureStatus::Loading | TextureStatus::Missing => {}
        }
    }

    pub fn on_mouse_move(&mut self, hit: Option<MeshId>, now: Instant) {
        if self.frozen || self.disposed {
            return;
        }
        let is_hit = hit.map_or(false, |h| self.owns(h));

        // Either run picks up from the scale the other one reached
        if is_hit && !self.hovered {
            self.hovered = true;
            self.scale_tween.set_direction(TweenDirection::Forwards);
            self.scale_tween.start_from(now, self.scale);
        } else if !is_hit && self.hovered {
            self.hovered = false;
            self.scale_tween.set_direction(TweenDirection::Backwards);
            self.scale_tween.start_from(now, self.scale);
        }
    }

    /// Advance the hover animation. No-op while frozen.
    pub fn update(&mut self, now: Instant) {
        if self.frozen || self.disposed {
            return;
        }
        let scale = &mut self.scale;
        self.scale_tween.update(now, |v| *scale = v);
    }

    pub fn set_frozen(&mut self, frozen: bool) {
        self.frozen = frozen;
    }

    /// Back to the resting state (used when a pooled ring is revived).
    pub fn reset(&mut self) {
        self.scale_tween.stop();
        self.scale_tween.set_direction(TweenDirection::Forwards);
        self.scale = 1.0;
        self.hovered = false;
        self.frozen = false;
    }

    /// Release this tile's texture reference. Safe to call more than once.
    pub fn dispose(&mut self, textures: &mut TextureRegistry) {
        if self.disposed {
            return;
        }
        textures.release(&self.item.url);
        self.disposed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::texture::testing::registry;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn geometry_tiles_full_circle_with_gaps() {
        let style = TileStyle::default();
        let count = 16;
        let total: f32 = (0..count)
            .map(|s| TileGeometry::for_slot(s, count, &style).theta_length)
            .sum();
        assert!(total < TAU);
        assert!((total - TAU * (1.0 - style.gap)).abs() < 1e-4);

        let g1 = TileGeometry::for_slot(1, count, &style);
        assert!((g1.center_angle() - TAU / 16.0).abs() < 1e-5);
    }

    #[test]
    fn placeholder_until_loaded_then_textured() {
        let (mut reg, loader) = registry();
        let mut ids = MeshIds::new();
        let style = TileStyle::default();
        let mut tile = ImageTile::new(0, 16, DisplayItem::local("a.png"), &style, &mut ids, &mut reg);
        assert_eq!(tile.material(), Material::Placeholder);

        loader.complete("a.png", true);
        reg.poll();
        tile.refresh_material(&reg, &mut ids);
        match tile.material() {
            Material::Textured { child } => {
                assert!(tile.owns(child));
                assert!(tile.owns(tile.mesh()));
                assert_eq!(tile.pick_id(), child);
            }
            other => panic!("Expected Textured, got {:?}", other),
        }
    }

    #[test]
    fn failed_load_shows_error_material() {
        let (mut reg, loader) = registry();
        let mut ids = MeshIds::new();
        let mut tile =
            ImageTile::new(0, 16, DisplayItem::local("bad.png"), &TileStyle::default(), &mut ids, &mut reg);
        loader.complete("bad.png", false);
        reg.poll();
        tile.refresh_material(&reg, &mut ids);
        assert_eq!(tile.material(), Material::Error);
    }

    #[test]
    fn hover_scales_up_and_back() {
        let (mut reg, _loader) = registry();
        let mut ids = MeshIds::new();
        let style = TileStyle::default();
        let mut tile = ImageTile::new(0, 16, DisplayItem::local("a.png"), &style, &mut ids, &mut reg);
        let t0 = Instant::now();

        tile.on_mouse_move(Some(tile.mesh()), t0);
        assert!(tile.is_hovered());
        tile.update(t0 + ms(1000));
        assert!((tile.scale() - style.hover_scale).abs() < 1e-5);

        tile.on_mouse_move(None, t0 + ms(1100));
        assert!(!tile.is_hovered());
        tile.update(t0 + ms(2000));
        assert!((tile.scale() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn early_leave_shrinks_from_current_scale() {
        let (mut reg, _loader) = registry();
        let mut ids = MeshIds::new();
        let style = TileStyle::default();
        let mut tile = ImageTile::new(0, 16, DisplayItem::local("a.png"), &style, &mut ids, &mut reg);
        let t0 = Instant::now();

        tile.on_mouse_move(Some(tile.mesh()), t0);
        tile.update(t0 + style.hover_duration / 4);
        let reached = tile.scale();
        assert!(reached > 1.0 && reached < style.hover_scale);

        let left_at = t0 + style.hover_duration / 4;
        tile.on_mouse_move(None, left_at);
        tile.update(left_at);
        assert!((tile.scale() - reached).abs() < 1e-5, "jumped to {}", tile.scale());

        let mut last = tile.scale();
        for step in 1..=10 {
            tile.update(left_at + style.hover_duration * step / 10);
            assert!(tile.scale() <= last + 1e-6);
            last = tile.scale();
        }
        assert!((tile.scale() - 1.0).abs() < 1e-5);

        // Re-entering after the shrink starts again from rest
        tile.on_mouse_move(Some(tile.mesh()), left_at + style.hover_duration);
        tile.update(left_at + style.hover_duration);
        assert!((tile.scale() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn frozen_tile_does_not_animate() {
        let (mut reg, _loader) = registry();
        let mut ids = MeshIds::new();
        let mut tile =
            ImageTile::new(0, 16, DisplayItem::local("a.png"), &TileStyle::default(), &mut ids, &mut reg);
        let t0 = Instant::now();
        tile.on_mouse_move(Some(tile.mesh()), t0);
        tile.set_frozen(true);
        tile.update(t0 + ms(1000));
        assert!((tile.scale() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn dispose_releases_only_own_reference() {
        let (mut reg, loader) = registry();
        let mut ids = MeshIds::new();
        let style = TileStyle::default();
        let mut a = ImageTile::new(0, 16, DisplayItem::local("s.png"), &style, &mut ids, &mut reg);
        let mut b = ImageTile::new(1, 16, DisplayItem::local("s.png"), &style, &mut ids, &mut reg);
        assert_eq!(loader.request_count("s.png"), 1);

        loader.complete("s.png", true);
        reg.poll();
        a.dispose(&mut reg);
        a.dispose(&mut reg);
        assert_eq!(reg.refs("s.png"), 1);

        b.refresh_material(&reg, &mut ids);
        assert!(matches!(b.material(), Material::Textured { .. }));
        b.dispose(&mut reg);
        assert_eq!(reg.refs("s.png"), 0);
    }
}
