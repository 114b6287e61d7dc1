//! Gallery scene loop.
//!
//! One `frame()` runs the fixed order input -> windowing -> animation:
//! the momentum tracker coasts, the camera follows its offset, the ring
//! window is recomputed and the rings near the camera animate with the
//! current scroll speed. Painting is left to the caller, which reads
//! `visible_sprites()` after the frame.

use std::time::Instant;

use rayon::prelude::*;

use crate::config::GalleryConfig;
use crate::dataset::Dataset;
use crate::input::MomentumTracker;
use crate::net::texture::TextureLoader;
use crate::render::graph::MeshId;
use crate::render::planner::planner_for;
use crate::render::ring::{Ring, RingIndex, Selection};
use crate::render::tile::Material;
use crate::render::window::{RingWindow, WindowChange};
use crate::render::SceneResources;

/// Points closer than this to the camera plane are not drawn
const NEAR: f32 = 0.05;
/// Indicator half size in world units
const INDICATOR_EXTENT: f32 = 0.05;

/// Camera at the cylinder axis looking outward.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub y: f32,
    /// Rotation about the vertical axis, radians
    pub yaw: f32,
    /// Vertical field of view
    pub fov_deg: f32,
    /// Viewport width / height
    pub aspect: f32,
}

/// A world point in normalized device coordinates (y grows downward).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projected {
    pub ndc: [f32; 2],
    pub depth: f32,
    /// NDC units per world unit at this depth
    pub scale: [f32; 2],
}

impl Camera {
    fn tan_half_fov(&self) -> (f32, f32) {
        let v = (self.fov_deg.to_radians() * 0.5).tan();
        (v * self.aspect, v)
    }

    /// Project the point at `angle` on a cylinder of `radius`, height `height`.
    pub fn project(&self, angle: f32, height: f32, radius: f32) -> Option<Projected> {
        let wx = radius * angle.sin();
        let wy = height - self.y;
        let wz = radius * angle.cos();

        let (sin_yaw, cos_yaw) = self.yaw.sin_cos();
        let rx = wx * cos_yaw + wz * sin_yaw;
        let rz = -wx * sin_yaw + wz * cos_yaw;
        if rz < NEAR {
            return None;
        }

        let (tan_h, tan_v) = self.tan_half_fov();
        Some(Projected {
            ndc: [rx / (rz * tan_h), -wy / (rz * tan_v)],
            depth: rz,
            scale: [1.0 / (rz * tan_h), 1.0 / (rz * tan_v)],
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SpriteKind {
    Tile {
        pick: MeshId,
        material: Material,
        url: String,
        hovered: bool,
    },
    Indicator {
        spin: f32,
    },
}

/// Screen-aligned quad produced for painting.
#[derive(Debug, Clone, PartialEq)]
pub struct Sprite {
    pub ring_index: RingIndex,
    pub center: [f32; 2],
    pub half_extent: [f32; 2],
    pub depth: f32,
    pub kind: SpriteKind,
}

impl Sprite {
    pub fn contains(&self, ndc: [f32; 2]) -> bool {
        (ndc[0] - self.center[0]).abs() <= self.half_extent[0]
            && (ndc[1] - self.center[1]).abs() <= self.half_extent[1]
    }
}

fn project_ring(ring: &Ring, camera: &Camera) -> Vec<Sprite> {
    let mut out = Vec::with_capacity(ring.tiles().len() + ring.indicators().len());

    for tile in ring.tiles() {
        let geom = tile.geometry();
        let angle = ring.world_angle(geom.center_angle());
        let Some(p) = camera.project(angle, ring.y(), geom.radius) else {
            continue;
        };
        let half_w = geom.arc_width() * 0.5 * tile.scale();
        let half_h = geom.height * 0.5 * tile.scale();
        out.push(Sprite {
            ring_index: ring.index(),
            center: p.ndc,
            half_extent: [half_w * p.scale[0], half_h * p.scale[1]],
            depth: p.depth,
            kind: SpriteKind::Tile {
                pick: tile.pick_id(),
                material: tile.material(),
                url: tile.item().url.clone(),
                hovered: tile.is_hovered(),
            },
        });
    }

    let radius = ring.tiles().first().map(|t| t.geometry().radius);
    for indicator in ring.indicators() {
        let Some(radius) = radius else { break };
        let angle = ring.world_angle(indicator.angle());
        let Some(p) = camera.project(angle, ring.y() + indicator.local_y(), radius) else {
            continue;
        };
        out.push(Sprite {
            ring_index: ring.index(),
            center: p.ndc,
            half_extent: [INDICATOR_EXTENT * p.scale[0], INDICATOR_EXTENT * p.scale[1]],
            depth: p.depth,
            kind: SpriteKind::Indicator {
                spin: indicator.rotation(),
            },
        });
    }
    out
}

#[derive(Debug, Clone, Default)]
pub struct FrameStats {
    pub camera_y: f32,
    pub scroll_speed: f32,
    /// Set when the ring window was recomputed this frame
    pub window: Option<WindowChange>,
    /// Rings animated this frame
    pub animated: usize,
    pub coasting: bool,
    pub paused: bool,
}

pub struct GalleryScene {
    config: GalleryConfig,
    tracker: MomentumTracker,
    window: RingWindow,
    res: SceneResources,
    camera: Camera,
    last_drag_y: Option<f32>,
    scroll_speed: f32,
    last_frame: Option<Instant>,
    hovered: Option<MeshId>,
    on_select: Option<Box<dyn FnMut(&Selection)>>,
    paused: bool,
    torn_down: bool,
}

impl GalleryScene {
    pub fn new(config: GalleryConfig, dataset: Dataset, loader: Box<dyn TextureLoader>) -> Self {
        let planner = planner_for(&config);
        log::info!(
            "Gallery scene: {:?} mode, {} items, planner={}",
            dataset.mode,
            dataset.items.len(),
            planner.name()
        );
        let window = RingWindow::new(&config, dataset, planner);
        let camera = Camera {
            y: config.camera_base_y,
            yaw: 0.0,
            fov_deg: config.fov_deg,
            aspect: 1.0,
        };
        Self {
            config,
            tracker: MomentumTracker::new(),
            window,
            res: SceneResources::new(loader),
            camera,
            last_drag_y: None,
            scroll_speed: 0.0,
            last_frame: None,
            hovered: None,
            on_select: None,
            paused: false,
            torn_down: false,
        }
    }

    pub fn config(&self) -> &GalleryConfig {
        &self.config
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn scroll_speed(&self) -> f32 {
        self.scroll_speed
    }

    pub fn window(&self) -> &RingWindow {
        &self.window
    }

    pub fn resources(&self) -> &SceneResources {
        &self.res
    }

    pub fn resources_mut(&mut self) -> &mut SceneResources {
        &mut self.res
    }

    /// Pointer/touch/wheel sink.
    pub fn input(&mut self) -> &mut MomentumTracker {
        &mut self.tracker
    }

    pub fn hovered(&self) -> Option<MeshId> {
        self.hovered
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        if aspect.is_finite() && aspect > 0.0 {
            self.camera.aspect = aspect;
        }
    }

    /// Called with every confirmed double-click selection.
    pub fn on_select(&mut self, handler: impl FnMut(&Selection) + 'static) {
        self.on_select = Some(Box::new(handler));
    }

    /// Advance one frame. While paused nothing is mutated.
    pub fn frame(&mut self, now: Instant) -> FrameStats {
        if self.torn_down {
            return FrameStats::default();
        }
        let dt = self
            .last_frame
            .map(|t| now.saturating_duration_since(t).as_secs_f32())
            .unwrap_or(0.0);
        self.last_frame = Some(now);

        if self.paused {
            return FrameStats {
                camera_y: self.camera.y,
                paused: true,
                ..Default::default()
            };
        }

        // Input
        let coasting = self.tracker.step();
        let (drag_x, drag_y) = self.tracker.offset();
        let scale = self.config.drag_scale;
        self.camera.y = drag_y / scale + self.config.camera_base_y;
        self.camera.yaw = drag_x / scale;

        let delta = self.last_drag_y.map_or(0.0, |prev| drag_y - prev);
        self.last_drag_y = Some(drag_y);
        let speed = delta / scale * self.config.scroll_speed_gain;
        self.scroll_speed = if speed.abs() < self.config.speed_epsilon {
            0.0
        } else {
            speed
        };

        // Windowing
        let change = self.window.update(self.camera.y, &mut self.res);

        // Animation
        self.res.textures.poll();
        let mut animated = 0;
        for ring in self.window.rings_mut() {
            if (ring.y() - self.camera.y).abs() > self.config.animate_distance {
                continue;
            }
            ring.update(
                self.scroll_speed,
                dt,
                now,
                &self.res.textures,
                &mut self.res.ids,
            );
            animated += 1;
        }

        FrameStats {
            camera_y: self.camera.y,
            scroll_speed: self.scroll_speed,
            window: change,
            animated,
            coasting,
            paused: false,
        }
    }

    fn near_camera(&self, ring: &Ring) -> bool {
        (ring.y() - self.camera.y).abs() <= self.config.animate_distance
    }

    /// Every tile and indicator in front of the camera, far to near.
    pub fn visible_sprites(&self) -> Vec<Sprite> {
        let camera = &self.camera;
        let rings: Vec<&Ring> = self.window.rings().filter(|r| self.near_camera(r)).collect();
        let mut sprites: Vec<Sprite> = rings
            .par_iter()
            .flat_map_iter(|ring| project_ring(ring, camera))
            .collect();
        sprites.sort_by(|a, b| b.depth.total_cmp(&a.depth));
        sprites
    }

    /// Nearest tile under `ndc`, as the id its ring resolves hits by.
    pub fn pick(&self, ndc: [f32; 2]) -> Option<MeshId> {
        self.window
            .rings()
            .filter(|r| self.near_camera(r))
            .flat_map(|ring| project_ring(ring, &self.camera))
            .filter(|s| s.contains(ndc))
            .filter_map(|s| match s.kind {
                SpriteKind::Tile { pick, .. } => Some((s.depth, pick)),
                SpriteKind::Indicator { .. } => None,
            })
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, pick)| pick)
    }

    pub fn pointer_moved(&mut self, ndc: [f32; 2], now: Instant) {
        if self.paused || self.torn_down {
            return;
        }
        let hit = self.pick(ndc);
        self.hovered = hit;
        for ring in self.window.rings_mut() {
            ring.on_mouse_move(hit, now);
        }
    }

    /// Forward a click to every ring. Returns the selection when it
    /// completes a double-click.
    pub fn click(&mut self, ndc: [f32; 2], now: Instant) -> Option<Selection> {
        if self.paused || self.torn_down {
            return None;
        }
        let hit = self.pick(ndc);
        let mut selection = None;
        for ring in self.window.rings_mut() {
            if let Some(sel) = ring.on_click(hit, now) {
                selection = Some(sel);
            }
        }
        let sel = selection?;
        log::info!(
            "Selected ring {} tile {} ({})",
            sel.ring_index,
            sel.tile_index,
            sel.external_id.as_deref().unwrap_or(&sel.url)
        );
        if let Some(handler) = self.on_select.as_mut() {
            handler(&sel);
        }
        Some(sel)
    }

    /// Freeze or resume every live ring. Frames keep running either way.
    pub fn set_paused(&mut self, paused: bool) {
        if self.paused == paused || self.torn_down {
            return;
        }
        self.paused = paused;
        if paused {
            self.window.freeze_all();
        } else {
            self.window.unfreeze_all();
        }
        log::debug!("Scene {}", if paused { "paused" } else { "resumed" });
    }

    /// Switch the displayed dataset (and possibly mode).
    pub fn set_dataset(&mut self, dataset: Dataset) -> Option<WindowChange> {
        if self.torn_down {
            return None;
        }
        let change = self.window.set_dataset(dataset, self.camera.y, &mut self.res);
        if self.paused {
            self.window.freeze_all();
        }
        Some(change)
    }

    /// Dispose every ring, free all textures, stop the planner and the
    /// input tracker. Idempotent.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.window.teardown(&mut self.res);
        self.res.textures.clear();
        self.res.graph.clear();
        self.tracker.dispose();
        self.on_select = None;
        self.hovered = None;
        self.torn_down = true;
        log::info!(
            "Gallery scene torn down ({} rings disposed)",
            self.window.disposed_count()
        );
    }
}

impl Drop for GalleryScene {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;

    use super::*;
    use crate::dataset::{DisplayItem, GalleryMode};
    use crate::net::texture::testing::ManualLoader;
    use crate::net::texture::TextureStatus;

    fn config() -> GalleryConfig {
        GalleryConfig {
            tiles_per_ring: 4,
            use_worker: false,
            ..Default::default()
        }
    }

    fn scene_with(loader: ManualLoader) -> GalleryScene {
        GalleryScene::new(
            config(),
            Dataset::local(["a.png", "b.png"]),
            Box::new(loader),
        )
    }

    fn scene() -> GalleryScene {
        scene_with(ManualLoader::default())
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn first_frame_builds_window() {
        let mut s = scene();
        let stats = s.frame(Instant::now());
        assert_eq!(stats.window.map(|c| c.created.len()), Some(100));
        assert_eq!(s.window().len(), 100);
        assert_eq!(stats.scroll_speed, 0.0);
    }

    #[test]
    fn camera_follows_drag_offset() {
        let mut s = scene();
        let t0 = Instant::now();
        s.frame(t0);
        s.input().press(0.0, 0.0);
        s.input().drag(40.0, 200.0);
        let stats = s.frame(t0 + ms(16));
        // damped: 20 x, 100 y
        assert!((s.camera().y - 1.0).abs() < 1e-6);
        assert!((s.camera().yaw - 0.2).abs() < 1e-6);
        assert!((stats.scroll_speed - 10.0).abs() < 1e-4);
    }

    #[test]
    fn idle_scroll_speed_snaps_to_zero() {
        let mut s = scene();
        let t0 = Instant::now();
        s.frame(t0);
        s.input().press(0.0, 0.0);
        s.input().drag(0.0, 0.000_01);
        let stats = s.frame(t0 + ms(16));
        assert_eq!(stats.scroll_speed, 0.0);
        let stats = s.frame(t0 + ms(32));
        assert_eq!(stats.scroll_speed, 0.0);
    }

    #[test]
    fn momentum_drives_window() {
        let mut s = scene();
        let mut now = Instant::now();
        s.frame(now);
        for _ in 0..40 {
            s.input().wheel(0.0, 200.0);
        }
        let mut rebuilt = false;
        while s.input().is_coasting() {
            now += ms(16);
            rebuilt |= s.frame(now).window.is_some();
        }
        assert!(rebuilt);
        let base = (s.camera().y / 0.5).floor() as i64;
        let current = s.window().current_ring_index().unwrap();
        assert!((current - base).abs() <= 25);
    }

    #[test]
    fn only_nearby_rings_animate() {
        let mut s = scene();
        let t0 = Instant::now();
        s.frame(t0);
        s.input().press(0.0, 0.0);
        s.input().drag(0.0, 10.0);
        let stats = s.frame(t0 + ms(16));
        assert!(stats.scroll_speed != 0.0);
        let near = s
            .window()
            .rings()
            .filter(|r| (r.y() - s.camera().y).abs() <= 6.0)
            .count();
        assert_eq!(stats.animated, near);
        assert!(near < s.window().len());
        assert!(s.window().ring(0).unwrap().rotation() != 0.0);
        assert_eq!(s.window().ring(40).unwrap().rotation(), 0.0);
    }

    #[test]
    fn textures_resolve_during_frames() {
        let loader = ManualLoader::default();
        let mut s = scene_with(loader.clone());
        let t0 = Instant::now();
        s.frame(t0);
        assert_eq!(loader.request_count("a.png"), 1);
        loader.complete("a.png", true);
        s.frame(t0 + ms(16));
        assert_eq!(s.resources().textures.status("a.png"), TextureStatus::Ready);
        let ring = s.window().ring(0).unwrap();
        assert!(ring
            .tiles()
            .iter()
            .filter(|t| t.item().url == "a.png")
            .all(|t| matches!(t.material(), Material::Textured { .. })));
    }

    #[test]
    fn centre_of_screen_picks_front_tile() {
        let mut s = scene();
        s.frame(Instant::now());
        let front = s.window().ring(0).unwrap().tiles()[0].pick_id();
        assert_eq!(s.pick([0.0, 0.0]), Some(front));
        assert_eq!(s.pick([0.0, 20.0]), None);
    }

    #[test]
    fn hover_and_double_click() {
        let mut s = scene();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        s.on_select(move |sel| sink.borrow_mut().push(sel.clone()));

        let t0 = Instant::now();
        s.frame(t0);
        s.pointer_moved([0.0, 0.0], t0);
        assert!(s.window().ring(0).unwrap().tiles()[0].is_hovered());

        assert!(s.click([0.0, 0.0], t0 + ms(10)).is_none());
        let sel = s.click([0.0, 0.0], t0 + ms(150)).expect("double click");
        assert_eq!(sel.ring_index, 0);
        assert_eq!(sel.tile_index, 0);
        assert_eq!(sel.url, "a.png");
        assert_eq!(seen.borrow().len(), 1);
    }

    #[test]
    fn click_on_empty_space_breaks_double_click() {
        let mut s = scene();
        let fired = Rc::new(RefCell::new(0));
        let sink = fired.clone();
        s.on_select(move |_| *sink.borrow_mut() += 1);

        let t0 = Instant::now();
        s.frame(t0);
        assert_eq!(s.pick([0.0, 20.0]), None);

        assert!(s.click([0.0, 0.0], t0).is_none());
        assert!(s.click([0.0, 20.0], t0 + ms(100)).is_none());
        assert!(s.click([0.0, 0.0], t0 + ms(200)).is_none());
        assert_eq!(*fired.borrow(), 0);

        // The click at t0 + 200ms opened a fresh pair
        assert!(s.click([0.0, 0.0], t0 + ms(300)).is_some());
        assert_eq!(*fired.borrow(), 1);
    }

    #[test]
    fn pause_suppresses_mutation() {
        let mut s = scene();
        let t0 = Instant::now();
        s.frame(t0);
        s.set_paused(true);
        assert!(s.window().rings().all(|r| r.is_frozen()));

        s.input().wheel(0.0, 500.0);
        let stats = s.frame(t0 + ms(16));
        assert!(stats.paused);
        assert_eq!(s.camera().y, 0.0);
        assert!(s.click([0.0, 0.0], t0 + ms(20)).is_none());

        s.set_paused(false);
        assert!(s.window().rings().all(|r| !r.is_frozen()));
        s.frame(t0 + ms(32));
        assert!(s.camera().y > 0.0);
    }

    #[test]
    fn dataset_switch_replaces_rings() {
        let mut s = scene();
        s.frame(Instant::now());
        let change = s
            .set_dataset(Dataset::new(
                GalleryMode::OnChain,
                vec![DisplayItem {
                    url: "ipfs://cid".into(),
                    external_id: Some("1".into()),
                }],
            ))
            .unwrap();
        assert_eq!(change.created.len(), 100);
        assert!(s.window().rings().all(|r| r.mode() == GalleryMode::OnChain));
        assert_eq!(s.resources().graph.len(), 100);
    }

    #[test]
    fn sprites_are_far_to_near() {
        let mut s = scene();
        s.frame(Instant::now());
        let sprites = s.visible_sprites();
        assert!(!sprites.is_empty());
        assert!(sprites.windows(2).all(|w| w[0].depth >= w[1].depth));
        assert!(sprites
            .iter()
            .any(|sp| matches!(sp.kind, SpriteKind::Indicator { .. })));
    }

    #[test]
    fn teardown_releases_everything_once() {
        let mut s = scene();
        let t0 = Instant::now();
        s.frame(t0);
        s.input().wheel(0.0, 100.0);
        s.teardown();
        assert!(s.is_torn_down());
        assert!(s.window().is_empty());
        assert_eq!(s.resources().textures.live_count(), 0);
        assert!(s.resources().graph.is_empty());
        assert!(s.input().is_disposed());
        let disposed = s.window().disposed_count();

        s.teardown();
        assert_eq!(s.window().disposed_count(), disposed);
        assert!(s.frame(t0 + ms(16)).window.is_none());
    }
}
