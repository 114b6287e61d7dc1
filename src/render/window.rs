//! Ring window manager.
//!
//! Keeps exactly the rings around the camera alive. The live set is a map
//! from ring index to ring; when the camera leaves the hysteresis band the
//! window is recomputed, rings still inside are kept as-is, new indices get
//! fresh (or pooled) rings, and rings that fell out are detached and either
//! pooled or disposed.

use std::collections::{BTreeMap, HashMap, VecDeque};

use crate::config::GalleryConfig;
use crate::dataset::{Dataset, DisplayItem, GalleryMode};
use crate::net::texture::TextureRegistry;
use crate::render::planner::{UpdateRequest, WindowPlan, WindowPlanner};
use crate::render::ring::{Ring, RingIndex, RingLayout};
use crate::render::SceneResources;

/// What one window recomputation did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowChange {
    pub base_index: RingIndex,
    pub created: Vec<RingIndex>,
    pub retained: Vec<RingIndex>,
    pub evicted: Vec<RingIndex>,
    /// Created rings that came out of the pool
    pub revived: usize,
}

type PoolKey = (RingIndex, GalleryMode);

/// Detached rings kept for reuse, least recently pooled first.
pub struct RingPool {
    capacity: usize,
    entries: VecDeque<(PoolKey, Ring)>,
}

impl RingPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: VecDeque::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, index: RingIndex, mode: GalleryMode) -> bool {
        self.entries.iter().any(|(k, _)| *k == (index, mode))
    }

    pub fn take(&mut self, index: RingIndex, mode: GalleryMode) -> Option<Ring> {
        let pos = self.entries.iter().position(|(k, _)| *k == (index, mode))?;
        self.entries.remove(pos).map(|(_, ring)| ring)
    }

    /// Pool a detached ring. Returns how many rings were disposed to stay
    /// within capacity (including a replaced duplicate).
    pub fn put(&mut self, ring: Ring, textures: &mut TextureRegistry) -> usize {
        let mut disposed = 0;
        let key = (ring.index(), ring.mode());
        if let Some(mut old) = self.take(key.0, key.1) {
            disposed += usize::from(old.dispose(textures));
        }
        if self.capacity == 0 {
            let mut ring = ring;
            return disposed + usize::from(ring.dispose(textures));
        }
        self.entries.push_back((key, ring));
        while self.entries.len() > self.capacity {
            if let Some((_, mut oldest)) = self.entries.pop_front() {
                log::debug!("Pool full, disposing ring {}", oldest.index());
                disposed += usize::from(oldest.dispose(textures));
            }
        }
        disposed
    }

    /// Dispose pooled rings built for `mode`.
    pub fn invalidate_mode(&mut self, mode: GalleryMode, textures: &mut TextureRegistry) -> usize {
        let mut disposed = 0;
        self.entries.retain_mut(|((_, m), ring)| {
            if *m == mode {
                disposed += usize::from(ring.dispose(textures));
                false
            } else {
                true
            }
        });
        disposed
    }

    pub fn clear(&mut self, textures: &mut TextureRegistry) -> usize {
        let mut disposed = 0;
        for (_, mut ring) in self.entries.drain(..) {
            disposed += usize::from(ring.dispose(textures));
        }
        disposed
    }
}

pub struct RingWindow {
    rings: BTreeMap<RingIndex, Ring>,
    current_ring_index: Option<RingIndex>,
    visible_rings: i64,
    ring_bound: i64,
    layout: RingLayout,
    dataset: Dataset,
    /// Items each mode's pooled rings were built from
    built_from: HashMap<GalleryMode, Vec<DisplayItem>>,
    planner: Box<dyn WindowPlanner>,
    pool: RingPool,
    disposed: usize,
}

impl RingWindow {
    pub fn new(cfg: &GalleryConfig, dataset: Dataset, planner: Box<dyn WindowPlanner>) -> Self {
        let mut built_from = HashMap::new();
        built_from.insert(dataset.mode, dataset.items.clone());
        Self {
            rings: BTreeMap::new(),
            current_ring_index: None,
            visible_rings: cfg.visible_rings,
            ring_bound: cfg.ring_bound,
            layout: RingLayout::from_config(cfg),
            dataset,
            built_from,
            planner,
            pool: RingPool::new(cfg.pool_capacity),
            disposed: 0,
        }
    }

    pub fn current_ring_index(&self) -> Option<RingIndex> {
        self.current_ring_index
    }

    pub fn mode(&self) -> GalleryMode {
        self.dataset.mode
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn layout(&self) -> &RingLayout {
        &self.layout
    }

    pub fn planner_name(&self) -> &'static str {
        self.planner.name()
    }

    pub fn len(&self) -> usize {
        self.rings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rings.is_empty()
    }

    pub fn ring(&self, index: RingIndex) -> Option<&Ring> {
        self.rings.get(&index)
    }

    pub fn rings(&self) -> impl Iterator<Item = &Ring> {
        self.rings.values()
    }

    pub fn rings_mut(&mut self) -> impl Iterator<Item = &mut Ring> {
        self.rings.values_mut()
    }

    pub fn indices(&self) -> Vec<RingIndex> {
        self.rings.keys().copied().collect()
    }

    pub fn pool(&self) -> &RingPool {
        &self.pool
    }

    /// Rings disposed over the window's lifetime.
    pub fn disposed_count(&self) -> usize {
        self.disposed
    }

    fn request(&self, camera_y: f32, current: Option<RingIndex>) -> UpdateRequest {
        UpdateRequest {
            camera_y,
            vertical_offset: self.layout.vertical_offset,
            visible_rings: self.visible_rings,
            current_ring_index: current,
            ring_bound: self.ring_bound,
        }
    }

    /// Recompute the window if the camera left the hysteresis band.
    pub fn update(&mut self, camera_y: f32, res: &mut SceneResources) -> Option<WindowChange> {
        let req = self.request(camera_y, self.current_ring_index);
        let plan = self.planner.update_rings(&req);
        if !plan.needs_update {
            return None;
        }
        Some(self.apply(plan, res))
    }

    /// Recompute the window unconditionally.
    pub fn rebuild(&mut self, camera_y: f32, res: &mut SceneResources) -> WindowChange {
        let req = self.request(camera_y, None);
        let plan = self.planner.update_rings(&req);
        self.apply(plan, res)
    }

    fn apply(&mut self, plan: WindowPlan, res: &mut SceneResources) -> WindowChange {
        let mut change = WindowChange {
            base_index: plan.base_index,
            ..Default::default()
        };
        let mode = self.dataset.mode;
        let mut next = BTreeMap::new();

        for index in plan.start_index..plan.end_index {
            if let Some(ring) = self.rings.remove(&index) {
                change.retained.push(index);
                next.insert(index, ring);
                continue;
            }
            let ring = match self.pool.take(index, mode) {
                Some(mut ring) => {
                    ring.reset_animation();
                    change.revived += 1;
                    ring
                }
                None => Ring::new(
                    index,
                    &self.dataset,
                    &self.layout,
                    &mut res.ids,
                    &mut res.textures,
                ),
            };
            res.graph.add(ring.id());
            change.created.push(index);
            next.insert(index, ring);
        }

        let leaving = std::mem::replace(&mut self.rings, next);
        for (index, ring) in leaving {
            res.graph.remove(ring.id());
            change.evicted.push(index);
            self.disposed += self.pool.put(ring, &mut res.textures);
        }

        self.current_ring_index = Some(plan.base_index);
        log::debug!(
            "Ring window -> [{}, {}) around {}: +{} ={} -{} (pooled {})",
            plan.start_index,
            plan.end_index,
            plan.base_index,
            change.created.len(),
            change.retained.len(),
            change.evicted.len(),
            self.pool.len()
        );
        change
    }

    /// Replace the displayed dataset and rebuild the window from scratch.
    pub fn set_dataset(
        &mut self,
        dataset: Dataset,
        camera_y: f32,
        res: &mut SceneResources,
    ) -> WindowChange {
        log::info!(
            "Switching gallery {:?} -> {:?} ({} items)",
            self.dataset.mode,
            dataset.mode,
            dataset.items.len()
        );

        for (_, ring) in std::mem::take(&mut self.rings) {
            res.graph.remove(ring.id());
            self.disposed += self.pool.put(ring, &mut res.textures);
        }

        let stale = self
            .built_from
            .get(&dataset.mode)
            .map_or(false, |items| *items != dataset.items);
        if stale {
            self.disposed += self.pool.invalidate_mode(dataset.mode, &mut res.textures);
        }
        self.built_from.insert(dataset.mode, dataset.items.clone());

        self.dataset = dataset;
        self.current_ring_index = None;
        self.rebuild(camera_y, res)
    }

    pub fn freeze_all(&mut self) {
        for ring in self.rings.values_mut() {
            ring.freeze();
        }
    }

    pub fn unfreeze_all(&mut self) {
        for ring in self.rings.values_mut() {
            ring.unfreeze();
        }
    }

    /// Dispose every live and pooled ring and stop the planner. Idempotent.
    pub fn teardown(&mut self, res: &mut SceneResources) {
        for (_, mut ring) in std::mem::take(&mut self.rings) {
            res.graph.remove(ring.id());
            self.disposed += usize::from(ring.dispose(&mut res.textures));
        }
        self.disposed += self.pool.clear(&mut res.textures);
        self.planner.terminate();
        self.current_ring_index = None;
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::net::texture::testing::ManualLoader;
    use crate::render::graph::MeshId;
    use crate::render::planner::{InlinePlanner, WorkerPlanner};

    fn config(pool: usize) -> GalleryConfig {
        GalleryConfig {
            tiles_per_ring: 4,
            pool_capacity: pool,
            use_worker: false,
            ..Default::default()
        }
    }

    fn resources() -> SceneResources {
        SceneResources::new(Box::new(ManualLoader::default()))
    }

    fn window(pool: usize) -> RingWindow {
        RingWindow::new(
            &config(pool),
            Dataset::local(["a.png", "b.png", "c.png"]),
            Box::new(InlinePlanner),
        )
    }

    fn expected(lo: i64, hi: i64) -> Vec<i64> {
        (lo..hi).collect()
    }

    fn ids(w: &RingWindow) -> HashMap<RingIndex, MeshId> {
        w.rings().map(|r| (r.index(), r.id())).collect()
    }

    #[test]
    fn first_update_builds_window() {
        let mut res = resources();
        let mut w = window(0);
        let change = w.update(0.0, &mut res).expect("initial build");
        assert_eq!(change.created.len(), 100);
        assert_eq!(w.indices(), expected(-50, 50));
        assert_eq!(res.graph.len(), 100);
        assert_eq!(w.current_ring_index(), Some(0));
    }

    #[test]
    fn live_set_matches_window_for_any_camera() {
        let mut res = resources();
        let mut w = window(8);
        for y in [-600.0_f32, -3.3, 0.0, 0.49, 7.25, 40.0, 499.9, 2000.0] {
            w.rebuild(y, &mut res);
            let base = (y as f64 / 0.5).floor() as i64;
            let lo = (base - 50).clamp(-1000, 1000);
            let hi = (base + 50).clamp(-1000, 1000);
            assert_eq!(w.indices(), expected(lo, hi), "camera {}", y);
            assert_eq!(res.graph.len(), w.len());
        }
    }

    #[test]
    fn hysteresis_band() {
        let mut res = resources();
        let mut w = window(0);
        w.update(0.0, &mut res);
        assert!(w.update(12.0, &mut res).is_none()); // base 24
        assert_eq!(w.current_ring_index(), Some(0));
        assert!(w.update(13.0, &mut res).is_some()); // base 26
        assert_eq!(w.current_ring_index(), Some(26));
    }

    #[test]
    fn scroll_scenario_retains_by_identity() {
        let mut res = resources();
        let mut w = window(0);
        w.update(0.0, &mut res);
        let before = ids(&w);

        let change = w.update(40.0, &mut res).expect("rebuild");
        assert_eq!(change.base_index, 80);
        assert_eq!(w.indices(), expected(30, 130));
        assert_eq!(change.retained, expected(30, 50));
        assert_eq!(change.created, expected(50, 130));
        assert_eq!(change.evicted, expected(-50, 30));

        let after = ids(&w);
        for idx in 30..50 {
            assert_eq!(before[&idx], after[&idx], "ring {} was recreated", idx);
            assert!(!w.ring(idx).unwrap().is_disposed());
        }
        for idx in 50..130 {
            assert!(!before.contains_key(&idx));
        }
        for idx in 0..30 {
            assert!(!res.graph.contains(before[&idx]));
        }
        assert_eq!(w.disposed_count(), 80);
    }

    #[test]
    fn large_jump_keeps_nothing() {
        let mut res = resources();
        let mut w = window(0);
        w.update(0.0, &mut res);
        let change = w.update(200.0, &mut res).unwrap();
        assert!(change.retained.is_empty());
        assert_eq!(w.indices(), expected(350, 450));
        assert_eq!(w.disposed_count(), 100);
    }

    #[test]
    fn pool_revives_rings_with_reset_state() {
        let mut res = resources();
        let mut w = window(200);
        w.update(0.0, &mut res);
        let original = w.ring(-40).unwrap().id();

        w.update(40.0, &mut res);
        assert!(w.pool().contains(-40, GalleryMode::Local));
        assert_eq!(w.disposed_count(), 0);

        let change = w.update(0.0, &mut res).unwrap();
        assert!(change.revived > 0);
        let ring = w.ring(-40).unwrap();
        assert_eq!(ring.id(), original);
        assert_eq!(ring.rotation(), 0.0);
        assert!(res.graph.contains(original));
    }

    #[test]
    fn pool_is_capped() {
        let mut res = resources();
        let mut w = window(10);
        w.update(0.0, &mut res);
        w.update(200.0, &mut res);
        assert_eq!(w.pool().len(), 10);
        assert_eq!(w.disposed_count(), 90);
    }

    #[test]
    fn mode_switch_rebuilds_and_pools_old_mode() {
        let mut res = resources();
        let mut w = window(500);
        w.update(0.0, &mut res);
        let old = ids(&w);

        let on_chain = Dataset::new(
            GalleryMode::OnChain,
            vec![DisplayItem {
                url: "ipfs.png".into(),
                external_id: Some("7".into()),
            }],
        );
        let change = w.set_dataset(on_chain, 0.0, &mut res);
        assert_eq!(change.created.len(), 100);
        assert_eq!(change.revived, 0);
        assert_eq!(w.mode(), GalleryMode::OnChain);
        assert!(w.rings().all(|r| r.mode() == GalleryMode::OnChain));
        for id in old.values() {
            assert!(!res.graph.contains(*id));
        }
        assert_eq!(res.graph.len(), 100);

        // Switching back revives the original instances.
        let change = w.set_dataset(Dataset::local(["a.png", "b.png", "c.png"]), 0.0, &mut res);
        assert_eq!(change.revived, 100);
        assert_eq!(ids(&w), old);
    }

    #[test]
    fn mode_switch_with_new_items_drops_stale_pool() {
        let mut res = resources();
        let mut w = window(500);
        w.update(0.0, &mut res);
        w.set_dataset(Dataset::local(["x.png"]), 0.0, &mut res);
        assert_eq!(w.disposed_count(), 100);
        assert!(w.rings().all(|r| r.tiles().iter().all(|t| t.item().url == "x.png")));
    }

    #[test]
    fn teardown_disposes_everything_once() {
        let mut res = resources();
        let mut w = window(30);
        w.update(0.0, &mut res);
        w.update(40.0, &mut res);
        let live = w.len();
        let pooled = w.pool().len();
        let before = w.disposed_count();

        w.teardown(&mut res);
        assert_eq!(w.disposed_count(), before + live + pooled);
        assert!(w.is_empty());
        assert!(res.graph.is_empty());
        assert_eq!(res.textures.live_count(), 0);

        w.teardown(&mut res);
        assert_eq!(w.disposed_count(), before + live + pooled);
    }

    #[test]
    fn shared_textures_survive_partial_eviction() {
        let mut res = resources();
        let mut w = window(0);
        w.update(0.0, &mut res);
        assert_eq!(res.textures.live_count(), 3);
        assert_eq!(res.textures.loads_issued(), 3);
        w.update(40.0, &mut res);
        // Newly created rings reuse the cached entries.
        assert_eq!(res.textures.loads_issued(), 3);
        let refs: usize = ["a.png", "b.png", "c.png"]
            .iter()
            .map(|u| res.textures.refs(u))
            .sum();
        assert_eq!(refs, w.len() * 4);
    }

    #[test]
    fn worker_backed_window_matches_inline() {
        let mut res_a = resources();
        let mut res_b = resources();
        let mut inline = window(0);
        let mut worker = RingWindow::new(
            &config(0),
            Dataset::local(["a.png"]),
            Box::new(WorkerPlanner::spawn(std::time::Duration::from_secs(5)).unwrap()),
        );
        for y in [0.0_f32, 5.0, 13.0, 40.0, -20.0, 300.0] {
            let a = inline.update(y, &mut res_a).map(|c| c.base_index);
            let b = worker.update(y, &mut res_b).map(|c| c.base_index);
            assert_eq!(a, b);
            assert_eq!(inline.indices(), worker.indices());
        }
        worker.teardown(&mut res_b);
    }
}
