//! Mesh identity and scene attachment.
//!
//! Every renderable surface gets a `MeshId` from the scene's allocator.
//! Hit-testing reports ids, and rings/tiles resolve hits by comparing ids.
//! The `SceneGraph` records which ring roots are currently attached.

use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshId(u64);

impl MeshId {
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Monotonic id source owned by a scene.
#[derive(Debug, Default)]
pub struct MeshIds {
    next: u64,
}

impl MeshIds {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    pub fn allocate(&mut self) -> MeshId {
        let id = MeshId(self.next.max(1));
        self.next = id.0 + 1;
        id
    }
}

#[derive(Debug, Default)]
pub struct SceneGraph {
    roots: HashSet<MeshId>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a root. Returns false if it was already attached.
    pub fn add(&mut self, root: MeshId) -> bool {
        self.roots.insert(root)
    }

    /// Detach a root. Returns false if it was not attached.
    pub fn remove(&mut self, root: MeshId) -> bool {
        self.roots.remove(&root)
    }

    pub fn contains(&self, root: MeshId) -> bool {
        self.roots.contains(&root)
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn clear(&mut self) {
        self.roots.clear();
    }
}
