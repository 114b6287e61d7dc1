pub mod graph;
pub mod indicator;
pub mod planner;
pub mod ring;
pub mod scene;
pub mod tile;
pub mod tween;
pub mod window;

use crate::net::texture::{TextureLoader, TextureRegistry};
use graph::{MeshIds, SceneGraph};

/// Per-scene shared state: mesh ids, textures and the attached ring roots.
/// Passed explicitly to whatever builds or disposes scene objects.
pub struct SceneResources {
    pub ids: MeshIds,
    pub textures: TextureRegistry,
    pub graph: SceneGraph,
}

impl SceneResources {
    pub fn new(loader: Box<dyn TextureLoader>) -> Self {
        Self {
            ids: MeshIds::new(),
            textures: TextureRegistry::new(loader),
            graph: SceneGraph::new(),
        }
    }
}
