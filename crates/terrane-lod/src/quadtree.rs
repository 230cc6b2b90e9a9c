//! The quadtree: node lifecycle, the pop-free readiness handshake and the
//! per-frame camera traversal.

use std::sync::Arc;

use terrane_tiles::TileCoord;
use terrane_worker::WorkerClient;
use tracing::{debug, trace};

use crate::{
    Aabb, Camera, ContentStrategy, LoadState, LodDecision, LodPolicy, NodeArena, NodeId,
    Quadrant, QuadtreeNode, TerrainContext, normalized_distance,
};

/// Web-Mercator world width in meters.
pub const WORLD_SIZE: f64 = 40_075_016.686;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QuadtreeSettings {
    /// Deepest level nodes may subdivide to.
    pub max_level: u8,
    /// Edge length of the root tile in world units.
    pub world_size: f64,
    pub policy: LodPolicy,
}

impl Default for QuadtreeSettings {
    fn default() -> Self {
        Self {
            max_level: 18,
            world_size: WORLD_SIZE,
            policy: LodPolicy::default(),
        }
    }
}

/// Arena-backed quadtree driven from a single scheduling thread.
///
/// All node mutation happens in the methods below. Async work (fetches and
/// worker jobs) is only observed in [`pump`](Self::pump), and every result is
/// matched to its node by [`NodeId`], so results for disposed nodes are
/// discarded.
pub struct Quadtree {
    nodes: NodeArena<QuadtreeNode>,
    root: Option<NodeId>,
    content: Box<dyn ContentStrategy>,
    jobs: WorkerClient,
    context: Arc<TerrainContext>,
    settings: QuadtreeSettings,
}

impl Quadtree {
    pub fn new(
        content: Box<dyn ContentStrategy>,
        context: Arc<TerrainContext>,
        settings: QuadtreeSettings,
    ) -> Self {
        Self {
            nodes: NodeArena::new(),
            root: None,
            jobs: context.client(),
            content,
            context,
            settings,
        }
    }

    /// Create the root for `coord` and start loading it, replacing any previous root.
    pub fn attach_root(&mut self, coord: TileCoord) -> NodeId {
        if let Some(old) = self.root.take() {
            self.dispose(old);
        }
        let world_size = self.settings.world_size;
        let id = self
            .nodes
            .insert_with(|id| QuadtreeNode::new(id, coord, None, None, world_size));
        self.root = Some(id);
        self.initialize(id);
        debug!(tile = %coord, content = self.content.name(), "attached quadtree root");
        id
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn node(&self, id: NodeId) -> Option<&QuadtreeNode> {
        self.nodes.get(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &QuadtreeNode> {
        self.nodes.iter().map(|(_, node)| node)
    }

    /// Nodes currently drawn: visible and not replaced by their children.
    pub fn rendered(&self) -> impl Iterator<Item = &QuadtreeNode> {
        self.nodes().filter(|node| node.is_rendered())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn settings(&self) -> &QuadtreeSettings {
        &self.settings
    }

    pub fn context(&self) -> &Arc<TerrainContext> {
        &self.context
    }

    /// Worker jobs submitted by this tree and not yet answered.
    pub fn pending_jobs(&self) -> usize {
        self.jobs.pending_count()
    }

    /// Start loading a node that has not been loaded yet.
    pub fn initialize(&mut self, id: NodeId) -> bool {
        let Some(node) = self.nodes.get_mut(id) else {
            return false;
        };
        if node.geometry != LoadState::Empty || node.texture != LoadState::Empty {
            return false;
        }
        self.content.load(node, &mut self.jobs);
        true
    }

    /// Split a rendered leaf into four children and start loading them.
    ///
    /// Children whose footprint is in view load first, then nearer before
    /// farther, ties in creation order.
    pub fn subdivide(&mut self, id: NodeId, camera: &Camera) -> bool {
        let Some(node) = self.nodes.get(id) else {
            return false;
        };
        if node.is_subdivided() || node.level() >= self.settings.max_level || !node.is_rendered()
        {
            return false;
        }
        let coord = node.coord();
        let y_range = node.bounds().map_or((0.0, 0.0), |bounds| bounds.y_range());
        let world_size = self.settings.world_size;

        let coords = coord.children();
        let children: [NodeId; 4] = std::array::from_fn(|i| {
            self.nodes.insert_with(|child| {
                QuadtreeNode::new(child, coords[i], Some(Quadrant::ALL[i]), Some(id), world_size)
            })
        });
        if let Some(node) = self.nodes.get_mut(id) {
            node.children = Some(children);
            node.ready_child_count = 0;
        }

        let mut order: Vec<(NodeId, bool, f64)> = children
            .iter()
            .filter_map(|&child| self.nodes.get(child))
            .map(|child| {
                let footprint = Aabb::from_footprint(child.center(), child.size(), y_range);
                (
                    child.id(),
                    camera.frustum.intersects(&footprint),
                    camera.position.distance(child.center()),
                )
            })
            .collect();
        order.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.total_cmp(&b.2)));
        for (child, _, _) in order {
            self.initialize(child);
        }

        debug!(level = coord.level, x = coord.x, y = coord.y, "subdivided");
        true
    }

    /// Dispose all four children and make the node its own representative again.
    pub fn simplify(&mut self, id: NodeId) -> bool {
        let Some(children) = self.nodes.get_mut(id).and_then(|node| node.children.take()) else {
            return false;
        };
        for child in children {
            self.dispose(child);
        }
        if let Some(node) = self.nodes.get_mut(id) {
            node.ready_child_count = 0;
            node.representative = true;
            let coord = node.coord();
            debug!(level = coord.level, x = coord.x, y = coord.y, "simplified");
        }
        true
    }

    /// Record that a node finished loading.
    ///
    /// The parent is hidden and all four children revealed together once the
    /// fourth child reports, never earlier. Each node reports once.
    pub fn on_ready(&mut self, id: NodeId) {
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        if node.ready {
            return;
        }
        node.ready = true;
        node.bounds = Some(node.compute_bounds());
        trace!(tile = %node.coord(), fallback = node.is_fallback(), "node ready");

        let Some(parent) = node.parent().and_then(|parent| self.nodes.get_mut(parent)) else {
            return;
        };
        parent.ready_child_count += 1;
        if parent.ready_child_count != 4 {
            return;
        }
        parent.representative = false;
        let parent_coord = parent.coord();
        for child in parent.children().into_iter().flatten() {
            if let Some(child) = self.nodes.get_mut(child) {
                child.visible = true;
            }
        }
        debug!(tile = %parent_coord, "children ready, replacing parent");
    }

    /// Remove a node and its subtree, aborting all outstanding work.
    pub fn dispose(&mut self, id: NodeId) {
        let Some(mut node) = self.nodes.remove(id) else {
            return;
        };
        if let Some(children) = node.children.take() {
            for child in children {
                self.dispose(child);
            }
        }
        self.content.dispose(&mut node, &mut self.jobs);
        if self.root == Some(id) {
            self.root = None;
        }
        trace!(tile = %node.coord(), "disposed");
    }

    /// Collect worker results and finished fetches, then fire readiness.
    ///
    /// Jobs submitted while polling are answered no earlier than the next pump.
    pub fn pump(&mut self) {
        for result in self.jobs.drain_results() {
            let id = NodeId::from_bits(result.key);
            match self.nodes.get_mut(id) {
                Some(node) if node.pending_job == Some(result.key) => {
                    node.finish_geometry(result.outcome);
                }
                _ => trace!(node = %id, "dropping result for disposed node"),
            }
        }

        for id in self.nodes.ids() {
            if let Some(node) = self.nodes.get_mut(id).filter(|node| node.is_loading()) {
                self.content.poll(node, &mut self.jobs);
            }
        }

        let loaded: Vec<NodeId> = self
            .nodes
            .iter()
            .filter(|(_, node)| !node.is_ready() && node.is_loaded())
            .map(|(id, _)| id)
            .collect();
        for id in loaded {
            self.on_ready(id);
        }
    }

    /// Walk the tree from the root, subdividing and simplifying by camera distance.
    pub fn update_from_camera(&mut self, camera: &Camera) {
        if let Some(root) = self.root {
            self.update_node(root, camera);
        }
    }

    fn update_node(&mut self, id: NodeId, camera: &Camera) {
        let Some(node) = self.nodes.get(id) else {
            return;
        };
        let policy = self.settings.policy;
        let distance = normalized_distance(
            camera.position,
            node.center(),
            node.level(),
            self.settings.max_level,
        );
        let in_view = node
            .bounds()
            .is_some_and(|bounds| camera.frustum.intersects(&bounds));

        match policy.decide(distance, in_view, node.is_rendered(), node.is_subdivided()) {
            LodDecision::Subdivide => {
                self.subdivide(id, camera);
            }
            LodDecision::Simplify => {
                self.simplify(id);
            }
            LodDecision::Keep => {}
        }

        if !policy.should_recurse(distance) {
            return;
        }
        if let Some(children) = self.nodes.get(id).and_then(|node| node.children()) {
            for child in children {
                self.update_node(child, camera);
            }
        }
    }
}
