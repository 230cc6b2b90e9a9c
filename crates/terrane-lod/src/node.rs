//! Quadtree node state.

use std::sync::Arc;

use glam::DVec3;
use terrane_rtin::TerrainMesh;
use terrane_tiles::{AbortableFetch, TileCoord, TileProvider, TileTexture, decode_texture};
use terrane_worker::{WorkerClient, WorkerError};
use tracing::warn;

use crate::{Aabb, NodeId};

/// Position of a child within its parent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Quadrant {
    TopLeft = 0,
    TopRight = 1,
    BottomLeft = 2,
    BottomRight = 3,
}

impl Quadrant {
    pub const ALL: [Quadrant; 4] = [
        Quadrant::TopLeft,
        Quadrant::TopRight,
        Quadrant::BottomLeft,
        Quadrant::BottomRight,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Centre offset `(x, z)` in units of the parent's size.
    pub fn offset(self) -> (f64, f64) {
        match self {
            Quadrant::TopLeft => (-0.25, -0.25),
            Quadrant::TopRight => (0.25, -0.25),
            Quadrant::BottomLeft => (-0.25, 0.25),
            Quadrant::BottomRight => (0.25, 0.25),
        }
    }
}

/// Progress of one content pipeline.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LoadState {
    #[default]
    Empty,
    Loading,
    Ready,
    /// Gave up; counts as terminal.
    Failed,
}

impl LoadState {
    pub fn is_terminal(self) -> bool {
        matches!(self, LoadState::Ready | LoadState::Failed)
    }
}

/// One tile of the quadtree.
///
/// World placement: the node covers a `size` square centred on `center` in
/// the X/Z plane. Its mesh is tile-local in `[-0.5, 0.5]` and is scaled by
/// `size` horizontally; heights are world units.
pub struct QuadtreeNode {
    pub(crate) id: NodeId,
    pub(crate) coord: TileCoord,
    pub(crate) quadrant: Option<Quadrant>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Option<[NodeId; 4]>,
    pub(crate) center: DVec3,
    pub(crate) size: f64,
    pub(crate) bounds: Option<Aabb>,

    pub(crate) geometry: LoadState,
    pub(crate) texture: LoadState,
    /// Geometry is the flat plane substituted after a failure.
    pub(crate) fallback: bool,
    pub(crate) visible: bool,
    pub(crate) representative: bool,
    pub(crate) ready_child_count: u8,
    /// `on_ready` has run for this node.
    pub(crate) ready: bool,

    pub(crate) mesh: Option<Arc<TerrainMesh>>,
    pub(crate) image: Option<Arc<TileTexture>>,
    pub(crate) imagery_fetch: Option<AbortableFetch>,
    pub(crate) elevation_fetch: Option<AbortableFetch>,
    pub(crate) pending_job: Option<u64>,
}

impl QuadtreeNode {
    pub(crate) fn new(
        id: NodeId,
        coord: TileCoord,
        quadrant: Option<Quadrant>,
        parent: Option<NodeId>,
        world_size: f64,
    ) -> Self {
        let n = coord.tiles_per_axis() as f64;
        let size = world_size / n;
        let center = DVec3::new(
            ((coord.x as f64 + 0.5) / n - 0.5) * world_size,
            0.0,
            ((coord.y as f64 + 0.5) / n - 0.5) * world_size,
        );
        Self {
            id,
            coord,
            quadrant,
            parent,
            children: None,
            center,
            size,
            bounds: None,
            geometry: LoadState::Empty,
            texture: LoadState::Empty,
            fallback: false,
            // The root has no parent to reveal it.
            visible: parent.is_none(),
            representative: true,
            ready_child_count: 0,
            ready: false,
            mesh: None,
            image: None,
            imagery_fetch: None,
            elevation_fetch: None,
            pending_job: None,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn coord(&self) -> TileCoord {
        self.coord
    }

    pub fn level(&self) -> u8 {
        self.coord.level
    }

    pub fn quadrant(&self) -> Option<Quadrant> {
        self.quadrant
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> Option<[NodeId; 4]> {
        self.children
    }

    pub fn is_subdivided(&self) -> bool {
        self.children.is_some()
    }

    pub fn center(&self) -> DVec3 {
        self.center
    }

    pub fn size(&self) -> f64 {
        self.size
    }

    /// World bounds; known once the node is ready.
    pub fn bounds(&self) -> Option<Aabb> {
        self.bounds
    }

    pub fn geometry_state(&self) -> LoadState {
        self.geometry
    }

    pub fn texture_state(&self) -> LoadState {
        self.texture
    }

    pub fn is_fallback(&self) -> bool {
        self.fallback
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn is_representative(&self) -> bool {
        self.representative
    }

    /// Drawn this frame: visible and not replaced by its children.
    pub fn is_rendered(&self) -> bool {
        self.visible && self.representative
    }

    pub fn ready_child_count(&self) -> u8 {
        self.ready_child_count
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Both pipelines reached a terminal state.
    pub fn is_loaded(&self) -> bool {
        self.geometry.is_terminal() && self.texture.is_terminal()
    }

    pub fn is_loading(&self) -> bool {
        self.geometry == LoadState::Loading || self.texture == LoadState::Loading
    }

    pub fn mesh(&self) -> Option<&Arc<TerrainMesh>> {
        self.mesh.as_ref()
    }

    pub fn texture(&self) -> Option<&Arc<TileTexture>> {
        self.image.as_ref()
    }

    /// World-space box from the mesh height range, or the flat footprint.
    pub(crate) fn compute_bounds(&self) -> Aabb {
        let (lo, hi) = self
            .mesh
            .as_ref()
            .map(|mesh| mesh.height_range())
            .unwrap_or((0.0, 0.0));
        Aabb::from_footprint(self.center, self.size, (lo as f64, hi as f64))
    }

    pub(crate) fn start_imagery(&mut self, provider: &dyn TileProvider) {
        self.texture = LoadState::Loading;
        self.imagery_fetch = Some(provider.fetch_tile(self.coord));
    }

    pub(crate) fn poll_imagery(&mut self) {
        let Some(result) = self.imagery_fetch.as_mut().and_then(|fetch| fetch.try_take()) else {
            return;
        };
        self.imagery_fetch = None;
        match result.map_err(|err| err.to_string()).and_then(|bytes| {
            decode_texture(&bytes).map_err(|err| err.to_string())
        }) {
            Ok(texture) => {
                self.image = Some(Arc::new(texture));
                self.texture = LoadState::Ready;
            }
            Err(err) => {
                warn!(tile = %self.coord, "imagery unavailable, rendering untextured: {err}");
                self.texture = LoadState::Failed;
            }
        }
    }

    pub(crate) fn set_mesh(&mut self, mesh: TerrainMesh) {
        self.mesh = Some(Arc::new(mesh));
        self.geometry = LoadState::Ready;
        self.pending_job = None;
    }

    pub(crate) fn fall_back_to_flat(&mut self) {
        self.set_mesh(TerrainMesh::flat_plane());
        self.fallback = true;
    }

    /// Apply a worker answer for this node's pending job.
    pub(crate) fn finish_geometry(&mut self, outcome: Result<TerrainMesh, WorkerError>) {
        match outcome {
            Ok(mesh) => self.set_mesh(mesh),
            Err(err) => {
                warn!(tile = %self.coord, "simplification failed, using flat plane: {err}");
                self.fall_back_to_flat();
            }
        }
    }

    /// Abort outstanding requests and drop content.
    pub(crate) fn release(&mut self, jobs: &mut WorkerClient) {
        for mut fetch in [self.imagery_fetch.take(), self.elevation_fetch.take()]
            .into_iter()
            .flatten()
        {
            fetch.abort();
        }
        if let Some(key) = self.pending_job.take() {
            jobs.cancel(key);
        }
        self.mesh = None;
        self.image = None;
    }
}
