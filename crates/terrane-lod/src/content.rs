//! Pluggable node content: what a node loads and how it becomes drawable.

use std::sync::Arc;

use terrane_rtin::TerrainMesh;
use terrane_tiles::TileProvider;
use terrane_worker::{SimplifyJob, WorkerClient};
use tracing::{trace, warn};

use crate::{ErrorPolicy, LoadState, QuadtreeNode};

/// Loads and releases the content of a node.
///
/// Strategies only touch the node they are handed. Worker answers are routed
/// back to the node by the quadtree.
pub trait ContentStrategy: Send {
    fn name(&self) -> &'static str;

    /// Start the node's pipelines.
    fn load(&self, node: &mut QuadtreeNode, jobs: &mut WorkerClient);

    /// Advance the node's in-flight fetches. Never blocks.
    fn poll(&self, node: &mut QuadtreeNode, jobs: &mut WorkerClient);

    /// Abort outstanding work and release content.
    fn dispose(&self, node: &mut QuadtreeNode, jobs: &mut WorkerClient) {
        node.release(jobs);
    }
}

/// Imagery draped over RTIN meshes simplified from elevation tiles.
pub struct HeightmapContent {
    imagery: Arc<dyn TileProvider>,
    elevation: Arc<dyn TileProvider>,
    error_policy: ErrorPolicy,
}

impl HeightmapContent {
    pub fn new(
        imagery: Arc<dyn TileProvider>,
        elevation: Arc<dyn TileProvider>,
        error_policy: ErrorPolicy,
    ) -> Self {
        Self {
            imagery,
            elevation,
            error_policy,
        }
    }

    pub fn error_threshold(&self, level: u8) -> f32 {
        self.error_policy
            .threshold(level, self.elevation.max_level())
    }
}

impl ContentStrategy for HeightmapContent {
    fn name(&self) -> &'static str {
        "heightmap"
    }

    fn load(&self, node: &mut QuadtreeNode, _jobs: &mut WorkerClient) {
        node.start_imagery(self.imagery.as_ref());
        node.geometry = LoadState::Loading;
        node.elevation_fetch = Some(self.elevation.fetch_tile(node.coord));
    }

    fn poll(&self, node: &mut QuadtreeNode, jobs: &mut WorkerClient) {
        node.poll_imagery();

        let Some(result) = node
            .elevation_fetch
            .as_mut()
            .and_then(|fetch| fetch.try_take())
        else {
            return;
        };
        node.elevation_fetch = None;
        match result {
            Ok(raster) => {
                let key = node.id.to_bits();
                let error_threshold = self.error_threshold(node.level());
                let worker = jobs.submit(SimplifyJob {
                    key,
                    raster,
                    error_threshold,
                });
                trace!(tile = %node.coord, worker, error_threshold, "submitted simplification");
                node.pending_job = Some(key);
            }
            Err(err) => {
                warn!(tile = %node.coord, "elevation unavailable, using flat plane: {err}");
                node.fall_back_to_flat();
            }
        }
    }
}

/// Imagery on a flat plane; no elevation or workers involved.
pub struct FlatContent {
    imagery: Arc<dyn TileProvider>,
}

impl FlatContent {
    pub fn new(imagery: Arc<dyn TileProvider>) -> Self {
        Self { imagery }
    }
}

impl ContentStrategy for FlatContent {
    fn name(&self) -> &'static str {
        "flat"
    }

    fn load(&self, node: &mut QuadtreeNode, _jobs: &mut WorkerClient) {
        node.start_imagery(self.imagery.as_ref());
        node.set_mesh(TerrainMesh::flat_plane());
    }

    fn poll(&self, node: &mut QuadtreeNode, _jobs: &mut WorkerClient) {
        node.poll_imagery();
    }
}
