//! The Tile View: two providers, a readiness handshake and a throttled
//! traversal driven once per host frame.

use std::sync::Arc;

use glam::DVec3;
use terrane_rtin::TerrainMesh;
use terrane_tiles::{TileCoord, TileProvider, TileTexture};
use tracing::{debug, info};

use crate::{
    Camera, ContentStrategy, ErrorPolicy, FlatContent, HeightmapContent, Quadtree, QuadtreeNode,
    QuadtreeSettings, TerrainContext,
};

/// Which provider a readiness signal comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderRole {
    Imagery = 0,
    Elevation = 1,
}

/// Content strategy used for every node of the view.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ContentKind {
    #[default]
    Heightmap,
    Flat,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewSettings {
    pub tree: QuadtreeSettings,
    /// Run the traversal on every n-th call to [`TileView::update`].
    pub update_interval: u32,
    pub error_policy: ErrorPolicy,
    pub content: ContentKind,
}

impl Default for ViewSettings {
    fn default() -> Self {
        Self {
            tree: QuadtreeSettings::default(),
            update_interval: 10,
            error_policy: ErrorPolicy::default(),
            content: ContentKind::default(),
        }
    }
}

/// A drawable tile handed to the host.
#[derive(Clone, Debug)]
pub struct RenderedTile {
    pub coord: TileCoord,
    pub center: DVec3,
    pub size: f64,
    pub mesh: Arc<TerrainMesh>,
    pub texture: Option<Arc<TileTexture>>,
    pub fallback: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ViewStats {
    pub nodes: usize,
    pub loading: usize,
    pub rendered: usize,
    /// Deepest level present in the tree.
    pub depth: u8,
    /// Worker jobs this view is waiting on.
    pub pending_jobs: usize,
    /// Jobs queued or running across the shared pool.
    pub pool_in_flight: u64,
    pub ticks: u64,
    pub traversals: u64,
}

/// Aggregate root owning the providers and the quadtree.
pub struct TileView {
    imagery: Arc<dyn TileProvider>,
    elevation: Arc<dyn TileProvider>,
    context: Arc<TerrainContext>,
    settings: ViewSettings,
    signaled: [bool; 2],
    tree: Option<Quadtree>,
    ticks: u64,
    traversals: u64,
}

impl TileView {
    /// The deepest level is capped by what the imagery provider serves.
    pub fn new(
        imagery: Arc<dyn TileProvider>,
        elevation: Arc<dyn TileProvider>,
        context: Arc<TerrainContext>,
        mut settings: ViewSettings,
    ) -> Self {
        settings.tree.max_level = settings.tree.max_level.min(imagery.max_level());
        settings.update_interval = settings.update_interval.max(1);
        debug!(
            imagery = imagery.name(),
            elevation = elevation.name(),
            max_level = settings.tree.max_level,
            "created tile view"
        );
        Self {
            imagery,
            elevation,
            context,
            settings,
            signaled: [false; 2],
            tree: None,
            ticks: 0,
            traversals: 0,
        }
    }

    pub fn settings(&self) -> &ViewSettings {
        &self.settings
    }

    /// Record that a provider is ready. Each role counts once; the root is
    /// attached when both have signalled. Returns `true` if this call attached it.
    pub fn signal_ready(&mut self, role: ProviderRole) -> bool {
        let slot = &mut self.signaled[role as usize];
        if *slot {
            return false;
        }
        *slot = true;
        debug!(?role, signals = self.ready_signals(), "provider ready");
        if self.ready_signals() < 2 || self.tree.is_some() {
            return false;
        }

        let mut tree = Quadtree::new(
            self.build_content(),
            Arc::clone(&self.context),
            self.settings.tree,
        );
        tree.attach_root(TileCoord::ROOT);
        self.tree = Some(tree);
        info!("tile view ready, root attached");
        true
    }

    pub fn ready_signals(&self) -> usize {
        self.signaled.iter().filter(|signaled| **signaled).count()
    }

    fn build_content(&self) -> Box<dyn ContentStrategy> {
        match self.settings.content {
            ContentKind::Heightmap => Box::new(HeightmapContent::new(
                Arc::clone(&self.imagery),
                Arc::clone(&self.elevation),
                self.settings.error_policy,
            )),
            ContentKind::Flat => Box::new(FlatContent::new(Arc::clone(&self.imagery))),
        }
    }

    /// Call once per host frame. Async results are collected every call; the
    /// camera traversal only runs every `update_interval` calls.
    pub fn update(&mut self, camera: &Camera) {
        self.ticks += 1;
        if self.tree.is_none() {
            if !self.signaled[ProviderRole::Imagery as usize] && self.imagery.is_ready() {
                self.signal_ready(ProviderRole::Imagery);
            }
            if !self.signaled[ProviderRole::Elevation as usize] && self.elevation.is_ready() {
                self.signal_ready(ProviderRole::Elevation);
            }
        }

        let Some(tree) = self.tree.as_mut() else {
            return;
        };
        tree.pump();
        if self.ticks % u64::from(self.settings.update_interval) == 0 {
            tree.update_from_camera(camera);
            self.traversals += 1;
        }
    }

    pub fn tree(&self) -> Option<&Quadtree> {
        self.tree.as_ref()
    }

    pub fn root(&self) -> Option<&QuadtreeNode> {
        let tree = self.tree.as_ref()?;
        tree.node(tree.root()?)
    }

    /// The drawn frontier: ready tiles that are visible and not replaced by children.
    pub fn rendered_tiles(&self) -> Vec<RenderedTile> {
        let Some(tree) = &self.tree else {
            return Vec::new();
        };
        tree.rendered()
            .filter_map(|node| {
                Some(RenderedTile {
                    coord: node.coord(),
                    center: node.center(),
                    size: node.size(),
                    mesh: Arc::clone(node.mesh()?),
                    texture: node.texture().cloned(),
                    fallback: node.is_fallback(),
                })
            })
            .collect()
    }

    pub fn stats(&self) -> ViewStats {
        let mut stats = ViewStats {
            ticks: self.ticks,
            traversals: self.traversals,
            pool_in_flight: self.context.pool.in_flight_count(),
            ..ViewStats::default()
        };
        if let Some(tree) = &self.tree {
            for node in tree.nodes() {
                stats.nodes += 1;
                stats.loading += usize::from(node.is_loading());
                stats.rendered += usize::from(node.is_rendered() && node.mesh().is_some());
                stats.depth = stats.depth.max(node.level());
            }
            stats.pending_jobs = tree.pending_jobs();
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use terrane_rtin::MeshOptions;
    use terrane_tiles::{DebugLayer, DebugProvider};

    use super::*;
    use crate::testing::ScriptedProvider;

    fn context() -> Arc<TerrainContext> {
        TerrainContext::build(17, 2, MeshOptions::default()).unwrap()
    }

    fn scripted_view(imagery: Arc<ScriptedProvider>, elevation: Arc<ScriptedProvider>) -> TileView {
        TileView::new(imagery, elevation, context(), ViewSettings::default())
    }

    /// The root appears only after one signal from each provider.
    #[test]
    fn test_root_needs_both_signals() {
        let imagery = ScriptedProvider::imagery();
        let elevation = ScriptedProvider::flat_elevation(0.0);
        imagery.set_ready(false);
        elevation.set_ready(false);
        let mut view = scripted_view(imagery, elevation);
        let camera = Camera::unbounded(DVec3::ZERO);

        for _ in 0..3 {
            view.update(&camera);
        }
        assert!(view.root().is_none());

        assert!(!view.signal_ready(ProviderRole::Imagery));
        assert!(!view.signal_ready(ProviderRole::Imagery));
        assert_eq!(view.ready_signals(), 1);
        assert!(view.root().is_none());

        assert!(view.signal_ready(ProviderRole::Elevation));
        assert_eq!(view.root().map(|root| root.coord()), Some(TileCoord::ROOT));
        assert!(!view.signal_ready(ProviderRole::Elevation));
    }

    #[test]
    fn test_provider_readiness_is_polled() {
        let imagery = ScriptedProvider::imagery();
        let elevation = ScriptedProvider::flat_elevation(0.0);
        elevation.set_ready(false);
        let mut view = scripted_view(imagery, Arc::clone(&elevation));
        let camera = Camera::unbounded(DVec3::ZERO);

        view.update(&camera);
        assert_eq!(view.ready_signals(), 1);
        assert!(view.root().is_none());

        elevation.set_ready(true);
        view.update(&camera);
        assert!(view.root().is_some());
    }

    /// The traversal runs on every 10th call only.
    #[test]
    fn test_traversal_cadence() {
        let mut view = scripted_view(
            ScriptedProvider::imagery(),
            ScriptedProvider::flat_elevation(0.0),
        );
        let camera = Camera::unbounded(DVec3::new(0.0, 1e12, 0.0));

        for _ in 0..9 {
            view.update(&camera);
        }
        assert_eq!(view.stats().traversals, 0);
        view.update(&camera);
        assert_eq!(view.stats().traversals, 1);
        for _ in 0..10 {
            view.update(&camera);
        }
        let stats = view.stats();
        assert_eq!(stats.ticks, 20);
        assert_eq!(stats.traversals, 2);
    }

    #[test]
    fn test_max_level_capped_by_imagery() {
        let settings = ViewSettings {
            tree: QuadtreeSettings {
                max_level: 22,
                ..QuadtreeSettings::default()
            },
            ..ViewSettings::default()
        };
        let view = TileView::new(
            ScriptedProvider::imagery(),
            ScriptedProvider::flat_elevation(0.0),
            context(),
            settings,
        );
        assert_eq!(view.settings().tree.max_level, 18);
    }

    /// Driving the view with a low camera refines the tree, and the drawn
    /// frontier always covers the world without overlaps.
    #[test]
    fn test_descending_camera_refines_tree() {
        let imagery: Arc<dyn TileProvider> =
            Arc::new(DebugProvider::new(DebugLayer::Imagery, 6, 8, 0));
        let elevation: Arc<dyn TileProvider> =
            Arc::new(DebugProvider::new(DebugLayer::Elevation, 6, 16, 3));
        let settings = ViewSettings {
            tree: QuadtreeSettings {
                max_level: 6,
                world_size: 4096.0,
                ..QuadtreeSettings::default()
            },
            update_interval: 2,
            ..ViewSettings::default()
        };
        let mut view = TileView::new(imagery, elevation, context(), settings);
        let camera = Camera::unbounded(DVec3::new(100.0, 50.0, 100.0));

        let deadline = Instant::now() + Duration::from_secs(20);
        while view.stats().depth < 3 && Instant::now() < deadline {
            view.update(&camera);
            std::thread::sleep(Duration::from_millis(1));
        }
        let stats = view.stats();
        assert!(stats.depth >= 3, "tree did not refine: {stats:?}");

        let tiles = view.rendered_tiles();
        let covered: f64 = tiles.iter().map(|tile| tile.size * tile.size).sum();
        assert!((covered - 4096.0 * 4096.0).abs() < 1e-6);
        for tile in &tiles {
            assert!(tile.mesh.triangle_count() >= 2);
        }
    }
}
