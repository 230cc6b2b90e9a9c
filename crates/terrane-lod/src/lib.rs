//! Quadtree level-of-detail engine for tiled planet-scale terrain.
//!
//! A [`TileView`] owns an imagery and an elevation provider and, once both
//! are ready, a [`Quadtree`] whose nodes live in a generational arena. Each
//! host frame the view collects finished fetches and worker results, and on
//! a fixed cadence walks the tree from the camera: nodes closer than the
//! subdivide distance split into four children, nodes farther than the
//! simplify distance merge back. A parent is replaced only once all four
//! children are ready, so transitions never show gaps.

mod arena;
mod content;
mod context;
mod frustum;
mod node;
mod policy;
mod quadtree;
mod view;

#[cfg(test)]
mod testing;

pub use arena::{NodeArena, NodeId};
pub use content::{ContentStrategy, FlatContent, HeightmapContent};
pub use context::TerrainContext;
pub use frustum::{Aabb, Camera, Frustum};
pub use node::{LoadState, Quadrant, QuadtreeNode};
pub use policy::{ErrorPolicy, LodDecision, LodPolicy, normalized_distance};
pub use quadtree::{Quadtree, QuadtreeSettings, WORLD_SIZE};
pub use view::{ContentKind, ProviderRole, RenderedTile, TileView, ViewSettings, ViewStats};
