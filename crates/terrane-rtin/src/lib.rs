//! Right-triangulated irregular network (RTIN) terrain simplification.
//!
//! Turns a square elevation grid of size `2^n + 1` into an error-bounded
//! indexed triangle mesh. The triangle coordinate table is computed once per
//! grid size by [`Rtin::new`] and shared read-only across every tile.

mod error;
mod grid;
mod mesh;
mod rtin;

pub use error::RtinError;
pub use grid::ElevationGrid;
pub use mesh::{MeshOptions, TerrainMesh};
pub use rtin::{Rtin, RtinMesh, RtinTile};
