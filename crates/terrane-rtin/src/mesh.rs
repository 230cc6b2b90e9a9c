//! Renderable mesh attributes derived from a simplified RTIN mesh.

use crate::{ElevationGrid, RtinMesh};

/// How grid coordinates map into tile-local space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MeshOptions {
    /// `[min_x, min_z, max_x, max_z]` of the tile in local units.
    pub bounds: [f32; 4],
    /// Multiplier applied to heights.
    pub exaggeration: f32,
}

impl Default for MeshOptions {
    fn default() -> Self {
        Self {
            bounds: [-0.5, -0.5, 0.5, 0.5],
            exaggeration: 1.0,
        }
    }
}

/// Immutable indexed triangle mesh for one tile.
///
/// Positions are `xyz` triples (X/Z in tile-local units, Y = height),
/// UVs are `uv` pairs in `[0, 1]` with V flipped so grid row 0 maps to V = 1.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TerrainMesh {
    pub positions: Vec<f32>,
    pub uvs: Vec<f32>,
    pub indices: Vec<u32>,
}

impl TerrainMesh {
    /// Components per position.
    pub const POSITION_SIZE: usize = 3;
    /// Components per UV.
    pub const UV_SIZE: usize = 2;

    /// Attach positions and UVs to a grid-space mesh.
    pub fn from_rtin(mesh: RtinMesh, grid: &ElevationGrid, options: &MeshOptions) -> Self {
        let tile_size = (grid.size() - 1) as f32;
        let [min_x, min_z, max_x, max_z] = options.bounds;
        let x_scale = (max_x - min_x) / tile_size;
        let z_scale = (max_z - min_z) / tile_size;

        let vertex_count = mesh.vertex_count();
        let mut positions = Vec::with_capacity(vertex_count * Self::POSITION_SIZE);
        let mut uvs = Vec::with_capacity(vertex_count * Self::UV_SIZE);

        for vertex in mesh.vertices.chunks_exact(2) {
            let (gx, gy) = (vertex[0] as usize, vertex[1] as usize);
            let height = grid.height(gx, gy);
            let (x, y) = (gx as f32, gy as f32);

            positions.push(x * x_scale + min_x);
            positions.push(height * options.exaggeration);
            positions.push(y * z_scale + min_z);

            uvs.push(x / tile_size);
            uvs.push((tile_size - y) / tile_size);
        }

        Self {
            positions,
            uvs,
            indices: mesh.triangles,
        }
    }

    /// Single flat quad spanning the unit tile, used when elevation is unavailable.
    pub fn flat_plane() -> Self {
        Self {
            positions: vec![
                -0.5, 0.0, -0.5, //
                0.5, 0.0, -0.5, //
                -0.5, 0.0, 0.5, //
                0.5, 0.0, 0.5,
            ],
            uvs: vec![0.0, 1.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0],
            indices: vec![0, 2, 1, 2, 3, 1],
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len() / Self::POSITION_SIZE
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Minimum and maximum Y over all vertices, `(0, 0)` for an empty mesh.
    pub fn height_range(&self) -> (f32, f32) {
        if self.positions.is_empty() {
            return (0.0, 0.0);
        }
        self.positions
            .chunks_exact(Self::POSITION_SIZE)
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), p| {
                (lo.min(p[1]), hi.max(p[1]))
            })
    }
}
