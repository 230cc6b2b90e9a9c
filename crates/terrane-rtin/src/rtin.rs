//! Triangle coordinate table, per-tile error pass and mesh extraction.

use crate::{ElevationGrid, RtinError};

/// Largest supported tile size; grid coordinates must fit in `u16`.
const MAX_TILE_SIZE: usize = 1 << 15;

/// Precomputed triangle table for one grid size.
///
/// Every triangle of the implicit binary subdivision tree is addressed by an
/// index `i`; index 0 and 1 are the two seed triangles that split the grid
/// along its diagonal. Triangles whose legs span a single grid step are not
/// stored since their hypotenuse midpoint is not a grid vertex.
#[derive(Debug)]
pub struct Rtin {
    grid_size: usize,
    num_triangles: usize,
    num_parent_triangles: usize,
    /// `[ax, ay, bx, by]` per triangle; `a`/`b` are the hypotenuse endpoints.
    coords: Vec<u16>,
}

impl Rtin {
    /// Build the triangle table for grids of `grid_size * grid_size` samples.
    pub fn new(grid_size: usize) -> Result<Self, RtinError> {
        let tile_size = grid_size.wrapping_sub(1);
        if grid_size < 3 || !tile_size.is_power_of_two() || tile_size > MAX_TILE_SIZE {
            return Err(RtinError::InvalidGridSize(grid_size));
        }

        let num_triangles = tile_size * tile_size * 2 - 2;
        let num_parent_triangles = num_triangles - tile_size * tile_size;
        let t = tile_size as u32;

        let mut coords = vec![0u16; num_triangles * 4];
        for i in 0..num_triangles {
            let mut id = i + 2;
            let (mut ax, mut ay) = (0u32, 0u32);
            let (mut bx, mut by) = (0u32, 0u32);
            let (mut cx, mut cy) = (0u32, 0u32);
            if id & 1 == 1 {
                // bottom-left seed
                bx = t;
                by = t;
                cx = t;
            } else {
                // top-right seed
                ax = t;
                ay = t;
                cy = t;
            }

            loop {
                id >>= 1;
                if id <= 1 {
                    break;
                }
                let mx = (ax + bx) >> 1;
                let my = (ay + by) >> 1;
                if id & 1 == 1 {
                    // left half
                    bx = ax;
                    by = ay;
                    ax = cx;
                    ay = cy;
                } else {
                    // right half
                    ax = bx;
                    ay = by;
                    bx = cx;
                    by = cy;
                }
                cx = mx;
                cy = my;
            }

            let k = i * 4;
            coords[k] = ax as u16;
            coords[k + 1] = ay as u16;
            coords[k + 2] = bx as u16;
            coords[k + 3] = by as u16;
        }

        Ok(Self {
            grid_size,
            num_triangles,
            num_parent_triangles,
            coords,
        })
    }

    pub fn grid_size(&self) -> usize {
        self.grid_size
    }

    pub fn tile_size(&self) -> usize {
        self.grid_size - 1
    }

    /// Number of triangles in the table: `2 * (size - 1)^2 - 2`.
    pub fn num_triangles(&self) -> usize {
        self.num_triangles
    }

    /// Triangles whose children are also in the table.
    pub fn num_parent_triangles(&self) -> usize {
        self.num_parent_triangles
    }

    /// Corners `[a, b, c]` of triangle `i` as `[x, y]` grid coordinates.
    ///
    /// `a`-`b` is the hypotenuse and `c` the right-angle corner.
    pub fn triangle(&self, i: usize) -> [[u16; 2]; 3] {
        let k = i * 4;
        let (ax, ay, bx, by) = (
            self.coords[k],
            self.coords[k + 1],
            self.coords[k + 2],
            self.coords[k + 3],
        );
        let (cx, cy) = right_angle_corner(ax as i64, ay as i64, bx as i64, by as i64);
        [[ax, ay], [bx, by], [cx as u16, cy as u16]]
    }

    /// Run the bottom-up error pass for one elevation grid.
    pub fn create_tile<'a>(&'a self, grid: &'a ElevationGrid) -> Result<RtinTile<'a>, RtinError> {
        if grid.size() != self.grid_size {
            return Err(RtinError::GridLengthMismatch {
                size: self.grid_size,
                expected: self.grid_size * self.grid_size,
                actual: grid.heights().len(),
            });
        }
        let mut tile = RtinTile {
            rtin: self,
            grid,
            errors: vec![0.0; grid.heights().len()],
        };
        tile.update();
        Ok(tile)
    }
}

#[inline]
fn right_angle_corner(ax: i64, ay: i64, bx: i64, by: i64) -> (i64, i64) {
    let mx = (ax + bx) >> 1;
    let my = (ay + by) >> 1;
    (mx + my - ay, my + ax - mx)
}

/// Per-tile error map over a shared [`Rtin`] table.
pub struct RtinTile<'a> {
    rtin: &'a Rtin,
    grid: &'a ElevationGrid,
    errors: Vec<f32>,
}

impl RtinTile<'_> {
    fn update(&mut self) {
        let size = self.rtin.grid_size;
        let terrain = self.grid.heights();
        let errors = &mut self.errors;

        // smallest triangles first so parents can fold in their children
        for i in (0..self.rtin.num_triangles).rev() {
            let k = i * 4;
            let ax = self.rtin.coords[k] as usize;
            let ay = self.rtin.coords[k + 1] as usize;
            let bx = self.rtin.coords[k + 2] as usize;
            let by = self.rtin.coords[k + 3] as usize;
            let mx = (ax + bx) >> 1;
            let my = (ay + by) >> 1;
            let cx = mx + my - ay;
            let cy = my + ax - mx;

            let interpolated = (terrain[ay * size + ax] + terrain[by * size + bx]) / 2.0;
            let middle = my * size + mx;
            let middle_error = (interpolated - terrain[middle]).abs();

            errors[middle] = errors[middle].max(middle_error);

            if i < self.rtin.num_parent_triangles {
                let left = ((ay + cy) >> 1) * size + ((ax + cx) >> 1);
                let right = ((by + cy) >> 1) * size + ((bx + cx) >> 1);
                errors[middle] = errors[middle].max(errors[left]).max(errors[right]);
            }
        }
    }

    /// Accumulated error stored at grid coordinate `(x, y)`.
    pub fn error_at(&self, x: usize, y: usize) -> f32 {
        self.errors[y * self.rtin.grid_size + x]
    }

    pub fn errors(&self) -> &[f32] {
        &self.errors
    }

    /// Extract the coarsest mesh whose error stays within `max_error`.
    pub fn mesh(&self, max_error: f32) -> RtinMesh {
        let size = self.rtin.grid_size;
        let max = size - 1;
        let mut extraction = Extraction {
            size,
            errors: &self.errors,
            max_error,
            indices: vec![0; size * size],
            num_vertices: 0,
            num_triangles: 0,
            vertices: Vec::new(),
            triangles: Vec::new(),
        };

        // pass 1: assign an index to every used vertex and count triangles
        extraction.count(0, 0, max, max, max, 0);
        extraction.count(max, max, 0, 0, 0, max);

        extraction.vertices = vec![0; extraction.num_vertices as usize * 2];
        extraction.triangles = Vec::with_capacity(extraction.num_triangles * 3);

        // pass 2: fill vertices and triangle indices
        extraction.emit(0, 0, max, max, max, 0);
        extraction.emit(max, max, 0, 0, 0, max);

        RtinMesh {
            vertices: extraction.vertices,
            triangles: extraction.triangles,
        }
    }
}

struct Extraction<'e> {
    size: usize,
    errors: &'e [f32],
    max_error: f32,
    /// 1-based vertex index per grid coordinate, 0 = unused.
    indices: Vec<u32>,
    num_vertices: u32,
    num_triangles: usize,
    vertices: Vec<u16>,
    triangles: Vec<u32>,
}

impl Extraction<'_> {
    #[inline]
    fn should_split(&self, a: (usize, usize), c: (usize, usize), m: (usize, usize)) -> bool {
        a.0.abs_diff(c.0) + a.1.abs_diff(c.1) > 1 && self.errors[m.1 * self.size + m.0] > self.max_error
    }

    fn vertex_index(&mut self, x: usize, y: usize) {
        let slot = &mut self.indices[y * self.size + x];
        if *slot == 0 {
            self.num_vertices += 1;
            *slot = self.num_vertices;
        }
    }

    fn count(&mut self, ax: usize, ay: usize, bx: usize, by: usize, cx: usize, cy: usize) {
        let mx = (ax + bx) >> 1;
        let my = (ay + by) >> 1;

        if self.should_split((ax, ay), (cx, cy), (mx, my)) {
            self.count(cx, cy, ax, ay, mx, my);
            self.count(bx, by, cx, cy, mx, my);
        } else {
            self.vertex_index(ax, ay);
            self.vertex_index(bx, by);
            self.vertex_index(cx, cy);
            self.num_triangles += 1;
        }
    }

    fn emit(&mut self, ax: usize, ay: usize, bx: usize, by: usize, cx: usize, cy: usize) {
        let mx = (ax + bx) >> 1;
        let my = (ay + by) >> 1;

        if self.should_split((ax, ay), (cx, cy), (mx, my)) {
            self.emit(cx, cy, ax, ay, mx, my);
            self.emit(bx, by, cx, cy, mx, my);
        } else {
            for (x, y) in [(ax, ay), (bx, by), (cx, cy)] {
                let index = self.indices[y * self.size + x] - 1;
                self.vertices[2 * index as usize] = x as u16;
                self.vertices[2 * index as usize + 1] = y as u16;
                self.triangles.push(index);
            }
        }
    }
}

/// Simplified mesh in grid space.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RtinMesh {
    /// Grid coordinates as `[x0, y0, x1, y1, ...]`.
    pub vertices: Vec<u16>,
    /// Three vertex indices per triangle.
    pub triangles: Vec<u32>,
}

impl RtinMesh {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / 2
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len() / 3
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    /// Paraboloid: every hypotenuse midpoint has a strictly positive error.
    fn paraboloid(size: usize) -> ElevationGrid {
        ElevationGrid::from_fn(size, |x, y| (x * x + y * y) as f32)
    }

    /// Sizes that are not `2^n + 1` are a configuration error.
    #[test]
    fn test_invalid_grid_sizes_are_rejected() {
        for size in [0, 1, 2, 4, 256, 258, 1000] {
            assert_eq!(
                Rtin::new(size).unwrap_err(),
                RtinError::InvalidGridSize(size),
                "size {size} should be rejected"
            );
        }
        for size in [3, 5, 9, 17, 65, 257] {
            assert!(Rtin::new(size).is_ok(), "size {size} should be accepted");
        }
    }

    #[test]
    fn test_triangle_count_formula() {
        for size in [3, 5, 9, 33, 257] {
            let rtin = Rtin::new(size).unwrap();
            let tile = size - 1;
            assert_eq!(rtin.num_triangles(), 2 * tile * tile - 2);
            assert_eq!(rtin.num_parent_triangles(), tile * tile - 2);
        }
    }

    /// Index 0 and 1 are the two seed triangles covering the whole grid.
    #[test]
    fn test_seed_triangles_cover_grid() {
        let rtin = Rtin::new(257).unwrap();
        assert_eq!(rtin.triangle(0), [[256, 256], [0, 0], [0, 256]]);
        assert_eq!(rtin.triangle(1), [[0, 0], [256, 256], [256, 0]]);
    }

    /// Every table entry is a right-isosceles triangle inside the grid.
    #[test]
    fn test_all_triangles_are_right_isosceles_in_bounds() {
        for size in [3, 5, 17, 65] {
            let rtin = Rtin::new(size).unwrap();
            let max = (size - 1) as i64;
            for i in 0..rtin.num_triangles() {
                let [a, b, c] = rtin.triangle(i).map(|p| [p[0] as i64, p[1] as i64]);
                for p in [a, b, c] {
                    assert!((0..=max).contains(&p[0]) && (0..=max).contains(&p[1]));
                }
                let ca = [a[0] - c[0], a[1] - c[1]];
                let cb = [b[0] - c[0], b[1] - c[1]];
                let dot = ca[0] * cb[0] + ca[1] * cb[1];
                let len_a = ca[0] * ca[0] + ca[1] * ca[1];
                let len_b = cb[0] * cb[0] + cb[1] * cb[1];
                assert_eq!(dot, 0, "triangle {i} of size {size} has no right angle at c");
                assert_eq!(len_a, len_b, "triangle {i} of size {size} is not isosceles");
                assert!(len_a > 0);
            }
        }
    }

    /// Threshold 0 on curved terrain keeps every grid vertex.
    #[test]
    fn test_zero_threshold_reproduces_full_grid() {
        let size = 17;
        let rtin = Rtin::new(size).unwrap();
        let grid = paraboloid(size);
        let tile = rtin.create_tile(&grid).unwrap();
        let mesh = tile.mesh(0.0);

        assert_eq!(mesh.vertex_count(), size * size);
        assert_eq!(mesh.triangle_count(), 2 * (size - 1) * (size - 1));
    }

    /// An infinite threshold collapses to the two seed triangles.
    #[test]
    fn test_infinite_threshold_yields_two_triangles() {
        let rtin = Rtin::new(65).unwrap();
        let grid = paraboloid(65);
        let tile = rtin.create_tile(&grid).unwrap();
        let mesh = tile.mesh(f32::INFINITY);

        assert_eq!(mesh.triangle_count(), 2);
        assert_eq!(mesh.vertex_count(), 4);
    }

    /// Flat terrain has no error anywhere, so even threshold 0 stays at two triangles.
    #[test]
    fn test_flat_terrain_collapses() {
        let rtin = Rtin::new(33).unwrap();
        let grid = ElevationGrid::flat(33);
        let tile = rtin.create_tile(&grid).unwrap();
        assert_eq!(tile.mesh(0.0).triangle_count(), 2);
    }

    /// The grid centre is the root midpoint and bounds every merge below it.
    #[test]
    fn test_root_midpoint_error_bounds_all_errors() {
        let size = 33;
        let rtin = Rtin::new(size).unwrap();
        let grid = ElevationGrid::from_fn(size, |x, y| ((x * 7 + y * 13) % 11) as f32);
        let tile = rtin.create_tile(&grid).unwrap();
        let centre = tile.error_at(size / 2, size / 2);
        let max = tile.errors().iter().copied().fold(0.0f32, f32::max);
        assert_eq!(centre, max);
    }

    /// A lone spike is kept only while the threshold is below its error.
    #[test]
    fn test_spike_respects_threshold() {
        let size = 5;
        let rtin = Rtin::new(size).unwrap();
        let mut grid = ElevationGrid::flat(size);
        grid.heights_mut()[2 * size + 2] = 10.0;
        let tile = rtin.create_tile(&grid).unwrap();

        assert_eq!(tile.error_at(2, 2), 10.0);

        let fine = tile.mesh(5.0);
        let has_spike = fine
            .vertices
            .chunks_exact(2)
            .any(|v| v[0] == 2 && v[1] == 2);
        assert!(has_spike);

        let coarse = tile.mesh(10.0);
        assert_eq!(coarse.triangle_count(), 2);
    }

    /// Shared vertices are emitted once and every index is in range.
    #[test]
    fn test_vertices_are_deduplicated() {
        let size = 33;
        let rtin = Rtin::new(size).unwrap();
        let grid = ElevationGrid::from_fn(size, |x, y| ((x * 31 + y * 17) % 23) as f32);
        let tile = rtin.create_tile(&grid).unwrap();
        let mesh = tile.mesh(3.0);

        let unique: HashSet<_> = mesh.vertices.chunks_exact(2).map(|v| (v[0], v[1])).collect();
        assert_eq!(unique.len(), mesh.vertex_count());
        assert!(
            mesh.triangles
                .iter()
                .all(|&i| (i as usize) < mesh.vertex_count())
        );
    }

    /// Coarser thresholds never produce more triangles.
    #[test]
    fn test_triangle_count_decreases_with_threshold() {
        let size = 65;
        let rtin = Rtin::new(size).unwrap();
        let grid = ElevationGrid::from_fn(size, |x, y| {
            ((x as f32 * 0.3).sin() + (y as f32 * 0.2).cos()) * 50.0
        });
        let tile = rtin.create_tile(&grid).unwrap();
        let mut previous = usize::MAX;
        for threshold in [0.0, 0.5, 2.0, 8.0, 32.0, 1000.0] {
            let count = tile.mesh(threshold).triangle_count();
            assert!(count <= previous, "threshold {threshold}: {count} > {previous}");
            previous = count;
        }
    }

    #[test]
    fn test_grid_of_wrong_size_is_rejected() {
        let rtin = Rtin::new(9).unwrap();
        let grid = ElevationGrid::flat(5);
        assert!(matches!(
            rtin.create_tile(&grid),
            Err(RtinError::GridLengthMismatch { size: 9, .. })
        ));
    }
}
