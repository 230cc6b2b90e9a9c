//! Tile addressing.

use std::fmt;

/// Address of a tile in a `2^level x 2^level` pyramid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileCoord {
    pub level: u8,
    pub x: u32,
    pub y: u32,
}

impl TileCoord {
    pub const ROOT: Self = Self::new(0, 0, 0);

    pub const fn new(level: u8, x: u32, y: u32) -> Self {
        Self { level, x, y }
    }

    /// Number of tiles along one axis at this level.
    pub fn tiles_per_axis(&self) -> u64 {
        1u64 << self.level
    }

    /// Returns `true` if `x` and `y` lie inside the pyramid at this level.
    pub fn is_valid(&self) -> bool {
        (self.x as u64) < self.tiles_per_axis() && (self.y as u64) < self.tiles_per_axis()
    }

    /// The four children, ordered left-top, right-top, left-bottom, right-bottom.
    pub fn children(&self) -> [TileCoord; 4] {
        let level = self.level + 1;
        let (x, y) = (self.x * 2, self.y * 2);
        [
            TileCoord::new(level, x, y),
            TileCoord::new(level, x + 1, y),
            TileCoord::new(level, x, y + 1),
            TileCoord::new(level, x + 1, y + 1),
        ]
    }

    /// Normalized `[u_min, v_min, u_max, v_max]` of this tile in `[0, 1]^2`.
    pub fn unit_bounds(&self) -> [f64; 4] {
        let n = self.tiles_per_axis() as f64;
        let (x, y) = (self.x as f64, self.y as f64);
        [x / n, y / n, (x + 1.0) / n, (y + 1.0) / n]
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.level, self.x, self.y)
    }
}

/// Geographic extent served by a provider, in degrees.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TileBounds {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl TileBounds {
    /// Full Web-Mercator extent.
    pub const WORLD: Self = Self {
        west: -180.0,
        south: -85.051_128_78,
        east: 180.0,
        north: 85.051_128_78,
    };
}

impl Default for TileBounds {
    fn default() -> Self {
        Self::WORLD
    }
}
