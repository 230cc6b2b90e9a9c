//! The tile provider contract.

use crate::{AbortableFetch, TileBounds, TileCoord};

/// A raster tile source for imagery or elevation.
///
/// Implementations must return quickly from [`fetch_tile`](Self::fetch_tile);
/// any I/O happens behind the returned [`AbortableFetch`].
pub trait TileProvider: Send + Sync {
    /// Human-readable name used in logs.
    fn name(&self) -> &str;

    fn min_level(&self) -> u8;

    fn max_level(&self) -> u8;

    /// Edge length of a tile raster in pixels.
    fn tile_size(&self) -> u32;

    fn bounds(&self) -> TileBounds {
        TileBounds::WORLD
    }

    /// Whether the provider has finished any setup and can serve tiles.
    fn is_ready(&self) -> bool {
        true
    }

    /// Start fetching the encoded raster for `coord`.
    fn fetch_tile(&self, coord: TileCoord) -> AbortableFetch;
}
