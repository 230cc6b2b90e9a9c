//! Tile sources for imagery and elevation.
//!
//! Defines the provider contract consumed by the quadtree
//! (`fetch_tile(level, x, y) -> abortable bytes`), the terrain-RGB raster
//! decoder, and the concrete providers: URL-template services (remote or
//! local) and an in-process debug source.

mod coord;
mod debug;
mod error;
mod fetch;
mod provider;
mod raster;
mod url;

pub use coord::{TileBounds, TileCoord};
pub use debug::{DebugLayer, DebugProvider};
pub use error::{DecodeError, FetchError};
pub use fetch::{AbortableFetch, FetchResponder, FetchResult};
pub use provider::TileProvider;
pub use raster::{
    TileTexture, decode_elevation, decode_terrain_rgb, decode_texture, encode_elevation,
    encode_terrain_rgb, terrain_rgb_to_grid,
};
pub use url::{RetryPolicy, UrlProviderOptions, UrlTemplate, UrlTemplateProvider};
