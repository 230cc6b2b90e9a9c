//! In-process tile source for running without a network.
//!
//! Imagery tiles are a flat grey whose brightness follows the level, framed by
//! a cyan border so tile edges are visible. Elevation tiles are fBm simplex
//! noise sampled in pyramid-normalized coordinates, which keeps neighbouring
//! tiles continuous across their shared edges.

use image::{Rgba, RgbaImage};
use noise::{NoiseFn, Simplex};
use tracing::trace;

use crate::raster::{encode_png, encode_terrain_rgb};
use crate::{AbortableFetch, FetchError, TileCoord, TileProvider};

const DARK: [u8; 3] = [0x22, 0x22, 0x22];
const LIGHT: [u8; 3] = [0xcc, 0xcc, 0xcc];
const BORDER: Rgba<u8> = Rgba([0x00, 0xff, 0xff, 0xff]);

/// Which kind of raster a [`DebugProvider`] produces.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DebugLayer {
    Imagery,
    Elevation,
}

/// Synthetic provider; every fetch completes immediately.
pub struct DebugProvider {
    layer: DebugLayer,
    name: String,
    max_level: u8,
    tile_size: u32,
    noise: Simplex,
    octaves: u32,
    base_frequency: f64,
    amplitude: f64,
}

impl DebugProvider {
    pub fn new(layer: DebugLayer, max_level: u8, tile_size: u32, seed: u32) -> Self {
        let name = match layer {
            DebugLayer::Imagery => "debug-imagery",
            DebugLayer::Elevation => "debug-elevation",
        };
        Self {
            layer,
            name: name.to_string(),
            max_level,
            tile_size,
            noise: Simplex::new(seed),
            octaves: 8,
            base_frequency: 4.0,
            amplitude: 3000.0,
        }
    }

    pub fn imagery(max_level: u8) -> Self {
        Self::new(DebugLayer::Imagery, max_level, 256, 0)
    }

    pub fn elevation(max_level: u8, seed: u32) -> Self {
        Self::new(DebugLayer::Elevation, max_level, 256, seed)
    }

    pub fn layer(&self) -> DebugLayer {
        self.layer
    }

    /// Fill colour for `level`, lerped from dark at level 0 to light at the max level.
    pub fn level_color(&self, level: u8) -> [u8; 3] {
        let t = if self.max_level == 0 {
            1.0
        } else {
            (level.min(self.max_level) as f32) / (self.max_level as f32)
        };
        let mut color = [0u8; 3];
        for (i, c) in color.iter_mut().enumerate() {
            *c = (DARK[i] as f32 + (LIGHT[i] as f32 - DARK[i] as f32) * t).round() as u8;
        }
        color
    }

    /// Height in meters at normalized pyramid coordinates `(u, v)`.
    pub fn sample(&self, u: f64, v: f64) -> f32 {
        let mut total = 0.0;
        let mut frequency = self.base_frequency;
        let mut amplitude = self.amplitude;
        for _ in 0..self.octaves {
            total += self.noise.get([u * frequency, v * frequency]) * amplitude;
            frequency *= 2.0;
            amplitude *= 0.5;
        }
        total as f32
    }

    fn imagery_tile(&self, coord: TileCoord) -> Result<Vec<u8>, FetchError> {
        let [r, g, b] = self.level_color(coord.level);
        let last = self.tile_size.saturating_sub(1);
        let image = RgbaImage::from_fn(self.tile_size, self.tile_size, |x, y| {
            if x == 0 || y == 0 || x == last || y == last {
                BORDER
            } else {
                Rgba([r, g, b, 0xff])
            }
        });
        encode_png(&image).map_err(|err| FetchError::Generate(err.to_string()))
    }

    fn elevation_tile(&self, coord: TileCoord) -> Result<Vec<u8>, FetchError> {
        let n = coord.tiles_per_axis() as f64;
        let size = self.tile_size as f64;
        encode_terrain_rgb(self.tile_size, |px, py| {
            let u = (coord.x as f64 + px as f64 / size) / n;
            let v = (coord.y as f64 + py as f64 / size) / n;
            self.sample(u, v)
        })
        .map_err(|err| FetchError::Generate(err.to_string()))
    }
}

impl TileProvider for DebugProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn min_level(&self) -> u8 {
        0
    }

    fn max_level(&self) -> u8 {
        self.max_level
    }

    fn tile_size(&self) -> u32 {
        self.tile_size
    }

    fn fetch_tile(&self, coord: TileCoord) -> AbortableFetch {
        if coord.level > self.max_level {
            return AbortableFetch::ready(Err(FetchError::OutOfRange {
                level: coord.level,
                min: 0,
                max: self.max_level,
            }));
        }
        trace!(provider = %self.name, tile = %coord, "generating debug tile");
        let result = match self.layer {
            DebugLayer::Imagery => self.imagery_tile(coord),
            DebugLayer::Elevation => self.elevation_tile(coord),
        };
        AbortableFetch::ready(result)
    }
}
