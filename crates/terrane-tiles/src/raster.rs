//! Raster decoding: terrain-RGB elevation and imagery textures.
//!
//! Elevation tiles store heights in the fixed-point terrain-RGB encoding
//! `height = (R * 65536 + G * 256 + B) / 10 - 10000`, giving a 0.1 m
//! quantization and a floor of -10 000 m.

use std::io::Cursor;

use image::imageops::FilterType;
use image::{ImageFormat, RgbaImage};
use terrane_rtin::ElevationGrid;

use crate::DecodeError;

const OFFSET_M: f64 = 10_000.0;
const SCALE: f64 = 10.0;
const MAX_ENCODED: f64 = 16_777_215.0;

/// Decode one terrain-RGB pixel into meters.
#[inline]
pub fn decode_elevation(r: u8, g: u8, b: u8) -> f32 {
    let encoded = r as f64 * 65_536.0 + g as f64 * 256.0 + b as f64;
    (encoded / SCALE - OFFSET_M) as f32
}

/// Encode meters into a terrain-RGB pixel, clamping to the representable range.
pub fn encode_elevation(height: f32) -> [u8; 3] {
    let value = ((height as f64 + OFFSET_M) * SCALE)
        .round()
        .clamp(0.0, MAX_ENCODED) as u32;
    [(value >> 16) as u8, (value >> 8) as u8, value as u8]
}

/// Decode a square terrain-RGB raster of `tile_size` pixels into a
/// `(tile_size + 1)^2` grid. The last row and column are replicated to fill
/// the border.
pub fn terrain_rgb_to_grid(image: &RgbaImage) -> ElevationGrid {
    let tile_size = image.width().min(image.height()) as usize;
    let grid_size = tile_size + 1;
    let mut grid = ElevationGrid::flat(grid_size);
    let heights = grid.heights_mut();

    for y in 0..tile_size {
        for x in 0..tile_size {
            let [r, g, b, _] = image.get_pixel(x as u32, y as u32).0;
            heights[y * grid_size + x] = decode_elevation(r, g, b);
        }
    }

    // backfill bottom row, then right column
    for x in 0..grid_size - 1 {
        heights[grid_size * (grid_size - 1) + x] = heights[grid_size * (grid_size - 2) + x];
    }
    for y in 0..grid_size {
        heights[grid_size * y + grid_size - 1] = heights[grid_size * y + grid_size - 2];
    }

    grid
}

/// Decode encoded raster bytes into an elevation grid of `tile_size + 1`
/// samples per side. Rasters of a different size are resampled nearest
/// neighbour so the fixed-point channels are never blended.
pub fn decode_terrain_rgb(bytes: &[u8], tile_size: u32) -> Result<ElevationGrid, DecodeError> {
    if tile_size < 2 {
        return Err(DecodeError::InvalidTileSize(tile_size));
    }
    let image = image::load_from_memory(bytes)?.to_rgba8();
    if image.width() == 0 || image.height() == 0 {
        return Err(DecodeError::EmptyRaster);
    }
    let image = if image.dimensions() != (tile_size, tile_size) {
        image::imageops::resize(&image, tile_size, tile_size, FilterType::Nearest)
    } else {
        image
    };
    Ok(terrain_rgb_to_grid(&image))
}

/// Encode a height function as a PNG terrain-RGB raster of `tile_size` pixels.
pub fn encode_terrain_rgb(
    tile_size: u32,
    mut height: impl FnMut(u32, u32) -> f32,
) -> Result<Vec<u8>, DecodeError> {
    let image = RgbaImage::from_fn(tile_size, tile_size, |x, y| {
        let [r, g, b] = encode_elevation(height(x, y));
        image::Rgba([r, g, b, 255])
    });
    encode_png(&image)
}

pub(crate) fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, DecodeError> {
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

/// Decoded RGBA8 imagery for one tile.
#[derive(Clone, Debug, PartialEq)]
pub struct TileTexture {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl TileTexture {
    pub fn from_image(image: RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            width,
            height,
            pixels: image.into_raw(),
        }
    }

    pub fn byte_len(&self) -> usize {
        self.pixels.len()
    }
}

/// Decode an imagery tile (PNG or JPEG) into RGBA8 pixels.
pub fn decode_texture(bytes: &[u8]) -> Result<TileTexture, DecodeError> {
    let image = image::load_from_memory(bytes)?.to_rgba8();
    if image.width() == 0 || image.height() == 0 {
        return Err(DecodeError::EmptyRaster);
    }
    Ok(TileTexture::from_image(image))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// decode(encode(h)) recovers h within the 0.1 m quantization, including negatives.
    #[test]
    fn test_elevation_round_trip_within_quantization() {
        for h in [-10_000.0, -432.17, -0.05, 0.0, 1.0, 8848.86, 123_456.7] {
            let [r, g, b] = encode_elevation(h);
            let decoded = decode_elevation(r, g, b);
            assert!(
                (decoded - h).abs() <= 0.05 + 1e-3,
                "height {h} decoded as {decoded}"
            );
        }
    }

    #[test]
    fn test_known_pixel_values() {
        assert_eq!(decode_elevation(0, 0, 0), -10_000.0);
        // 100_000 / 10 - 10_000 = 0
        assert_eq!(decode_elevation(0x01, 0x86, 0xA0), 0.0);
    }

    #[test]
    fn test_encoding_clamps_out_of_range() {
        assert_eq!(encode_elevation(-20_000.0), [0, 0, 0]);
        assert_eq!(encode_elevation(10_000_000.0), [255, 255, 255]);
    }

    /// The last interior row and column are replicated into the border.
    #[test]
    fn test_border_is_replicated() {
        let image = RgbaImage::from_fn(4, 4, |x, y| {
            let [r, g, b] = encode_elevation((y * 4 + x) as f32);
            image::Rgba([r, g, b, 255])
        });
        let grid = terrain_rgb_to_grid(&image);
        assert_eq!(grid.size(), 5);
        for x in 0..4 {
            assert_eq!(grid.height(x, 4), grid.height(x, 3));
        }
        for y in 0..5 {
            assert_eq!(grid.height(4, y), grid.height(3, y));
        }
        assert_eq!(grid.height(4, 4), 15.0);
        assert_eq!(grid.height(1, 2), 9.0);
    }

    #[test]
    fn test_png_round_trip_through_decoder() {
        let bytes = encode_terrain_rgb(8, |x, y| x as f32 * 10.0 - y as f32 * 100.0).unwrap();
        let grid = decode_terrain_rgb(&bytes, 8).unwrap();
        assert_eq!(grid.size(), 9);
        assert!((grid.height(3, 2) - (30.0 - 200.0)).abs() < 0.1);
    }

    /// Rasters larger than the tile size are resampled to it.
    #[test]
    fn test_resampling_to_tile_size() {
        let bytes = encode_terrain_rgb(16, |_, _| 250.0).unwrap();
        let grid = decode_terrain_rgb(&bytes, 8).unwrap();
        assert_eq!(grid.size(), 9);
        assert!(grid.heights().iter().all(|&h| (h - 250.0).abs() < 0.1));
    }

    #[test]
    fn test_garbage_bytes_fail_to_decode() {
        assert!(matches!(
            decode_terrain_rgb(b"not an image", 256),
            Err(DecodeError::Image(_))
        ));
        assert!(decode_texture(b"").is_err());
    }

    #[test]
    fn test_texture_decode_keeps_dimensions() {
        let image = RgbaImage::from_pixel(3, 2, image::Rgba([1, 2, 3, 255]));
        let texture = decode_texture(&encode_png(&image).unwrap()).unwrap();
        assert_eq!((texture.width, texture.height), (3, 2));
        assert_eq!(texture.byte_len(), 24);
        assert_eq!(&texture.pixels[..4], &[1, 2, 3, 255]);
    }
}
