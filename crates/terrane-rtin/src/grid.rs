//! Fixed-size square elevation grid.

use crate::RtinError;

/// Square grid of `size * size` heights in meters, row-major (`y * size + x`).
#[derive(Clone, Debug, PartialEq)]
pub struct ElevationGrid {
    size: usize,
    heights: Vec<f32>,
}

impl ElevationGrid {
    /// Wrap raw heights. The length must be exactly `size * size`.
    pub fn new(size: usize, heights: Vec<f32>) -> Result<Self, RtinError> {
        let expected = size * size;
        if heights.len() != expected {
            return Err(RtinError::GridLengthMismatch {
                size,
                expected,
                actual: heights.len(),
            });
        }
        Ok(Self { size, heights })
    }

    /// A grid where every height is zero.
    pub fn flat(size: usize) -> Self {
        Self {
            size,
            heights: vec![0.0; size * size],
        }
    }

    /// Build a grid by sampling `f(x, y)` at every grid coordinate.
    pub fn from_fn(size: usize, mut f: impl FnMut(usize, usize) -> f32) -> Self {
        let mut heights = Vec::with_capacity(size * size);
        for y in 0..size {
            for x in 0..size {
                heights.push(f(x, y));
            }
        }
        Self { size, heights }
    }

    /// Side length in samples.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Height at grid coordinate `(x, y)`.
    #[inline]
    pub fn height(&self, x: usize, y: usize) -> f32 {
        self.heights[y * self.size + x]
    }

    pub fn heights(&self) -> &[f32] {
        &self.heights
    }

    pub fn heights_mut(&mut self) -> &mut [f32] {
        &mut self.heights
    }

    /// Minimum and maximum height in the grid.
    pub fn height_range(&self) -> (f32, f32) {
        self.heights
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &h| {
                (lo.min(h), hi.max(h))
            })
    }
}
