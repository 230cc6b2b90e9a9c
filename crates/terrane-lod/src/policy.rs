//! Distance policy for subdivision and simplification, and RTIN error thresholds.

use glam::DVec3;

/// Normalized distance thresholds with a hysteresis band between them.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LodPolicy {
    /// Subdivide when the normalized distance is strictly below this.
    pub subdivide_below: f64,
    /// Simplify when the normalized distance is strictly above this. Children
    /// are only traversed while the distance is at most this value.
    pub simplify_above: f64,
}

impl Default for LodPolicy {
    fn default() -> Self {
        Self {
            subdivide_below: 110.0,
            simplify_above: 130.0,
        }
    }
}

/// What the traversal should do with a node this frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LodDecision {
    Subdivide,
    Simplify,
    Keep,
}

/// Camera-to-anchor distance divided by `2^(max_level - level)`.
pub fn normalized_distance(camera: DVec3, anchor: DVec3, level: u8, max_level: u8) -> f64 {
    let depth = i32::from(max_level.saturating_sub(level));
    camera.distance(anchor) / 2f64.powi(depth)
}

impl LodPolicy {
    /// Decide for a node at `distance`.
    ///
    /// `rendered` is whether the node is currently the drawn representative of
    /// its area, `subdivided` whether it has children.
    pub fn decide(
        &self,
        distance: f64,
        in_view: bool,
        rendered: bool,
        subdivided: bool,
    ) -> LodDecision {
        if distance < self.subdivide_below && in_view && rendered && !subdivided {
            LodDecision::Subdivide
        } else if distance > self.simplify_above && subdivided {
            LodDecision::Simplify
        } else {
            LodDecision::Keep
        }
    }

    /// Whether traversal continues into the node's children.
    pub fn should_recurse(&self, distance: f64) -> bool {
        distance <= self.simplify_above
    }
}

/// Maximum RTIN error allowed for a tile at a given level.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ErrorPolicy {
    /// Same threshold at every level.
    Constant(f32),
    /// `coarse_error` below `coarse_levels`, then
    /// `(max_level - level) / max_level * fine_scale`.
    DepthScaled {
        coarse_error: f32,
        coarse_levels: u8,
        fine_scale: f32,
    },
}

impl Default for ErrorPolicy {
    fn default() -> Self {
        ErrorPolicy::DepthScaled {
            coarse_error: 100.0,
            coarse_levels: 10,
            fine_scale: 80.0,
        }
    }
}

impl ErrorPolicy {
    pub fn threshold(&self, level: u8, max_level: u8) -> f32 {
        match *self {
            ErrorPolicy::Constant(error) => error,
            ErrorPolicy::DepthScaled {
                coarse_error,
                coarse_levels,
                fine_scale,
            } => {
                if level < coarse_levels || max_level == 0 {
                    coarse_error
                } else {
                    let remaining = max_level.saturating_sub(level) as f32;
                    remaining / max_level as f32 * fine_scale
                }
            }
        }
    }
}
