//! View volume: world-space AABBs tested against view-projection planes.

use glam::{DMat4, DVec3, DVec4};

const LEFT: usize = 0;
const RIGHT: usize = 1;
const BOTTOM: usize = 2;
const TOP: usize = 3;
const NEAR: usize = 4;
const FAR: usize = 5;

/// An axis-aligned bounding box in world space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: DVec3,
    pub max: DVec3,
}

impl Aabb {
    pub fn new(min: DVec3, max: DVec3) -> Self {
        Self { min, max }
    }

    /// Box over the square `size` footprint at `center` (X/Z) spanning heights `y_range`.
    pub fn from_footprint(center: DVec3, size: f64, y_range: (f64, f64)) -> Self {
        let half = size * 0.5;
        Self {
            min: DVec3::new(center.x - half, y_range.0, center.z - half),
            max: DVec3::new(center.x + half, y_range.1, center.z + half),
        }
    }

    pub fn center(&self) -> DVec3 {
        (self.min + self.max) * 0.5
    }

    pub fn extents(&self) -> DVec3 {
        (self.max - self.min) * 0.5
    }

    /// Vertical span `(min_y, max_y)`.
    pub fn y_range(&self) -> (f64, f64) {
        (self.min.y, self.max.y)
    }
}

/// Six inward-facing planes `(a, b, c, d)`; a point is inside when
/// `a*x + b*y + c*z + d >= 0` for every plane.
#[derive(Clone, Debug, PartialEq)]
pub struct Frustum {
    planes: [DVec4; 6],
}

impl Frustum {
    /// Extract planes from a view-projection matrix with a `[0, 1]` depth range
    /// (Gribb-Hartmann).
    pub fn from_view_projection(vp: &DMat4) -> Self {
        let rows = [vp.row(0), vp.row(1), vp.row(2), vp.row(3)];

        let mut planes = [DVec4::ZERO; 6];
        planes[LEFT] = rows[3] + rows[0];
        planes[RIGHT] = rows[3] - rows[0];
        planes[BOTTOM] = rows[3] + rows[1];
        planes[TOP] = rows[3] - rows[1];
        planes[NEAR] = rows[2];
        planes[FAR] = rows[3] - rows[2];

        for plane in &mut planes {
            let len = plane.truncate().length();
            if len > 0.0 {
                *plane /= len;
            }
        }

        Self { planes }
    }

    pub fn from_planes(planes: [DVec4; 6]) -> Self {
        Self { planes }
    }

    /// A volume that contains everything.
    pub fn unbounded() -> Self {
        Self {
            planes: [DVec4::new(0.0, 0.0, 0.0, 1.0); 6],
        }
    }

    /// Returns `true` if `aabb` is at least partially inside.
    ///
    /// Conservative p-vertex test: boxes near the frustum corners may be
    /// reported visible, visible boxes are never rejected.
    pub fn intersects(&self, aabb: &Aabb) -> bool {
        self.planes.iter().all(|plane| {
            let normal = plane.truncate();
            let p = DVec3::select(normal.cmpge(DVec3::ZERO), aabb.max, aabb.min);
            normal.dot(p) + plane.w >= 0.0
        })
    }
}

/// Viewer state consumed by the quadtree traversal.
#[derive(Clone, Debug)]
pub struct Camera {
    pub position: DVec3,
    pub frustum: Frustum,
}

impl Camera {
    pub fn new(position: DVec3, view_projection: &DMat4) -> Self {
        Self {
            position,
            frustum: Frustum::from_view_projection(view_projection),
        }
    }

    /// Perspective camera at `position` looking at `target`, Y up.
    pub fn looking_at(
        position: DVec3,
        target: DVec3,
        fov_y: f64,
        aspect: f64,
        near: f64,
        far: f64,
    ) -> Self {
        let view = DMat4::look_at_rh(position, target, DVec3::Y);
        let projection = DMat4::perspective_rh(fov_y, aspect, near, far);
        Self::new(position, &(projection * view))
    }

    /// A camera that sees everything.
    pub fn unbounded(position: DVec3) -> Self {
        Self {
            position,
            frustum: Frustum::unbounded(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forward_camera() -> Camera {
        Camera::looking_at(
            DVec3::ZERO,
            DVec3::NEG_Z,
            std::f64::consts::FRAC_PI_4,
            16.0 / 9.0,
            0.1,
            1000.0,
        )
    }

    #[test]
    fn test_box_in_front_is_visible() {
        let camera = forward_camera();
        let aabb = Aabb::new(DVec3::new(-1.0, -1.0, -5.0), DVec3::new(1.0, 1.0, -3.0));
        assert!(camera.frustum.intersects(&aabb));
    }

    #[test]
    fn test_box_behind_is_culled() {
        let camera = forward_camera();
        let aabb = Aabb::new(DVec3::new(-1.0, -1.0, 3.0), DVec3::new(1.0, 1.0, 5.0));
        assert!(!camera.frustum.intersects(&aabb));
    }

    #[test]
    fn test_box_to_the_side_and_beyond_far_is_culled() {
        let camera = forward_camera();
        let side = Aabb::new(DVec3::new(1000.0, -1.0, -6.0), DVec3::new(1002.0, 1.0, -4.0));
        let far = Aabb::new(DVec3::new(-1.0, -1.0, -2000.0), DVec3::new(1.0, 1.0, -1500.0));
        assert!(!camera.frustum.intersects(&side));
        assert!(!camera.frustum.intersects(&far));
    }

    /// A box straddling a plane counts as visible.
    #[test]
    fn test_partially_inside_is_visible() {
        let camera = forward_camera();
        let aabb = Aabb::new(DVec3::new(-100.0, -1.0, -10.0), DVec3::new(1.0, 1.0, -5.0));
        assert!(camera.frustum.intersects(&aabb));
    }

    #[test]
    fn test_unbounded_sees_everything() {
        let frustum = Frustum::unbounded();
        let aabb = Aabb::new(DVec3::splat(-1e12), DVec3::splat(-1e12 + 1.0));
        assert!(frustum.intersects(&aabb));
    }

    #[test]
    fn test_footprint_box() {
        let aabb = Aabb::from_footprint(DVec3::new(10.0, 0.0, -4.0), 8.0, (-2.0, 6.0));
        assert_eq!(aabb.min, DVec3::new(6.0, -2.0, -8.0));
        assert_eq!(aabb.max, DVec3::new(14.0, 6.0, 0.0));
        assert_eq!(aabb.center(), DVec3::new(10.0, 2.0, -4.0));
        assert_eq!(aabb.extents(), DVec3::new(4.0, 4.0, 4.0));
    }
}
