//! Frustum plane extraction and sphere tests

use glam::{Mat4, Vec3, Vec4};

/// Six view-frustum planes extracted from a clip-from-world matrix.
///
/// Planes are stored as `Vec4(normal, d)` with normals pointing inward,
/// so a point is inside when `normal . p + d >= 0` for every plane.
/// Extraction assumes the 0..1 clip depth range used by Vulkan.
#[derive(Debug, Clone, Copy)]
pub struct Frustum {
    planes: [Vec4; 6],
}

impl Frustum {
    /// Extract planes from `projection * view * world_to_local`
    pub fn from_clip_matrix(clip_from_world: Mat4) -> Self {
        let r0 = clip_from_world.row(0);
        let r1 = clip_from_world.row(1);
        let r2 = clip_from_world.row(2);
        let r3 = clip_from_world.row(3);

        let planes = [
            normalize_plane(r3 + r0), // left
            normalize_plane(r3 - r0), // right
            normalize_plane(r3 + r1), // bottom
            normalize_plane(r3 - r1), // top
            normalize_plane(r2),      // near
            normalize_plane(r3 - r2), // far
        ];
        Self { planes }
    }

    /// Whether a sphere is at least partially inside the frustum
    pub fn intersects_sphere(&self, center: Vec3, radius: f32) -> bool {
        self.planes
            .iter()
            .all(|plane| plane.truncate().dot(center) + plane.w > -radius)
    }

    pub fn contains_point(&self, point: Vec3) -> bool {
        self.intersects_sphere(point, 0.0)
    }
}

fn normalize_plane(plane: Vec4) -> Vec4 {
    let length = plane.truncate().length();
    if length > f32::EPSILON {
        plane / length
    } else {
        plane
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn looking_down_negative_z() -> Frustum {
        let projection = Mat4::perspective_rh(std::f32::consts::FRAC_PI_2, 1.0, 0.1, 100.0);
        Frustum::from_clip_matrix(projection)
    }

    #[test]
    fn point_in_front_is_inside() {
        let frustum = looking_down_negative_z();
        assert!(frustum.contains_point(Vec3::new(0.0, 0.0, -5.0)));
    }

    #[test]
    fn point_behind_is_outside() {
        let frustum = looking_down_negative_z();
        assert!(!frustum.contains_point(Vec3::new(0.0, 0.0, 5.0)));
    }

    #[test]
    fn point_far_to_the_side_is_outside() {
        // 90 degree fov, so x extent at depth 5 is 5
        let frustum = looking_down_negative_z();
        assert!(!frustum.contains_point(Vec3::new(100.0, 0.0, -5.0)));
        assert!(frustum.contains_point(Vec3::new(4.0, 0.0, -5.0)));
    }

    #[test]
    fn sphere_straddling_a_plane_is_inside() {
        let frustum = looking_down_negative_z();
        // Center just outside the left plane, radius large enough to reach in
        assert!(!frustum.intersects_sphere(Vec3::new(7.0, 0.0, -5.0), 0.5));
        assert!(frustum.intersects_sphere(Vec3::new(7.0, 0.0, -5.0), 4.0));
    }

    #[test]
    fn sphere_past_the_far_plane_is_outside() {
        let frustum = looking_down_negative_z();
        assert!(!frustum.intersects_sphere(Vec3::new(0.0, 0.0, -200.0), 1.0));
    }
}
