//! Mesh component with precomputed culling bounds

use glam::Vec3;

/// Mesh data plus the bounding sphere used by visibility culling.
///
/// The centroid and radius are computed once when the positions are set;
/// culling never walks the vertex data per frame.
#[derive(Debug, Clone)]
pub struct Mesh {
    pub positions: Vec<Vec3>,
    pub indices: Vec<u32>,
    centroid: Vec3,
    bounding_radius: f32,
}

impl Mesh {
    pub fn from_positions(positions: Vec<Vec3>, indices: Vec<u32>) -> Self {
        let mut mesh = Self {
            positions,
            indices,
            centroid: Vec3::ZERO,
            bounding_radius: 0.0,
        };
        mesh.recompute_bounds();
        mesh
    }

    /// Create a cube mesh centered at origin with the given edge length
    pub fn cube(size: f32) -> Self {
        let h = size / 2.0;
        let positions = vec![
            Vec3::new(-h, -h, -h),
            Vec3::new(h, -h, -h),
            Vec3::new(h, h, -h),
            Vec3::new(-h, h, -h),
            Vec3::new(-h, -h, h),
            Vec3::new(h, -h, h),
            Vec3::new(h, h, h),
            Vec3::new(-h, h, h),
        ];
        let indices = vec![
            0, 1, 2, 2, 3, 0, // back
            4, 6, 5, 6, 4, 7, // front
            0, 3, 7, 7, 4, 0, // left
            1, 5, 6, 6, 2, 1, // right
            3, 2, 6, 6, 7, 3, // top
            0, 4, 5, 5, 1, 0, // bottom
        ];
        Self::from_positions(positions, indices)
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Get position data as bytes for upload
    pub fn position_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.positions)
    }

    /// Center of the bounding sphere in mesh-local space
    pub fn centroid(&self) -> Vec3 {
        self.centroid
    }

    /// Radius of the bounding sphere around the centroid
    pub fn bounding_sphere_radius(&self) -> f32 {
        self.bounding_radius
    }

    fn recompute_bounds(&mut self) {
        if self.positions.is_empty() {
            self.centroid = Vec3::ZERO;
            self.bounding_radius = 0.0;
            return;
        }

        let sum: Vec3 = self.positions.iter().copied().sum();
        self.centroid = sum / self.positions.len() as f32;

        self.bounding_radius = self
            .positions
            .iter()
            .map(|p| p.distance(self.centroid))
            .fold(0.0f32, f32::max);
    }
}
