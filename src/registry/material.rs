//! Material component

use glam::Vec4;

/// Surface parameters consumed by the draw recording stage
#[derive(Debug, Clone, Copy)]
pub struct Material {
    pub base_color: Vec4,
    pub transparent: bool,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            base_color: Vec4::ONE,
            transparent: false,
        }
    }
}

impl Material {
    pub fn opaque(base_color: Vec4) -> Self {
        Self {
            base_color,
            transparent: false,
        }
    }

    pub fn transparent(base_color: Vec4) -> Self {
        Self {
            base_color,
            transparent: true,
        }
    }
}
