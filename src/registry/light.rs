//! Light component
//! Position comes from the Transform component on the same entity

use glam::Vec3;

#[derive(Debug, Clone)]
pub struct Light {
    pub color: Vec3,
    pub intensity: f32,
    pub radius: f32,
    pub cast_shadows: bool,
    pub cast_dynamic_shadows: bool,
}

impl Default for Light {
    fn default() -> Self {
        Self {
            color: Vec3::ONE,
            intensity: 1.0,
            radius: 10.0,
            cast_shadows: false,
            cast_dynamic_shadows: false,
        }
    }
}

impl Light {
    pub fn new(color: Vec3, intensity: f32, radius: f32) -> Self {
        Self {
            color,
            intensity,
            radius,
            ..Default::default()
        }
    }

    pub fn with_shadows(mut self) -> Self {
        self.cast_shadows = true;
        self.cast_dynamic_shadows = true;
        self
    }

    pub fn with_static_shadows_only(mut self) -> Self {
        self.cast_shadows = true;
        self.cast_dynamic_shadows = false;
        self
    }

    /// Whether a shadow camera attached to this light renders this frame
    pub fn should_cast_shadows(&self) -> bool {
        self.cast_shadows
    }

    /// Whether the shadow map is re-rendered for moving geometry
    pub fn should_cast_dynamic_shadows(&self) -> bool {
        self.cast_dynamic_shadows
    }
}
