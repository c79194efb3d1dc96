//! Entity component bundle

/// Stable slot index of an entity in the scene registry
pub type EntityId = usize;

/// An entity ties components together by their registry slot indices.
///
/// Absent components are ordinary, not errors; systems that need a
/// component simply skip entities without it.
#[derive(Debug, Clone, Default)]
pub struct Entity {
    pub transform: Option<usize>,
    pub mesh: Option<usize>,
    pub material: Option<usize>,
    pub camera: Option<usize>,
    pub light: Option<usize>,
}

impl Entity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_transform(mut self, index: usize) -> Self {
        self.transform = Some(index);
        self
    }

    pub fn with_mesh(mut self, index: usize) -> Self {
        self.mesh = Some(index);
        self
    }

    pub fn with_material(mut self, index: usize) -> Self {
        self.material = Some(index);
        self
    }

    pub fn with_camera(mut self, index: usize) -> Self {
        self.camera = Some(index);
        self
    }

    pub fn with_light(mut self, index: usize) -> Self {
        self.light = Some(index);
        self
    }
}
