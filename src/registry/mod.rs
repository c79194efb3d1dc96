//! Fixed-capacity component registries

pub mod camera;
pub mod entity;
pub mod light;
pub mod material;
pub mod mesh;
pub mod transform;

pub use camera::{Camera, RenderTargetId, SubView};
pub use entity::{Entity, EntityId};
pub use light::Light;
pub use material::Material;
pub use mesh::Mesh;
pub use transform::Transform;

use std::collections::HashMap;

/// Dense slot array with lookup by name.
///
/// Slots are fixed at construction; creation finds the first free slot
/// and returns its index, which stays stable until the item is removed.
/// Running out of slots returns `None` and is a sizing problem for the
/// caller, not a per-frame error.
pub struct SlotRegistry<T> {
    slots: Vec<Option<T>>,
    names: HashMap<String, usize>,
}

impl<T> SlotRegistry<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self {
            slots,
            names: HashMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Place `value` in the first free slot under `name`
    pub fn create(&mut self, name: &str, value: T) -> Option<usize> {
        if self.names.contains_key(name) {
            log::warn!("registry already contains an item named '{}'", name);
            return None;
        }
        let index = self.slots.iter().position(|slot| slot.is_none())?;
        self.slots[index] = Some(value);
        self.names.insert(name.to_string(), index);
        Some(index)
    }

    pub fn remove(&mut self, index: usize) -> Option<T> {
        let value = self.slots.get_mut(index)?.take()?;
        self.names.retain(|_, &mut i| i != index);
        Some(value)
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.slots.get(index)?.as_ref()
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.slots.get_mut(index)?.as_mut()
    }

    pub fn lookup(&self, name: &str) -> Option<usize> {
        self.names.get(name).copied()
    }

    pub fn name_of(&self, index: usize) -> Option<&str> {
        self.names
            .iter()
            .find_map(|(name, &i)| (i == index).then_some(name.as_str()))
    }

    pub fn is_initialized(&self, index: usize) -> bool {
        matches!(self.slots.get(index), Some(Some(_)))
    }

    /// Iterate occupied slots with their indices
    pub fn iter(&self) -> impl Iterator<Item = (usize, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|v| (i, v)))
    }
}

/// All component registries for one scene.
///
/// The scheduler reads these during a frame; creation and deletion are
/// serialized with frame boundaries by the embedding layer.
pub struct SceneRegistry {
    pub entities: SlotRegistry<Entity>,
    pub transforms: SlotRegistry<Transform>,
    pub meshes: SlotRegistry<Mesh>,
    pub materials: SlotRegistry<Material>,
    pub cameras: SlotRegistry<Camera>,
    pub lights: SlotRegistry<Light>,
}

impl SceneRegistry {
    pub fn new(max_entities: usize) -> Self {
        Self {
            entities: SlotRegistry::with_capacity(max_entities),
            transforms: SlotRegistry::with_capacity(max_entities),
            meshes: SlotRegistry::with_capacity(max_entities),
            materials: SlotRegistry::with_capacity(max_entities),
            cameras: SlotRegistry::with_capacity(max_entities),
            lights: SlotRegistry::with_capacity(max_entities),
        }
    }

    pub fn entity_transform(&self, entity: &Entity) -> Option<&Transform> {
        self.transforms.get(entity.transform?)
    }

    pub fn entity_mesh(&self, entity: &Entity) -> Option<&Mesh> {
        self.meshes.get(entity.mesh?)
    }

    pub fn entity_material(&self, entity: &Entity) -> Option<&Material> {
        self.materials.get(entity.material?)
    }

    pub fn entity_camera(&self, entity: &Entity) -> Option<&Camera> {
        self.cameras.get(entity.camera?)
    }

    pub fn entity_light(&self, entity: &Entity) -> Option<&Light> {
        self.lights.get(entity.light?)
    }

    /// Min and max render order over entities with a camera, or `None`
    /// when no camera exists
    pub fn render_order_range(&self) -> Option<(i32, i32)> {
        let mut range: Option<(i32, i32)> = None;
        for (_, entity) in self.entities.iter() {
            if let Some(camera) = self.entity_camera(entity) {
                range = Some(match range {
                    Some((min, max)) => {
                        (min.min(camera.render_order), max.max(camera.render_order))
                    }
                    None => (camera.render_order, camera.render_order),
                });
            }
        }
        range
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn create_returns_stable_indices() {
        let mut registry: SlotRegistry<Transform> = SlotRegistry::with_capacity(4);
        let a = registry.create("a", Transform::default()).unwrap();
        let b = registry.create("b", Transform::from_position(Vec3::X)).unwrap();
        assert_ne!(a, b);
        assert_eq!(registry.lookup("a"), Some(a));
        assert_eq!(registry.lookup("b"), Some(b));
        assert!(registry.is_initialized(a));
    }

    #[test]
    fn create_fails_when_full() {
        let mut registry: SlotRegistry<u32> = SlotRegistry::with_capacity(2);
        assert!(registry.create("a", 1).is_some());
        assert!(registry.create("b", 2).is_some());
        assert!(registry.create("c", 3).is_none());
    }

    #[test]
    fn remove_frees_the_slot() {
        let mut registry: SlotRegistry<u32> = SlotRegistry::with_capacity(1);
        let index = registry.create("a", 1).unwrap();
        assert_eq!(registry.remove(index), Some(1));
        assert!(!registry.is_initialized(index));
        assert_eq!(registry.lookup("a"), None);
        assert_eq!(registry.create("b", 2), Some(index));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut registry: SlotRegistry<u32> = SlotRegistry::with_capacity(4);
        assert!(registry.create("a", 1).is_some());
        assert!(registry.create("a", 2).is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn render_order_range_covers_all_cameras() {
        let mut scene = SceneRegistry::new(8);
        for (name, order) in [("shadow", -1), ("main", 0), ("overlay", 2)] {
            let camera = Camera::perspective(60.0, 1.0, 0.1, 100.0).with_render_order(order);
            let camera_index = scene.cameras.create(name, camera).unwrap();
            scene
                .entities
                .create(name, Entity::new().with_camera(camera_index))
                .unwrap();
        }
        assert_eq!(scene.render_order_range(), Some((-1, 2)));
    }

    #[test]
    fn render_order_range_is_none_without_cameras() {
        let scene = SceneRegistry::new(8);
        assert_eq!(scene.render_order_range(), None);
    }
}
