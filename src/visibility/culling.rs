//! Per-camera visibility determination

use crate::registry::{EntityId, SceneRegistry};
use crate::visibility::frustum::Frustum;

/// Visibility test bias. Bounding radii are doubled so borderline
/// geometry errs toward being drawn instead of popping at frustum edges.
const RADIUS_MULTIPLIER: f32 = 2.0;

/// One candidate entity as seen from a camera sub-view for this frame
#[derive(Debug, Clone, Copy)]
pub struct VisibleEntityInfo {
    pub entity_id: EntityId,
    pub distance: f32,
    pub visible: bool,
}

/// Determine which entities a camera can see, one list per sub-view.
///
/// Every candidate entity with a mesh and a transform appears in each
/// list, sorted ascending by distance from the camera position, with
/// `visible` true when its bounding sphere intersects any sub-view's
/// frustum within the camera's maximum visible distance. Culled entries
/// carry a distance of `f32::MAX`, placing them after every visible
/// entry; the recording stage can walk visible geometry front to back
/// and stop at the first invisible one.
///
/// A camera entity without a camera or transform yields no lists.
pub fn visible_entities(
    scene: &SceneRegistry,
    camera_entity_id: EntityId,
) -> Vec<Vec<VisibleEntityInfo>> {
    let camera_entity = match scene.entities.get(camera_entity_id) {
        Some(entity) => entity,
        None => return Vec::new(),
    };
    let camera = match scene.entity_camera(camera_entity) {
        Some(camera) => camera,
        None => return Vec::new(),
    };
    let camera_transform = match scene.entity_transform(camera_entity) {
        Some(transform) => transform,
        None => return Vec::new(),
    };

    let world_to_local = camera_transform.inverse_matrix();
    let camera_position = camera_transform.position;

    let frustums: Vec<Frustum> = (0..camera.num_views())
        .map(|view| Frustum::from_clip_matrix(camera.clip_from_world(view, world_to_local)))
        .collect();

    let mut entries = Vec::new();
    for (entity_id, entity) in scene.entities.iter() {
        if entity_id == camera_entity_id {
            continue;
        }
        let mesh = match scene.entity_mesh(entity) {
            Some(mesh) => mesh,
            None => continue,
        };
        let transform = match scene.entity_transform(entity) {
            Some(transform) => transform,
            None => continue,
        };

        let center = transform.matrix().transform_point3(mesh.centroid());
        let radius =
            transform.max_scale() * mesh.bounding_sphere_radius() * RADIUS_MULTIPLIER;
        let distance = camera_position.distance(center);

        // Visible for the camera when any sub-view sees it; an object
        // spanning two cubemap faces must not be culled.
        let visible = distance <= camera.max_visible_distance
            && frustums
                .iter()
                .any(|frustum| frustum.intersects_sphere(center, radius));

        entries.push(VisibleEntityInfo {
            entity_id,
            distance: if visible { distance } else { f32::MAX },
            visible,
        });
    }

    entries.sort_by(|a, b| a.distance.total_cmp(&b.distance));

    vec![entries; camera.num_views()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Camera, Entity, Mesh, Transform};
    use glam::Vec3;

    fn scene_with_camera(camera: Camera) -> (SceneRegistry, EntityId) {
        let mut scene = SceneRegistry::new(32);
        let camera_index = scene.cameras.create("camera", camera).unwrap();
        let transform_index = scene
            .transforms
            .create("camera", Transform::default())
            .unwrap();
        let camera_entity = scene
            .entities
            .create(
                "camera",
                Entity::new()
                    .with_camera(camera_index)
                    .with_transform(transform_index),
            )
            .unwrap();
        (scene, camera_entity)
    }

    fn add_cube(scene: &mut SceneRegistry, name: &str, position: Vec3) -> EntityId {
        let mesh_index = scene.meshes.create(name, Mesh::cube(1.0)).unwrap();
        let transform_index = scene
            .transforms
            .create(name, Transform::from_position(position))
            .unwrap();
        scene
            .entities
            .create(
                name,
                Entity::new()
                    .with_mesh(mesh_index)
                    .with_transform(transform_index),
            )
            .unwrap()
    }

    fn find(entries: &[VisibleEntityInfo], entity_id: EntityId) -> &VisibleEntityInfo {
        entries
            .iter()
            .find(|info| info.entity_id == entity_id)
            .unwrap()
    }

    #[test]
    fn entity_in_front_is_visible_behind_is_not() {
        let (mut scene, camera_entity) =
            scene_with_camera(Camera::perspective(90.0, 1.0, 0.1, 100.0));
        let front = add_cube(&mut scene, "front", Vec3::new(0.0, 0.0, -5.0));
        let behind = add_cube(&mut scene, "behind", Vec3::new(0.0, 0.0, 5.0));

        let views = visible_entities(&scene, camera_entity);
        assert_eq!(views.len(), 1);
        assert!(find(&views[0], front).visible);
        assert!(!find(&views[0], behind).visible);
    }

    #[test]
    fn list_is_sorted_by_distance() {
        let (mut scene, camera_entity) =
            scene_with_camera(Camera::perspective(90.0, 1.0, 0.1, 100.0));
        add_cube(&mut scene, "far", Vec3::new(0.0, 0.0, -50.0));
        add_cube(&mut scene, "near", Vec3::new(0.0, 0.0, -2.0));
        add_cube(&mut scene, "mid", Vec3::new(0.0, 0.0, -20.0));

        let views = visible_entities(&scene, camera_entity);
        let distances: Vec<f32> = views[0].iter().map(|info| info.distance).collect();
        for pair in distances.windows(2) {
            assert!(pair[0] <= pair[1]);
        }
    }

    #[test]
    fn invisible_entries_sort_after_every_visible_one() {
        let (mut scene, camera_entity) =
            scene_with_camera(Camera::perspective(90.0, 1.0, 0.1, 100.0));
        let behind = add_cube(&mut scene, "behind", Vec3::new(0.0, 0.0, 2.0));
        let far = add_cube(&mut scene, "far", Vec3::new(0.0, 0.0, -50.0));

        // The culled cube is nearer, but still lands last
        let views = visible_entities(&scene, camera_entity);
        assert_eq!(views[0][0].entity_id, far);
        let last = &views[0][1];
        assert_eq!(last.entity_id, behind);
        assert!(!last.visible);
        assert_eq!(last.distance, f32::MAX);
    }

    #[test]
    fn sphere_containing_the_camera_is_visible() {
        let (mut scene, camera_entity) =
            scene_with_camera(Camera::perspective(90.0, 1.0, 0.1, 100.0));
        let mesh_index = scene.meshes.create("room", Mesh::cube(50.0)).unwrap();
        let transform_index = scene
            .transforms
            .create("room", Transform::default())
            .unwrap();
        let room = scene
            .entities
            .create(
                "room",
                Entity::new()
                    .with_mesh(mesh_index)
                    .with_transform(transform_index),
            )
            .unwrap();

        let views = visible_entities(&scene, camera_entity);
        assert!(find(&views[0], room).visible);
    }

    #[test]
    fn cubemap_camera_sees_all_directions() {
        let (mut scene, camera_entity) = scene_with_camera(Camera::cubemap(0.1, 100.0));
        let right = add_cube(&mut scene, "right", Vec3::new(5.0, 0.0, 0.0));
        let above = add_cube(&mut scene, "above", Vec3::new(0.0, 5.0, 0.0));

        let views = visible_entities(&scene, camera_entity);
        assert_eq!(views.len(), 6);
        for view in &views {
            assert!(find(view, right).visible);
            assert!(find(view, above).visible);
        }
    }

    #[test]
    fn beyond_max_distance_is_not_visible() {
        let (mut scene, camera_entity) = scene_with_camera(
            Camera::perspective(90.0, 1.0, 0.1, 1000.0).with_max_visible_distance(10.0),
        );
        let far = add_cube(&mut scene, "far", Vec3::new(0.0, 0.0, -50.0));

        let views = visible_entities(&scene, camera_entity);
        assert!(!find(&views[0], far).visible);
    }

    #[test]
    fn entities_without_mesh_or_transform_are_skipped() {
        let (mut scene, camera_entity) =
            scene_with_camera(Camera::perspective(90.0, 1.0, 0.1, 100.0));
        let transform_index = scene
            .transforms
            .create("bare", Transform::default())
            .unwrap();
        scene
            .entities
            .create("bare", Entity::new().with_transform(transform_index))
            .unwrap();

        let views = visible_entities(&scene, camera_entity);
        assert!(views[0].is_empty());
    }

    #[test]
    fn camera_without_transform_yields_nothing() {
        let mut scene = SceneRegistry::new(8);
        let camera_index = scene
            .cameras
            .create("camera", Camera::perspective(90.0, 1.0, 0.1, 100.0))
            .unwrap();
        let camera_entity = scene
            .entities
            .create("camera", Entity::new().with_camera(camera_index))
            .unwrap();

        assert!(visible_entities(&scene, camera_entity).is_empty());
    }
}
