//! Headless culling demo: builds a small scene and prints what each
//! camera sees. Run with `RUST_LOG=info`.

use glam::Vec3;
use render_scheduler::registry::{Camera, Entity, Mesh, RenderTargetId, Transform};
use render_scheduler::{visible_entities, SceneRegistry};

fn add_cube(scene: &mut SceneRegistry, name: &str, position: Vec3, size: f32) {
    let mesh = scene.meshes.create(name, Mesh::cube(size)).unwrap();
    let transform = scene
        .transforms
        .create(name, Transform::from_position(position))
        .unwrap();
    scene
        .entities
        .create(
            name,
            Entity::new().with_mesh(mesh).with_transform(transform),
        )
        .unwrap();
}

fn add_camera(scene: &mut SceneRegistry, name: &str, camera: Camera, position: Vec3) -> usize {
    let camera_index = scene.cameras.create(name, camera).unwrap();
    let transform = scene
        .transforms
        .create(name, Transform::from_position(position))
        .unwrap();
    scene
        .entities
        .create(
            name,
            Entity::new()
                .with_camera(camera_index)
                .with_transform(transform),
        )
        .unwrap()
}

fn main() {
    env_logger::init();

    let mut scene = SceneRegistry::new(64);
    add_cube(&mut scene, "crate", Vec3::new(0.0, 0.0, -5.0), 1.0);
    add_cube(&mut scene, "pillar", Vec3::new(3.0, 0.0, -10.0), 2.0);
    add_cube(&mut scene, "distant", Vec3::new(0.0, 0.0, -500.0), 1.0);
    add_cube(&mut scene, "behind", Vec3::new(0.0, 0.0, 20.0), 1.0);

    let main_camera = add_camera(
        &mut scene,
        "main",
        Camera::perspective(60.0, 16.0 / 9.0, 0.1, 200.0)
            .with_render_target(RenderTargetId(1)),
        Vec3::ZERO,
    );
    let probe = add_camera(
        &mut scene,
        "probe",
        Camera::cubemap(0.1, 100.0)
            .with_render_order(-1)
            .with_render_target(RenderTargetId(2)),
        Vec3::new(0.0, 1.0, 0.0),
    );

    if let Some((min, max)) = scene.render_order_range() {
        log::info!("render orders {} to {}", min, max);
    }

    for (label, camera_entity) in [("main", main_camera), ("probe", probe)] {
        let views = visible_entities(&scene, camera_entity);
        log::info!("camera '{}': {} sub-view(s)", label, views.len());
        for info in &views[0] {
            let name = scene.entities.name_of(info.entity_id).unwrap_or("?");
            log::info!(
                "  {:<8} distance {:>6.1}  {}",
                name,
                info.distance,
                if info.visible { "visible" } else { "culled" }
            );
        }
    }
}
