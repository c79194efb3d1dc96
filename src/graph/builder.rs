//! Frame graph construction from camera render order

use crate::device::{CommandBufferHandle, DeviceResult, RenderDevice, SwapchainHandle};
use crate::graph::node::{FrameGraph, FrameNode, NodeId};
use crate::registry::SceneRegistry;
use crate::submit::PresentRequest;
use crate::sync::SyncPrimitivePool;
use crate::window::WindowTargets;

/// Builds one frame's dependency graph.
///
/// Cameras are scanned in ascending render order; every render order
/// that yields at least one node becomes a level, and every node in a
/// level depends on every node in the level before it. The policy is
/// deliberately coarse: any later camera may sample any earlier
/// camera's output (shadow maps feeding the main pass being the common
/// case), so the later level waits on the whole previous level.
pub struct FrameGraphBuilder<'a, D: RenderDevice> {
    device: &'a mut D,
    pool: &'a mut SyncPrimitivePool,
    frame: usize,
}

impl<'a, D: RenderDevice> FrameGraphBuilder<'a, D> {
    pub fn new(device: &'a mut D, pool: &'a mut SyncPrimitivePool, frame: usize) -> Self {
        Self {
            device,
            pool,
            frame,
        }
    }

    pub fn build(
        self,
        scene: &SceneRegistry,
        windows: &WindowTargets,
        misc_command_buffer: Option<CommandBufferHandle>,
    ) -> DeviceResult<FrameGraph> {
        let mut graph = FrameGraph::empty();
        // Per node, the swapchain images it must signal for presentation
        let mut window_bindings: Vec<Vec<(SwapchainHandle, u32)>> = Vec::new();

        if let Some((min_order, max_order)) = scene.render_order_range() {
            for order in min_order..=max_order {
                let mut current_level = Vec::new();

                for (entity_id, entity) in scene.entities.iter() {
                    let camera = match scene.entity_camera(entity) {
                        Some(camera) => camera,
                        None => continue,
                    };
                    if camera.render_order != order {
                        continue;
                    }
                    if camera.render_target.is_none() || camera.num_renderpasses() == 0 {
                        continue;
                    }
                    // A shadow camera only renders while its light asks
                    // for both static and dynamic shadows
                    if let Some(light) = scene.entity_light(entity) {
                        if !light.should_cast_shadows() || !light.should_cast_dynamic_shadows() {
                            continue;
                        }
                    }

                    let label = scene
                        .entities
                        .name_of(entity_id)
                        .unwrap_or("camera")
                        .to_string();

                    let mut window_wait_semaphores = Vec::new();
                    let mut bindings = Vec::new();
                    for (_, target) in windows.presentable_for_camera(entity_id) {
                        let (swapchain, image_available) = match (
                            target.swapchain,
                            target.image_available_semaphore(self.frame),
                        ) {
                            (Some(swapchain), Some(semaphore)) => (swapchain, semaphore),
                            _ => continue,
                        };
                        window_wait_semaphores.push(image_available);
                        bindings.push((swapchain, target.image_index));
                    }

                    let id = NodeId(graph.nodes.len());
                    graph.nodes.push(FrameNode {
                        label,
                        camera_entity: Some(entity_id),
                        command_buffers: camera.command_buffers().to_vec(),
                        level: graph.levels.len(),
                        queue_index: 0,
                        dependencies: Vec::new(),
                        children: Vec::new(),
                        signal_semaphores: Vec::new(),
                        window_signal_semaphores: Vec::new(),
                        window_wait_semaphores,
                        fence: None,
                    });
                    window_bindings.push(bindings);
                    current_level.push(id);
                }

                if !current_level.is_empty() {
                    Self::wire_level(&mut graph, current_level);
                }
            }
        }

        if let Some(command_buffer) = misc_command_buffer {
            let id = NodeId(graph.nodes.len());
            graph.nodes.push(FrameNode {
                label: "misc".to_string(),
                camera_entity: None,
                command_buffers: vec![command_buffer],
                level: graph.levels.len(),
                queue_index: 0,
                dependencies: Vec::new(),
                children: Vec::new(),
                signal_semaphores: Vec::new(),
                window_signal_semaphores: Vec::new(),
                window_wait_semaphores: Vec::new(),
                fence: None,
            });
            window_bindings.push(Vec::new());
            Self::wire_level(&mut graph, vec![id]);
        }

        self.assign_sync_primitives(&mut graph, &window_bindings)?;
        Ok(graph)
    }

    /// Make every node of the new level depend on every node of the
    /// previous one, then append it
    fn wire_level(graph: &mut FrameGraph, level: Vec<NodeId>) {
        if let Some(previous) = graph.levels.last() {
            for &parent in previous {
                for &child in &level {
                    graph.nodes[parent.0].children.push(child);
                    graph.nodes[child.0].dependencies.push(parent);
                }
            }
        }
        graph.levels.push(level);
    }

    /// Allocate one signal semaphore per child edge and per bound
    /// window, and one fence per terminal node
    fn assign_sync_primitives(
        self,
        graph: &mut FrameGraph,
        window_bindings: &[Vec<(SwapchainHandle, u32)>],
    ) -> DeviceResult<()> {
        for index in 0..graph.nodes.len() {
            for _ in 0..graph.nodes[index].children.len() {
                let semaphore = self.pool.get_semaphore(self.device, self.frame)?;
                graph.nodes[index].signal_semaphores.push(semaphore);
            }

            for &(swapchain, image_index) in &window_bindings[index] {
                let semaphore = self.pool.get_semaphore(self.device, self.frame)?;
                graph.nodes[index].window_signal_semaphores.push(semaphore);
                graph.window_presents.push(PresentRequest {
                    swapchain,
                    image_index,
                    wait_semaphores: vec![semaphore],
                });
            }

            if graph.nodes[index].children.is_empty() {
                let fence = self.pool.get_fence(self.device, self.frame)?;
                graph.nodes[index].fence = Some(fence);
                graph.final_fences.push(fence);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::mock::MockDevice;
    use crate::registry::{Camera, Entity, Light, RenderTargetId};
    use crate::window::WindowTarget;

    struct Fixture {
        device: MockDevice,
        pool: SyncPrimitivePool,
        scene: SceneRegistry,
        windows: WindowTargets,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                device: MockDevice::new(),
                pool: SyncPrimitivePool::new(2),
                scene: SceneRegistry::new(32),
                windows: WindowTargets::new(),
            }
        }

        fn add_camera(&mut self, name: &str, render_order: i32) -> usize {
            self.add_camera_with(name, render_order, None)
        }

        fn add_camera_with(
            &mut self,
            name: &str,
            render_order: i32,
            light: Option<Light>,
        ) -> usize {
            let mut camera = Camera::perspective(60.0, 1.0, 0.1, 100.0)
                .with_render_order(render_order)
                .with_render_target(RenderTargetId(1));
            camera.set_command_buffers(vec![self.device.allocate_command_buffer().unwrap()]);
            let camera_index = self.scene.cameras.create(name, camera).unwrap();
            let mut entity = Entity::new().with_camera(camera_index);
            if let Some(light) = light {
                let light_index = self.scene.lights.create(name, light).unwrap();
                entity = entity.with_light(light_index);
            }
            self.scene.entities.create(name, entity).unwrap()
        }

        fn build(&mut self, misc: Option<CommandBufferHandle>) -> FrameGraph {
            FrameGraphBuilder::new(&mut self.device, &mut self.pool, 0)
                .build(&self.scene, &self.windows, misc)
                .unwrap()
        }
    }

    #[test]
    fn shadow_camera_with_shadows_disabled_contributes_nothing() {
        let mut fixture = Fixture::new();
        fixture.add_camera_with("shadow", -1, Some(Light::default()));
        let main = fixture.add_camera("main", 0);

        let graph = fixture.build(None);
        assert_eq!(graph.levels().len(), 1);
        let node = graph.node(graph.levels()[0][0]);
        assert!(node.dependencies.is_empty());
        assert_eq!(node.label, fixture.scene.entities.name_of(main).unwrap());

        let items = graph.queue_items();
        assert_eq!(items.len(), 1);
        assert!(items[0].wait_semaphores.is_empty());
        assert!(items[0].fence.is_some());
    }

    #[test]
    fn shadow_camera_with_only_static_shadows_contributes_nothing() {
        let mut fixture = Fixture::new();
        fixture.add_camera_with("shadow", -1, Some(Light::default().with_static_shadows_only()));
        fixture.add_camera("main", 0);

        let graph = fixture.build(None);
        assert_eq!(graph.levels().len(), 1);
        assert!(graph.node(graph.levels()[0][0]).dependencies.is_empty());
    }

    #[test]
    fn shadow_camera_with_shadows_enabled_renders_first() {
        let mut fixture = Fixture::new();
        fixture.add_camera_with("shadow", -1, Some(Light::default().with_shadows()));
        fixture.add_camera("main", 0);

        let graph = fixture.build(None);
        assert_eq!(graph.levels().len(), 2);
        let main = graph.node(graph.levels()[1][0]);
        assert_eq!(main.dependencies.len(), 1);
    }

    #[test]
    fn later_level_depends_on_the_whole_previous_level() {
        let mut fixture = Fixture::new();
        fixture.add_camera("left", 0);
        fixture.add_camera("right", 0);
        fixture.add_camera("compose", 1);

        let graph = fixture.build(None);
        assert_eq!(graph.levels().len(), 2);
        assert_eq!(graph.levels()[0].len(), 2);

        let compose = graph.node(graph.levels()[1][0]);
        assert_eq!(compose.dependencies.len(), 2);
        assert!(compose.fence.is_some());
        assert_eq!(graph.final_fences().len(), 1);

        for &id in &graph.levels()[0] {
            let node = graph.node(id);
            assert_eq!(node.children.len(), 1);
            assert_eq!(node.signal_semaphores.len(), 1);
            assert!(node.fence.is_none());
        }

        let items = graph.queue_items();
        assert_eq!(items.len(), 2);
        assert!(items[0].fence.is_none());
        assert_eq!(items[0].signal_semaphores.len(), 2);
        assert_eq!(items[1].wait_semaphores.len(), 2);
        assert_eq!(items[1].fence, compose.fence);
    }

    #[test]
    fn empty_render_orders_consume_no_level() {
        let mut fixture = Fixture::new();
        fixture.add_camera("early", -3);
        fixture.add_camera("late", 2);

        let graph = fixture.build(None);
        assert_eq!(graph.levels().len(), 2);
        assert_eq!(graph.node(graph.levels()[0][0]).level, 0);
        assert_eq!(graph.node(graph.levels()[1][0]).level, 1);
    }

    #[test]
    fn every_edge_has_exactly_one_paired_semaphore() {
        let mut fixture = Fixture::new();
        fixture.add_camera("left", 0);
        fixture.add_camera("right", 0);
        fixture.add_camera("compose", 1);

        let graph = fixture.build(None);
        for (_, node) in graph.nodes() {
            for &child in &node.children {
                let waits = graph.wait_semaphores_for(child);
                let shared = node
                    .signal_semaphores
                    .iter()
                    .filter(|semaphore| waits.contains(semaphore))
                    .count();
                assert_eq!(shared, 1);
            }
        }
    }

    #[test]
    #[should_panic(expected = "not expecting more than one fence per level")]
    fn two_terminal_nodes_in_one_level_panic() {
        let mut fixture = Fixture::new();
        fixture.add_camera("left", 0);
        fixture.add_camera("right", 0);

        let graph = fixture.build(None);
        graph.queue_items();
    }

    #[test]
    fn misc_work_becomes_the_terminal_level() {
        let mut fixture = Fixture::new();
        fixture.add_camera("main", 0);
        let misc = fixture.device.allocate_command_buffer().unwrap();

        let graph = fixture.build(Some(misc));
        assert_eq!(graph.levels().len(), 2);

        let misc_node = graph.node(graph.levels()[1][0]);
        assert_eq!(misc_node.label, "misc");
        assert_eq!(misc_node.dependencies.len(), 1);
        assert!(misc_node.fence.is_some());
        assert!(graph.node(graph.levels()[0][0]).fence.is_none());
        assert_eq!(graph.final_fences().len(), 1);
    }

    #[test]
    fn bound_windows_add_waits_signals_and_presents() {
        let mut fixture = Fixture::new();
        let main = fixture.add_camera("main", 0);

        let image_available = fixture.device.create_semaphore().unwrap();
        let mut target = WindowTarget::new(main);
        target.swapchain = Some(crate::device::SwapchainHandle(3));
        target.image_available_semaphores = vec![image_available, image_available];
        target.image_index = 1;
        fixture.windows.insert("primary", target);

        let graph = fixture.build(None);
        let items = graph.queue_items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].wait_semaphores, vec![image_available]);
        assert_eq!(items[0].signal_semaphores.len(), 1);

        let presents = graph.window_presents();
        assert_eq!(presents.len(), 1);
        assert_eq!(presents[0].image_index, 1);
        assert_eq!(presents[0].wait_semaphores, items[0].signal_semaphores);
    }

    #[test]
    fn no_cameras_yields_an_empty_graph() {
        let mut fixture = Fixture::new();
        let graph = fixture.build(None);
        assert!(graph.is_empty());
        assert!(graph.queue_items().is_empty());
    }
}
