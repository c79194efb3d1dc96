//! Frame orchestration and the render thread

use crate::device::{CommandBufferHandle, DeviceResult, FenceHandle, RenderDevice};
use crate::graph::FrameGraphBuilder;
use crate::query::OcclusionQueryManager;
use crate::registry::{Camera, Entity, EntityId, SceneRegistry, Transform};
use crate::submit::SubmissionScheduler;
use crate::sync::SyncPrimitivePool;
use crate::visibility::{visible_entities, VisibleEntityInfo};
use crate::window::WindowTargets;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const FENCE_WAIT_TIMEOUT_NS: u64 = 1_000_000_000;

#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Capacity of every component registry and of each camera's query
    /// pool
    pub max_entities: usize,
    pub frames_in_flight: usize,
    pub target_frame_interval: Duration,
    /// Wait on the previous visit of this frame slot's fences before
    /// reusing its resources. Disabling trades safety under memory
    /// pressure for latency.
    pub wait_for_final_fences: bool,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            max_entities: 1024,
            frames_in_flight: 2,
            target_frame_interval: Duration::from_millis(16),
            wait_for_final_fences: true,
        }
    }
}

/// Everything the external recording stage is handed for one frame
pub struct FrameContext<'a, D: RenderDevice> {
    pub device: &'a mut D,
    pub scene: &'a mut SceneRegistry,
    /// Per camera entity, the sorted visible set for each sub-view
    pub visible: &'a HashMap<EntityId, Vec<Vec<VisibleEntityInfo>>>,
    /// Per camera entity, last frame's occlusion answers and this
    /// frame's query recording
    pub queries: &'a mut HashMap<EntityId, OcclusionQueryManager>,
    pub frame: usize,
}

/// Records per-camera command buffers from the visible sets.
///
/// Implementations install the buffers on their cameras via
/// [`Camera::set_command_buffers`] and may return one extra command
/// buffer of work not tied to any camera, such as blits to windows.
pub trait DrawRecorder<D: RenderDevice> {
    fn record(&mut self, ctx: FrameContext<'_, D>) -> DeviceResult<Option<CommandBufferHandle>>;
}

/// Owns the whole per-frame pipeline: visibility, recording, graph
/// build and submission. Runs on one thread; the scene registry is the
/// only shared state, locked for the duration of a frame.
pub struct Renderer<D: RenderDevice> {
    device: D,
    config: RendererConfig,
    scene: Arc<RwLock<SceneRegistry>>,
    windows: WindowTargets,
    pool: SyncPrimitivePool,
    scheduler: SubmissionScheduler,
    queries: HashMap<EntityId, OcclusionQueryManager>,
    /// Terminal fences of each frame slot's last graph
    final_fences: Vec<Vec<FenceHandle>>,
    frame_index: usize,
    frames_rendered: u64,
}

impl<D: RenderDevice> Renderer<D> {
    pub fn new(device: D, config: RendererConfig) -> Self {
        let scene = Arc::new(RwLock::new(SceneRegistry::new(config.max_entities)));
        let pool = SyncPrimitivePool::new(config.frames_in_flight);
        let final_fences = vec![Vec::new(); config.frames_in_flight];
        Self {
            device,
            config,
            scene,
            windows: WindowTargets::new(),
            pool,
            scheduler: SubmissionScheduler::new(),
            queries: HashMap::new(),
            final_fences,
            frame_index: 0,
            frames_rendered: 0,
        }
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn scene(&self) -> Arc<RwLock<SceneRegistry>> {
        Arc::clone(&self.scene)
    }

    pub fn windows_mut(&mut self) -> &mut WindowTargets {
        &mut self.windows
    }

    pub fn frame_index(&self) -> usize {
        self.frame_index
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    /// Last frame's occlusion answer for an entity as seen by a camera.
    /// Unknown cameras and unqueried entities answer visible.
    pub fn is_entity_visible(&self, camera_entity: EntityId, entity: EntityId) -> bool {
        self.queries
            .get(&camera_entity)
            .map_or(true, |manager| manager.is_entity_visible(entity))
    }

    /// Run one frame end to end: wait for this slot's previous fences,
    /// download last frame's queries, cull, record, build the graph and
    /// submit it, then recycle the slot's sync primitives.
    pub fn render_frame<R: DrawRecorder<D>>(&mut self, recorder: &mut R) -> DeviceResult<()> {
        if self.config.wait_for_final_fences {
            let fences = std::mem::take(&mut self.final_fences[self.frame_index]);
            self.device.wait_for_fences(&fences, FENCE_WAIT_TIMEOUT_NS)?;
        }

        for manager in self.queries.values_mut() {
            manager.download(&self.device);
        }

        let mut scene_guard = self.scene.write();

        let camera_entities: Vec<EntityId> = scene_guard
            .entities
            .iter()
            .filter(|(_, entity)| entity.camera.is_some())
            .map(|(entity_id, _)| entity_id)
            .collect();

        for &camera_entity in &camera_entities {
            if let Some(camera_index) = scene_guard
                .entities
                .get(camera_entity)
                .and_then(|entity| entity.camera)
            {
                if let Some(camera) = scene_guard.cameras.get_mut(camera_index) {
                    camera.render_complete = false;
                }
            }
        }

        for &camera_entity in &camera_entities {
            if !self.queries.contains_key(&camera_entity) {
                let manager =
                    OcclusionQueryManager::new(&mut self.device, self.config.max_entities as u32)?;
                self.queries.insert(camera_entity, manager);
            }
        }

        let mut visible = HashMap::new();
        for &camera_entity in &camera_entities {
            let views = visible_entities(&scene_guard, camera_entity);
            if !views.is_empty() {
                visible.insert(camera_entity, views);
            }
        }

        let misc_command_buffer = recorder.record(FrameContext {
            device: &mut self.device,
            scene: &mut scene_guard,
            visible: &visible,
            queries: &mut self.queries,
            frame: self.frame_index,
        })?;

        let graph = FrameGraphBuilder::new(&mut self.device, &mut self.pool, self.frame_index)
            .build(&scene_guard, &self.windows, misc_command_buffer)?;

        for item in graph.queue_items() {
            self.scheduler.enqueue(item);
        }
        let submitted = self.scheduler.flush(&mut self.device)?;

        for request in graph.window_presents() {
            self.scheduler.enqueue_present(request.clone());
        }
        self.scheduler.flush_present(&mut self.device)?;

        for (_, node) in graph.nodes() {
            let camera_index = node
                .camera_entity
                .and_then(|entity_id| scene_guard.entities.get(entity_id))
                .and_then(|entity| entity.camera);
            if let Some(camera_index) = camera_index {
                if let Some(camera) = scene_guard.cameras.get_mut(camera_index) {
                    camera.render_complete = true;
                }
            }
        }

        self.pool.mark_submitted(self.frame_index);
        self.final_fences[self.frame_index] = graph.final_fences().to_vec();

        log::trace!(
            "frame {}: {} submissions, {} presents",
            self.frames_rendered,
            submitted,
            graph.window_presents().len()
        );

        self.frame_index = (self.frame_index + 1) % self.config.frames_in_flight;
        self.frames_rendered += 1;
        Ok(())
    }

    /// Release everything this renderer created on the device. Called
    /// once, from the render thread, after the last frame.
    pub fn release_gpu_resources(&mut self) {
        for fences in &mut self.final_fences {
            let fences = std::mem::take(fences);
            if let Err(e) = self.device.wait_for_fences(&fences, FENCE_WAIT_TIMEOUT_NS) {
                log::warn!("final fence wait failed during teardown: {}", e);
            }
        }
        for (_, mut manager) in self.queries.drain() {
            manager.destroy(&mut self.device);
        }
        self.pool.destroy(&mut self.device);
    }
}

/// Handle to a running render loop. Dropping it without calling
/// [`stop`](RenderLoopHandle::stop) detaches the loop.
pub struct RenderLoopHandle {
    stop_sender: mpsc::Sender<()>,
    join_handle: thread::JoinHandle<()>,
}

impl RenderLoopHandle {
    /// Signal the loop to exit and block until it has released its GPU
    /// resources
    pub fn stop(self) {
        let _ = self.stop_sender.send(());
        let _ = self.join_handle.join();
    }
}

/// Move the renderer onto a dedicated thread running frames at the
/// configured interval until stopped
pub fn spawn<D, R>(mut renderer: Renderer<D>, mut recorder: R) -> RenderLoopHandle
where
    D: RenderDevice + Send + 'static,
    R: DrawRecorder<D> + Send + 'static,
{
    let (stop_sender, stop_receiver) = mpsc::channel();
    let interval = renderer.config.target_frame_interval;
    let join_handle = thread::spawn(move || {
        loop {
            match stop_receiver.recv_timeout(interval) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => {}
            }
            if let Err(e) = renderer.render_frame(&mut recorder) {
                log::error!("frame failed: {}", e);
            }
        }
        renderer.release_gpu_resources();
    });
    RenderLoopHandle {
        stop_sender,
        join_handle,
    }
}

/// Pre-build a pool of shadow cameras on a background thread.
///
/// The cameras carry no render target, so they stay out of the frame
/// graph until a light claims one and a target is attached. Creation
/// goes through the shared scene lock; the render loop simply starts
/// seeing the cameras once their slots fill in.
pub fn spawn_shadow_camera_pool(
    scene: Arc<RwLock<SceneRegistry>>,
    count: usize,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        for i in 0..count {
            let name = format!("shadow_camera_{}", i);
            let mut scene = scene.write();
            let camera = Camera::cubemap(0.1, 100.0).with_render_order(-1);
            let camera_index = match scene.cameras.create(&name, camera) {
                Some(index) => index,
                None => {
                    log::warn!("shadow camera pool truncated at {} of {}", i, count);
                    return;
                }
            };
            let transform_index = match scene.transforms.create(&name, Transform::default()) {
                Some(index) => index,
                None => {
                    log::warn!("shadow camera pool truncated at {} of {}", i, count);
                    return;
                }
            };
            let created = scene.entities.create(
                &name,
                Entity::new()
                    .with_camera(camera_index)
                    .with_transform(transform_index),
            );
            if created.is_none() {
                scene.cameras.remove(camera_index);
                scene.transforms.remove(transform_index);
                log::warn!("shadow camera pool truncated at {} of {}", i, count);
                return;
            }
        }
        log::debug!("shadow camera pool ready ({} cameras)", count);
    })
}
