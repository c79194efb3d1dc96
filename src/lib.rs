//! Per-frame visibility and GPU submission scheduling for a Vulkan renderer
//!
//! Each frame runs through one pipeline on a dedicated render thread:
//! - **Visibility**: frustum culling per camera sub-view, with occlusion
//!   query results reused from the previous frame
//! - **Recording**: an external [`DrawRecorder`] turns the visible sets
//!   into per-camera command buffers
//! - **Frame graph**: command buffers are grouped into levels by camera
//!   render order and wired with pooled semaphores and fences
//! - **Submission**: one batch per level is handed to the device queue
//!   in order, then swapchain presents are flushed
//!
//! The GPU sits behind the [`RenderDevice`] trait; `VulkanDevice` is the
//! ash-backed implementation.

pub mod device;
pub mod graph;
pub mod query;
pub mod registry;
pub mod renderer;
pub mod submit;
pub mod sync;
pub mod visibility;
pub mod window;

pub use device::{RenderDevice, VulkanDevice};
pub use graph::{FrameGraph, FrameGraphBuilder};
pub use query::OcclusionQueryManager;
pub use registry::SceneRegistry;
pub use renderer::{
    spawn, spawn_shadow_camera_pool, DrawRecorder, FrameContext, RenderLoopHandle, Renderer,
    RendererConfig,
};
pub use submit::{CommandQueueItem, SubmissionScheduler};
pub use sync::SyncPrimitivePool;
pub use visibility::{visible_entities, VisibleEntityInfo};
pub use window::{WindowTarget, WindowTargets};
