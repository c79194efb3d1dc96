//! Camera component

use crate::device::CommandBufferHandle;
use glam::{Mat4, Vec3};

/// Texture the camera renders into, owned by the resource layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderTargetId(pub u64);

/// One projection/view pair rendered by a camera.
///
/// Most cameras have a single sub-view; cubemap cameras have six. The
/// view matrix is relative to the camera entity's local space, so moving
/// the entity moves every sub-view together.
#[derive(Debug, Clone, Copy)]
pub struct SubView {
    pub view: Mat4,
    pub projection: Mat4,
}

/// Camera for viewing the scene
#[derive(Debug, Clone)]
pub struct Camera {
    /// Cameras render in ascending order; negative orders are used for
    /// shadow and reflection passes that must finish first.
    pub render_order: i32,
    pub max_visible_distance: f32,
    pub use_depth_prepass: bool,
    pub multiview: bool,
    pub render_target: Option<RenderTargetId>,
    /// Set once this camera's work has been submitted for the current
    /// frame, cleared at the start of the next
    pub render_complete: bool,
    views: Vec<SubView>,
    command_buffers: Vec<CommandBufferHandle>,
}

impl Camera {
    fn with_views(views: Vec<SubView>) -> Self {
        Self {
            render_order: 0,
            max_visible_distance: 1000.0,
            use_depth_prepass: false,
            multiview: views.len() > 1,
            render_target: None,
            render_complete: false,
            views,
            command_buffers: Vec::new(),
        }
    }

    pub fn perspective(fov_y_degrees: f32, aspect: f32, near: f32, far: f32) -> Self {
        let projection = Mat4::perspective_rh(fov_y_degrees.to_radians(), aspect, near, far);
        Self::with_views(vec![SubView {
            view: Mat4::IDENTITY,
            projection,
        }])
    }

    pub fn orthographic(width: f32, height: f32, near: f32, far: f32) -> Self {
        let half_w = width / 2.0;
        let half_h = height / 2.0;
        let projection = Mat4::orthographic_rh(-half_w, half_w, -half_h, half_h, near, far);
        Self::with_views(vec![SubView {
            view: Mat4::IDENTITY,
            projection,
        }])
    }

    /// Six-face camera for point-light shadows and reflection probes
    pub fn cubemap(near: f32, far: f32) -> Self {
        let projection = Mat4::perspective_rh(std::f32::consts::FRAC_PI_2, 1.0, near, far);
        let faces = [
            (Vec3::X, Vec3::Y),
            (-Vec3::X, Vec3::Y),
            (Vec3::Y, Vec3::Z),
            (-Vec3::Y, -Vec3::Z),
            (Vec3::Z, Vec3::Y),
            (-Vec3::Z, Vec3::Y),
        ];
        let views = faces
            .iter()
            .map(|&(dir, up)| SubView {
                view: Mat4::look_at_rh(Vec3::ZERO, dir, up),
                projection,
            })
            .collect();
        Self::with_views(views)
    }

    pub fn with_render_order(mut self, render_order: i32) -> Self {
        self.render_order = render_order;
        self
    }

    pub fn with_max_visible_distance(mut self, distance: f32) -> Self {
        self.max_visible_distance = distance;
        self
    }

    pub fn with_render_target(mut self, target: RenderTargetId) -> Self {
        self.render_target = Some(target);
        self
    }

    pub fn with_depth_prepass(mut self) -> Self {
        self.use_depth_prepass = true;
        self
    }

    pub fn num_views(&self) -> usize {
        self.views.len()
    }

    pub fn view(&self, index: usize) -> &SubView {
        &self.views[index]
    }

    /// Combined clip-from-world matrix for one sub-view, given the
    /// camera entity's world-to-local matrix
    pub fn clip_from_world(&self, index: usize, world_to_local: Mat4) -> Mat4 {
        let sub_view = &self.views[index];
        sub_view.projection * sub_view.view * world_to_local
    }

    pub fn num_renderpasses(&self) -> usize {
        self.command_buffers.len()
    }

    /// Replace the per-renderpass command buffers recorded this frame
    pub fn set_command_buffers(&mut self, command_buffers: Vec<CommandBufferHandle>) {
        self.command_buffers = command_buffers;
    }

    pub fn command_buffer(&self, renderpass: usize) -> CommandBufferHandle {
        self.command_buffers[renderpass]
    }

    pub fn command_buffers(&self) -> &[CommandBufferHandle] {
        &self.command_buffers
    }
}
