//! Presentation targets bound to cameras

use crate::device::{SemaphoreHandle, SwapchainHandle};
use crate::registry::EntityId;
use std::collections::HashMap;

/// One OS window's presentation state as the scheduler sees it.
///
/// The swapchain and the per-frame image-available semaphores are
/// created by the windowing layer; this struct only references them.
/// A window without a swapchain (minimized, or not yet initialized)
/// contributes nothing to the frame.
#[derive(Debug, Clone)]
pub struct WindowTarget {
    pub camera_entity: EntityId,
    pub swapchain: Option<SwapchainHandle>,
    /// Indexed by frame-in-flight slot
    pub image_available_semaphores: Vec<SemaphoreHandle>,
    /// Swapchain image acquired for the current frame
    pub image_index: u32,
}

impl WindowTarget {
    pub fn new(camera_entity: EntityId) -> Self {
        Self {
            camera_entity,
            swapchain: None,
            image_available_semaphores: Vec::new(),
            image_index: 0,
        }
    }

    pub fn presentable(&self) -> bool {
        self.swapchain.is_some()
    }

    pub fn image_available_semaphore(&self, frame: usize) -> Option<SemaphoreHandle> {
        self.image_available_semaphores.get(frame).copied()
    }
}

/// All windows, keyed by their name in the windowing layer
#[derive(Default)]
pub struct WindowTargets {
    windows: HashMap<String, WindowTarget>,
}

impl WindowTargets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, target: WindowTarget) {
        self.windows.insert(name.to_string(), target);
    }

    pub fn remove(&mut self, name: &str) -> Option<WindowTarget> {
        self.windows.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&WindowTarget> {
        self.windows.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut WindowTarget> {
        self.windows.get_mut(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &WindowTarget)> {
        self.windows.iter().map(|(name, target)| (name.as_str(), target))
    }

    /// Presentable windows whose output comes from this camera entity
    pub fn presentable_for_camera(
        &self,
        camera_entity: EntityId,
    ) -> impl Iterator<Item = (&str, &WindowTarget)> {
        self.windows
            .iter()
            .filter(move |(_, target)| {
                target.camera_entity == camera_entity && target.presentable()
            })
            .map(|(name, target)| (name.as_str(), target))
    }
}
