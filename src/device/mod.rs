//! Device abstraction over the GPU backend

pub mod traits;
pub mod vulkan;

#[cfg(test)]
pub(crate) mod mock;

pub use traits::{
    CommandBufferHandle, DeviceError, DeviceResult, FenceHandle, QueryPoolHandle, RenderDevice,
    SemaphoreHandle, StageFlags, SwapchainHandle,
};
pub use vulkan::VulkanDevice;
