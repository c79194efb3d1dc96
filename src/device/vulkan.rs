//! Vulkan device implementation using ash

use crate::device::traits::*;
use crate::submit::CommandQueueItem;
use ash::khr::{surface, swapchain};
use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::collections::HashMap;
use std::sync::Arc;

/// Vulkan implementation of [`RenderDevice`].
///
/// Raw `vk` objects live only inside this struct, keyed by the opaque
/// handles the rest of the crate passes around. Everything still alive
/// at teardown is destroyed in `Drop`.
pub struct VulkanDevice {
    _entry: ash::Entry,
    instance: ash::Instance,
    surface_fn: surface::Instance,
    swapchain_fn: swapchain::Device,
    surface: vk::SurfaceKHR,
    physical_device: vk::PhysicalDevice,
    device: ash::Device,
    graphics_queue: vk::Queue,
    graphics_queue_family: u32,
    command_pool: vk::CommandPool,

    semaphores: HashMap<u64, vk::Semaphore>,
    fences: HashMap<u64, vk::Fence>,
    command_buffers: HashMap<u64, vk::CommandBuffer>,
    query_pools: HashMap<u64, vk::QueryPool>,
    swapchains: HashMap<u64, vk::SwapchainKHR>,

    next_semaphore_id: u64,
    next_fence_id: u64,
    next_command_buffer_id: u64,
    next_query_pool_id: u64,
    next_swapchain_id: u64,
}

impl VulkanDevice {
    pub fn new(window: Arc<winit::window::Window>) -> DeviceResult<Self> {
        unsafe {
            let entry = ash::Entry::load()
                .map_err(|e| DeviceError::InitializationFailed(e.to_string()))?;

            let app_name = c"Render Scheduler";

            let app_info = vk::ApplicationInfo {
                p_application_name: app_name.as_ptr(),
                application_version: vk::make_api_version(0, 1, 0, 0),
                p_engine_name: app_name.as_ptr(),
                engine_version: vk::make_api_version(0, 1, 0, 0),
                api_version: vk::API_VERSION_1_2,
                ..Default::default()
            };

            let display_handle = window
                .display_handle()
                .map_err(|e| DeviceError::InitializationFailed(e.to_string()))?;
            let window_handle = window
                .window_handle()
                .map_err(|e| DeviceError::InitializationFailed(e.to_string()))?;

            let extensions = ash_window::enumerate_required_extensions(display_handle.as_raw())
                .map_err(|e| DeviceError::InitializationFailed(e.to_string()))?
                .to_vec();

            let instance_info = vk::InstanceCreateInfo {
                p_application_info: &app_info,
                enabled_extension_count: extensions.len() as u32,
                pp_enabled_extension_names: extensions.as_ptr(),
                ..Default::default()
            };

            let instance = entry
                .create_instance(&instance_info, None)
                .map_err(|e| DeviceError::InitializationFailed(e.to_string()))?;

            let surface_fn = surface::Instance::new(&entry, &instance);
            let surface = ash_window::create_surface(
                &entry,
                &instance,
                display_handle.as_raw(),
                window_handle.as_raw(),
                None,
            )
            .map_err(|e| DeviceError::SurfaceCreationFailed(e.to_string()))?;

            let physical_devices = instance
                .enumerate_physical_devices()
                .map_err(|e| DeviceError::InitializationFailed(e.to_string()))?;

            let physical_device = physical_devices
                .into_iter()
                .find(|&pd| Self::find_queue_family(&instance, pd, &surface_fn, surface).is_some())
                .ok_or_else(|| {
                    DeviceError::InitializationFailed("No suitable physical device".into())
                })?;

            let graphics_queue_family =
                Self::find_queue_family(&instance, physical_device, &surface_fn, surface)
                    .ok_or_else(|| {
                        DeviceError::InitializationFailed("No suitable queue family".into())
                    })?;

            let queue_priorities = [1.0f32];
            let queue_info = vk::DeviceQueueCreateInfo {
                queue_family_index: graphics_queue_family,
                queue_count: 1,
                p_queue_priorities: queue_priorities.as_ptr(),
                ..Default::default()
            };

            let device_features = vk::PhysicalDeviceFeatures::default();
            let device_extensions = [swapchain::NAME.as_ptr()];

            let device_info = vk::DeviceCreateInfo {
                queue_create_info_count: 1,
                p_queue_create_infos: &queue_info,
                enabled_extension_count: device_extensions.len() as u32,
                pp_enabled_extension_names: device_extensions.as_ptr(),
                p_enabled_features: &device_features,
                ..Default::default()
            };

            let device = instance
                .create_device(physical_device, &device_info, None)
                .map_err(|e| DeviceError::InitializationFailed(e.to_string()))?;

            let graphics_queue = device.get_device_queue(graphics_queue_family, 0);
            let swapchain_fn = swapchain::Device::new(&instance, &device);

            let pool_info = vk::CommandPoolCreateInfo {
                queue_family_index: graphics_queue_family,
                flags: vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
                ..Default::default()
            };

            let command_pool = device
                .create_command_pool(&pool_info, None)
                .map_err(|e| DeviceError::InitializationFailed(e.to_string()))?;

            Ok(Self {
                _entry: entry,
                instance,
                surface_fn,
                swapchain_fn,
                surface,
                physical_device,
                device,
                graphics_queue,
                graphics_queue_family,
                command_pool,
                semaphores: HashMap::new(),
                fences: HashMap::new(),
                command_buffers: HashMap::new(),
                query_pools: HashMap::new(),
                swapchains: HashMap::new(),
                next_semaphore_id: 1,
                next_fence_id: 1,
                next_command_buffer_id: 1,
                next_query_pool_id: 1,
                next_swapchain_id: 1,
            })
        }
    }

    /// Get the Vulkan device
    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    /// Get the physical device
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    /// Get the graphics queue family index
    pub fn graphics_queue_family(&self) -> u32 {
        self.graphics_queue_family
    }

    /// Register a swapchain created by the windowing layer. The swapchain
    /// stays owned by that layer; this device only presents to it.
    pub fn register_swapchain(&mut self, swapchain: vk::SwapchainKHR) -> SwapchainHandle {
        let id = self.next_swapchain_id;
        self.next_swapchain_id += 1;
        self.swapchains.insert(id, swapchain);
        SwapchainHandle(id)
    }

    fn find_queue_family(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        surface_fn: &surface::Instance,
        surface: vk::SurfaceKHR,
    ) -> Option<u32> {
        let queue_families =
            unsafe { instance.get_physical_device_queue_family_properties(physical_device) };

        for (index, family) in queue_families.iter().enumerate() {
            let supports_graphics = family.queue_flags.contains(vk::QueueFlags::GRAPHICS);
            let supports_surface = unsafe {
                surface_fn
                    .get_physical_device_surface_support(physical_device, index as u32, surface)
                    .unwrap_or(false)
            };

            if supports_graphics && supports_surface {
                return Some(index as u32);
            }
        }
        None
    }

    fn convert_stage_flags(flags: StageFlags) -> vk::PipelineStageFlags {
        let mut out = vk::PipelineStageFlags::empty();
        if flags.contains(StageFlags::TOP_OF_PIPE) {
            out |= vk::PipelineStageFlags::TOP_OF_PIPE;
        }
        if flags.contains(StageFlags::COLOR_ATTACHMENT_OUTPUT) {
            out |= vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT;
        }
        if flags.contains(StageFlags::BOTTOM_OF_PIPE) {
            out |= vk::PipelineStageFlags::BOTTOM_OF_PIPE;
        }
        out
    }

    fn vk_semaphore(&self, handle: SemaphoreHandle) -> vk::Semaphore {
        match self.semaphores.get(&handle.0) {
            Some(s) => *s,
            None => panic!("unknown semaphore handle {}", handle.0),
        }
    }

    fn vk_fence(&self, handle: FenceHandle) -> vk::Fence {
        match self.fences.get(&handle.0) {
            Some(f) => *f,
            None => panic!("unknown fence handle {}", handle.0),
        }
    }

    fn vk_command_buffer(&self, handle: CommandBufferHandle) -> vk::CommandBuffer {
        match self.command_buffers.get(&handle.0) {
            Some(cb) => *cb,
            None => panic!("unknown command buffer handle {}", handle.0),
        }
    }

    fn vk_query_pool(&self, handle: QueryPoolHandle) -> vk::QueryPool {
        match self.query_pools.get(&handle.0) {
            Some(p) => *p,
            None => panic!("unknown query pool handle {}", handle.0),
        }
    }
}

impl RenderDevice for VulkanDevice {
    fn create_semaphore(&mut self) -> DeviceResult<SemaphoreHandle> {
        let semaphore_info = vk::SemaphoreCreateInfo::default();
        let semaphore = unsafe {
            self.device
                .create_semaphore(&semaphore_info, None)
                .map_err(|e| DeviceError::SyncCreationFailed(e.to_string()))?
        };

        let id = self.next_semaphore_id;
        self.next_semaphore_id += 1;
        self.semaphores.insert(id, semaphore);
        Ok(SemaphoreHandle(id))
    }

    fn create_fence(&mut self) -> DeviceResult<FenceHandle> {
        let fence_info = vk::FenceCreateInfo::default();
        let fence = unsafe {
            self.device
                .create_fence(&fence_info, None)
                .map_err(|e| DeviceError::SyncCreationFailed(e.to_string()))?
        };

        let id = self.next_fence_id;
        self.next_fence_id += 1;
        self.fences.insert(id, fence);
        Ok(FenceHandle(id))
    }

    fn reset_fence(&mut self, fence: FenceHandle) -> DeviceResult<()> {
        let fence = self.vk_fence(fence);
        unsafe {
            self.device
                .reset_fences(&[fence])
                .map_err(|e| DeviceError::SyncCreationFailed(e.to_string()))
        }
    }

    fn wait_for_fences(&self, fences: &[FenceHandle], timeout_ns: u64) -> DeviceResult<()> {
        if fences.is_empty() {
            return Ok(());
        }
        let vk_fences: Vec<vk::Fence> = fences.iter().map(|&f| self.vk_fence(f)).collect();
        unsafe {
            self.device
                .wait_for_fences(&vk_fences, true, timeout_ns)
                .map_err(|e| DeviceError::FenceWaitFailed(e.to_string()))
        }
    }

    fn destroy_semaphore(&mut self, semaphore: SemaphoreHandle) {
        if let Some(semaphore) = self.semaphores.remove(&semaphore.0) {
            unsafe {
                self.device.destroy_semaphore(semaphore, None);
            }
        }
    }

    fn destroy_fence(&mut self, fence: FenceHandle) {
        if let Some(fence) = self.fences.remove(&fence.0) {
            unsafe {
                self.device.destroy_fence(fence, None);
            }
        }
    }

    fn create_query_pool(&mut self, query_count: u32) -> DeviceResult<QueryPoolHandle> {
        let pool_info = vk::QueryPoolCreateInfo {
            query_type: vk::QueryType::OCCLUSION,
            query_count,
            ..Default::default()
        };

        let pool = unsafe {
            self.device
                .create_query_pool(&pool_info, None)
                .map_err(|e| DeviceError::QueryPoolCreationFailed(e.to_string()))?
        };

        let id = self.next_query_pool_id;
        self.next_query_pool_id += 1;
        self.query_pools.insert(id, pool);
        Ok(QueryPoolHandle(id))
    }

    fn destroy_query_pool(&mut self, pool: QueryPoolHandle) {
        if let Some(pool) = self.query_pools.remove(&pool.0) {
            unsafe {
                self.device.destroy_query_pool(pool, None);
            }
        }
    }

    fn get_query_results(
        &self,
        pool: QueryPoolHandle,
        first: u32,
        count: u32,
    ) -> DeviceResult<Vec<u64>> {
        let pool = self.vk_query_pool(pool);

        // Each query yields a (value, availability) pair. The pair is
        // folded into the sentinel encoding documented on RenderDevice.
        let mut pairs = vec![[0u64; 2]; count as usize];
        unsafe {
            self.device
                .get_query_pool_results::<[u64; 2]>(
                    pool,
                    first,
                    &mut pairs,
                    vk::QueryResultFlags::TYPE_64
                        | vk::QueryResultFlags::WITH_AVAILABILITY
                        | vk::QueryResultFlags::PARTIAL,
                )
                .map_err(|e| DeviceError::QueryResultsUnavailable(e.to_string()))?;
        }

        Ok(pairs
            .iter()
            .map(|&[value, available]| if available != 0 { value + 1 } else { 0 })
            .collect())
    }

    fn allocate_command_buffer(&mut self) -> DeviceResult<CommandBufferHandle> {
        let alloc_info = vk::CommandBufferAllocateInfo {
            command_pool: self.command_pool,
            level: vk::CommandBufferLevel::PRIMARY,
            command_buffer_count: 1,
            ..Default::default()
        };

        let command_buffer = unsafe {
            self.device
                .allocate_command_buffers(&alloc_info)
                .map_err(|e| DeviceError::CommandBufferAllocationFailed(e.to_string()))?[0]
        };

        let id = self.next_command_buffer_id;
        self.next_command_buffer_id += 1;
        self.command_buffers.insert(id, command_buffer);
        Ok(CommandBufferHandle(id))
    }

    fn cmd_reset_query_pool(
        &mut self,
        command_buffer: CommandBufferHandle,
        pool: QueryPoolHandle,
        first: u32,
        count: u32,
    ) {
        let command_buffer = self.vk_command_buffer(command_buffer);
        let pool = self.vk_query_pool(pool);
        unsafe {
            self.device
                .cmd_reset_query_pool(command_buffer, pool, first, count);
        }
    }

    fn cmd_begin_query(
        &mut self,
        command_buffer: CommandBufferHandle,
        pool: QueryPoolHandle,
        query: u32,
    ) {
        let command_buffer = self.vk_command_buffer(command_buffer);
        let pool = self.vk_query_pool(pool);
        unsafe {
            self.device
                .cmd_begin_query(command_buffer, pool, query, vk::QueryControlFlags::empty());
        }
    }

    fn cmd_end_query(
        &mut self,
        command_buffer: CommandBufferHandle,
        pool: QueryPoolHandle,
        query: u32,
    ) {
        let command_buffer = self.vk_command_buffer(command_buffer);
        let pool = self.vk_query_pool(pool);
        unsafe {
            self.device.cmd_end_query(command_buffer, pool, query);
        }
    }

    fn submit(&mut self, item: &CommandQueueItem) -> DeviceResult<()> {
        let command_buffers: Vec<vk::CommandBuffer> = item
            .command_buffers
            .iter()
            .map(|&cb| self.vk_command_buffer(cb))
            .collect();
        let wait_semaphores: Vec<vk::Semaphore> = item
            .wait_semaphores
            .iter()
            .map(|&s| self.vk_semaphore(s))
            .collect();
        let wait_stages: Vec<vk::PipelineStageFlags> = item
            .wait_stage_masks
            .iter()
            .map(|&f| Self::convert_stage_flags(f))
            .collect();
        let signal_semaphores: Vec<vk::Semaphore> = item
            .signal_semaphores
            .iter()
            .map(|&s| self.vk_semaphore(s))
            .collect();
        let fence = item
            .fence
            .map(|f| self.vk_fence(f))
            .unwrap_or(vk::Fence::null());

        let submit_info = vk::SubmitInfo {
            wait_semaphore_count: wait_semaphores.len() as u32,
            p_wait_semaphores: wait_semaphores.as_ptr(),
            p_wait_dst_stage_mask: wait_stages.as_ptr(),
            command_buffer_count: command_buffers.len() as u32,
            p_command_buffers: command_buffers.as_ptr(),
            signal_semaphore_count: signal_semaphores.len() as u32,
            p_signal_semaphores: signal_semaphores.as_ptr(),
            ..Default::default()
        };

        unsafe {
            self.device
                .queue_submit(self.graphics_queue, &[submit_info], fence)
                .map_err(|e| DeviceError::SubmitFailed(format!("{}: {}", item.hint, e)))
        }
    }

    fn present(
        &mut self,
        swapchains: &[SwapchainHandle],
        image_indices: &[u32],
        wait_semaphores: &[SemaphoreHandle],
    ) -> DeviceResult<()> {
        let vk_swapchains: Vec<vk::SwapchainKHR> = swapchains
            .iter()
            .map(|s| match self.swapchains.get(&s.0) {
                Some(sc) => *sc,
                None => panic!("unknown swapchain handle {}", s.0),
            })
            .collect();
        let vk_waits: Vec<vk::Semaphore> = wait_semaphores
            .iter()
            .map(|&s| self.vk_semaphore(s))
            .collect();

        let present_info = vk::PresentInfoKHR {
            wait_semaphore_count: vk_waits.len() as u32,
            p_wait_semaphores: vk_waits.as_ptr(),
            swapchain_count: vk_swapchains.len() as u32,
            p_swapchains: vk_swapchains.as_ptr(),
            p_image_indices: image_indices.as_ptr(),
            ..Default::default()
        };

        unsafe {
            self.swapchain_fn
                .queue_present(self.graphics_queue, &present_info)
                .map_err(|e| DeviceError::PresentFailed(e.to_string()))?;
        }
        Ok(())
    }
}

impl Drop for VulkanDevice {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();

            for (_, semaphore) in self.semaphores.drain() {
                self.device.destroy_semaphore(semaphore, None);
            }
            for (_, fence) in self.fences.drain() {
                self.device.destroy_fence(fence, None);
            }
            for (_, pool) in self.query_pools.drain() {
                self.device.destroy_query_pool(pool, None);
            }

            // Swapchains are owned by the windowing layer and destroyed
            // there, before the device goes away.
            self.swapchains.clear();

            self.device.destroy_command_pool(self.command_pool, None);
            self.device.destroy_device(None);
            self.surface_fn.destroy_surface(self.surface, None);
            self.instance.destroy_instance(None);
        }
    }
}
