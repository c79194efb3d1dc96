//! Queue submission batching and ordering

use crate::device::{
    CommandBufferHandle, DeviceResult, FenceHandle, RenderDevice, SemaphoreHandle, StageFlags,
    SwapchainHandle,
};
use parking_lot::Mutex;
use std::collections::VecDeque;

/// One submission batch, built per frame-graph level.
///
/// Wait and signal sets are already deduplicated by the graph builder.
#[derive(Debug, Clone)]
pub struct CommandQueueItem {
    /// Short label carried into submit diagnostics
    pub hint: String,
    pub command_buffers: Vec<CommandBufferHandle>,
    pub wait_semaphores: Vec<SemaphoreHandle>,
    /// One stage mask per wait semaphore
    pub wait_stage_masks: Vec<StageFlags>,
    pub signal_semaphores: Vec<SemaphoreHandle>,
    pub fence: Option<FenceHandle>,
    pub queue_index: u32,
}

/// One pending swapchain presentation
#[derive(Debug, Clone)]
pub struct PresentRequest {
    pub swapchain: SwapchainHandle,
    pub image_index: u32,
    pub wait_semaphores: Vec<SemaphoreHandle>,
}

/// Hands batches to the device queue in enqueue order.
///
/// Enqueue order is the correctness contract: a later level's waits are
/// only valid once the earlier level's signals have been submitted.
/// Presentation is flushed separately, after all render submissions.
#[derive(Default)]
pub struct SubmissionScheduler {
    render_queue: Mutex<VecDeque<CommandQueueItem>>,
    present_queue: Mutex<VecDeque<PresentRequest>>,
}

impl SubmissionScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&self, item: CommandQueueItem) {
        self.render_queue.lock().push_back(item);
    }

    pub fn enqueue_present(&self, request: PresentRequest) {
        self.present_queue.lock().push_back(request);
    }

    pub fn pending(&self) -> usize {
        self.render_queue.lock().len()
    }

    /// Submit every pending batch in order. Returns how many were
    /// submitted.
    pub fn flush<D: RenderDevice>(&self, device: &mut D) -> DeviceResult<usize> {
        let mut submitted = 0;
        loop {
            let item = match self.render_queue.lock().pop_front() {
                Some(item) => item,
                None => break,
            };
            device.submit(&item)?;
            submitted += 1;
        }
        Ok(submitted)
    }

    /// Present every pending swapchain image. Returns how many presents
    /// were issued.
    pub fn flush_present<D: RenderDevice>(&self, device: &mut D) -> DeviceResult<usize> {
        let mut presented = 0;
        loop {
            let request = match self.present_queue.lock().pop_front() {
                Some(request) => request,
                None => break,
            };
            device.present(
                &[request.swapchain],
                &[request.image_index],
                &request.wait_semaphores,
            )?;
            presented += 1;
        }
        Ok(presented)
    }
}
