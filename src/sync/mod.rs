//! Pooled GPU synchronization primitives
//!
//! Semaphores and fences are recycled per frame-in-flight slot instead
//! of being created and destroyed every frame. A primitive claimed for
//! slot `i` becomes reusable the next time the CPU reaches slot `i`,
//! after a full pipeline round trip, at which point the GPU work that
//! consumed it has retired.

use crate::device::{DeviceResult, FenceHandle, RenderDevice, SemaphoreHandle};

struct SlotPool<T> {
    available: Vec<T>,
    in_use: Vec<T>,
}

impl<T> SlotPool<T> {
    fn new() -> Self {
        Self {
            available: Vec::new(),
            in_use: Vec::new(),
        }
    }
}

pub struct SyncPrimitivePool {
    semaphores: Vec<SlotPool<SemaphoreHandle>>,
    fences: Vec<SlotPool<FenceHandle>>,
}

impl SyncPrimitivePool {
    pub fn new(frames_in_flight: usize) -> Self {
        Self {
            semaphores: (0..frames_in_flight).map(|_| SlotPool::new()).collect(),
            fences: (0..frames_in_flight).map(|_| SlotPool::new()).collect(),
        }
    }

    pub fn frames_in_flight(&self) -> usize {
        self.semaphores.len()
    }

    /// Claim a semaphore for the given frame slot, reusing one when the
    /// slot has any available
    pub fn get_semaphore<D: RenderDevice>(
        &mut self,
        device: &mut D,
        frame: usize,
    ) -> DeviceResult<SemaphoreHandle> {
        let pool = &mut self.semaphores[frame];
        let semaphore = match pool.available.pop() {
            Some(semaphore) => semaphore,
            None => device.create_semaphore()?,
        };
        pool.in_use.push(semaphore);
        Ok(semaphore)
    }

    /// Claim a fence for the given frame slot. Reused fences are reset
    /// before being handed out.
    pub fn get_fence<D: RenderDevice>(
        &mut self,
        device: &mut D,
        frame: usize,
    ) -> DeviceResult<FenceHandle> {
        let pool = &mut self.fences[frame];
        let fence = match pool.available.pop() {
            Some(fence) => {
                device.reset_fence(fence)?;
                fence
            }
            None => device.create_fence()?,
        };
        pool.in_use.push(fence);
        Ok(fence)
    }

    /// Recycle everything claimed for this frame slot.
    ///
    /// Called once per frame after all submissions are enqueued. Safe
    /// because the slot is not revisited until the pipeline depth has
    /// elapsed.
    pub fn mark_submitted(&mut self, frame: usize) {
        let semaphores = &mut self.semaphores[frame];
        semaphores.available.append(&mut semaphores.in_use);
        let fences = &mut self.fences[frame];
        fences.available.append(&mut fences.in_use);
    }

    /// Destroy every pooled primitive. Only called at teardown, after
    /// the device is idle.
    pub fn destroy<D: RenderDevice>(&mut self, device: &mut D) {
        for pool in &mut self.semaphores {
            for semaphore in pool.available.drain(..).chain(pool.in_use.drain(..)) {
                device.destroy_semaphore(semaphore);
            }
        }
        for pool in &mut self.fences {
            for fence in pool.available.drain(..).chain(pool.in_use.drain(..)) {
                device.destroy_fence(fence);
            }
        }
    }
}
