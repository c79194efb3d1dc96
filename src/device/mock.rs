//! In-memory device used by unit tests

use crate::device::traits::*;
use crate::submit::CommandQueueItem;
use std::cell::RefCell;
use std::collections::HashSet;

/// A recording [`RenderDevice`] with no GPU behind it.
///
/// Query results are scripted per pool, submissions and presents are kept
/// for inspection, and fence state is tracked so reuse bugs show up.
#[derive(Default)]
pub(crate) struct MockDevice {
    next_id: u64,

    pub live_semaphores: HashSet<u64>,
    pub live_fences: HashSet<u64>,
    pub live_query_pools: HashSet<u64>,

    pub semaphores_created: usize,
    pub fences_created: usize,
    pub fence_resets: Vec<FenceHandle>,

    /// Scripted results for `get_query_results`, already in the encoded
    /// form (0 = unavailable, v + 1 = available with value v).
    pub query_results: Vec<u64>,
    /// When set, `get_query_results` fails instead.
    pub fail_query_results: bool,

    pub submitted: Vec<CommandQueueItem>,
    pub presented: Vec<(Vec<SwapchainHandle>, Vec<u32>, Vec<SemaphoreHandle>)>,
    pub fence_waits: RefCell<Vec<Vec<FenceHandle>>>,

    pub begun_queries: Vec<u32>,
    pub ended_queries: Vec<u32>,
    pub reset_ranges: Vec<(u32, u32)>,
}

impl MockDevice {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

impl RenderDevice for MockDevice {
    fn create_semaphore(&mut self) -> DeviceResult<SemaphoreHandle> {
        let id = self.next_id();
        self.live_semaphores.insert(id);
        self.semaphores_created += 1;
        Ok(SemaphoreHandle(id))
    }

    fn create_fence(&mut self) -> DeviceResult<FenceHandle> {
        let id = self.next_id();
        self.live_fences.insert(id);
        self.fences_created += 1;
        Ok(FenceHandle(id))
    }

    fn reset_fence(&mut self, fence: FenceHandle) -> DeviceResult<()> {
        assert!(self.live_fences.contains(&fence.0), "reset of unknown fence");
        self.fence_resets.push(fence);
        Ok(())
    }

    fn wait_for_fences(&self, fences: &[FenceHandle], _timeout_ns: u64) -> DeviceResult<()> {
        for fence in fences {
            assert!(self.live_fences.contains(&fence.0), "wait on unknown fence");
        }
        self.fence_waits.borrow_mut().push(fences.to_vec());
        Ok(())
    }

    fn destroy_semaphore(&mut self, semaphore: SemaphoreHandle) {
        self.live_semaphores.remove(&semaphore.0);
    }

    fn destroy_fence(&mut self, fence: FenceHandle) {
        self.live_fences.remove(&fence.0);
    }

    fn create_query_pool(&mut self, _query_count: u32) -> DeviceResult<QueryPoolHandle> {
        let id = self.next_id();
        self.live_query_pools.insert(id);
        Ok(QueryPoolHandle(id))
    }

    fn destroy_query_pool(&mut self, pool: QueryPoolHandle) {
        self.live_query_pools.remove(&pool.0);
    }

    fn get_query_results(
        &self,
        pool: QueryPoolHandle,
        first: u32,
        count: u32,
    ) -> DeviceResult<Vec<u64>> {
        assert!(self.live_query_pools.contains(&pool.0), "unknown query pool");
        if self.fail_query_results {
            return Err(DeviceError::QueryResultsUnavailable(
                "results not ready".into(),
            ));
        }
        // Queries beyond the scripted range read as 0, unavailable,
        // like a real pool whose queries were reset but never finished
        let first = first as usize;
        let count = count as usize;
        Ok((first..first + count)
            .map(|i| self.query_results.get(i).copied().unwrap_or(0))
            .collect())
    }

    fn allocate_command_buffer(&mut self) -> DeviceResult<CommandBufferHandle> {
        Ok(CommandBufferHandle(self.next_id()))
    }

    fn cmd_reset_query_pool(
        &mut self,
        _command_buffer: CommandBufferHandle,
        _pool: QueryPoolHandle,
        first: u32,
        count: u32,
    ) {
        self.reset_ranges.push((first, count));
    }

    fn cmd_begin_query(
        &mut self,
        _command_buffer: CommandBufferHandle,
        _pool: QueryPoolHandle,
        query: u32,
    ) {
        self.begun_queries.push(query);
    }

    fn cmd_end_query(
        &mut self,
        _command_buffer: CommandBufferHandle,
        _pool: QueryPoolHandle,
        query: u32,
    ) {
        self.ended_queries.push(query);
    }

    fn submit(&mut self, item: &CommandQueueItem) -> DeviceResult<()> {
        for semaphore in item.wait_semaphores.iter().chain(&item.signal_semaphores) {
            assert!(
                self.live_semaphores.contains(&semaphore.0),
                "submit references unknown semaphore"
            );
        }
        if let Some(fence) = item.fence {
            assert!(self.live_fences.contains(&fence.0), "submit references unknown fence");
        }
        self.submitted.push(item.clone());
        Ok(())
    }

    fn present(
        &mut self,
        swapchains: &[SwapchainHandle],
        image_indices: &[u32],
        wait_semaphores: &[SemaphoreHandle],
    ) -> DeviceResult<()> {
        self.presented.push((
            swapchains.to_vec(),
            image_indices.to_vec(),
            wait_semaphores.to_vec(),
        ));
        Ok(())
    }
}
