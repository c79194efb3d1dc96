//! Core device abstraction for the frame scheduler
//!
//! The scheduler never touches raw Vulkan objects. It speaks in opaque
//! handles against this trait, which the Vulkan device implements and
//! tests replace with an in-memory mock.

use crate::submit::CommandQueueItem;
use thiserror::Error;

/// Device error type
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("Failed to initialize device: {0}")]
    InitializationFailed(String),
    #[error("Failed to create surface: {0}")]
    SurfaceCreationFailed(String),
    #[error("Failed to create synchronization primitive: {0}")]
    SyncCreationFailed(String),
    #[error("Failed to create query pool: {0}")]
    QueryPoolCreationFailed(String),
    #[error("Failed to allocate command buffer: {0}")]
    CommandBufferAllocationFailed(String),
    #[error("Failed to submit commands: {0}")]
    SubmitFailed(String),
    #[error("Failed to present: {0}")]
    PresentFailed(String),
    #[error("Query results not available: {0}")]
    QueryResultsUnavailable(String),
    #[error("Fence wait failed: {0}")]
    FenceWaitFailed(String),
}

pub type DeviceResult<T> = Result<T, DeviceError>;

/// Handle to a GPU semaphore. Pool-owned: never destroyed on drop,
/// recycled by the sync primitive pool until teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SemaphoreHandle(pub(crate) u64);

/// Handle to a GPU fence. Pool-owned, same lifetime rules as semaphores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FenceHandle(pub(crate) u64);

/// Handle to a recorded command buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandBufferHandle(pub(crate) u64);

/// Handle to an occlusion query pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueryPoolHandle(pub(crate) u64);

/// Handle to a swapchain registered by the windowing layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SwapchainHandle(pub(crate) u64);

/// Pipeline stage flags for submission wait masks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageFlags(pub(crate) u32);

impl StageFlags {
    pub const TOP_OF_PIPE: Self = Self(1 << 0);
    pub const COLOR_ATTACHMENT_OUTPUT: Self = Self(1 << 1);
    pub const BOTTOM_OF_PIPE: Self = Self(1 << 2);

    pub fn contains(&self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }
}

impl std::ops::BitOr for StageFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

/// The GPU device surface the scheduler depends on.
///
/// Query results use a sentinel encoding that callers must treat as a
/// hard contract: a raw value of 0 means "not yet available", a raw
/// value `v > 0` means "available with sample count `v - 1`".
pub trait RenderDevice {
    /// Create a new binary semaphore
    fn create_semaphore(&mut self) -> DeviceResult<SemaphoreHandle>;

    /// Create a new fence in the unsignaled state
    fn create_fence(&mut self) -> DeviceResult<FenceHandle>;

    /// Reset a fence to the unsignaled state
    fn reset_fence(&mut self, fence: FenceHandle) -> DeviceResult<()>;

    /// Block until every fence in the set is signaled or the timeout
    /// (nanoseconds) elapses
    fn wait_for_fences(&self, fences: &[FenceHandle], timeout_ns: u64) -> DeviceResult<()>;

    fn destroy_semaphore(&mut self, semaphore: SemaphoreHandle);

    fn destroy_fence(&mut self, fence: FenceHandle);

    /// Create an occlusion query pool with `query_count` slots
    fn create_query_pool(&mut self, query_count: u32) -> DeviceResult<QueryPoolHandle>;

    fn destroy_query_pool(&mut self, pool: QueryPoolHandle);

    /// Download `count` raw query results starting at `first`, in the
    /// sentinel encoding documented on this trait. Does not wait for
    /// unavailable queries.
    fn get_query_results(
        &self,
        pool: QueryPoolHandle,
        first: u32,
        count: u32,
    ) -> DeviceResult<Vec<u64>>;

    /// Allocate a primary command buffer from the device's pool
    fn allocate_command_buffer(&mut self) -> DeviceResult<CommandBufferHandle>;

    /// Record a query pool reset over `[first, first + count)`
    fn cmd_reset_query_pool(
        &mut self,
        command_buffer: CommandBufferHandle,
        pool: QueryPoolHandle,
        first: u32,
        count: u32,
    );

    /// Record the start of an occlusion query scoped to subsequent draws
    fn cmd_begin_query(
        &mut self,
        command_buffer: CommandBufferHandle,
        pool: QueryPoolHandle,
        query: u32,
    );

    /// Record the end of an occlusion query
    fn cmd_end_query(
        &mut self,
        command_buffer: CommandBufferHandle,
        pool: QueryPoolHandle,
        query: u32,
    );

    /// Submit one batch to the graphics queue. Ordering across calls is
    /// the caller's responsibility.
    fn submit(&mut self, item: &CommandQueueItem) -> DeviceResult<()>;

    /// Queue a presentation of the given swapchain images, waiting on
    /// the given semaphores
    fn present(
        &mut self,
        swapchains: &[SwapchainHandle],
        image_indices: &[u32],
        wait_semaphores: &[SemaphoreHandle],
    ) -> DeviceResult<()>;
}
