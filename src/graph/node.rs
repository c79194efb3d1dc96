//! Frame graph nodes and the built graph

use crate::device::{CommandBufferHandle, FenceHandle, SemaphoreHandle, StageFlags};
use crate::registry::EntityId;
use crate::submit::{CommandQueueItem, PresentRequest};

/// Index of a node within its [`FrameGraph`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) usize);

/// One camera's recorded GPU work for this frame.
///
/// `signal_semaphores` holds exactly one semaphore per entry in
/// `children`, matched by position; a child finds the semaphore it must
/// wait on by locating itself in its dependency's child list. Terminal
/// nodes carry a fence instead.
#[derive(Debug)]
pub struct FrameNode {
    pub label: String,
    /// Camera entity that produced this node; `None` for the misc node
    pub camera_entity: Option<EntityId>,
    pub command_buffers: Vec<CommandBufferHandle>,
    /// Topological depth. Increases only across render orders that
    /// actually produced nodes.
    pub level: usize,
    pub queue_index: u32,
    pub dependencies: Vec<NodeId>,
    pub children: Vec<NodeId>,
    pub signal_semaphores: Vec<SemaphoreHandle>,
    pub window_signal_semaphores: Vec<SemaphoreHandle>,
    pub window_wait_semaphores: Vec<SemaphoreHandle>,
    pub fence: Option<FenceHandle>,
}

/// Dependency-ordered GPU work for one frame
pub struct FrameGraph {
    pub(crate) nodes: Vec<FrameNode>,
    pub(crate) levels: Vec<Vec<NodeId>>,
    pub(crate) final_fences: Vec<FenceHandle>,
    pub(crate) window_presents: Vec<PresentRequest>,
}

impl FrameGraph {
    pub fn empty() -> Self {
        Self {
            nodes: Vec::new(),
            levels: Vec::new(),
            final_fences: Vec::new(),
            window_presents: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &FrameNode {
        &self.nodes[id.0]
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &FrameNode)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    pub fn levels(&self) -> &[Vec<NodeId>] {
        &self.levels
    }

    /// Fences of terminal nodes, waited on before per-frame resources
    /// are reused
    pub fn final_fences(&self) -> &[FenceHandle] {
        &self.final_fences
    }

    pub fn window_presents(&self) -> &[PresentRequest] {
        &self.window_presents
    }

    /// Semaphores this node must wait on: the paired signal of every
    /// dependency edge, plus any window image-available semaphores.
    ///
    /// Panics when a dependency does not list this node as a child;
    /// that can only happen through a construction bug.
    pub fn wait_semaphores_for(&self, id: NodeId) -> Vec<SemaphoreHandle> {
        let node = &self.nodes[id.0];
        let mut waits = Vec::new();
        for &dependency in &node.dependencies {
            let parent = &self.nodes[dependency.0];
            let slot = parent
                .children
                .iter()
                .position(|&child| child == id)
                .unwrap_or_else(|| {
                    panic!("node '{}' missing from its dependency's children", node.label)
                });
            waits.push(parent.signal_semaphores[slot]);
        }
        waits.extend_from_slice(&node.window_wait_semaphores);
        waits
    }

    /// Collapse the graph into one submission batch per level.
    ///
    /// Panics when a level contains more than one fence; levels are
    /// built with at most one terminal node each, so a second fence is
    /// a construction bug.
    pub fn queue_items(&self) -> Vec<CommandQueueItem> {
        let mut items = Vec::with_capacity(self.levels.len());
        for (level_index, level) in self.levels.iter().enumerate() {
            let mut command_buffers = Vec::new();
            let mut wait_semaphores: Vec<SemaphoreHandle> = Vec::new();
            let mut signal_semaphores: Vec<SemaphoreHandle> = Vec::new();
            let mut fence = None;
            let mut labels = Vec::new();
            let mut queue_index = 0;

            for &id in level {
                let node = &self.nodes[id.0];
                command_buffers.extend_from_slice(&node.command_buffers);
                labels.push(node.label.as_str());
                queue_index = node.queue_index;

                for semaphore in self.wait_semaphores_for(id) {
                    if !wait_semaphores.contains(&semaphore) {
                        wait_semaphores.push(semaphore);
                    }
                }
                for &semaphore in node
                    .signal_semaphores
                    .iter()
                    .chain(&node.window_signal_semaphores)
                {
                    if !signal_semaphores.contains(&semaphore) {
                        signal_semaphores.push(semaphore);
                    }
                }
                if node.fence.is_some() {
                    if fence.is_some() {
                        panic!("not expecting more than one fence per level");
                    }
                    fence = node.fence;
                }
            }

            let wait_stage_masks =
                vec![StageFlags::COLOR_ATTACHMENT_OUTPUT; wait_semaphores.len()];
            items.push(CommandQueueItem {
                hint: format!("level {} [{}]", level_index, labels.join(", ")),
                command_buffers,
                wait_semaphores,
                wait_stage_masks,
                signal_semaphores,
                fence,
                queue_index,
            });
        }
        items
    }
}
