//! Per-frame render command graph

pub mod builder;
pub mod node;

pub use builder::FrameGraphBuilder;
pub use node::{FrameGraph, FrameNode, NodeId};
