//! Frustum culling and visible-set construction

pub mod culling;
pub mod frustum;

pub use culling::{visible_entities, VisibleEntityInfo};
pub use frustum::Frustum;
