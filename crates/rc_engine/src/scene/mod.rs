//! Scene management system
//!
//! A hierarchy of transform nodes with attached scene objects, converted
//! each frame into a bucketed, sorted render queue. Following Game Engine
//! Architecture Chapter 11.2.7 - Scene Graphs.
//!
//! ## Architecture
//!
//! ```text
//! SceneManager
//!   ├── SceneGraph     slot map of SceneNodes (transform + objects + bounds)
//!   ├── SceneObjects   slot map of Entity / Light / Sky / Sprite
//!   ├── RenderQueue    five buckets of RenderableRef handles
//!   └── LightQueue     lights affecting the current view
//! ```
//!
//! Nodes and objects refer to each other through generation-checked ids, so
//! a queue entry whose object was destroyed mid-frame resolves to nothing
//! instead of dangling.

pub mod camera;
pub mod entity;
pub mod light;
pub mod node;
pub mod render_queue;
pub mod scene_manager;
pub mod scene_node;
pub mod scene_object;
pub mod sky;
pub mod sprite;

#[cfg(test)]
pub(crate) mod tests;

slotmap::new_key_type! {
    /// Handle of a scene node
    pub struct SceneNodeId;

    /// Handle of a scene object
    pub struct SceneObjectId;
}

pub use camera::Camera;
pub use entity::{BoneAttachment, Entity, SubEntity};
pub use light::{Light, LightKind, LightParams, LightQueue, LightQueueItem};
pub use node::{DirtyFlags, Node, NodeArena};
pub use render_queue::{BucketFilter, BucketMask, RenderBucket, RenderOrder, RenderQueue, RenderQueueItem, RenderableRef, SortKey};
pub use scene_manager::SceneManager;
pub use scene_node::{ObjectArena, QueueVisit, SceneGraph, SceneNode};
pub use scene_object::{RenderableView, SceneObject, SceneObjectKind};
pub use sky::Sky;
pub use sprite::{Rect, Sprite};
