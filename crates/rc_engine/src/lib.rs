//! # RC Engine
//!
//! Scene graph, render queue and material binding core of a real-time 3D
//! engine. Drawing goes through the [`RenderBackend`](render::RenderBackend)
//! trait; the bundled [`RecordingBackend`](render::RecordingBackend) records
//! device commands instead of talking to a GPU.
//!
//! ## Features
//!
//! - **Scene Graph**: node hierarchy with lazy world transforms and bounds
//! - **Render Queue**: five buckets with per-bucket sort policies
//! - **Materials**: effect parameters bound automatically by semantic
//! - **Skinning**: skeletons, animation clips and bone attachments
//! - **Resources**: grouped search paths and a load-once registry
//!
//! ## Quick Start
//!
//! ```rust
//! use rc_engine::prelude::*;
//! use rc_engine::foundation::math::Vec3;
//!
//! fn main() -> EngineResult<()> {
//!     let mut context = EngineContext::new(EngineConfig::default(), Box::new(RecordingBackend::new()))?;
//!
//!     let scene = context.scene_mut();
//!     let sun = scene.create_light("sun", LightKind::Directional)?;
//!     let root = scene.root_node();
//!     scene.attach_object(root, sun)?;
//!
//!     let camera = Camera::perspective(Vec3::new(0.0, 2.0, 10.0), 60.0, 16.0 / 9.0, 0.1, 100.0);
//!     let stats = context.frame(1.0 / 60.0, &camera)?;
//!     assert_eq!(stats.lights, 1);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

pub mod core;
pub mod events;
pub mod foundation;
pub mod render;
pub mod resources;
pub mod scene;

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        core::{EngineConfig, EngineContext, EngineError, EngineResult, ErrorCode, FrameStats},
        events::{AnimationEvent, AnimationEventKind, EventBus},
        foundation::math::{Mat4, Quat, Transform, Vec3},
        render::{CommandLog, Material, RecordingBackend, RenderBackend, RenderFactory},
        resources::{Mesh, ResourceManager, Skeleton},
        scene::{Camera, LightKind, NodeArena, Rect, RenderBucket, RenderOrder, SceneManager},
    };
}
