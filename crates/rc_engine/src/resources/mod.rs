//! Resource loading
//!
//! Named, load-once resources grouped by resource group:
//! - [`Mesh`], [`Skeleton`] and [`AnimationClip`] from private binary files
//! - `Material` and `Effect` from RON descriptions
//! - `Texture` from image files

pub mod animation;
pub mod file_system;
pub mod mesh;
pub mod resource;
pub mod resource_manager;
pub mod skeleton;
pub mod stream;

pub use animation::{AnimationClip, AnimationPlayer, AnimationState, BoneTrack, Keyframe};
pub use file_system::FileSystem;
pub use mesh::{Mesh, MeshData, MeshPart, MeshPartData};
pub use resource::{Resource, ResourceHandle, ResourceKind, ResourceState};
pub use resource_manager::ResourceManager;
pub use skeleton::{Bone, BoneId, Skeleton};
pub use stream::{DataStream, DataWriter};
