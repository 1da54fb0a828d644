//! Skeletons
//!
//! Bones are [`Node`]s keyed by [`BoneId`], so they share the dirty-flag
//! transform code with scene nodes. Each bone carries its inverse bind pose
//! (the offset matrix); the skin matrix of a bone is
//! `bone_world * offset`.
//!
//! ## RCSKEL layout
//!
//! ```text
//! "RCSKEL" u32:version(1) string:name u32:bone_count
//! bone_count x { string:name i32:parent(-1 = root) vec3:position quat:rotation vec3:scale mat4:offset }
//! ```
//! Parents always precede their children.

use crate::core::{EngineError, EngineResult};
use crate::foundation::math::{Mat4, Transform};
use crate::resources::resource::{Resource, ResourceKind};
use crate::resources::resource_manager::ResourceManager;
use crate::resources::stream::{DataStream, DataWriter};
use crate::scene::node::{Node, NodeArena};

const MAGIC: &[u8] = b"RCSKEL";
const VERSION: u32 = 1;

/// Index of a bone inside its skeleton
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BoneId(pub usize);

/// One bone: a transform node plus its inverse bind pose
#[derive(Debug, Clone)]
pub struct Bone {
    node: Node<BoneId>,
    bind_pose: Transform,
    offset: Mat4,
}

impl Bone {
    /// Transform node
    pub fn node(&self) -> &Node<BoneId> {
        &self.node
    }

    /// Bone name
    pub fn name(&self) -> &str {
        self.node.name()
    }

    /// Local transform at bind time
    pub fn bind_pose(&self) -> &Transform {
        &self.bind_pose
    }

    /// Inverse bind pose
    pub fn offset(&self) -> &Mat4 {
        &self.offset
    }
}

/// Bone hierarchy
#[derive(Debug, Clone, Default)]
pub struct Skeleton {
    name: String,
    bones: Vec<Bone>,
}

impl NodeArena<BoneId> for Skeleton {
    fn node(&self, key: BoneId) -> Option<&Node<BoneId>> {
        self.bones.get(key.0).map(|bone| &bone.node)
    }

    fn node_mut(&mut self, key: BoneId) -> Option<&mut Node<BoneId>> {
        self.bones.get_mut(key.0).map(|bone| &mut bone.node)
    }
}

impl Skeleton {
    /// Empty skeleton
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), bones: Vec::new() }
    }

    /// Skeleton name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a bone below `parent`
    ///
    /// Fails with `ERR_INVALID_PARAMS` on a duplicate name and with
    /// `ERR_ITEM_NOT_FOUND` on an unknown parent.
    pub fn add_bone(
        &mut self,
        name: &str,
        parent: Option<BoneId>,
        bind_pose: Transform,
        offset: Mat4,
    ) -> EngineResult<BoneId> {
        if self.bones.iter().any(|b| b.name() == name) {
            return Err(EngineError::invalid_params(format!(
                "skeleton '{}' already has a bone '{name}'",
                self.name
            )));
        }
        let id = BoneId(self.bones.len());
        self.bones.push(Bone {
            node: Node::with_transform(name, bind_pose),
            bind_pose,
            offset,
        });
        if let Some(parent) = parent {
            if let Err(error) = self.attach_child(parent, id) {
                self.bones.pop();
                return Err(error);
            }
        }
        Ok(id)
    }

    /// Set every offset to the inverse of the bone's bind-pose world transform
    pub fn compute_offsets_from_bind_pose(&mut self) -> EngineResult<()> {
        self.reset_to_bind_pose()?;
        for index in 0..self.bones.len() {
            let world = self.world_transform(BoneId(index))?;
            self.bones[index].offset = world.try_inverse().unwrap_or_else(Mat4::identity);
        }
        Ok(())
    }

    /// Number of bones
    pub fn bone_count(&self) -> usize {
        self.bones.len()
    }

    /// Bones in index order
    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    /// Bone by id
    pub fn bone(&self, id: BoneId) -> Option<&Bone> {
        self.bones.get(id.0)
    }

    /// Find a bone by name
    pub fn bone_by_name(&self, name: &str) -> EngineResult<BoneId> {
        self.bones
            .iter()
            .position(|b| b.name() == name)
            .map(BoneId)
            .ok_or_else(|| EngineError::item_not_found(format!("skeleton '{}' has no bone '{name}'", self.name)))
    }

    /// Restore every bone's local transform to its bind pose
    pub fn reset_to_bind_pose(&mut self) -> EngineResult<()> {
        for index in 0..self.bones.len() {
            let pose = self.bones[index].bind_pose;
            self.set_transform(BoneId(index), pose)?;
        }
        Ok(())
    }

    /// Write `bone_world * offset` for every bone into `out`
    pub fn skin_matrices(&mut self, out: &mut Vec<Mat4>) -> EngineResult<()> {
        out.clear();
        for index in 0..self.bones.len() {
            let world = self.world_transform(BoneId(index))?;
            out.push(world * self.bones[index].offset);
        }
        Ok(())
    }

    /// Decode an RCSKEL stream
    pub fn read(stream: &mut DataStream) -> EngineResult<Self> {
        stream.expect_magic(MAGIC)?;
        let version = stream.read_u32()?;
        if version != VERSION {
            return Err(EngineError::parse(format!("'{}': unsupported RCSKEL version {version}", stream.name())));
        }

        let mut skeleton = Skeleton::new(stream.read_string()?);
        let count = stream.read_u32()? as usize;
        for _ in 0..count {
            let name = stream.read_string()?;
            let parent = stream.read_i32()?;
            let bind_pose = Transform::new(stream.read_vec3()?, stream.read_quat()?, stream.read_vec3()?);
            let offset = stream.read_mat4()?;
            let parent = match usize::try_from(parent) {
                Ok(index) if index < skeleton.bone_count() => Some(BoneId(index)),
                Ok(index) => {
                    return Err(EngineError::parse(format!(
                        "'{}': bone '{name}' refers to parent {index} before it is defined",
                        stream.name()
                    )));
                }
                Err(_) => None,
            };
            skeleton.add_bone(&name, parent, bind_pose, offset)?;
        }
        Ok(skeleton)
    }

    /// Encode as RCSKEL
    pub fn write(&self, writer: &mut DataWriter) {
        writer.write_bytes(MAGIC).write_u32(VERSION).write_string(&self.name);
        writer.write_u32(self.bones.len() as u32);
        for bone in &self.bones {
            let parent = bone.node.parent().map_or(-1, |p| p.0 as i32);
            writer
                .write_string(bone.name())
                .write_i32(parent)
                .write_vec3(&bone.bind_pose.position)
                .write_quat(&bone.bind_pose.rotation)
                .write_vec3(&bone.bind_pose.scale)
                .write_mat4(&bone.offset);
        }
    }
}

impl Resource for Skeleton {
    const KIND: ResourceKind = ResourceKind::Skeleton;

    fn load_impl(manager: &ResourceManager, name: &str, group: &str) -> EngineResult<Self> {
        let mut stream = manager.file_system().open_stream(name, group)?;
        let skeleton = Skeleton::read(&mut stream)?;
        log::debug!("Loaded skeleton '{}' ({} bones)", skeleton.name, skeleton.bone_count());
        Ok(skeleton)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ErrorCode;
    use crate::foundation::math::Vec3;
    use approx::assert_relative_eq;

    fn arm() -> Skeleton {
        let mut skeleton = Skeleton::new("arm");
        let root = skeleton
            .add_bone("shoulder", None, Transform::identity(), Mat4::identity())
            .unwrap();
        skeleton
            .add_bone("elbow", Some(root), Transform::from_position(Vec3::new(0.0, 2.0, 0.0)), Mat4::identity())
            .unwrap();
        skeleton.compute_offsets_from_bind_pose().unwrap();
        skeleton
    }

    #[test]
    fn test_bind_pose_skin_is_identity() {
        let mut skeleton = arm();
        let mut skin = Vec::new();
        skeleton.skin_matrices(&mut skin).unwrap();
        assert_eq!(skin.len(), 2);
        for matrix in &skin {
            assert_relative_eq!(*matrix, Mat4::identity(), epsilon = 1e-6);
        }
    }

    #[test]
    fn test_skin_is_world_times_offset() {
        let mut skeleton = arm();
        let shoulder = skeleton.bone_by_name("shoulder").unwrap();
        let elbow = skeleton.bone_by_name("elbow").unwrap();
        skeleton.set_position(shoulder, Vec3::new(1.0, 0.0, 0.0)).unwrap();

        let mut skin = Vec::new();
        skeleton.skin_matrices(&mut skin).unwrap();
        let expected = skeleton.world_transform(elbow).unwrap() * skeleton.bone(elbow).unwrap().offset();
        assert_relative_eq!(skin[elbow.0], expected, epsilon = 1e-6);
        assert_relative_eq!(skin[elbow.0], Mat4::new_translation(&Vec3::new(1.0, 0.0, 0.0)), epsilon = 1e-6);
    }

    #[test]
    fn test_lookup_and_duplicates() {
        let mut skeleton = arm();
        assert_eq!(skeleton.bone_by_name("wrist").unwrap_err().code(), ErrorCode::ItemNotFound);
        let error = skeleton
            .add_bone("elbow", None, Transform::identity(), Mat4::identity())
            .unwrap_err();
        assert_eq!(error.code(), ErrorCode::InvalidParams);
        assert_eq!(skeleton.bone_count(), 2);
    }

    #[test]
    fn test_rcskel_file() {
        let skeleton = arm();
        let mut writer = DataWriter::new();
        skeleton.write(&mut writer);

        let mut stream = DataStream::from_bytes("arm.skeleton", writer.into_bytes());
        let mut loaded = Skeleton::read(&mut stream).unwrap();
        assert_eq!(loaded.name(), "arm");
        assert_eq!(loaded.bone_count(), 2);
        let elbow = loaded.bone_by_name("elbow").unwrap();
        assert_eq!(loaded.bone(elbow).unwrap().node().parent(), Some(BoneId(0)));
        assert_relative_eq!(loaded.world_position(elbow).unwrap(), Vec3::new(0.0, 2.0, 0.0));
    }
}
