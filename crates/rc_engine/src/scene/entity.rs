//! Mesh instances
//!
//! An [`Entity`] places a shared [`Mesh`] in the scene. It owns one
//! [`SubEntity`] per mesh part, a private copy of the mesh skeleton and the
//! animation player driving that copy.
//!
//! ## World transforms
//!
//! Every sub-entity draws with the same transform array:
//! - no skeleton: `[world]`
//! - skeleton, no clip playing: `bone_count + 1` copies of `world`
//! - skeleton and a playing clip: the skin matrices followed by `world`
//!
//! The node-level world transform is always the last element.

use crate::core::{EngineError, EngineResult};
use crate::events::{AnimationEvent, EventBus};
use crate::foundation::bounds::AABB;
use crate::foundation::math::Mat4;
use crate::render::material::Material;
use crate::resources::{AnimationClip, AnimationPlayer, BoneId, Mesh, Skeleton};
use crate::scene::node::NodeArena;
use crate::scene::{SceneNodeId, SceneObjectId};
use std::sync::Arc;

/// One drawable part of an entity
#[derive(Debug, Clone)]
pub struct SubEntity {
    part: usize,
    material: Arc<Material>,
    visible: bool,
}

impl SubEntity {
    /// Index of the mesh part
    pub fn part(&self) -> usize {
        self.part
    }

    /// Material used to draw the part
    pub fn material(&self) -> &Arc<Material> {
        &self.material
    }

    /// Replace the material
    pub fn set_material(&mut self, material: Arc<Material>) {
        self.material = material;
    }

    /// Entity-private material, cloned from the shared one on first access
    pub fn material_mut(&mut self) -> &mut Material {
        if Arc::get_mut(&mut self.material).is_none() {
            self.material = Arc::new(self.material.clone_material());
        }
        Arc::make_mut(&mut self.material)
    }

    /// Whether the part is drawn
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Show or hide the part
    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }
}

/// Scene node following a bone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoneAttachment {
    /// Followed bone
    pub bone: BoneId,
    /// Node whose local transform tracks the bone
    pub node: SceneNodeId,
}

/// Instance of a mesh
#[derive(Debug, Clone)]
pub struct Entity {
    mesh: Arc<Mesh>,
    sub_entities: Vec<SubEntity>,
    skeleton: Option<Skeleton>,
    animation: AnimationPlayer,
    bone_attachments: Vec<BoneAttachment>,
    world_transforms: Vec<Mat4>,
    skinned: bool,
}

impl Entity {
    /// Instance `mesh`, sharing its part materials until one is modified
    pub fn new(mesh: Arc<Mesh>) -> Self {
        let sub_entities = mesh
            .parts()
            .iter()
            .enumerate()
            .map(|(part, mesh_part)| SubEntity {
                part,
                material: mesh_part.material().clone(),
                visible: true,
            })
            .collect();
        let skeleton = mesh.skeleton().map(|skeleton| (**skeleton).clone());
        let bone_count = skeleton.as_ref().map_or(0, Skeleton::bone_count);

        Self {
            mesh,
            sub_entities,
            skeleton,
            animation: AnimationPlayer::new(),
            bone_attachments: Vec::new(),
            world_transforms: vec![Mat4::identity(); bone_count + 1],
            skinned: false,
        }
    }

    /// Shared mesh
    pub fn mesh(&self) -> &Arc<Mesh> {
        &self.mesh
    }

    /// Parts in mesh order
    pub fn sub_entities(&self) -> &[SubEntity] {
        &self.sub_entities
    }

    /// Part by index
    pub fn sub_entity(&self, index: usize) -> Option<&SubEntity> {
        self.sub_entities.get(index)
    }

    /// Mutable part by index
    pub fn sub_entity_mut(&mut self, index: usize) -> Option<&mut SubEntity> {
        self.sub_entities.get_mut(index)
    }

    /// Entity-private skeleton
    pub fn skeleton(&self) -> Option<&Skeleton> {
        self.skeleton.as_ref()
    }

    /// Mutable skeleton for manual posing
    pub fn skeleton_mut(&mut self) -> Option<&mut Skeleton> {
        self.skeleton.as_mut()
    }

    /// Animation player
    pub fn animation_player(&self) -> &AnimationPlayer {
        &self.animation
    }

    /// Mutable animation player
    pub fn animation_player_mut(&mut self) -> &mut AnimationPlayer {
        &mut self.animation
    }

    /// Register a clip for this entity's skeleton
    pub fn add_animation(&mut self, clip: Arc<AnimationClip>) -> EngineResult<()> {
        let skeleton = self.skeleton.as_ref().ok_or_else(|| {
            EngineError::invalid_state(format!("mesh '{}' has no skeleton to animate", self.mesh.name()))
        })?;
        self.animation.add_clip(clip, skeleton)
    }

    /// Whether a clip is playing
    pub fn is_animated(&self) -> bool {
        self.skeleton.is_some() && self.animation.is_active()
    }

    /// Advance the playing clips and pose the skeleton
    pub fn update_animation(
        &mut self,
        dt: f32,
        id: SceneObjectId,
        events: &mut EventBus<AnimationEvent>,
    ) -> EngineResult<()> {
        match self.skeleton.as_mut() {
            Some(skeleton) if self.animation.is_active() => self.animation.update(dt, skeleton, id, events),
            _ => Ok(()),
        }
    }

    /// Rebuild the transform array for the node world transform `world`
    pub fn update_transforms(&mut self, world: &Mat4) -> EngineResult<()> {
        let animated = self.is_animated();
        self.world_transforms.clear();
        match self.skeleton.as_mut() {
            Some(skeleton) if animated => skeleton.skin_matrices(&mut self.world_transforms)?,
            Some(skeleton) => self.world_transforms.resize(skeleton.bone_count(), *world),
            None => {}
        }
        self.world_transforms.push(*world);
        self.skinned = animated && self.skeleton.is_some();
        Ok(())
    }

    /// Whether the transform array currently holds skin matrices
    pub fn is_skinned(&self) -> bool {
        self.skinned
    }

    /// Skin matrices (if any) followed by the world transform
    pub fn world_transforms(&self) -> &[Mat4] {
        &self.world_transforms
    }

    /// Mesh bounds under `world`, following the current pose when skinned
    pub fn world_bounds(&self, world: &Mat4) -> AABB {
        self.posed_bounds(self.mesh.bounds(), world)
    }

    /// Bounds of one part under `world`
    pub fn part_world_bounds(&self, part: usize, world: &Mat4) -> AABB {
        self.mesh
            .parts()
            .get(part)
            .map_or_else(AABB::empty, |p| self.posed_bounds(p.bounds(), world))
    }

    // Union of the bind-pose box under every skin matrix; blended vertices
    // stay inside it.
    fn posed_bounds(&self, bounds: &AABB, world: &Mat4) -> AABB {
        let skin = match self.world_transforms.split_last() {
            Some((_, skin)) if self.skinned && !skin.is_empty() => skin,
            _ => return bounds.transformed(world),
        };
        let mut posed = AABB::empty();
        for matrix in skin {
            posed.merge(&bounds.transformed(matrix));
        }
        posed.transformed(world)
    }

    /// Nodes following bones
    pub fn bone_attachments(&self) -> &[BoneAttachment] {
        &self.bone_attachments
    }

    pub(crate) fn add_bone_attachment(&mut self, bone_name: &str, node: SceneNodeId) -> EngineResult<BoneId> {
        let skeleton = self.skeleton.as_ref().ok_or_else(|| {
            EngineError::invalid_state(format!("mesh '{}' has no skeleton to attach to", self.mesh.name()))
        })?;
        let bone = skeleton.bone_by_name(bone_name)?;
        self.bone_attachments.retain(|a| a.node != node);
        self.bone_attachments.push(BoneAttachment { bone, node });
        Ok(bone)
    }

    pub(crate) fn remove_bone_attachments_to(&mut self, node: SceneNodeId) {
        self.bone_attachments.retain(|a| a.node != node);
    }

    /// Model-space transform of `bone`
    pub fn bone_transform(&mut self, bone: BoneId) -> EngineResult<Mat4> {
        let skeleton = self.skeleton.as_mut().ok_or_else(|| {
            EngineError::invalid_state(format!("mesh '{}' has no skeleton", self.mesh.name()))
        })?;
        skeleton.world_transform(bone)
    }
}
