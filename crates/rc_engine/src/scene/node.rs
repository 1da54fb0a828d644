//! Hierarchical transform nodes
//!
//! [`Node`] holds a local SRT transform, the cached world matrix and the dirty
//! bits. The hierarchy operations live on the [`NodeArena`] trait so the same
//! code drives scene nodes (slot-map keys) and skeleton bones (indices).
//!
//! Dirty propagation runs in two directions:
//! - a transform change marks `WORLD | BOUNDS` on the node and every
//!   descendant
//! - a transform or bounds change marks `BOUNDS` on every ancestor
//!
//! World transforms are resolved lazily, top-down from the nearest clean
//! ancestor.

use crate::core::{EngineError, EngineResult};
use crate::foundation::math::{Mat4, Quat, Transform, Vec3};
use bitflags::bitflags;
use std::fmt::Debug;

bitflags! {
    /// Cached state that must be recomputed before it is read
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DirtyFlags: u8 {
        /// Cached world transform is stale
        const WORLD = 0b01;
        /// Cached world bounds are stale
        const BOUNDS = 0b10;
    }
}

/// A transform node in an arena-backed hierarchy
#[derive(Debug, Clone)]
pub struct Node<K> {
    name: String,
    position: Vec3,
    rotation: Quat,
    scale: Vec3,
    world: Mat4,
    dirty: DirtyFlags,
    parent: Option<K>,
    children: Vec<K>,
}

impl<K: Copy + PartialEq> Node<K> {
    /// Create a detached node with an identity transform
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            position: Vec3::zeros(),
            rotation: Quat::identity(),
            scale: Vec3::new(1.0, 1.0, 1.0),
            world: Mat4::identity(),
            dirty: DirtyFlags::all(),
            parent: None,
            children: Vec::new(),
        }
    }

    /// Create a detached node with an initial local transform
    pub fn with_transform(name: impl Into<String>, transform: Transform) -> Self {
        let mut node = Self::new(name);
        node.position = transform.position;
        node.rotation = transform.rotation;
        node.scale = transform.scale;
        node
    }

    /// Node name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Local position
    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Local rotation
    pub fn rotation(&self) -> Quat {
        self.rotation
    }

    /// Local scale
    pub fn scale(&self) -> Vec3 {
        self.scale
    }

    /// Local transform as SRT components
    pub fn local_transform(&self) -> Transform {
        Transform::new(self.position, self.rotation, self.scale)
    }

    /// Local transform as a matrix
    pub fn local_matrix(&self) -> Mat4 {
        self.local_transform().to_matrix()
    }

    /// Last resolved world matrix; may be stale if `WORLD` is dirty
    pub fn cached_world_transform(&self) -> &Mat4 {
        &self.world
    }

    /// Current dirty bits
    pub fn dirty_flags(&self) -> DirtyFlags {
        self.dirty
    }

    /// Parent key, `None` for roots and detached nodes
    pub fn parent(&self) -> Option<K> {
        self.parent
    }

    /// Children in attachment order
    pub fn children(&self) -> &[K] {
        &self.children
    }

    /// Mark dirty bits without propagation
    pub(crate) fn mark(&mut self, flags: DirtyFlags) {
        self.dirty.insert(flags);
    }

    /// Clear dirty bits
    pub(crate) fn clean(&mut self, flags: DirtyFlags) {
        self.dirty.remove(flags);
    }
}

/// Storage owning a hierarchy of [`Node`]s addressed by key `K`
///
/// Implementors only provide lookup; every hierarchy operation is a provided
/// method.
pub trait NodeArena<K: Copy + PartialEq + Debug> {
    /// Look up a node
    fn node(&self, key: K) -> Option<&Node<K>>;

    /// Look up a node mutably
    fn node_mut(&mut self, key: K) -> Option<&mut Node<K>>;

    /// Look up a node or fail with `ERR_ITEM_NOT_FOUND`
    #[track_caller]
    fn try_node(&self, key: K) -> EngineResult<&Node<K>> {
        self.node(key)
            .ok_or_else(|| EngineError::item_not_found(format!("node {key:?} does not exist")))
    }

    /// Set the local position
    fn set_position(&mut self, key: K, position: Vec3) -> EngineResult<()> {
        self.modify_local(key, |node| node.position = position)
    }

    /// Set the local rotation
    fn set_rotation(&mut self, key: K, rotation: Quat) -> EngineResult<()> {
        self.modify_local(key, |node| node.rotation = rotation)
    }

    /// Set the local scale
    fn set_scale(&mut self, key: K, scale: Vec3) -> EngineResult<()> {
        self.modify_local(key, |node| node.scale = scale)
    }

    /// Set position, rotation and scale at once
    fn set_transform(&mut self, key: K, transform: Transform) -> EngineResult<()> {
        self.modify_local(key, |node| {
            node.position = transform.position;
            node.rotation = transform.rotation;
            node.scale = transform.scale;
        })
    }

    /// Move by `delta` in parent space
    fn translate(&mut self, key: K, delta: Vec3) -> EngineResult<()> {
        self.modify_local(key, |node| node.position += delta)
    }

    /// Apply `rotation` after the current local rotation
    fn rotate(&mut self, key: K, rotation: Quat) -> EngineResult<()> {
        self.modify_local(key, |node| node.rotation = rotation * node.rotation)
    }

    #[doc(hidden)]
    fn modify_local(&mut self, key: K, apply: impl FnOnce(&mut Node<K>)) -> EngineResult<()> {
        let node = self
            .node_mut(key)
            .ok_or_else(|| EngineError::item_not_found(format!("node {key:?} does not exist")))?;
        apply(node);
        self.mark_transform_dirty(key);
        Ok(())
    }

    /// Mark `WORLD | BOUNDS` on the subtree and `BOUNDS` on every ancestor
    fn mark_transform_dirty(&mut self, key: K) {
        self.mark_subtree_dirty(key, DirtyFlags::WORLD | DirtyFlags::BOUNDS);
        if let Some(parent) = self.node(key).and_then(Node::parent) {
            self.mark_bounds_dirty(parent);
        }
    }

    /// Mark `flags` on `key` and every descendant
    fn mark_subtree_dirty(&mut self, key: K, flags: DirtyFlags) {
        let mut stack = vec![key];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.node_mut(current) {
                node.mark(flags);
                stack.extend(node.children.iter().copied());
            }
        }
    }

    /// Mark `BOUNDS` on `key` and every ancestor
    fn mark_bounds_dirty(&mut self, key: K) {
        let mut cursor = Some(key);
        while let Some(current) = cursor {
            cursor = match self.node_mut(current) {
                Some(node) => {
                    node.mark(DirtyFlags::BOUNDS);
                    node.parent
                }
                None => None,
            };
        }
    }

    /// Resolve the world transform, recomputing stale ancestors top-down
    ///
    /// Only the queried node and its ancestors are cleaned; descendants stay
    /// dirty until they are queried themselves.
    fn world_transform(&mut self, key: K) -> EngineResult<Mat4> {
        let mut chain = Vec::new();
        let mut base = Mat4::identity();
        let mut cursor = Some(key);
        while let Some(current) = cursor {
            let node = self.try_node(current)?;
            if !node.dirty.contains(DirtyFlags::WORLD) {
                base = node.world;
                break;
            }
            chain.push(current);
            cursor = node.parent;
        }

        for current in chain.into_iter().rev() {
            if let Some(node) = self.node_mut(current) {
                base *= node.local_matrix();
                node.world = base;
                node.clean(DirtyFlags::WORLD);
            }
        }
        Ok(base)
    }

    /// World-space position of the node origin
    fn world_position(&mut self, key: K) -> EngineResult<Vec3> {
        let world = self.world_transform(key)?;
        Ok(Vec3::new(world.m14, world.m24, world.m34))
    }

    /// World-space rotation, ignoring any shear from non-uniform parents
    fn world_rotation(&mut self, key: K) -> EngineResult<Quat> {
        Ok(Transform::from_matrix(&self.world_transform(key)?).rotation)
    }

    /// World-space scale
    fn world_scale(&mut self, key: K) -> EngineResult<Vec3> {
        Ok(Transform::from_matrix(&self.world_transform(key)?).scale)
    }

    /// Resolve world transforms of `key` and its whole subtree
    fn update_world_transforms(&mut self, key: K) -> EngineResult<()> {
        let mut stack = vec![key];
        while let Some(current) = stack.pop() {
            self.world_transform(current)?;
            stack.extend(self.try_node(current)?.children.iter().copied());
        }
        Ok(())
    }

    /// Whether `ancestor` appears on the parent chain of `key` (or is `key`)
    fn is_ancestor(&self, ancestor: K, key: K) -> bool {
        let mut cursor = Some(key);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.node(current).and_then(Node::parent);
        }
        false
    }

    /// Make `child` a child of `parent`
    ///
    /// Attaching a node to itself or to its current parent is a no-op. A node
    /// already attached elsewhere is moved. Attaching an ancestor below its
    /// own descendant fails with `ERR_INVALID_PARAMS`.
    fn attach_child(&mut self, parent: K, child: K) -> EngineResult<()> {
        if parent == child {
            return Ok(());
        }
        let current_parent = self.try_node(child)?.parent;
        if self.try_node(parent)?.children.contains(&child) {
            return Ok(());
        }
        if self.is_ancestor(child, parent) {
            return Err(EngineError::invalid_params(format!(
                "attaching {child:?} under {parent:?} would create a cycle"
            )));
        }
        if let Some(old_parent) = current_parent {
            self.detach_child(old_parent, child)?;
        }

        if let Some(node) = self.node_mut(parent) {
            node.children.push(child);
        }
        if let Some(node) = self.node_mut(child) {
            node.parent = Some(parent);
        }
        self.mark_subtree_dirty(child, DirtyFlags::WORLD | DirtyFlags::BOUNDS);
        self.mark_bounds_dirty(parent);
        Ok(())
    }

    /// Detach `child` from `parent`
    ///
    /// Only the old parent chain has its bounds invalidated; the detached
    /// subtree keeps its cached state until it is attached again.
    fn detach_child(&mut self, parent: K, child: K) -> EngineResult<()> {
        let parent_node = self
            .node_mut(parent)
            .ok_or_else(|| EngineError::item_not_found(format!("node {parent:?} does not exist")))?;
        let index = parent_node
            .children
            .iter()
            .position(|c| *c == child)
            .ok_or_else(|| {
                EngineError::item_not_found(format!("{child:?} is not a child of {parent:?}"))
            })?;
        parent_node.children.remove(index);

        if let Some(node) = self.node_mut(child) {
            node.parent = None;
        }
        self.mark_bounds_dirty(parent);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Minimal index-keyed arena for exercising the provided methods
    struct VecArena(Vec<Node<usize>>);

    impl VecArena {
        fn with_nodes(count: usize) -> Self {
            Self((0..count).map(|i| Node::new(format!("n{i}"))).collect())
        }
    }

    impl NodeArena<usize> for VecArena {
        fn node(&self, key: usize) -> Option<&Node<usize>> {
            self.0.get(key)
        }

        fn node_mut(&mut self, key: usize) -> Option<&mut Node<usize>> {
            self.0.get_mut(key)
        }
    }

    fn chain() -> VecArena {
        // 0 -> 1 -> 2 -> 3
        let mut arena = VecArena::with_nodes(4);
        arena.attach_child(0, 1).unwrap();
        arena.attach_child(1, 2).unwrap();
        arena.attach_child(2, 3).unwrap();
        arena
    }

    #[test]
    fn test_world_transform_composes_parent_first() {
        let mut arena = chain();
        arena.set_position(1, Vec3::new(10.0, 0.0, 0.0)).unwrap();
        arena.set_scale(1, Vec3::new(2.0, 2.0, 2.0)).unwrap();
        arena.set_position(2, Vec3::new(0.0, 5.0, 0.0)).unwrap();

        // Child offset is scaled by the parent
        let position = arena.world_position(2).unwrap();
        assert_relative_eq!(position, Vec3::new(10.0, 10.0, 0.0));
    }

    #[test]
    fn test_query_cleans_self_and_ancestors_only() {
        let mut arena = chain();
        arena.world_transform(2).unwrap();

        assert!(!arena.0[0].dirty_flags().contains(DirtyFlags::WORLD));
        assert!(!arena.0[1].dirty_flags().contains(DirtyFlags::WORLD));
        assert!(!arena.0[2].dirty_flags().contains(DirtyFlags::WORLD));
        assert!(arena.0[3].dirty_flags().contains(DirtyFlags::WORLD));
    }

    #[test]
    fn test_set_position_propagates_both_directions() {
        let mut arena = chain();
        arena.update_world_transforms(0).unwrap();
        for node in &mut arena.0 {
            node.clean(DirtyFlags::all());
        }

        arena.set_position(2, Vec3::new(1.0, 0.0, 0.0)).unwrap();

        // Ancestors: bounds only
        assert_eq!(arena.0[0].dirty_flags(), DirtyFlags::BOUNDS);
        assert_eq!(arena.0[1].dirty_flags(), DirtyFlags::BOUNDS);
        // Self and descendants: both
        assert_eq!(arena.0[2].dirty_flags(), DirtyFlags::all());
        assert_eq!(arena.0[3].dirty_flags(), DirtyFlags::all());
    }

    #[test]
    fn test_descendant_sees_parent_delta() {
        let mut arena = chain();
        arena.set_position(3, Vec3::new(0.0, 0.0, 1.0)).unwrap();
        let before = arena.world_position(3).unwrap();

        arena.set_position(1, Vec3::new(3.0, -2.0, 0.0)).unwrap();
        let after = arena.world_position(3).unwrap();

        assert_relative_eq!(after - before, Vec3::new(3.0, -2.0, 0.0));
    }

    #[test]
    fn test_world_rotation_and_scale_compose() {
        let mut arena = chain();
        let quarter = Quat::from_axis_angle(&Vec3::z_axis(), std::f32::consts::FRAC_PI_2);
        arena.set_rotation(1, quarter).unwrap();
        arena.set_scale(1, Vec3::new(2.0, 2.0, 2.0)).unwrap();
        arena.set_rotation(2, quarter).unwrap();

        let rotation = arena.world_rotation(3).unwrap();
        assert_relative_eq!(rotation.angle(), std::f32::consts::PI, epsilon = 1.0e-4);
        assert_relative_eq!(arena.world_scale(3).unwrap(), Vec3::new(2.0, 2.0, 2.0), epsilon = 1.0e-5);
    }

    #[test]
    fn test_attach_self_and_duplicate_are_noops() {
        let mut arena = chain();
        arena.attach_child(1, 1).unwrap();
        arena.attach_child(1, 2).unwrap();
        assert_eq!(arena.0[1].children(), &[2]);
    }

    #[test]
    fn test_attach_ancestor_under_descendant_is_rejected() {
        let mut arena = chain();
        let error = arena.attach_child(3, 1).unwrap_err();
        assert_eq!(error.code(), crate::core::ErrorCode::InvalidParams);
        assert_eq!(arena.0[3].children(), &[] as &[usize]);
    }

    #[test]
    fn test_attach_moves_from_previous_parent() {
        let mut arena = chain();
        arena.attach_child(0, 3).unwrap();
        assert_eq!(arena.0[2].children(), &[] as &[usize]);
        assert_eq!(arena.0[3].parent(), Some(0));
        assert_eq!(arena.0[0].children(), &[1, 3]);
    }

    #[test]
    fn test_detach_marks_old_parent_chain_bounds() {
        let mut arena = chain();
        arena.update_world_transforms(0).unwrap();
        for node in &mut arena.0 {
            node.clean(DirtyFlags::all());
        }

        arena.detach_child(2, 3).unwrap();

        assert_eq!(arena.0[3].parent(), None);
        assert_eq!(arena.0[3].dirty_flags(), DirtyFlags::empty());
        assert_eq!(arena.0[2].dirty_flags(), DirtyFlags::BOUNDS);
        assert_eq!(arena.0[0].dirty_flags(), DirtyFlags::BOUNDS);
    }

    #[test]
    fn test_detach_non_child_fails() {
        let mut arena = chain();
        let error = arena.detach_child(0, 3).unwrap_err();
        assert_eq!(error.code(), crate::core::ErrorCode::ItemNotFound);
    }
}
