//! Scene nodes and render-queue population
//!
//! [`SceneGraph`] owns every [`SceneNode`] in a slot map. Each scene node is
//! a transform [`Node`] plus the scene objects attached to it and the cached
//! union of their world bounds with those of its children.
//!
//! Queue population walks the graph top-down: a node whose merged bounds
//! miss the frustum is skipped along with its whole subtree, otherwise each
//! active renderable object queues itself and the children are visited.

use crate::core::{EngineError, EngineResult};
use crate::foundation::bounds::{Frustum, AABB};
use crate::foundation::math::{Mat4, Vec3};
use crate::scene::node::{DirtyFlags, Node, NodeArena};
use crate::scene::render_queue::{BucketFilter, RenderOrder, RenderQueue};
use crate::scene::scene_object::SceneObject;
use crate::scene::{SceneNodeId, SceneObjectId};
use slotmap::SlotMap;

/// Arena of scene objects
pub type ObjectArena = SlotMap<SceneObjectId, SceneObject>;

/// Node + attached objects + merged world bounds
#[derive(Debug, Clone)]
pub struct SceneNode {
    node: Node<SceneNodeId>,
    objects: Vec<SceneObjectId>,
    world_bounds: AABB,
}

impl SceneNode {
    fn new(name: &str) -> Self {
        Self {
            node: Node::new(name),
            objects: Vec::new(),
            world_bounds: AABB::empty(),
        }
    }

    /// Transform node
    pub fn node(&self) -> &Node<SceneNodeId> {
        &self.node
    }

    /// Attached objects in attach order
    pub fn objects(&self) -> &[SceneObjectId] {
        &self.objects
    }

    /// Last computed world bounds; may be stale
    pub fn cached_world_bounds(&self) -> &AABB {
        &self.world_bounds
    }
}

/// Parameters of one queue population pass
#[derive(Debug, Clone)]
pub struct QueueVisit {
    /// View frustum in world space
    pub frustum: Frustum,
    /// Eye position for distance keys
    pub camera_position: Vec3,
    /// Sort policy
    pub order: RenderOrder,
    /// Buckets this pass fills
    pub filter: BucketFilter,
    /// Whether bounds are tested at all
    pub culling: bool,
}

impl QueueVisit {
    /// Whether `bounds` may be visible; empty bounds are never culled
    pub fn may_see(&self, bounds: &AABB) -> bool {
        !self.culling || bounds.is_empty() || self.frustum.intersects_aabb(bounds)
    }
}

/// Slot-map arena of scene nodes with a fixed root
#[derive(Debug)]
pub struct SceneGraph {
    nodes: SlotMap<SceneNodeId, SceneNode>,
    root: SceneNodeId,
}

impl NodeArena<SceneNodeId> for SceneGraph {
    fn node(&self, key: SceneNodeId) -> Option<&Node<SceneNodeId>> {
        self.nodes.get(key).map(|n| &n.node)
    }

    fn node_mut(&mut self, key: SceneNodeId) -> Option<&mut Node<SceneNodeId>> {
        self.nodes.get_mut(key).map(|n| &mut n.node)
    }
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneGraph {
    /// Graph containing only the root node
    pub fn new() -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(SceneNode::new("Root"));
        Self { nodes, root }
    }

    /// Root node
    pub fn root(&self) -> SceneNodeId {
        self.root
    }

    /// Create a detached node
    pub fn create_node(&mut self, name: &str) -> SceneNodeId {
        self.nodes.insert(SceneNode::new(name))
    }

    /// Scene node by id
    pub fn get(&self, id: SceneNodeId) -> Option<&SceneNode> {
        self.nodes.get(id)
    }

    /// Whether `id` is alive
    pub fn contains(&self, id: SceneNodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Number of nodes including the root
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false; the root cannot be destroyed
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Destroy `id` and its subtree, returning the objects that were attached
    pub fn destroy_node(&mut self, id: SceneNodeId) -> EngineResult<Vec<SceneObjectId>> {
        if id == self.root {
            return Err(EngineError::invalid_params("the root scene node cannot be destroyed"));
        }
        if let Some(parent) = self.try_node(id)?.parent() {
            self.detach_child(parent, id)?;
        }

        let mut detached = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(scene_node) = self.nodes.remove(current) {
                detached.extend(scene_node.objects);
                stack.extend(scene_node.node.children().iter().copied());
            }
        }
        Ok(detached)
    }

    /// Record `object` as attached to `node`
    pub(crate) fn add_object(&mut self, node: SceneNodeId, object: SceneObjectId) -> EngineResult<()> {
        let scene_node = self
            .nodes
            .get_mut(node)
            .ok_or_else(|| EngineError::item_not_found(format!("scene node {node:?} does not exist")))?;
        scene_node.objects.push(object);
        self.mark_bounds_dirty(node);
        Ok(())
    }

    /// Forget `object` on `node`; returns false if it was not attached there
    pub(crate) fn remove_object(&mut self, node: SceneNodeId, object: SceneObjectId) -> bool {
        let Some(scene_node) = self.nodes.get_mut(node) else {
            return false;
        };
        let before = scene_node.objects.len();
        scene_node.objects.retain(|o| *o != object);
        let removed = scene_node.objects.len() != before;
        if removed {
            self.mark_bounds_dirty(node);
        }
        removed
    }

    /// Merged world bounds of `id`: attached objects and all children
    ///
    /// Recomputed only while the node's `BOUNDS` bit is set.
    pub fn world_bounds(&mut self, id: SceneNodeId, objects: &ObjectArena) -> EngineResult<AABB> {
        let scene_node = self
            .nodes
            .get(id)
            .ok_or_else(|| EngineError::item_not_found(format!("scene node {id:?} does not exist")))?;
        if !scene_node.node.dirty_flags().contains(DirtyFlags::BOUNDS) {
            return Ok(scene_node.world_bounds);
        }
        let attached = scene_node.objects.clone();
        let children = scene_node.node.children().to_vec();

        let world = self.world_transform(id)?;
        let mut bounds = AABB::empty();
        for object in attached.iter().filter_map(|o| objects.get(*o)) {
            bounds.merge(&object.world_bounds(&world));
        }
        for child in children {
            bounds.merge(&self.world_bounds(child, objects)?);
        }

        if let Some(scene_node) = self.nodes.get_mut(id) {
            scene_node.world_bounds = bounds;
            scene_node.node.clean(DirtyFlags::BOUNDS);
        }
        Ok(bounds)
    }

    /// Queue the visible content of `id` and its subtree
    pub fn update_render_queues(
        &mut self,
        id: SceneNodeId,
        objects: &ObjectArena,
        queue: &mut RenderQueue,
        visit: &QueueVisit,
    ) -> EngineResult<()> {
        let bounds = self.world_bounds(id, objects)?;
        if !visit.may_see(&bounds) {
            log::trace!("Culled scene node {:?}", id);
            return Ok(());
        }

        let world: Mat4 = self.world_transform(id)?;
        let Some(scene_node) = self.nodes.get(id) else {
            return Ok(());
        };
        for object_id in &scene_node.objects {
            if let Some(object) = objects.get(*object_id) {
                if object.is_active() && object.is_renderable() {
                    object.on_update_render_queue(*object_id, &world, queue, visit);
                }
            }
        }

        let children = scene_node.node.children().to_vec();
        for child in children {
            self.update_render_queues(child, objects, queue, visit)?;
        }
        Ok(())
    }
}
