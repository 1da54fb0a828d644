//! Scene manager
//!
//! Owns the scene graph, every scene object, the render queue and the light
//! queue, and runs the per-frame scene work:
//!
//! 1. [`SceneManager::update_scene_graph`]: animation, bone attachments,
//!    world transforms
//! 2. [`SceneManager::update_background_queue`]: sky boxes
//! 3. [`SceneManager::update_light_queue`] and
//!    [`SceneManager::update_render_queue`]: lights and the main buckets
//! 4. [`SceneManager::update_overlay_queue`]: sprites
//!
//! Each pass clears and refills only its own buckets.

use crate::core::{EngineError, EngineResult, SceneConfig};
use crate::events::{AnimationEvent, EventBus};
use crate::foundation::bounds::{Frustum, AABB};
use crate::foundation::math::{Mat4, Transform, Vec3};
use crate::render::factory::RenderFactory;
use crate::render::material::Material;
use crate::resources::Mesh;
use crate::scene::camera::Camera;
use crate::scene::entity::Entity;
use crate::scene::light::{Light, LightKind, LightQueue};
use crate::scene::node::{DirtyFlags, NodeArena};
use crate::scene::render_queue::{BucketFilter, BucketMask, RenderBucket, RenderOrder, RenderQueue, RenderableRef};
use crate::scene::scene_node::{ObjectArena, QueueVisit, SceneGraph};
use crate::scene::scene_object::{RenderableView, SceneObject, SceneObjectKind};
use crate::scene::sky::Sky;
use crate::scene::sprite::{Rect, Sprite};
use crate::scene::{SceneNodeId, SceneObjectId};
use std::collections::HashMap;
use std::sync::Arc;

/// Owner of the scene graph, scene objects and queues
#[derive(Debug)]
pub struct SceneManager {
    factory: Arc<RenderFactory>,
    config: SceneConfig,
    graph: SceneGraph,
    objects: ObjectArena,
    names: HashMap<String, SceneObjectId>,
    render_queue: RenderQueue,
    light_queue: LightQueue,
}

impl SceneManager {
    /// Empty scene holding only the root node
    pub fn new(factory: Arc<RenderFactory>, config: SceneConfig) -> Self {
        log::info!(
            "Scene manager created (order {:?}, culling {})",
            config.render_order,
            if config.enable_culling { "on" } else { "off" }
        );
        Self {
            factory,
            config,
            graph: SceneGraph::new(),
            objects: ObjectArena::with_key(),
            names: HashMap::new(),
            render_queue: RenderQueue::new(),
            light_queue: LightQueue::new(),
        }
    }

    /// Scene settings
    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    /// Turn frustum culling on or off
    pub fn set_culling_enabled(&mut self, enabled: bool) {
        self.config.enable_culling = enabled;
    }

    // ========================================================================
    // Scene Nodes
    // ========================================================================

    /// Root of the scene
    pub fn root_node(&self) -> SceneNodeId {
        self.graph.root()
    }

    /// Node arena, for transform edits through [`NodeArena`]
    pub fn scene_graph(&self) -> &SceneGraph {
        &self.graph
    }

    /// Mutable node arena
    pub fn scene_graph_mut(&mut self) -> &mut SceneGraph {
        &mut self.graph
    }

    /// Create a node that is not yet part of the hierarchy
    pub fn create_scene_node(&mut self, name: &str) -> SceneNodeId {
        self.graph.create_node(name)
    }

    /// Create a node below `parent`
    pub fn create_child_scene_node(&mut self, parent: SceneNodeId, name: &str) -> EngineResult<SceneNodeId> {
        self.graph.try_node(parent)?;
        let node = self.graph.create_node(name);
        self.graph.attach_child(parent, node)?;
        Ok(node)
    }

    /// Destroy `node` and its subtree; attached objects survive detached
    pub fn destroy_scene_node(&mut self, node: SceneNodeId) -> EngineResult<()> {
        let detached = self.graph.destroy_node(node)?;
        for id in &detached {
            if let Some(object) = self.objects.get_mut(*id) {
                object.set_parent_node(None);
            }
        }
        for object in self.objects.values_mut() {
            if let Some(entity) = object.as_entity_mut() {
                let dead: Vec<_> = entity
                    .bone_attachments()
                    .iter()
                    .map(|a| a.node)
                    .filter(|n| !self.graph.contains(*n))
                    .collect();
                for node in dead {
                    entity.remove_bone_attachments_to(node);
                }
            }
        }
        log::debug!("Destroyed scene node {:?}, detached {} objects", node, detached.len());
        Ok(())
    }

    /// Merged world bounds of `node` and its subtree
    pub fn node_world_bounds(&mut self, node: SceneNodeId) -> EngineResult<AABB> {
        self.graph.world_bounds(node, &self.objects)
    }

    // ========================================================================
    // Scene Objects
    // ========================================================================

    fn insert_object(&mut self, name: &str, kind: SceneObjectKind) -> EngineResult<SceneObjectId> {
        if self.names.contains_key(name) {
            return Err(EngineError::invalid_params(format!("scene object '{name}' already exists")));
        }
        log::debug!("Created {} '{}'", kind, name);
        let id = self.objects.insert(SceneObject::new(name, kind));
        self.names.insert(name.to_string(), id);
        Ok(id)
    }

    /// Instance `mesh`
    pub fn create_entity(&mut self, name: &str, mesh: Arc<Mesh>) -> EngineResult<SceneObjectId> {
        self.insert_object(name, SceneObjectKind::Entity(Entity::new(mesh)))
    }

    /// Create a light of `kind`
    pub fn create_light(&mut self, name: &str, kind: LightKind) -> EngineResult<SceneObjectId> {
        self.insert_object(name, SceneObjectKind::Light(Light::new(kind)))
    }

    /// Create a sky box of half extent `distance`
    pub fn create_sky_box(&mut self, name: &str, material: Arc<Material>, distance: f32) -> EngineResult<SceneObjectId> {
        let sky = Sky::new(&self.factory, material, distance)?;
        self.insert_object(name, SceneObjectKind::Sky(sky))
    }

    /// Create a sprite covering `rect` in pixels
    pub fn create_sprite(&mut self, name: &str, material: Arc<Material>, rect: Rect) -> EngineResult<SceneObjectId> {
        let sprite = Sprite::new(&self.factory, material, rect)?;
        self.insert_object(name, SceneObjectKind::Sprite(sprite))
    }

    /// Detach and drop an object
    ///
    /// Queue entries still naming it fail to resolve afterwards.
    pub fn destroy_scene_object(&mut self, id: SceneObjectId) -> EngineResult<()> {
        let object = self
            .objects
            .remove(id)
            .ok_or_else(|| EngineError::item_not_found(format!("scene object {id:?} does not exist")))?;
        if let Some(node) = object.parent_node() {
            self.graph.remove_object(node, id);
        }
        self.names.remove(object.name());
        log::debug!("Destroyed {} '{}'", object.kind(), object.name());
        Ok(())
    }

    /// Attach `object` to `node`
    ///
    /// Re-attaching to the same node is a no-op; an object attached
    /// elsewhere must be detached first (`ERR_INVALID_STATE`).
    pub fn attach_object(&mut self, node: SceneNodeId, object: SceneObjectId) -> EngineResult<()> {
        self.graph.try_node(node)?;
        let scene_object = self.object_entry(object)?;
        match scene_object.parent_node() {
            Some(current) if current == node => return Ok(()),
            Some(current) => {
                return Err(EngineError::invalid_state(format!(
                    "scene object '{}' is already attached to node {current:?}",
                    scene_object.name()
                )));
            }
            None => {}
        }
        self.graph.add_object(node, object)?;
        if let Some(scene_object) = self.objects.get_mut(object) {
            scene_object.set_parent_node(Some(node));
        }
        Ok(())
    }

    /// Detach `object` from its node; detached objects are left alone
    pub fn detach_object(&mut self, object: SceneObjectId) -> EngineResult<()> {
        let scene_object = self
            .objects
            .get_mut(object)
            .ok_or_else(|| EngineError::item_not_found(format!("scene object {object:?} does not exist")))?;
        if let Some(node) = scene_object.parent_node() {
            scene_object.set_parent_node(None);
            self.graph.remove_object(node, object);
        }
        Ok(())
    }

    /// Make `node` follow bone `bone_name` of `entity`
    ///
    /// The entity must be attached; `node` becomes a child of the entity's
    /// node and its local transform is overwritten with the bone transform on
    /// every scene update.
    pub fn attach_to_bone(&mut self, entity: SceneObjectId, bone_name: &str, node: SceneNodeId) -> EngineResult<()> {
        self.graph.try_node(node)?;
        let object = self.object_entry(entity)?;
        let entity_node = object.parent_node().ok_or_else(|| {
            EngineError::invalid_state(format!("entity '{}' is not attached to a scene node", object.name()))
        })?;
        let skeleton = object.as_entity().and_then(Entity::skeleton).ok_or_else(|| {
            EngineError::invalid_state(format!("'{}' is not a skinned entity", object.name()))
        })?;
        skeleton.bone_by_name(bone_name)?;

        self.graph.attach_child(entity_node, node)?;
        self.entity_mut(entity)?.add_bone_attachment(bone_name, node)?;
        Ok(())
    }

    fn object_entry(&self, id: SceneObjectId) -> EngineResult<&SceneObject> {
        self.objects
            .get(id)
            .ok_or_else(|| EngineError::item_not_found(format!("scene object {id:?} does not exist")))
    }

    /// Object by id
    pub fn object(&self, id: SceneObjectId) -> Option<&SceneObject> {
        self.objects.get(id)
    }

    /// Mutable object by id
    ///
    /// Bounds of the owning node and its ancestors are recomputed on the
    /// next query, since a light range or a material change may move them.
    pub fn object_mut(&mut self, id: SceneObjectId) -> Option<&mut SceneObject> {
        self.dirty_object_bounds(id);
        self.objects.get_mut(id)
    }

    fn dirty_object_bounds(&mut self, id: SceneObjectId) {
        if let Some(node) = self.objects.get(id).and_then(SceneObject::parent_node) {
            self.graph.mark_bounds_dirty(node);
        }
    }

    /// Object id by name
    pub fn object_by_name(&self, name: &str) -> EngineResult<SceneObjectId> {
        self.names
            .get(name)
            .copied()
            .ok_or_else(|| EngineError::item_not_found(format!("scene object '{name}' does not exist")))
    }

    /// Number of live objects
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Entity payload of `id`
    pub fn entity(&self, id: SceneObjectId) -> EngineResult<&Entity> {
        let object = self.object_entry(id)?;
        object
            .as_entity()
            .ok_or_else(|| EngineError::invalid_params(format!("'{}' is a {}, not an entity", object.name(), object.kind())))
    }

    /// Mutable entity payload of `id`
    pub fn entity_mut(&mut self, id: SceneObjectId) -> EngineResult<&mut Entity> {
        self.dirty_object_bounds(id);
        let object = self
            .objects
            .get_mut(id)
            .ok_or_else(|| EngineError::item_not_found(format!("scene object {id:?} does not exist")))?;
        let name = object.name().to_string();
        object
            .as_entity_mut()
            .ok_or_else(|| EngineError::invalid_params(format!("'{name}' is not an entity")))
    }

    /// Mutable light payload of `id`
    pub fn light_mut(&mut self, id: SceneObjectId) -> EngineResult<&mut Light> {
        self.dirty_object_bounds(id);
        let object = self
            .objects
            .get_mut(id)
            .ok_or_else(|| EngineError::item_not_found(format!("scene object {id:?} does not exist")))?;
        let name = object.name().to_string();
        object
            .as_light_mut()
            .ok_or_else(|| EngineError::invalid_params(format!("'{name}' is not a light")))
    }

    /// Mutable sprite payload of `id`
    pub fn sprite_mut(&mut self, id: SceneObjectId) -> EngineResult<&mut Sprite> {
        self.dirty_object_bounds(id);
        let object = self
            .objects
            .get_mut(id)
            .ok_or_else(|| EngineError::item_not_found(format!("scene object {id:?} does not exist")))?;
        let name = object.name().to_string();
        object
            .as_sprite_mut()
            .ok_or_else(|| EngineError::invalid_params(format!("'{name}' is not a sprite")))
    }

    // ========================================================================
    // Per-Frame Update
    // ========================================================================

    /// Advance animations, sync bone attachments and resolve world transforms
    ///
    /// Must run before any queue update of the same frame.
    pub fn update_scene_graph(&mut self, dt: f32, events: &mut EventBus<AnimationEvent>) -> EngineResult<()> {
        for (id, object) in self.objects.iter_mut() {
            if !object.is_active() {
                continue;
            }
            if let Some(entity) = object.as_entity_mut() {
                entity.update_animation(dt, id, events)?;
            }
        }

        self.sync_bone_attachments()?;

        let root = self.graph.root();
        self.graph.update_world_transforms(root)?;

        for object in self.objects.values_mut() {
            let Some(node) = object.parent_node() else {
                continue;
            };
            if let Some(entity) = object.as_entity_mut() {
                let world = self.graph.world_transform(node)?;
                let was_skinned = entity.is_skinned();
                entity.update_transforms(&world)?;
                if was_skinned || entity.is_skinned() {
                    self.graph.mark_bounds_dirty(node);
                }
            }
        }
        Ok(())
    }

    // Entities whose node moved after the scene update
    fn refresh_moved_entities(&mut self) -> EngineResult<()> {
        let moved: Vec<(SceneObjectId, SceneNodeId)> = self
            .objects
            .iter()
            .filter(|(_, object)| object.as_entity().is_some())
            .filter_map(|(id, object)| {
                let node = object.parent_node()?;
                let dirty = self.graph.get(node)?.node().dirty_flags();
                dirty.contains(DirtyFlags::WORLD).then_some((id, node))
            })
            .collect();
        for (id, node) in moved {
            let world = self.graph.world_transform(node)?;
            if let Some(entity) = self.objects.get_mut(id).and_then(SceneObject::as_entity_mut) {
                entity.update_transforms(&world)?;
            }
        }
        Ok(())
    }

    fn sync_bone_attachments(&mut self) -> EngineResult<()> {
        for object in self.objects.values_mut() {
            let Some(entity) = object.as_entity_mut() else {
                continue;
            };
            let attachments = entity.bone_attachments().to_vec();
            for attachment in attachments {
                if !self.graph.contains(attachment.node) {
                    continue;
                }
                let bone_transform = entity.bone_transform(attachment.bone)?;
                self.graph
                    .set_transform(attachment.node, Transform::from_matrix(&bone_transform))?;
            }
        }
        Ok(())
    }

    fn visit(&mut self, visit: &QueueVisit) -> EngineResult<()> {
        let root = self.graph.root();
        self.graph
            .update_render_queues(root, &self.objects, &mut self.render_queue, visit)
    }

    /// Refill the Opaque, Transparent and Translucent buckets for `camera`
    ///
    /// Entities on nodes moved since [`SceneManager::update_scene_graph`]
    /// get their transforms rebuilt here; bone poses are not re-evaluated.
    pub fn update_render_queue(&mut self, camera: &Camera, order: RenderOrder) -> EngineResult<()> {
        self.refresh_moved_entities()?;
        self.render_queue.clear_buckets(RenderBucket::MAIN_PASS);
        let visit = QueueVisit {
            frustum: camera.frustum(),
            camera_position: camera.position,
            order,
            filter: BucketFilter::only(RenderBucket::MAIN_PASS),
            culling: self.config.enable_culling,
        };
        self.visit(&visit)
    }

    /// Center sky boxes on `camera` and refill the Background bucket
    pub fn update_background_queue(&mut self, camera: &Camera) -> EngineResult<()> {
        for object in self.objects.values_mut() {
            if let Some(sky) = object.as_sky_mut() {
                sky.follow_camera(&camera.position);
            }
        }
        self.render_queue.clear_queue(RenderBucket::Background);
        let visit = QueueVisit {
            frustum: camera.frustum(),
            camera_position: camera.position,
            order: RenderOrder::StateChange,
            filter: BucketFilter::only(BucketMask::BACKGROUND),
            culling: false,
        };
        self.visit(&visit)
    }

    /// Refill the Overlay bucket with sprites, ordered by z-order
    pub fn update_overlay_queue(&mut self) -> EngineResult<()> {
        self.render_queue.clear_queue(RenderBucket::Overlay);
        let visit = QueueVisit {
            frustum: Frustum::from_matrix(&Mat4::identity()),
            camera_position: Vec3::zeros(),
            order: RenderOrder::StateChange,
            filter: BucketFilter::only(BucketMask::OVERLAY),
            culling: false,
        };
        self.visit(&visit)
    }

    /// Collect the lights affecting `camera`
    pub fn update_light_queue(&mut self, camera: &Camera) -> EngineResult<()> {
        self.light_queue.clear();
        let frustum = camera.frustum();
        let root = self.graph.root();
        for (id, object) in &self.objects {
            let (Some(light), Some(node)) = (object.as_light(), object.parent_node()) else {
                continue;
            };
            if !object.is_active() || !self.graph.is_ancestor(root, node) {
                continue;
            }
            let params = light.params(&self.graph.world_transform(node)?);
            if Light::affects(&params, &frustum) {
                self.light_queue.push(id, params);
            }
        }
        Ok(())
    }

    /// Render queue of the current frame
    pub fn render_queue(&self) -> &RenderQueue {
        &self.render_queue
    }

    /// Mutable render queue, for sorting buckets
    pub fn render_queue_mut(&mut self) -> &mut RenderQueue {
        &mut self.render_queue
    }

    /// Lights of the current frame
    pub fn light_queue(&self) -> &LightQueue {
        &self.light_queue
    }

    /// Draw view of a queued handle; `None` once its object is gone
    pub fn resolve_renderable(&self, renderable: &RenderableRef) -> Option<RenderableView<'_>> {
        self.objects.get(renderable.object())?.renderable_view(renderable)
    }
}
