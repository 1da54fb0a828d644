//! Scene objects
//!
//! Everything that can be attached to a scene node: entities, lights, sky
//! boxes and sprites. Objects live in the scene manager's arena and refer to
//! their node by id.

use crate::foundation::bounds::AABB;
use crate::foundation::math::Mat4;
use crate::render::material::Material;
use crate::render::render_operation::RenderOperation;
use crate::render::renderable::Renderable;
use crate::scene::entity::Entity;
use crate::scene::light::Light;
use crate::scene::render_queue::{RenderBucket, RenderQueue, RenderQueueItem, RenderableRef, SortKey};
use crate::scene::scene_node::QueueVisit;
use crate::scene::sky::Sky;
use crate::scene::sprite::Sprite;
use crate::scene::{SceneNodeId, SceneObjectId};
use std::fmt;
use std::sync::Arc;

/// Concrete object payload
#[derive(Debug, Clone)]
pub enum SceneObjectKind {
    /// Mesh instance
    Entity(Entity),
    /// Light source
    Light(Light),
    /// Background cube
    Sky(Sky),
    /// Screen-space quad
    Sprite(Sprite),
}

impl fmt::Display for SceneObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SceneObjectKind::Entity(_) => "Entity",
            SceneObjectKind::Light(_) => "Light",
            SceneObjectKind::Sky(_) => "Sky",
            SceneObjectKind::Sprite(_) => "Sprite",
        };
        f.write_str(name)
    }
}

/// Named object with activity flags and an optional parent node
#[derive(Debug, Clone)]
pub struct SceneObject {
    name: String,
    kind: SceneObjectKind,
    active: bool,
    parent_node: Option<SceneNodeId>,
}

impl SceneObject {
    pub(crate) fn new(name: impl Into<String>, kind: SceneObjectKind) -> Self {
        Self {
            name: name.into(),
            kind,
            active: true,
            parent_node: None,
        }
    }

    /// Unique name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Payload
    pub fn kind(&self) -> &SceneObjectKind {
        &self.kind
    }

    /// Mutable payload
    pub fn kind_mut(&mut self) -> &mut SceneObjectKind {
        &mut self.kind
    }

    /// Whether the object takes part in updates and queues
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Enable or disable the object
    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    /// Whether the object produces draws; lights do not
    pub fn is_renderable(&self) -> bool {
        !matches!(self.kind, SceneObjectKind::Light(_))
    }

    /// Node the object is attached to
    pub fn parent_node(&self) -> Option<SceneNodeId> {
        self.parent_node
    }

    pub(crate) fn set_parent_node(&mut self, node: Option<SceneNodeId>) {
        self.parent_node = node;
    }

    /// Entity payload
    pub fn as_entity(&self) -> Option<&Entity> {
        match &self.kind {
            SceneObjectKind::Entity(entity) => Some(entity),
            _ => None,
        }
    }

    /// Mutable entity payload
    pub fn as_entity_mut(&mut self) -> Option<&mut Entity> {
        match &mut self.kind {
            SceneObjectKind::Entity(entity) => Some(entity),
            _ => None,
        }
    }

    /// Light payload
    pub fn as_light(&self) -> Option<&Light> {
        match &self.kind {
            SceneObjectKind::Light(light) => Some(light),
            _ => None,
        }
    }

    /// Mutable light payload
    pub fn as_light_mut(&mut self) -> Option<&mut Light> {
        match &mut self.kind {
            SceneObjectKind::Light(light) => Some(light),
            _ => None,
        }
    }

    /// Mutable sky payload
    pub fn as_sky_mut(&mut self) -> Option<&mut Sky> {
        match &mut self.kind {
            SceneObjectKind::Sky(sky) => Some(sky),
            _ => None,
        }
    }

    /// Sprite payload
    pub fn as_sprite(&self) -> Option<&Sprite> {
        match &self.kind {
            SceneObjectKind::Sprite(sprite) => Some(sprite),
            _ => None,
        }
    }

    /// Mutable sprite payload
    pub fn as_sprite_mut(&mut self) -> Option<&mut Sprite> {
        match &mut self.kind {
            SceneObjectKind::Sprite(sprite) => Some(sprite),
            _ => None,
        }
    }

    /// World bounds when attached to a node with transform `world`
    ///
    /// Sky boxes and sprites report empty bounds and never cull their node.
    pub fn world_bounds(&self, world: &Mat4) -> AABB {
        match &self.kind {
            SceneObjectKind::Entity(entity) => entity.world_bounds(world),
            SceneObjectKind::Light(light) => light.world_bounds(world),
            SceneObjectKind::Sky(_) | SceneObjectKind::Sprite(_) => AABB::empty(),
        }
    }

    /// Queue this object's draws that pass `visit`
    pub fn on_update_render_queue(&self, id: SceneObjectId, world: &Mat4, queue: &mut RenderQueue, visit: &QueueVisit) {
        match &self.kind {
            SceneObjectKind::Entity(entity) => {
                for sub in entity.sub_entities().iter().filter(|s| s.is_visible()) {
                    let bucket = sub.material().queue();
                    if !visit.filter.allows(bucket) {
                        continue;
                    }
                    let bounds = entity.part_world_bounds(sub.part(), world);
                    if !visit.may_see(&bounds) {
                        continue;
                    }
                    let sort_key =
                        visit
                            .order
                            .sort_key(bucket, sub.material().effect().id(), &bounds, &visit.camera_position);
                    let renderable = RenderableRef::SubEntity { object: id, part: sub.part() };
                    queue.add_to_queue(RenderQueueItem { renderable, sort_key }, bucket);
                }
            }
            SceneObjectKind::Sky(_) => {
                if visit.filter.allows(RenderBucket::Background) {
                    let item = RenderQueueItem { renderable: RenderableRef::Sky(id), sort_key: SortKey::default() };
                    queue.add_to_queue(item, RenderBucket::Background);
                }
            }
            SceneObjectKind::Sprite(sprite) => {
                if visit.filter.allows(RenderBucket::Overlay) {
                    let item = RenderQueueItem {
                        renderable: RenderableRef::Sprite(id),
                        sort_key: SortKey::depth(sprite.z_order() as f32),
                    };
                    queue.add_to_queue(item, RenderBucket::Overlay);
                }
            }
            SceneObjectKind::Light(_) => {}
        }
    }

    /// Draw view for `renderable`, if it names a part of this object
    pub fn renderable_view(&self, renderable: &RenderableRef) -> Option<RenderableView<'_>> {
        match (&self.kind, renderable) {
            (SceneObjectKind::Entity(entity), RenderableRef::SubEntity { part, .. }) => {
                let sub = entity.sub_entity(*part)?;
                let mesh_part = entity.mesh().parts().get(sub.part())?;
                Some(RenderableView {
                    material: sub.material(),
                    operation: mesh_part.render_operation(),
                    world_transforms: entity.world_transforms(),
                })
            }
            (SceneObjectKind::Sky(sky), RenderableRef::Sky(_)) => Some(RenderableView {
                material: sky.material(),
                operation: sky.render_operation(),
                world_transforms: sky.world_transforms(),
            }),
            (SceneObjectKind::Sprite(sprite), RenderableRef::Sprite(_)) => Some(RenderableView {
                material: sprite.material(),
                operation: sprite.render_operation(),
                world_transforms: sprite.world_transforms(),
            }),
            _ => None,
        }
    }
}

/// Borrowed material, geometry and transforms of one queued draw
#[derive(Debug, Clone, Copy)]
pub struct RenderableView<'a> {
    material: &'a Arc<Material>,
    operation: &'a RenderOperation,
    world_transforms: &'a [Mat4],
}

impl Renderable for RenderableView<'_> {
    fn material(&self) -> &Arc<Material> {
        self.material
    }

    fn render_operation(&self) -> &RenderOperation {
        self.operation
    }

    fn world_transforms(&self) -> &[Mat4] {
        self.world_transforms
    }
}
