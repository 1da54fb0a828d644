use super::support;
use crate::core::ErrorCode;
use crate::events::{AnimationEventKind, EventBus};
use crate::foundation::math::{Mat4, Vec3};
use crate::render::renderable::Renderable;
use crate::resources::BoneId;
use crate::scene::{NodeArena, RenderableRef, SceneManager, SceneNodeId, SceneObjectId};
use approx::assert_relative_eq;
use std::sync::Arc;

fn skinned_scene() -> (SceneManager, SceneNodeId, SceneObjectId) {
    let (factory, mut scene) = support::scene();
    let root = scene.root_node();
    let node = scene.create_child_scene_node(root, "body").unwrap();
    scene.scene_graph_mut().set_position(node, Vec3::new(2.0, 0.0, 0.0)).unwrap();
    let mesh = support::box_mesh(&factory, "arm", Some(support::arm_skeleton()));
    let arm = scene.create_entity("arm", mesh).unwrap();
    scene.attach_object(node, arm).unwrap();
    scene.entity_mut(arm).unwrap().add_animation(Arc::new(support::raise_clip())).unwrap();
    (scene, node, arm)
}

fn transforms_of(scene: &SceneManager, arm: SceneObjectId) -> Vec<Mat4> {
    let part = RenderableRef::SubEntity { object: arm, part: 0 };
    scene.resolve_renderable(&part).unwrap().world_transforms().to_vec()
}

#[test]
fn test_animated_entity_submits_skin_then_world() {
    let (mut scene, node, arm) = skinned_scene();
    let mut events = EventBus::new();
    scene.entity_mut(arm).unwrap().animation_player_mut().play("raise").unwrap();
    scene.update_scene_graph(0.0, &mut events).unwrap();
    scene.update_scene_graph(0.5, &mut events).unwrap();

    let transforms = transforms_of(&scene, arm);
    assert_eq!(transforms.len(), 3);
    let world = scene.scene_graph_mut().world_transform(node).unwrap();
    assert_eq!(transforms[2], world);

    let skeleton = scene.entity_mut(arm).unwrap().skeleton_mut().unwrap();
    for index in 0..2 {
        let bone = BoneId(index);
        let expected = skeleton.world_transform(bone).unwrap() * skeleton.bone(bone).unwrap().offset();
        assert_relative_eq!(transforms[index], expected, epsilon = 1e-6);
    }
    assert_relative_eq!(transforms[0], Mat4::identity(), epsilon = 1e-6);
    assert!((transforms[1] - Mat4::identity()).norm() > 0.1);
}

#[test]
fn test_animation_events_and_idle_fallback() {
    let (mut scene, node, arm) = skinned_scene();
    let mut events = EventBus::new();
    scene.entity_mut(arm).unwrap().animation_player_mut().play("raise").unwrap();

    scene.update_scene_graph(0.0, &mut events).unwrap();
    let begun = events.drain();
    assert_eq!(begun.len(), 1);
    assert_eq!(begun[0].kind, AnimationEventKind::Begin);
    assert_eq!(begun[0].entity, arm);
    assert_eq!(begun[0].clip, "raise");

    scene.update_scene_graph(2.0, &mut events).unwrap();
    let ended = events.drain();
    assert_eq!(ended.len(), 1);
    assert_eq!(ended[0].kind, AnimationEventKind::End);

    scene.update_scene_graph(0.1, &mut events).unwrap();
    let world = scene.scene_graph_mut().world_transform(node).unwrap();
    let transforms = transforms_of(&scene, arm);
    assert_eq!(transforms.len(), 3);
    assert!(transforms.iter().all(|m| *m == world));
}

#[test]
fn test_bone_attachment_follows_bone() {
    let (mut scene, _node, arm) = skinned_scene();
    let hand = scene.create_scene_node("hand");
    scene.attach_to_bone(arm, "elbow", hand).unwrap();

    let mut events = EventBus::new();
    scene.update_scene_graph(0.0, &mut events).unwrap();
    assert_relative_eq!(
        scene.scene_graph_mut().world_position(hand).unwrap(),
        Vec3::new(2.0, 2.0, 0.0),
        epsilon = 1e-5
    );

    let elbow = BoneId(1);
    scene
        .entity_mut(arm)
        .unwrap()
        .skeleton_mut()
        .unwrap()
        .set_position(elbow, Vec3::new(0.0, 3.0, 0.0))
        .unwrap();
    scene.update_scene_graph(0.0, &mut events).unwrap();
    assert_relative_eq!(
        scene.scene_graph_mut().world_position(hand).unwrap(),
        Vec3::new(2.0, 3.0, 0.0),
        epsilon = 1e-5
    );
}

#[test]
fn test_bone_attachment_errors() {
    let (factory, mut scene) = support::scene();
    let hand = scene.create_scene_node("hand");
    let mesh = support::box_mesh(&factory, "arm", Some(support::arm_skeleton()));
    let arm = scene.create_entity("arm", mesh).unwrap();

    let error = scene.attach_to_bone(arm, "elbow", hand).unwrap_err();
    assert_eq!(error.code(), ErrorCode::InvalidState);

    let root = scene.root_node();
    scene.attach_object(root, arm).unwrap();
    let error = scene.attach_to_bone(arm, "wrist", hand).unwrap_err();
    assert_eq!(error.code(), ErrorCode::ItemNotFound);

    scene.attach_to_bone(arm, "elbow", hand).unwrap();
    scene.destroy_scene_node(hand).unwrap();
    assert!(scene.entity(arm).unwrap().bone_attachments().is_empty());
}

#[test]
fn test_node_bounds_follow_the_pose() {
    let (mut scene, node, arm) = skinned_scene();
    let mut events = EventBus::new();
    scene.update_scene_graph(0.0, &mut events).unwrap();
    let bind = scene.node_world_bounds(node).unwrap();
    assert_relative_eq!(bind.max, Vec3::new(3.0, 1.0, 1.0));

    scene.entity_mut(arm).unwrap().animation_player_mut().play("raise").unwrap();
    scene.update_scene_graph(0.0, &mut events).unwrap();
    scene.update_scene_graph(0.5, &mut events).unwrap();
    let posed = scene.node_world_bounds(node).unwrap();
    assert!(posed.max.x - posed.min.x > 3.0);
    let root = scene.root_node();
    assert_eq!(scene.node_world_bounds(root).unwrap(), posed);
}
