use super::support;
use crate::core::ErrorCode;
use crate::foundation::math::Vec3;
use crate::scene::{LightKind, NodeArena};
use approx::assert_relative_eq;

#[test]
fn test_grandchild_follows_moved_parent() {
    let (_factory, mut scene) = support::scene();
    let root = scene.root_node();
    let a = scene.create_child_scene_node(root, "A").unwrap();
    let b = scene.create_child_scene_node(a, "B").unwrap();
    let graph = scene.scene_graph_mut();
    graph.set_position(a, Vec3::new(10.0, 0.0, 0.0)).unwrap();
    graph.set_position(b, Vec3::new(0.0, 5.0, 0.0)).unwrap();

    assert_relative_eq!(graph.world_position(b).unwrap(), Vec3::new(10.0, 5.0, 0.0));

    graph.set_position(a, Vec3::new(20.0, 0.0, 0.0)).unwrap();
    assert_relative_eq!(graph.world_position(b).unwrap(), Vec3::new(20.0, 5.0, 0.0));
}

#[test]
fn test_parent_move_invalidates_ancestor_bounds() {
    let (factory, mut scene) = support::scene();
    let root = scene.root_node();
    let a = scene.create_child_scene_node(root, "A").unwrap();
    let b = scene.create_child_scene_node(a, "B").unwrap();
    let crate_box = scene.create_entity("crate", support::box_mesh(&factory, "crate", None)).unwrap();
    scene.attach_object(b, crate_box).unwrap();

    let before = scene.node_world_bounds(root).unwrap();
    assert_relative_eq!(before.center(), Vec3::zeros());

    scene.scene_graph_mut().set_position(b, Vec3::new(0.0, 3.0, 0.0)).unwrap();
    let after = scene.node_world_bounds(root).unwrap();
    assert_relative_eq!(after.center(), Vec3::new(0.0, 3.0, 0.0));
    assert_relative_eq!(scene.node_world_bounds(a).unwrap().center(), Vec3::new(0.0, 3.0, 0.0));
}

#[test]
fn test_object_attaches_to_one_node_at_a_time() {
    let (_factory, mut scene) = support::scene();
    let root = scene.root_node();
    let a = scene.create_child_scene_node(root, "A").unwrap();
    let b = scene.create_child_scene_node(root, "B").unwrap();
    let lamp = scene.create_light("lamp", LightKind::Point).unwrap();

    scene.attach_object(a, lamp).unwrap();
    scene.attach_object(a, lamp).unwrap();
    assert_eq!(scene.scene_graph().get(a).unwrap().objects(), &[lamp]);

    let error = scene.attach_object(b, lamp).unwrap_err();
    assert_eq!(error.code(), ErrorCode::InvalidState);

    scene.detach_object(lamp).unwrap();
    scene.attach_object(b, lamp).unwrap();
    assert!(scene.scene_graph().get(a).unwrap().objects().is_empty());
    assert_eq!(scene.object(lamp).unwrap().parent_node(), Some(b));
}

#[test]
fn test_object_names_are_unique() {
    let (_factory, mut scene) = support::scene();
    let sun = scene.create_light("sun", LightKind::Directional).unwrap();
    let error = scene.create_light("sun", LightKind::Point).unwrap_err();
    assert_eq!(error.code(), ErrorCode::InvalidParams);
    assert_eq!(scene.object_by_name("sun").unwrap(), sun);

    scene.destroy_scene_object(sun).unwrap();
    assert_eq!(scene.object_by_name("sun").unwrap_err().code(), ErrorCode::ItemNotFound);
    scene.create_light("sun", LightKind::Directional).unwrap();
}

#[test]
fn test_destroying_node_detaches_subtree_objects() {
    let (_factory, mut scene) = support::scene();
    let root = scene.root_node();
    let a = scene.create_child_scene_node(root, "A").unwrap();
    let b = scene.create_child_scene_node(a, "B").unwrap();
    let lamp = scene.create_light("lamp", LightKind::Point).unwrap();
    scene.attach_object(b, lamp).unwrap();

    scene.destroy_scene_node(a).unwrap();
    assert!(!scene.scene_graph().contains(a));
    assert!(!scene.scene_graph().contains(b));
    assert!(scene.scene_graph().get(root).unwrap().node().children().is_empty());
    assert_eq!(scene.object(lamp).unwrap().parent_node(), None);

    let error = scene.destroy_scene_node(root).unwrap_err();
    assert_eq!(error.code(), ErrorCode::InvalidParams);
}

#[test]
fn test_cycle_is_rejected() {
    let (_factory, mut scene) = support::scene();
    let root = scene.root_node();
    let a = scene.create_child_scene_node(root, "A").unwrap();
    let b = scene.create_child_scene_node(a, "B").unwrap();
    let error = scene.scene_graph_mut().attach_child(b, a).unwrap_err();
    assert_eq!(error.code(), ErrorCode::InvalidParams);
}
