//! Shared fixtures for scene tests

use crate::core::SceneConfig;
use crate::foundation::bounds::AABB;
use crate::foundation::math::{Mat4, Quat, Transform, Vec3};
use crate::render::effect::{Effect, EffectDesc};
use crate::render::factory::RenderFactory;
use crate::render::geometry;
use crate::render::material::Material;
use crate::resources::{AnimationClip, BoneTrack, Keyframe, Mesh, MeshPart, Skeleton};
use crate::scene::{Camera, RenderBucket, SceneManager};
use std::sync::Arc;

/// Effect with world, view-projection, skin, diffuse and light parameters
pub fn effect(factory: &RenderFactory, name: &str) -> Arc<Effect> {
    let desc: EffectDesc = ron::from_str(&format!(
        r#"EffectDesc(
            name: "{name}",
            parameters: [
                (name: "World", type: Matrix4, semantic: Some("WorldMatrix")),
                (name: "ViewProj", type: Matrix4, semantic: Some("ViewProjectionMatrix")),
                (name: "Skin", type: Matrix4Array, semantic: Some("SkinMatrices")),
                (name: "Diffuse", type: Float4, semantic: Some("Material_Diffuse_Color")),
                (name: "LightColor", type: Float3, semantic: Some("Light_Color")),
            ],
            techniques: [(name: "Default", passes: [(name: "P0")])],
        )"#
    ))
    .unwrap();
    Arc::new(Effect::from_desc(&desc, factory).unwrap())
}

/// Material drawn in `bucket`
pub fn material(factory: &RenderFactory, name: &str, bucket: RenderBucket) -> Arc<Material> {
    Arc::new(
        Material::builder(name, effect(factory, name))
            .queue(bucket)
            .build(factory.default_texture()),
    )
}

/// One-part cube mesh spanning -1..1
pub fn box_mesh(factory: &RenderFactory, name: &str, skeleton: Option<Skeleton>) -> Arc<Mesh> {
    let part = MeshPart::new(
        "body",
        material(factory, &format!("{name}_body"), RenderBucket::Opaque),
        geometry::unit_cube_bounds(),
        geometry::unit_cube(factory).unwrap(),
    );
    Arc::new(Mesh::new(name, vec![part], skeleton.map(Arc::new)))
}

/// Two-part mesh: `near` around the origin and `far` 100 units along +X
pub fn split_mesh(factory: &RenderFactory) -> Arc<Mesh> {
    let operation = geometry::unit_cube(factory).unwrap();
    let near = MeshPart::new(
        "near",
        material(factory, "near", RenderBucket::Opaque),
        geometry::unit_cube_bounds(),
        operation.clone(),
    );
    let far = MeshPart::new(
        "far",
        material(factory, "far", RenderBucket::Opaque),
        AABB::new(Vec3::new(99.0, -1.0, -1.0), Vec3::new(101.0, 1.0, 1.0)),
        operation,
    );
    Arc::new(Mesh::new("split", vec![near, far], None))
}

/// Two bones: `shoulder` at the origin, `elbow` two units above
pub fn arm_skeleton() -> Skeleton {
    let mut skeleton = Skeleton::new("arm");
    let shoulder = skeleton
        .add_bone("shoulder", None, Transform::identity(), Mat4::identity())
        .unwrap();
    skeleton
        .add_bone("elbow", Some(shoulder), Transform::from_position(Vec3::new(0.0, 2.0, 0.0)), Mat4::identity())
        .unwrap();
    skeleton.compute_offsets_from_bind_pose().unwrap();
    skeleton
}

/// One-second clip bending the elbow a quarter turn about Z
pub fn raise_clip() -> AnimationClip {
    let bent = Quat::from_axis_angle(&Vec3::z_axis(), std::f32::consts::FRAC_PI_2);
    let keys = vec![
        Keyframe { time: 0.0, transform: Transform::from_position(Vec3::new(0.0, 2.0, 0.0)) },
        Keyframe { time: 1.0, transform: Transform::new(Vec3::new(0.0, 2.0, 0.0), bent, Vec3::new(1.0, 1.0, 1.0)) },
    ];
    let mut clip = AnimationClip::new("raise", 1.0);
    clip.add_track(BoneTrack::new("elbow", keys).unwrap());
    clip
}

/// Camera at +Z looking at the origin
pub fn camera() -> Camera {
    Camera::perspective(Vec3::new(0.0, 0.0, 10.0), 60.0, 1.0, 0.1, 100.0)
}

/// Scene with culling enabled
pub fn scene() -> (Arc<RenderFactory>, SceneManager) {
    let factory = Arc::new(RenderFactory::default());
    let scene = SceneManager::new(factory.clone(), SceneConfig::default());
    (factory, scene)
}
