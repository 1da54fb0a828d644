//! Procedural demo scene
//!
//! Everything is built in code so the viewer runs without a media directory:
//! a sky box, a ring of crates with two glass ones, a skinned arm holding a
//! lantern, a sun, an orbiting point light and a HUD sprite.

use rc_engine::foundation::math::Vec4;
use rc_engine::prelude::*;
use rc_engine::render::effect::{Effect, EffectDesc};
use rc_engine::render::geometry;
use rc_engine::resources::{AnimationClip, BoneTrack, Keyframe, MeshPart, Skeleton};
use rc_engine::scene::{SceneNodeId, SceneObjectId};
use std::sync::Arc;

const CRATE_RING_SIZE: usize = 8;
const CRATE_RING_RADIUS: f32 = 6.0;

/// Handles the viewer animates after setup
pub struct DemoScene {
    /// Node carrying the orbiting point light
    pub lamp_node: SceneNodeId,
    /// Skinned arm entity
    pub arm: SceneObjectId,
    /// HUD sprite
    pub hud: SceneObjectId,
}

fn model_effect(factory: &RenderFactory, name: &str) -> EngineResult<Arc<Effect>> {
    let desc: EffectDesc = ron::from_str(&format!(
        r#"EffectDesc(
            name: "{name}",
            parameters: [
                (name: "World", type: Matrix4, semantic: Some("WorldMatrix")),
                (name: "ViewProj", type: Matrix4, semantic: Some("ViewProjectionMatrix")),
                (name: "Skin", type: Matrix4Array, semantic: Some("SkinMatrices")),
                (name: "Eye", type: Float3, semantic: Some("CameraPosition")),
                (name: "Diffuse", type: Float4, semantic: Some("Material_Diffuse_Color")),
                (name: "DiffuseMap", type: Texture, semantic: Some("Material_DiffuseMap")),
                (name: "LightColor", type: Float3, semantic: Some("Light_Color")),
                (name: "LightDir", type: Float3, semantic: Some("Light_Direction")),
            ],
            techniques: [(name: "Default", passes: [
                (name: "P0", shaders: [(Vertex, "{name}.vs"), (Pixel, "{name}.ps")]),
            ])],
        )"#
    ))?;
    Ok(Arc::new(Effect::from_desc(&desc, factory)?))
}

fn material(factory: &RenderFactory, name: &str, bucket: RenderBucket, diffuse: Vec4) -> EngineResult<Arc<Material>> {
    let material = Material::builder(name, model_effect(factory, name)?)
        .queue(bucket)
        .diffuse(diffuse)
        .build(factory.default_texture());
    Ok(Arc::new(material))
}

fn cube_mesh(factory: &RenderFactory, name: &str, skeleton: Option<Skeleton>) -> EngineResult<Arc<Mesh>> {
    let part = MeshPart::new(
        "body",
        material(factory, &format!("{name}_body"), RenderBucket::Opaque, Vec4::new(0.8, 0.6, 0.4, 1.0))?,
        geometry::unit_cube_bounds(),
        geometry::unit_cube(factory)?,
    );
    Ok(Arc::new(Mesh::new(name, vec![part], skeleton.map(Arc::new))))
}

fn arm_skeleton() -> EngineResult<Skeleton> {
    let mut skeleton = Skeleton::new("arm");
    let shoulder = skeleton.add_bone("shoulder", None, Transform::identity(), Mat4::identity())?;
    let elbow = skeleton.add_bone(
        "elbow",
        Some(shoulder),
        Transform::from_position(Vec3::new(0.0, 2.0, 0.0)),
        Mat4::identity(),
    )?;
    skeleton.add_bone("wrist", Some(elbow), Transform::from_position(Vec3::new(0.0, 2.0, 0.0)), Mat4::identity())?;
    skeleton.compute_offsets_from_bind_pose()?;
    Ok(skeleton)
}

fn wave_clip() -> EngineResult<AnimationClip> {
    let elbow_at = Vec3::new(0.0, 2.0, 0.0);
    let bent = |degrees: f32| Quat::from_axis_angle(&Vec3::z_axis(), degrees.to_radians());
    let key = |time: f32, degrees: f32| Keyframe {
        time,
        transform: Transform::new(elbow_at, bent(degrees), Vec3::new(1.0, 1.0, 1.0)),
    };

    let mut clip = AnimationClip::new("wave", 2.0);
    clip.add_track(BoneTrack::new("elbow", vec![key(0.0, -30.0), key(1.0, 30.0), key(2.0, -30.0)])?);
    Ok(clip)
}

/// Populate `context` with the demo content
pub fn build(context: &mut EngineContext) -> EngineResult<DemoScene> {
    let factory = context.device().factory().clone();
    let scene = context.scene_mut();
    let root = scene.root_node();

    let sky_material = material(&factory, "sky", RenderBucket::Background, Vec4::new(0.3, 0.5, 0.9, 1.0))?;
    let sky = scene.create_sky_box("sky", sky_material, 80.0)?;
    scene.attach_object(root, sky)?;

    let sun = scene.create_light("sun", LightKind::Directional)?;
    {
        let light = scene.light_mut(sun)?;
        light.set_direction(Vec3::new(-0.3, -1.0, -0.2))?;
        light.set_color(Vec3::new(1.0, 0.95, 0.85));
        light.set_cast_shadows(true);
    }
    scene.attach_object(root, sun)?;

    let crate_mesh = cube_mesh(&factory, "crate", None)?;
    for index in 0..CRATE_RING_SIZE {
        let angle = index as f32 / CRATE_RING_SIZE as f32 * std::f32::consts::TAU;
        let node = scene.create_child_scene_node(root, &format!("crate_node_{index}"))?;
        let position = Vec3::new(angle.cos() * CRATE_RING_RADIUS, 0.0, angle.sin() * CRATE_RING_RADIUS);
        scene.scene_graph_mut().set_position(node, position)?;

        let entity = scene.create_entity(&format!("crate_{index}"), crate_mesh.clone())?;
        scene.attach_object(node, entity)?;
        if index % 4 == 0 {
            let glass = scene
                .entity_mut(entity)?
                .sub_entity_mut(0)
                .map(|sub| sub.material_mut());
            if let Some(glass) = glass {
                glass.set_queue(RenderBucket::Transparent);
                glass.colors_mut().diffuse = Vec4::new(0.6, 0.8, 1.0, 0.4);
            }
        }
    }

    let arm_node = scene.create_child_scene_node(root, "arm_node")?;
    let arm = scene.create_entity("arm", cube_mesh(&factory, "arm", Some(arm_skeleton()?))?)?;
    scene.attach_object(arm_node, arm)?;
    {
        let entity = scene.entity_mut(arm)?;
        entity.add_animation(Arc::new(wave_clip()?))?;
        let player = entity.animation_player_mut();
        player.set_looping("wave", true)?;
        player.play("wave")?;
    }

    let lantern_node = scene.create_scene_node("lantern_node");
    scene.attach_to_bone(arm, "wrist", lantern_node)?;
    let lantern = scene.create_entity("lantern", cube_mesh(&factory, "lantern", None)?)?;
    scene.attach_object(lantern_node, lantern)?;

    let lamp_node = scene.create_child_scene_node(root, "lamp_node")?;
    let lamp = scene.create_light("lamp", LightKind::Point)?;
    {
        let light = scene.light_mut(lamp)?;
        light.set_color(Vec3::new(1.0, 0.6, 0.2));
        light.set_attenuation(12.0, 1.0, 0.09, 0.032)?;
    }
    scene.attach_object(lamp_node, lamp)?;

    let hud_material = material(&factory, "hud", RenderBucket::Overlay, Vec4::new(1.0, 1.0, 1.0, 0.8))?;
    let hud = scene.create_sprite("hud", hud_material, Rect::new(16.0, 16.0, 128.0, 32.0))?;
    scene.attach_object(root, hud)?;

    log::info!("Demo scene built with {} objects", scene.object_count());
    Ok(DemoScene { lamp_node, arm, hud })
}
