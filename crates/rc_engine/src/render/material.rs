//! Materials and shader parameter auto-binding
//!
//! A [`Material`] pairs a shared [`Effect`] with per-material colors,
//! textures and a render-queue bucket. When the material is built it scans
//! the effect's parameters once and caches an auto-binding for every
//! parameter whose usage has a binder in [`BINDERS`]. At draw time
//! [`Material::apply_material`] walks exactly that list.
//!
//! Texture parameters with no texture assigned fall back to the factory's
//! default texture; the fallback is reported once, when the bindings are
//! built.
//!
//! ## File format
//!
//! ```ron
//! MaterialDesc(
//!     effect: "Model.effect.ron",
//!     parameters: [
//!         (semantic: "Material_Diffuse_Color", value: Color(1.0, 0.5, 0.5, 1.0)),
//!         (semantic: "Material_Power", value: Float(32.0)),
//!         (semantic: "Material_DiffuseMap", name: Some("DiffuseMap"), value: Texture("brick.png")),
//!     ],
//!     queue: "Opaque",
//! )
//! ```

use crate::core::{EngineError, EngineResult};
use crate::foundation::math::{Mat4, Mat4Ext, Vec3, Vec4};
use crate::render::effect::{Effect, EffectParamUsage, EffectParamValue, EffectParameter, EffectTechnique};
use crate::render::texture::Texture;
use crate::resources::{Resource, ResourceKind, ResourceManager};
use crate::scene::{Camera, LightParams, RenderBucket};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Lighting coefficients of a material
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaterialColors {
    /// Ambient reflectance
    pub ambient: Vec4,
    /// Diffuse reflectance
    pub diffuse: Vec4,
    /// Specular reflectance
    pub specular: Vec4,
    /// Emitted color
    pub emissive: Vec4,
    /// Specular exponent
    pub power: f32,
}

impl Default for MaterialColors {
    fn default() -> Self {
        Self {
            ambient: Vec4::new(0.2, 0.2, 0.2, 1.0),
            diffuse: Vec4::new(1.0, 1.0, 1.0, 1.0),
            specular: Vec4::new(0.0, 0.0, 0.0, 1.0),
            emissive: Vec4::new(0.0, 0.0, 0.0, 1.0),
            power: 1.0,
        }
    }
}

/// Camera and light state of the pass being drawn
#[derive(Debug, Clone, PartialEq)]
pub struct ViewContext {
    /// World-to-view
    pub view: Mat4,
    /// View-to-clip
    pub projection: Mat4,
    /// `projection * view`
    pub view_projection: Mat4,
    /// Eye position in world space
    pub camera_position: Vec3,
    /// Light of the current lighting pass
    pub light: Option<LightParams>,
}

impl ViewContext {
    /// View of a scene camera
    pub fn from_camera(camera: &Camera) -> Self {
        let view = camera.view_matrix();
        let projection = camera.projection_matrix();
        Self {
            view,
            projection,
            view_projection: projection * view,
            camera_position: camera.position,
            light: None,
        }
    }

    /// Pixel-space orthographic view for overlays, origin at the top-left
    pub fn screen(width: u32, height: u32) -> Self {
        let projection = Mat4::orthographic(0.0, width as f32, height as f32, 0.0, -1.0, 1.0);
        Self {
            view: Mat4::identity(),
            projection,
            view_projection: projection,
            camera_position: Vec3::zeros(),
            light: None,
        }
    }

    /// Same view lit by `light`
    pub fn with_light(mut self, light: Option<LightParams>) -> Self {
        self.light = light;
        self
    }
}

/// Inputs a binder may read
pub struct BindingContext<'a> {
    /// Skin matrices followed by the world transform
    pub world_transforms: &'a [Mat4],
    /// Current view
    pub view: &'a ViewContext,
    /// Material being applied
    pub material: &'a Material,
    /// Parameter being bound
    pub parameter: &'a EffectParameter,
}

impl BindingContext<'_> {
    fn world(&self) -> Mat4 {
        self.world_transforms.last().copied().unwrap_or_else(Mat4::identity)
    }
}

/// Produces the live value of one usage; `None` leaves the parameter alone
pub type Binder = fn(&BindingContext<'_>) -> Option<EffectParamValue>;

/// Binder lookup table
///
/// Adding a semantic means adding an [`EffectParamUsage`] variant and one
/// row here.
pub const BINDERS: &[(EffectParamUsage, Binder)] = &[
    (EffectParamUsage::WorldMatrix, bind_world),
    (EffectParamUsage::ViewMatrix, bind_view),
    (EffectParamUsage::ProjectionMatrix, bind_projection),
    (EffectParamUsage::WorldViewMatrix, bind_world_view),
    (EffectParamUsage::ViewProjectionMatrix, bind_view_projection),
    (EffectParamUsage::WorldViewProjectionMatrix, bind_world_view_projection),
    (EffectParamUsage::WorldInverseTransposeMatrix, bind_world_inverse_transpose),
    (EffectParamUsage::SkinMatrices, bind_skin_matrices),
    (EffectParamUsage::CameraPosition, bind_camera_position),
    (EffectParamUsage::MaterialAmbientColor, bind_ambient),
    (EffectParamUsage::MaterialDiffuseColor, bind_diffuse),
    (EffectParamUsage::MaterialSpecularColor, bind_specular),
    (EffectParamUsage::MaterialEmissiveColor, bind_emissive),
    (EffectParamUsage::MaterialPower, bind_power),
    (EffectParamUsage::MaterialDiffuseMap, bind_texture),
    (EffectParamUsage::MaterialSpecularMap, bind_texture),
    (EffectParamUsage::MaterialNormalMap, bind_texture),
    (EffectParamUsage::LightColor, bind_light_color),
    (EffectParamUsage::LightPosition, bind_light_position),
    (EffectParamUsage::LightDirection, bind_light_direction),
    (EffectParamUsage::LightAttenuation, bind_light_attenuation),
    (EffectParamUsage::LightSpotParams, bind_light_spot),
];

fn binder_for(usage: EffectParamUsage) -> Option<Binder> {
    BINDERS.iter().find(|(u, _)| *u == usage).map(|(_, binder)| *binder)
}

fn bind_world(c: &BindingContext<'_>) -> Option<EffectParamValue> {
    Some(EffectParamValue::Matrix4(c.world()))
}

fn bind_view(c: &BindingContext<'_>) -> Option<EffectParamValue> {
    Some(EffectParamValue::Matrix4(c.view.view))
}

fn bind_projection(c: &BindingContext<'_>) -> Option<EffectParamValue> {
    Some(EffectParamValue::Matrix4(c.view.projection))
}

fn bind_world_view(c: &BindingContext<'_>) -> Option<EffectParamValue> {
    Some(EffectParamValue::Matrix4(c.view.view * c.world()))
}

fn bind_view_projection(c: &BindingContext<'_>) -> Option<EffectParamValue> {
    Some(EffectParamValue::Matrix4(c.view.view_projection))
}

fn bind_world_view_projection(c: &BindingContext<'_>) -> Option<EffectParamValue> {
    Some(EffectParamValue::Matrix4(c.view.view_projection * c.world()))
}

fn bind_world_inverse_transpose(c: &BindingContext<'_>) -> Option<EffectParamValue> {
    let inverse = c.world().try_inverse().unwrap_or_else(Mat4::identity);
    Some(EffectParamValue::Matrix4(inverse.transpose()))
}

fn bind_skin_matrices(c: &BindingContext<'_>) -> Option<EffectParamValue> {
    let skin = c.world_transforms.split_last().map_or(&[][..], |(_, skin)| skin);
    Some(EffectParamValue::Matrix4Array(skin.to_vec()))
}

fn bind_camera_position(c: &BindingContext<'_>) -> Option<EffectParamValue> {
    Some(EffectParamValue::Float3(c.view.camera_position))
}

fn bind_ambient(c: &BindingContext<'_>) -> Option<EffectParamValue> {
    Some(EffectParamValue::Float4(c.material.colors.ambient))
}

fn bind_diffuse(c: &BindingContext<'_>) -> Option<EffectParamValue> {
    Some(EffectParamValue::Float4(c.material.colors.diffuse))
}

fn bind_specular(c: &BindingContext<'_>) -> Option<EffectParamValue> {
    Some(EffectParamValue::Float4(c.material.colors.specular))
}

fn bind_emissive(c: &BindingContext<'_>) -> Option<EffectParamValue> {
    Some(EffectParamValue::Float4(c.material.colors.emissive))
}

fn bind_power(c: &BindingContext<'_>) -> Option<EffectParamValue> {
    Some(EffectParamValue::Float(c.material.colors.power))
}

fn bind_texture(c: &BindingContext<'_>) -> Option<EffectParamValue> {
    let texture = c
        .material
        .textures
        .get(c.parameter.name())
        .unwrap_or(&c.material.default_texture);
    Some(EffectParamValue::Texture(Some(texture.clone())))
}

fn bind_light_color(c: &BindingContext<'_>) -> Option<EffectParamValue> {
    c.view.light.as_ref().map(|l| EffectParamValue::Float3(l.color))
}

fn bind_light_position(c: &BindingContext<'_>) -> Option<EffectParamValue> {
    c.view.light.as_ref().map(|l| EffectParamValue::Float3(l.position))
}

fn bind_light_direction(c: &BindingContext<'_>) -> Option<EffectParamValue> {
    c.view.light.as_ref().map(|l| EffectParamValue::Float3(l.direction))
}

fn bind_light_attenuation(c: &BindingContext<'_>) -> Option<EffectParamValue> {
    c.view.light.as_ref().map(|l| EffectParamValue::Float3(l.attenuation))
}

fn bind_light_spot(c: &BindingContext<'_>) -> Option<EffectParamValue> {
    c.view.light.as_ref().map(|l| EffectParamValue::Float3(l.spot))
}

#[derive(Debug, Clone, Copy)]
struct AutoBinding {
    parameter: usize,
    usage: EffectParamUsage,
    bind: Binder,
}

/// Effect + colors + textures + bucket
#[derive(Debug, Clone)]
pub struct Material {
    name: String,
    effect: Arc<Effect>,
    technique: usize,
    colors: MaterialColors,
    textures: HashMap<String, Arc<Texture>>,
    queue: RenderBucket,
    default_texture: Arc<Texture>,
    auto_bindings: Vec<AutoBinding>,
}

impl Material {
    /// Start building a material around `effect`
    pub fn builder(name: impl Into<String>, effect: Arc<Effect>) -> MaterialBuilder {
        MaterialBuilder {
            name: name.into(),
            effect,
            technique: 0,
            colors: MaterialColors::default(),
            textures: HashMap::new(),
            queue: RenderBucket::Opaque,
        }
    }

    /// Material name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Shared effect
    pub fn effect(&self) -> &Arc<Effect> {
        &self.effect
    }

    /// Technique used for drawing
    pub fn technique(&self) -> &EffectTechnique {
        // Index validated when the material was built
        &self.effect.techniques()[self.technique]
    }

    /// Lighting coefficients
    pub fn colors(&self) -> &MaterialColors {
        &self.colors
    }

    /// Mutable lighting coefficients
    pub fn colors_mut(&mut self) -> &mut MaterialColors {
        &mut self.colors
    }

    /// Texture bound to the parameter `name`
    pub fn texture(&self, name: &str) -> Option<&Arc<Texture>> {
        self.textures.get(name)
    }

    /// Bind a texture to the parameter `name`
    pub fn set_texture(&mut self, name: impl Into<String>, texture: Arc<Texture>) {
        self.textures.insert(name.into(), texture);
    }

    /// Render-queue bucket
    pub fn queue(&self) -> RenderBucket {
        self.queue
    }

    /// Change the render-queue bucket
    pub fn set_queue(&mut self, queue: RenderBucket) {
        self.queue = queue;
    }

    /// `(parameter index, usage)` of every auto-bound parameter
    pub fn auto_bindings(&self) -> impl Iterator<Item = (usize, EffectParamUsage)> + '_ {
        self.auto_bindings.iter().map(|b| (b.parameter, b.usage))
    }

    /// Push live values into every auto-bound parameter
    ///
    /// `world_transforms` ends with the world transform; preceding elements
    /// are skin matrices. Parameters without a known usage are not touched.
    pub fn apply_material(&self, world_transforms: &[Mat4], view: &ViewContext) -> EngineResult<()> {
        for binding in &self.auto_bindings {
            let Some(parameter) = self.effect.parameter(binding.parameter) else {
                continue;
            };
            let context = BindingContext { world_transforms, view, material: self, parameter };
            if let Some(value) = (binding.bind)(&context) {
                parameter.set_value(value)?;
            }
        }
        Ok(())
    }

    /// Entity-private copy sharing the effect and textures
    pub fn clone_material(&self) -> Material {
        log::debug!("Cloning material '{}'", self.name);
        self.clone()
    }

    /// Build a material from its description, loading effect and textures
    pub fn from_desc(name: &str, desc: &MaterialDesc, manager: &ResourceManager, group: &str) -> EngineResult<Self> {
        let effect = manager.load::<Effect>(&desc.effect, group)?;
        let mut builder = Material::builder(name, effect).queue(desc.queue.parse()?);
        if let Some(technique) = &desc.technique {
            builder = builder.technique(technique)?;
        }

        for parameter in &desc.parameters {
            let usage: EffectParamUsage = parameter.semantic.parse()?;
            builder = match (usage, &parameter.value) {
                (EffectParamUsage::MaterialAmbientColor, MaterialParamValue::Color(r, g, b, a)) => {
                    builder.ambient(Vec4::new(*r, *g, *b, *a))
                }
                (EffectParamUsage::MaterialDiffuseColor, MaterialParamValue::Color(r, g, b, a)) => {
                    builder.diffuse(Vec4::new(*r, *g, *b, *a))
                }
                (EffectParamUsage::MaterialSpecularColor, MaterialParamValue::Color(r, g, b, a)) => {
                    builder.specular(Vec4::new(*r, *g, *b, *a))
                }
                (EffectParamUsage::MaterialEmissiveColor, MaterialParamValue::Color(r, g, b, a)) => {
                    builder.emissive(Vec4::new(*r, *g, *b, *a))
                }
                (EffectParamUsage::MaterialPower, MaterialParamValue::Float(power)) => builder.power(*power),
                (usage, MaterialParamValue::Texture(file)) if usage.is_texture() => {
                    let slot = parameter.name.as_deref().ok_or_else(|| {
                        EngineError::invalid_params(format!(
                            "material '{name}': texture parameter {} needs a name",
                            usage.as_str()
                        ))
                    })?;
                    builder.texture(slot, manager.load::<Texture>(file, group)?)
                }
                (usage, value) => {
                    return Err(EngineError::invalid_params(format!(
                        "material '{name}': {value:?} cannot be assigned to semantic {}",
                        usage.as_str()
                    )));
                }
            };
        }

        Ok(builder.build(manager.factory().default_texture()))
    }
}

impl Resource for Material {
    const KIND: ResourceKind = ResourceKind::Material;

    fn load_impl(manager: &ResourceManager, name: &str, group: &str) -> EngineResult<Self> {
        let text = manager.file_system().open_stream(name, group)?.read_to_string()?;
        let desc: MaterialDesc = ron::from_str(&text)?;
        Material::from_desc(name, &desc, manager, group)
    }
}

/// Staged material construction
#[derive(Debug)]
pub struct MaterialBuilder {
    name: String,
    effect: Arc<Effect>,
    technique: usize,
    colors: MaterialColors,
    textures: HashMap<String, Arc<Texture>>,
    queue: RenderBucket,
}

impl MaterialBuilder {
    /// Draw with the technique called `name`
    pub fn technique(mut self, name: &str) -> EngineResult<Self> {
        self.technique = self.effect.technique_index(name)?;
        Ok(self)
    }

    /// Render-queue bucket
    pub fn queue(mut self, queue: RenderBucket) -> Self {
        self.queue = queue;
        self
    }

    /// All colors at once
    pub fn colors(mut self, colors: MaterialColors) -> Self {
        self.colors = colors;
        self
    }

    /// Ambient reflectance
    pub fn ambient(mut self, color: Vec4) -> Self {
        self.colors.ambient = color;
        self
    }

    /// Diffuse reflectance
    pub fn diffuse(mut self, color: Vec4) -> Self {
        self.colors.diffuse = color;
        self
    }

    /// Specular reflectance
    pub fn specular(mut self, color: Vec4) -> Self {
        self.colors.specular = color;
        self
    }

    /// Emitted color
    pub fn emissive(mut self, color: Vec4) -> Self {
        self.colors.emissive = color;
        self
    }

    /// Specular exponent
    pub fn power(mut self, power: f32) -> Self {
        self.colors.power = power;
        self
    }

    /// Bind a texture to the parameter `name`
    pub fn texture(mut self, name: impl Into<String>, texture: Arc<Texture>) -> Self {
        self.textures.insert(name.into(), texture);
        self
    }

    /// Scan the effect once and cache the auto-bindings
    pub fn build(self, default_texture: Arc<Texture>) -> Material {
        if self.effect.techniques().is_empty() {
            log::warn!("Material '{}' uses effect '{}' without techniques", self.name, self.effect.name());
        }

        let mut auto_bindings = Vec::new();
        for (index, parameter) in self.effect.parameters().iter().enumerate() {
            let usage = parameter.usage();
            let Some(bind) = binder_for(usage) else {
                continue;
            };
            if usage.is_texture() && !self.textures.contains_key(parameter.name()) {
                log::warn!(
                    "Material '{}': no texture for '{}', using the default texture",
                    self.name,
                    parameter.name()
                );
            }
            auto_bindings.push(AutoBinding { parameter: index, usage, bind });
        }
        log::debug!("Material '{}' auto-binds {} parameters", self.name, auto_bindings.len());

        Material {
            name: self.name,
            effect: self.effect,
            technique: self.technique,
            colors: self.colors,
            textures: self.textures,
            queue: self.queue,
            default_texture,
            auto_bindings,
        }
    }
}

/// Serialized material
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialDesc {
    /// Effect resource name
    pub effect: String,
    /// Technique name; the first technique when omitted
    #[serde(default)]
    pub technique: Option<String>,
    /// Parameter assignments
    #[serde(default)]
    pub parameters: Vec<MaterialParamDesc>,
    /// Render-queue bucket name
    #[serde(default = "default_queue")]
    pub queue: String,
}

fn default_queue() -> String {
    "Opaque".to_string()
}

/// One `Parameter { semantic, value }` entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialParamDesc {
    /// Semantic string
    pub semantic: String,
    /// Effect parameter name, required for textures
    #[serde(default)]
    pub name: Option<String>,
    /// Value
    pub value: MaterialParamValue,
}

/// Value of a material parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MaterialParamValue {
    /// RGBA color
    Color(f32, f32, f32, f32),
    /// Scalar
    Float(f32),
    /// Texture resource name
    Texture(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::effect::EffectDesc;
    use crate::render::factory::RenderFactory;
    use approx::assert_relative_eq;

    fn effect(factory: &RenderFactory) -> Arc<Effect> {
        let desc: EffectDesc = ron::from_str(
            r#"EffectDesc(
                name: "Test",
                parameters: [
                    (name: "World", type: Matrix4, semantic: Some("WorldMatrix")),
                    (name: "ViewProj", type: Matrix4, semantic: Some("ViewProjectionMatrix")),
                    (name: "Diffuse", type: Float4, semantic: Some("Material_Diffuse_Color")),
                    (name: "Custom", type: Float4),
                    (name: "DiffuseMap", type: Texture, semantic: Some("Material_DiffuseMap")),
                    (name: "Skin", type: Matrix4Array, semantic: Some("SkinMatrices")),
                    (name: "LightColor", type: Float3, semantic: Some("Light_Color")),
                ],
                techniques: [(name: "Default", passes: [(name: "P0")])],
            )"#,
        )
        .unwrap();
        Arc::new(Effect::from_desc(&desc, factory).unwrap())
    }

    fn view() -> ViewContext {
        let camera = Camera::perspective(Vec3::new(0.0, 2.0, 8.0), 60.0, 1.5, 0.1, 100.0);
        ViewContext::from_camera(&camera)
    }

    #[test]
    fn test_apply_binds_exactly_known_usages() {
        let factory = RenderFactory::default();
        let effect = effect(&factory);
        let diffuse = Vec4::new(0.25, 0.5, 0.75, 1.0);
        let material = Material::builder("m", effect.clone())
            .diffuse(diffuse)
            .build(factory.default_texture());

        let world = Mat4::new_translation(&Vec3::new(1.0, 2.0, 3.0));
        let view = view();
        material.apply_material(&[world], &view).unwrap();

        let get = |name: &str| effect.parameter_by_name(name).unwrap();
        assert_eq!(get("World").value(), EffectParamValue::Matrix4(world));
        assert_eq!(get("ViewProj").value(), EffectParamValue::Matrix4(view.view_projection));
        assert_eq!(get("Diffuse").value(), EffectParamValue::Float4(diffuse));
        assert_eq!(get("Custom").version(), 0);
        // No light in the view: light parameters stay untouched
        assert_eq!(get("LightColor").version(), 0);
    }

    #[test]
    fn test_missing_texture_falls_back_to_default() {
        let factory = RenderFactory::default();
        let effect = effect(&factory);
        let material = Material::builder("m", effect.clone()).build(factory.default_texture());

        material.apply_material(&[Mat4::identity()], &view()).unwrap();
        match effect.parameter_by_name("DiffuseMap").unwrap().value() {
            EffectParamValue::Texture(Some(texture)) => assert!(Arc::ptr_eq(&texture, &factory.default_texture())),
            other => panic!("unexpected {other:?}"),
        }

        let brick = factory.create_texture_2d("brick", crate::render::PixelFormat::Rgba8Unorm, 1, 1, vec![1, 2, 3, 4]).unwrap();
        let mut textured = material.clone_material();
        textured.set_texture("DiffuseMap", brick.clone());
        textured.apply_material(&[Mat4::identity()], &view()).unwrap();
        match effect.parameter_by_name("DiffuseMap").unwrap().value() {
            EffectParamValue::Texture(Some(texture)) => assert!(Arc::ptr_eq(&texture, &brick)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_skin_palette_excludes_world() {
        let factory = RenderFactory::default();
        let effect = effect(&factory);
        let material = Material::builder("m", effect.clone()).build(factory.default_texture());

        let bone = Mat4::new_scaling(2.0);
        let world = Mat4::new_translation(&Vec3::new(0.0, 1.0, 0.0));
        material.apply_material(&[bone, bone, world], &view()).unwrap();

        assert_eq!(effect.parameter_by_name("Skin").unwrap().value(), EffectParamValue::Matrix4Array(vec![bone, bone]));
        assert_eq!(effect.parameter_by_name("World").unwrap().value(), EffectParamValue::Matrix4(world));
    }

    #[test]
    fn test_world_view_projection_order() {
        let world = Mat4::new_translation(&Vec3::new(5.0, 0.0, 0.0));
        let view = view();
        let material_effect = effect(&RenderFactory::default());
        let parameter = EffectParameter::new("WVP", crate::render::EffectParamType::Matrix4, EffectParamUsage::WorldViewProjectionMatrix);
        let material = Material::builder("m", material_effect).build(RenderFactory::default().default_texture());
        let context = BindingContext { world_transforms: &[world], view: &view, material: &material, parameter: &parameter };

        let Some(EffectParamValue::Matrix4(wvp)) = bind_world_view_projection(&context) else {
            panic!("expected a matrix");
        };
        assert_relative_eq!(wvp, view.view_projection * world);
    }

    #[test]
    fn test_material_desc_parses() {
        let desc: MaterialDesc = ron::from_str(
            r#"MaterialDesc(
                effect: "Model.effect.ron",
                parameters: [
                    (semantic: "Material_Diffuse_Color", value: Color(1.0, 0.5, 0.5, 1.0)),
                    (semantic: "Material_DiffuseMap", name: Some("DiffuseMap"), value: Texture("brick.png")),
                ],
                queue: "Transparent",
            )"#,
        )
        .unwrap();
        assert_eq!(desc.technique, None);
        assert_eq!(desc.parameters.len(), 2);
        assert_eq!(desc.queue.parse::<RenderBucket>().unwrap(), RenderBucket::Transparent);
    }
}
