//! Effects: shader parameters, techniques and passes
//!
//! An [`Effect`] is shared by every material using the same shaders. Each
//! [`EffectParameter`] carries at most one [`EffectParamUsage`]; parameters
//! with a known usage are filled in automatically by
//! [`Material::apply_material`](crate::render::Material::apply_material),
//! `Unknown` ones only by explicit `set_value` calls.
//!
//! Parameter values live behind a lock together with a version counter that
//! is bumped on every write. Backends compare versions to upload only what
//! changed since their last draw.
//!
//! ## File format
//!
//! Effects load from RON:
//!
//! ```ron
//! EffectDesc(
//!     name: "Model",
//!     parameters: [
//!         (name: "World", type: Matrix4, semantic: Some("WorldMatrix")),
//!         (name: "DiffuseColor", type: Float4, semantic: Some("Material_Diffuse_Color")),
//!         (name: "Tint", type: Float4),
//!     ],
//!     techniques: [
//!         (name: "Default", passes: [
//!             (name: "P0", shaders: [(Vertex, "Model.vs"), (Pixel, "Model.ps")]),
//!         ]),
//!     ],
//! )
//! ```

use crate::core::{EngineError, EngineResult};
use crate::foundation::math::{Mat4, Vec2, Vec3, Vec4};
use crate::render::factory::RenderFactory;
use crate::render::shader::{ShaderPipeline, ShaderStage};
use crate::render::state::{
    BlendState, BlendStateDesc, DepthStencilState, DepthStencilStateDesc, RasterizerState, RasterizerStateDesc,
};
use crate::render::texture::Texture;
use crate::resources::{Resource, ResourceKind, ResourceManager};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// Well-known parameter semantics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum EffectParamUsage {
    Unknown,
    WorldMatrix,
    ViewMatrix,
    ProjectionMatrix,
    WorldViewMatrix,
    ViewProjectionMatrix,
    WorldViewProjectionMatrix,
    WorldInverseTransposeMatrix,
    SkinMatrices,
    CameraPosition,
    MaterialAmbientColor,
    MaterialDiffuseColor,
    MaterialSpecularColor,
    MaterialEmissiveColor,
    MaterialPower,
    MaterialDiffuseMap,
    MaterialSpecularMap,
    MaterialNormalMap,
    LightColor,
    LightPosition,
    LightDirection,
    LightAttenuation,
    LightSpotParams,
}

const SEMANTIC_NAMES: &[(EffectParamUsage, &str)] = &[
    (EffectParamUsage::Unknown, "Unknown"),
    (EffectParamUsage::WorldMatrix, "WorldMatrix"),
    (EffectParamUsage::ViewMatrix, "ViewMatrix"),
    (EffectParamUsage::ProjectionMatrix, "ProjectionMatrix"),
    (EffectParamUsage::WorldViewMatrix, "WorldViewMatrix"),
    (EffectParamUsage::ViewProjectionMatrix, "ViewProjectionMatrix"),
    (EffectParamUsage::WorldViewProjectionMatrix, "WorldViewProjectionMatrix"),
    (EffectParamUsage::WorldInverseTransposeMatrix, "WorldInverseTransposeMatrix"),
    (EffectParamUsage::SkinMatrices, "SkinMatrices"),
    (EffectParamUsage::CameraPosition, "CameraPosition"),
    (EffectParamUsage::MaterialAmbientColor, "Material_Ambient_Color"),
    (EffectParamUsage::MaterialDiffuseColor, "Material_Diffuse_Color"),
    (EffectParamUsage::MaterialSpecularColor, "Material_Specular_Color"),
    (EffectParamUsage::MaterialEmissiveColor, "Material_Emissive_Color"),
    (EffectParamUsage::MaterialPower, "Material_Power"),
    (EffectParamUsage::MaterialDiffuseMap, "Material_DiffuseMap"),
    (EffectParamUsage::MaterialSpecularMap, "Material_SpecularMap"),
    (EffectParamUsage::MaterialNormalMap, "Material_NormalMap"),
    (EffectParamUsage::LightColor, "Light_Color"),
    (EffectParamUsage::LightPosition, "Light_Position"),
    (EffectParamUsage::LightDirection, "Light_Direction"),
    (EffectParamUsage::LightAttenuation, "Light_Attenuation"),
    (EffectParamUsage::LightSpotParams, "Light_SpotParams"),
];

impl EffectParamUsage {
    /// Semantic string used in effect and material files
    pub fn as_str(self) -> &'static str {
        SEMANTIC_NAMES
            .iter()
            .find(|(usage, _)| *usage == self)
            .map_or("Unknown", |(_, name)| name)
    }

    /// Type a parameter must have to carry this usage; `None` for `Unknown`
    pub fn expected_type(self) -> Option<EffectParamType> {
        use EffectParamUsage::*;
        Some(match self {
            Unknown => return None,
            WorldMatrix | ViewMatrix | ProjectionMatrix | WorldViewMatrix | ViewProjectionMatrix
            | WorldViewProjectionMatrix | WorldInverseTransposeMatrix => EffectParamType::Matrix4,
            SkinMatrices => EffectParamType::Matrix4Array,
            MaterialAmbientColor | MaterialDiffuseColor | MaterialSpecularColor | MaterialEmissiveColor => {
                EffectParamType::Float4
            }
            MaterialPower => EffectParamType::Float,
            MaterialDiffuseMap | MaterialSpecularMap | MaterialNormalMap => EffectParamType::Texture,
            CameraPosition | LightColor | LightPosition | LightDirection | LightAttenuation | LightSpotParams => {
                EffectParamType::Float3
            }
        })
    }

    /// Whether the usage binds a material texture
    pub fn is_texture(self) -> bool {
        self.expected_type() == Some(EffectParamType::Texture)
    }
}

impl FromStr for EffectParamUsage {
    type Err = EngineError;

    fn from_str(semantic: &str) -> EngineResult<Self> {
        SEMANTIC_NAMES
            .iter()
            .find(|(_, name)| *name == semantic)
            .map(|(usage, _)| *usage)
            .ok_or_else(|| EngineError::invalid_params(format!("unknown parameter semantic '{semantic}'")))
    }
}

/// Declared type of a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum EffectParamType {
    Bool,
    Int,
    Float,
    Float2,
    Float3,
    Float4,
    Matrix4,
    Matrix4Array,
    Texture,
}

/// Parameter value
#[derive(Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub enum EffectParamValue {
    Bool(bool),
    Int(i32),
    Float(f32),
    Float2(Vec2),
    Float3(Vec3),
    Float4(Vec4),
    Matrix4(Mat4),
    Matrix4Array(Vec<Mat4>),
    Texture(Option<Arc<Texture>>),
}

impl EffectParamValue {
    /// Zero value of `param_type`
    pub fn default_for(param_type: EffectParamType) -> Self {
        match param_type {
            EffectParamType::Bool => Self::Bool(false),
            EffectParamType::Int => Self::Int(0),
            EffectParamType::Float => Self::Float(0.0),
            EffectParamType::Float2 => Self::Float2(Vec2::zeros()),
            EffectParamType::Float3 => Self::Float3(Vec3::zeros()),
            EffectParamType::Float4 => Self::Float4(Vec4::zeros()),
            EffectParamType::Matrix4 => Self::Matrix4(Mat4::identity()),
            EffectParamType::Matrix4Array => Self::Matrix4Array(Vec::new()),
            EffectParamType::Texture => Self::Texture(None),
        }
    }

    /// Type of this value
    pub fn param_type(&self) -> EffectParamType {
        match self {
            Self::Bool(_) => EffectParamType::Bool,
            Self::Int(_) => EffectParamType::Int,
            Self::Float(_) => EffectParamType::Float,
            Self::Float2(_) => EffectParamType::Float2,
            Self::Float3(_) => EffectParamType::Float3,
            Self::Float4(_) => EffectParamType::Float4,
            Self::Matrix4(_) => EffectParamType::Matrix4,
            Self::Matrix4Array(_) => EffectParamType::Matrix4Array,
            Self::Texture(_) => EffectParamType::Texture,
        }
    }
}

/// One shader constant or resource slot
#[derive(Debug)]
pub struct EffectParameter {
    name: String,
    param_type: EffectParamType,
    usage: EffectParamUsage,
    value: RwLock<EffectParamValue>,
    version: AtomicU64,
}

impl EffectParameter {
    /// Create a parameter holding the zero value of its type
    pub fn new(name: impl Into<String>, param_type: EffectParamType, usage: EffectParamUsage) -> Self {
        Self {
            name: name.into(),
            param_type,
            usage,
            value: RwLock::new(EffectParamValue::default_for(param_type)),
            version: AtomicU64::new(0),
        }
    }

    /// Parameter name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared type
    pub fn param_type(&self) -> EffectParamType {
        self.param_type
    }

    /// Semantic tag
    pub fn usage(&self) -> EffectParamUsage {
        self.usage
    }

    /// Number of writes so far
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Current value
    pub fn value(&self) -> EffectParamValue {
        self.value.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Replace the value; its type must match the declaration
    pub fn set_value(&self, value: EffectParamValue) -> EngineResult<()> {
        if value.param_type() != self.param_type {
            return Err(EngineError::invalid_params(format!(
                "parameter '{}' is {:?}, got {:?}",
                self.name,
                self.param_type,
                value.param_type()
            )));
        }
        *self.value.write().unwrap_or_else(PoisonError::into_inner) = value;
        self.version.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }
}

/// One pass of a technique: a pipeline plus fixed-function state
#[derive(Debug, Clone)]
pub struct EffectPass {
    /// Pass name
    pub name: String,
    /// Shader pipeline
    pub pipeline: Arc<ShaderPipeline>,
    /// Blend state
    pub blend_state: Arc<BlendState>,
    /// Constant blend factor
    pub blend_factor: [f32; 4],
    /// Multisample coverage mask
    pub sample_mask: u32,
    /// Depth-stencil state
    pub depth_stencil_state: Arc<DepthStencilState>,
    /// Stencil reference value
    pub stencil_ref: u16,
    /// Rasterizer state
    pub rasterizer_state: Arc<RasterizerState>,
}

/// Ordered list of passes
#[derive(Debug, Clone)]
pub struct EffectTechnique {
    name: String,
    passes: Vec<EffectPass>,
}

impl EffectTechnique {
    /// Create a technique
    pub fn new(name: impl Into<String>, passes: Vec<EffectPass>) -> Self {
        Self { name: name.into(), passes }
    }

    /// Technique name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Passes in draw order
    pub fn passes(&self) -> &[EffectPass] {
        &self.passes
    }
}

/// Shader parameters plus the techniques that consume them
#[derive(Debug)]
pub struct Effect {
    id: u64,
    name: String,
    parameters: Vec<EffectParameter>,
    techniques: Vec<EffectTechnique>,
}

impl Effect {
    /// Build an effect from its description, creating pipelines and states
    pub fn from_desc(desc: &EffectDesc, factory: &RenderFactory) -> EngineResult<Self> {
        if desc.techniques.is_empty() {
            return Err(EngineError::invalid_params(format!("effect '{}' has no technique", desc.name)));
        }

        let mut seen = HashSet::new();
        let mut parameters = Vec::with_capacity(desc.parameters.len());
        for param in &desc.parameters {
            if !seen.insert(param.name.as_str()) {
                return Err(EngineError::invalid_params(format!(
                    "effect '{}' declares parameter '{}' twice",
                    desc.name, param.name
                )));
            }
            let usage = match &param.semantic {
                Some(semantic) => semantic.parse::<EffectParamUsage>()?,
                None => EffectParamUsage::Unknown,
            };
            if let Some(expected) = usage.expected_type() {
                if expected != param.param_type {
                    return Err(EngineError::invalid_params(format!(
                        "parameter '{}' with semantic {} must be {:?}",
                        param.name,
                        usage.as_str(),
                        expected
                    )));
                }
            }
            parameters.push(EffectParameter::new(&param.name, param.param_type, usage));
        }

        let mut techniques = Vec::with_capacity(desc.techniques.len());
        for technique in &desc.techniques {
            let passes = technique
                .passes
                .iter()
                .map(|pass| {
                    let pipeline_name = format!("{}/{}/{}", desc.name, technique.name, pass.name);
                    EffectPass {
                        name: pass.name.clone(),
                        pipeline: factory.create_shader_pipeline(pipeline_name, pass.shaders.clone()),
                        blend_state: factory.create_blend_state(pass.blend),
                        blend_factor: pass.blend_factor,
                        sample_mask: pass.sample_mask,
                        depth_stencil_state: factory.create_depth_stencil_state(pass.depth_stencil),
                        stencil_ref: pass.stencil_ref,
                        rasterizer_state: factory.create_rasterizer_state(pass.rasterizer),
                    }
                })
                .collect();
            techniques.push(EffectTechnique::new(&technique.name, passes));
        }

        log::debug!(
            "Created effect '{}' ({} parameters, {} techniques)",
            desc.name,
            parameters.len(),
            techniques.len()
        );
        Ok(Self {
            id: factory.next_id(),
            name: desc.name.clone(),
            parameters,
            techniques,
        })
    }

    /// Factory-assigned id, used as the state-change sort key
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Effect name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All parameters in declaration order
    pub fn parameters(&self) -> &[EffectParameter] {
        &self.parameters
    }

    /// Parameter by index
    pub fn parameter(&self, index: usize) -> Option<&EffectParameter> {
        self.parameters.get(index)
    }

    /// Parameter by name
    pub fn parameter_by_name(&self, name: &str) -> Option<&EffectParameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Techniques in declaration order
    pub fn techniques(&self) -> &[EffectTechnique] {
        &self.techniques
    }

    /// Index of a technique by name
    pub fn technique_index(&self, name: &str) -> EngineResult<usize> {
        self.techniques
            .iter()
            .position(|t| t.name == name)
            .ok_or_else(|| EngineError::item_not_found(format!("effect '{}' has no technique '{name}'", self.name)))
    }

    /// Technique by index
    pub fn technique(&self, index: usize) -> Option<&EffectTechnique> {
        self.techniques.get(index)
    }
}

impl Resource for Effect {
    const KIND: ResourceKind = ResourceKind::Effect;

    fn load_impl(manager: &ResourceManager, name: &str, group: &str) -> EngineResult<Self> {
        let text = manager.file_system().open_stream(name, group)?.read_to_string()?;
        let desc: EffectDesc = ron::from_str(&text)?;
        Effect::from_desc(&desc, manager.factory())
    }
}

/// Serialized effect
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectDesc {
    /// Effect name
    pub name: String,
    /// Parameters
    #[serde(default)]
    pub parameters: Vec<EffectParamDesc>,
    /// Techniques, the first one is the default
    pub techniques: Vec<TechniqueDesc>,
}

/// Serialized parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectParamDesc {
    /// Parameter name
    pub name: String,
    /// Declared type
    #[serde(rename = "type")]
    pub param_type: EffectParamType,
    /// Semantic string, see [`EffectParamUsage::as_str`]
    #[serde(default)]
    pub semantic: Option<String>,
}

/// Serialized technique
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechniqueDesc {
    /// Technique name
    pub name: String,
    /// Passes in draw order
    pub passes: Vec<PassDesc>,
}

/// Serialized pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassDesc {
    /// Pass name
    pub name: String,
    /// `(stage, source)` pairs
    #[serde(default)]
    pub shaders: Vec<(ShaderStage, String)>,
    /// Blend state
    #[serde(default)]
    pub blend: BlendStateDesc,
    /// Constant blend factor
    #[serde(default = "default_blend_factor")]
    pub blend_factor: [f32; 4],
    /// Coverage mask
    #[serde(default = "default_sample_mask")]
    pub sample_mask: u32,
    /// Depth-stencil state
    #[serde(default)]
    pub depth_stencil: DepthStencilStateDesc,
    /// Stencil reference
    #[serde(default)]
    pub stencil_ref: u16,
    /// Rasterizer state
    #[serde(default)]
    pub rasterizer: RasterizerStateDesc,
}

fn default_blend_factor() -> [f32; 4] {
    [1.0; 4]
}

fn default_sample_mask() -> u32 {
    u32::MAX
}

#[cfg(test)]
mod tests {
    use super::*;

    const EFFECT: &str = r#"
        EffectDesc(
            name: "Model",
            parameters: [
                (name: "World", type: Matrix4, semantic: Some("WorldMatrix")),
                (name: "DiffuseColor", type: Float4, semantic: Some("Material_Diffuse_Color")),
                (name: "Tint", type: Float4),
            ],
            techniques: [
                (name: "Default", passes: [
                    (name: "P0", shaders: [(Vertex, "Model.vs"), (Pixel, "Model.ps")]),
                    (name: "P1", blend: (blend_enable: true), depth_stencil: (depth_write: false)),
                ]),
            ],
        )
    "#;

    fn build(source: &str) -> EngineResult<Effect> {
        let desc: EffectDesc = ron::from_str(source)?;
        Effect::from_desc(&desc, &RenderFactory::new([255; 4]))
    }

    #[test]
    fn test_effect_from_ron() {
        let effect = build(EFFECT).unwrap();
        assert_eq!(effect.parameters().len(), 3);
        assert_eq!(effect.parameter_by_name("World").unwrap().usage(), EffectParamUsage::WorldMatrix);
        assert_eq!(effect.parameter_by_name("Tint").unwrap().usage(), EffectParamUsage::Unknown);

        let technique = effect.technique(0).unwrap();
        assert_eq!(technique.passes().len(), 2);
        assert_eq!(technique.passes()[0].pipeline.stage(ShaderStage::Pixel), Some("Model.ps"));
        assert!(technique.passes()[1].blend_state.desc().blend_enable);
        assert!(!technique.passes()[1].depth_stencil_state.desc().depth_write);
        assert_eq!(effect.technique_index("Default").unwrap(), 0);
        assert!(effect.technique_index("Shadow").is_err());
    }

    #[test]
    fn test_semantic_type_mismatch_is_rejected() {
        let source = r#"EffectDesc(
            name: "Bad",
            parameters: [(name: "World", type: Float4, semantic: Some("WorldMatrix"))],
            techniques: [(name: "T", passes: [])],
        )"#;
        let error = build(source).unwrap_err();
        assert_eq!(error.code(), crate::core::ErrorCode::InvalidParams);
    }

    #[test]
    fn test_unknown_semantic_is_rejected() {
        let source = r#"EffectDesc(
            name: "Bad",
            parameters: [(name: "X", type: Float, semantic: Some("Material_Shininess"))],
            techniques: [(name: "T", passes: [])],
        )"#;
        assert_eq!(build(source).unwrap_err().code(), crate::core::ErrorCode::InvalidParams);
    }

    #[test]
    fn test_set_value_checks_type_and_bumps_version() {
        let parameter = EffectParameter::new("Color", EffectParamType::Float4, EffectParamUsage::Unknown);
        assert_eq!(parameter.version(), 0);

        parameter.set_value(EffectParamValue::Float4(Vec4::new(1.0, 0.0, 0.0, 1.0))).unwrap();
        assert_eq!(parameter.version(), 1);
        assert!(parameter.set_value(EffectParamValue::Float(1.0)).is_err());
        assert_eq!(parameter.version(), 1);
    }

    #[test]
    fn test_semantic_names_roundtrip() {
        for (usage, name) in SEMANTIC_NAMES {
            assert_eq!(usage.as_str(), *name);
            assert_eq!(name.parse::<EffectParamUsage>().unwrap(), *usage);
        }
    }
}
