//! Fixed-function render state descriptors and state objects
//!
//! Descriptors are plain serde data so effect files can spell them out; the
//! factory turns them into immutable, id-carrying state objects the device
//! compares when deciding whether a bind is redundant.

use serde::{Deserialize, Serialize};

/// Blend source / destination factor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    InvSrcColor,
    SrcAlpha,
    InvSrcAlpha,
    DstColor,
    InvDstColor,
    DstAlpha,
    InvDstAlpha,
    BlendFactor,
}

/// Blend equation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum BlendOperation {
    Add,
    Subtract,
    RevSubtract,
    Min,
    Max,
}

/// Depth and stencil comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum CompareFunction {
    Never,
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

/// Stencil buffer update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum StencilOperation {
    Keep,
    Zero,
    Replace,
    IncrSat,
    DecrSat,
    Invert,
    Incr,
    Decr,
}

/// Polygon fill
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum FillMode {
    Solid,
    Wireframe,
}

/// Face culling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum CullMode {
    None,
    Front,
    Back,
}

/// Blend settings of the first render target
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlendStateDesc {
    /// Enable alpha-to-coverage
    pub alpha_to_coverage: bool,
    /// Enable blending
    pub blend_enable: bool,
    /// Color source factor
    pub src_blend: BlendFactor,
    /// Color destination factor
    pub dest_blend: BlendFactor,
    /// Color equation
    pub blend_op: BlendOperation,
    /// Alpha source factor
    pub src_blend_alpha: BlendFactor,
    /// Alpha destination factor
    pub dest_blend_alpha: BlendFactor,
    /// Alpha equation
    pub blend_op_alpha: BlendOperation,
    /// RGBA write mask, bit 0 = red
    pub color_write_mask: u8,
}

impl Default for BlendStateDesc {
    fn default() -> Self {
        Self::opaque()
    }
}

impl BlendStateDesc {
    /// Blending disabled
    pub const fn opaque() -> Self {
        Self {
            alpha_to_coverage: false,
            blend_enable: false,
            src_blend: BlendFactor::One,
            dest_blend: BlendFactor::Zero,
            blend_op: BlendOperation::Add,
            src_blend_alpha: BlendFactor::One,
            dest_blend_alpha: BlendFactor::Zero,
            blend_op_alpha: BlendOperation::Add,
            color_write_mask: 0x0F,
        }
    }

    /// Classic `src * a + dst * (1 - a)`
    pub const fn alpha_blend() -> Self {
        Self {
            blend_enable: true,
            src_blend: BlendFactor::SrcAlpha,
            dest_blend: BlendFactor::InvSrcAlpha,
            src_blend_alpha: BlendFactor::One,
            dest_blend_alpha: BlendFactor::InvSrcAlpha,
            ..Self::opaque()
        }
    }

    /// `src * a + dst`
    pub const fn additive() -> Self {
        Self {
            blend_enable: true,
            src_blend: BlendFactor::SrcAlpha,
            dest_blend: BlendFactor::One,
            src_blend_alpha: BlendFactor::One,
            dest_blend_alpha: BlendFactor::One,
            ..Self::opaque()
        }
    }
}

/// Per-face stencil configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct StencilFaceDesc {
    /// Stencil test failed
    pub fail_op: StencilOperation,
    /// Stencil passed, depth failed
    pub depth_fail_op: StencilOperation,
    /// Both passed
    pub pass_op: StencilOperation,
    /// Stencil comparison
    pub func: CompareFunction,
}

impl Default for StencilFaceDesc {
    fn default() -> Self {
        Self {
            fail_op: StencilOperation::Keep,
            depth_fail_op: StencilOperation::Keep,
            pass_op: StencilOperation::Keep,
            func: CompareFunction::Always,
        }
    }
}

/// Depth and stencil test configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct DepthStencilStateDesc {
    /// Enable the depth test
    pub depth_enable: bool,
    /// Write depth
    pub depth_write: bool,
    /// Depth comparison
    pub depth_func: CompareFunction,
    /// Enable the stencil test
    pub stencil_enable: bool,
    /// Stencil read mask
    pub stencil_read_mask: u8,
    /// Stencil write mask
    pub stencil_write_mask: u8,
    /// Front faces
    pub front: StencilFaceDesc,
    /// Back faces
    pub back: StencilFaceDesc,
}

impl Default for DepthStencilStateDesc {
    fn default() -> Self {
        Self {
            depth_enable: true,
            depth_write: true,
            depth_func: CompareFunction::Less,
            stencil_enable: false,
            stencil_read_mask: 0xFF,
            stencil_write_mask: 0xFF,
            front: StencilFaceDesc::default(),
            back: StencilFaceDesc::default(),
        }
    }
}

impl DepthStencilStateDesc {
    /// Depth test on, depth writes off (blended geometry)
    pub fn read_only() -> Self {
        Self { depth_write: false, ..Self::default() }
    }

    /// Depth test and writes off (overlays)
    pub fn disabled() -> Self {
        Self { depth_enable: false, depth_write: false, ..Self::default() }
    }
}

/// Rasterizer configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RasterizerStateDesc {
    /// Fill mode
    pub fill_mode: FillMode,
    /// Cull mode
    pub cull_mode: CullMode,
    /// Counter-clockwise triangles face front
    pub front_counter_clockwise: bool,
    /// Constant depth bias
    pub depth_bias: f32,
    /// Slope-scaled depth bias
    pub slope_scaled_depth_bias: f32,
    /// Clip against the scissor rectangle
    pub scissor_enable: bool,
    /// Multisample rasterization
    pub multisample_enable: bool,
}

impl Default for RasterizerStateDesc {
    fn default() -> Self {
        Self {
            fill_mode: FillMode::Solid,
            cull_mode: CullMode::Back,
            front_counter_clockwise: true,
            depth_bias: 0.0,
            slope_scaled_depth_bias: 0.0,
            scissor_enable: false,
            multisample_enable: false,
        }
    }
}

/// Immutable state object created by the factory
#[derive(Debug, Clone, PartialEq)]
pub struct StateObject<D> {
    id: u64,
    desc: D,
}

impl<D> StateObject<D> {
    pub(crate) fn new(id: u64, desc: D) -> Self {
        Self { id, desc }
    }

    /// Factory-assigned id
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Descriptor this state was created from
    pub fn desc(&self) -> &D {
        &self.desc
    }
}

/// Blend state object
pub type BlendState = StateObject<BlendStateDesc>;
/// Depth-stencil state object
pub type DepthStencilState = StateObject<DepthStencilStateDesc>;
/// Rasterizer state object
pub type RasterizerState = StateObject<RasterizerStateDesc>;
