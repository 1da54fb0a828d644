//! Rendering system
//!
//! Backend-agnostic render layer. Following Game Engine Architecture Chapter
//! 11 - The Rendering Engine.
//!
//! ## Architecture
//!
//! ```text
//! Material (auto-binding) ─┐
//!                          ├─> RenderDevice ─> RenderBackend
//! RenderOperation ─────────┘
//! ```
//!
//! - [`RenderFactory`] creates every GPU-side object and hands out ids
//! - [`Material`] pushes live values into its [`Effect`] parameters by usage
//! - [`RenderDevice`] tracks bound state and skips redundant binds
//! - [`RenderBackend`] is the vendor seam; [`RecordingBackend`] records
//!   commands in-process

pub mod buffer;
pub mod device;
pub mod effect;
pub mod factory;
pub mod frame_buffer;
pub mod geometry;
pub mod material;
pub mod recording;
pub mod render_operation;
pub mod renderable;
pub mod shader;
pub mod state;
pub mod texture;

pub use buffer::{AccessHint, BufferKind, BufferMapping, GraphicsBuffer, MapAccess};
pub use device::{DeviceStats, RenderBackend, RenderDevice};
pub use effect::{
    Effect, EffectDesc, EffectParamType, EffectParamUsage, EffectParamValue, EffectParameter, EffectPass,
    EffectTechnique,
};
pub use factory::RenderFactory;
pub use frame_buffer::{FrameBuffer, Viewport};
pub use material::{
    BindingContext, Material, MaterialBuilder, MaterialColors, MaterialDesc, MaterialParamDesc, MaterialParamValue,
    ViewContext, BINDERS,
};
pub use recording::{CommandLog, DeviceCommand, RecordingBackend};
pub use render_operation::{
    IndexFormat, PrimitiveType, RenderOperation, VertexDeclaration, VertexElement, VertexElementFormat,
    VertexElementUsage,
};
pub use renderable::Renderable;
pub use shader::{ShaderPipeline, ShaderStage};
pub use state::{
    BlendState, BlendStateDesc, DepthStencilState, DepthStencilStateDesc, RasterizerState, RasterizerStateDesc,
};
pub use texture::{PixelFormat, Texture};
