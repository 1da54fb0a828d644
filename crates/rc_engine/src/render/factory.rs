//! Render object factory
//!
//! Every GPU-side object is created here and receives a process-unique id.
//! The factory is shared (`Arc`) between the device, the scene manager and
//! resource loaders, so it only needs `&self`.

use crate::core::EngineResult;
use crate::render::buffer::{AccessHint, BufferKind, GraphicsBuffer};
use crate::render::frame_buffer::FrameBuffer;
use crate::render::shader::{ShaderPipeline, ShaderStage};
use crate::render::state::{
    BlendState, BlendStateDesc, DepthStencilState, DepthStencilStateDesc, RasterizerState, RasterizerStateDesc,
    StateObject,
};
use crate::render::texture::{PixelFormat, Texture};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

/// Creates buffers, states, pipelines, frame buffers and textures
#[derive(Debug)]
pub struct RenderFactory {
    next_id: AtomicU64,
    default_texture_color: [u8; 4],
    default_texture: OnceLock<Arc<Texture>>,
}

impl RenderFactory {
    /// Create a factory; `default_texture_color` fills the fallback texture
    pub fn new(default_texture_color: [u8; 4]) -> Self {
        Self {
            next_id: AtomicU64::new(1),
            default_texture_color,
            default_texture: OnceLock::new(),
        }
    }

    /// Allocate a fresh object id
    pub fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Create a vertex buffer
    pub fn create_vertex_buffer(&self, size: usize, hint: AccessHint, initial: Option<&[u8]>) -> EngineResult<Arc<GraphicsBuffer>> {
        self.create_buffer(BufferKind::Vertex, size, hint, initial)
    }

    /// Create an index buffer
    pub fn create_index_buffer(&self, size: usize, hint: AccessHint, initial: Option<&[u8]>) -> EngineResult<Arc<GraphicsBuffer>> {
        self.create_buffer(BufferKind::Index, size, hint, initial)
    }

    /// Create a constant buffer
    pub fn create_constant_buffer(&self, size: usize, hint: AccessHint) -> EngineResult<Arc<GraphicsBuffer>> {
        self.create_buffer(BufferKind::Constant, size, hint, None)
    }

    fn create_buffer(
        &self,
        kind: BufferKind,
        size: usize,
        hint: AccessHint,
        initial: Option<&[u8]>,
    ) -> EngineResult<Arc<GraphicsBuffer>> {
        let buffer = GraphicsBuffer::new(self.next_id(), kind, hint, size, initial)?;
        log::trace!("Created {:?} buffer {} ({} bytes, {:?})", kind, buffer.id(), size, hint);
        Ok(Arc::new(buffer))
    }

    /// Create a blend state object
    pub fn create_blend_state(&self, desc: BlendStateDesc) -> Arc<BlendState> {
        Arc::new(StateObject::new(self.next_id(), desc))
    }

    /// Create a depth-stencil state object
    pub fn create_depth_stencil_state(&self, desc: DepthStencilStateDesc) -> Arc<DepthStencilState> {
        Arc::new(StateObject::new(self.next_id(), desc))
    }

    /// Create a rasterizer state object
    pub fn create_rasterizer_state(&self, desc: RasterizerStateDesc) -> Arc<RasterizerState> {
        Arc::new(StateObject::new(self.next_id(), desc))
    }

    /// Create a shader pipeline from its stage sources
    pub fn create_shader_pipeline(&self, name: impl Into<String>, stages: Vec<(ShaderStage, String)>) -> Arc<ShaderPipeline> {
        Arc::new(ShaderPipeline::new(self.next_id(), name, stages))
    }

    /// Create the frame buffer backed by the swap chain
    pub fn create_screen_frame_buffer(&self, width: u32, height: u32) -> Arc<FrameBuffer> {
        Arc::new(FrameBuffer::screen(self.next_id(), width, height))
    }

    /// Create an off-screen frame buffer with `color_count` RGBA8 targets
    pub fn create_frame_buffer(
        &self,
        width: u32,
        height: u32,
        color_count: usize,
        depth: bool,
    ) -> EngineResult<Arc<FrameBuffer>> {
        let color_targets = (0..color_count)
            .map(|i| self.create_render_target(format!("color{i}"), PixelFormat::Rgba8Unorm, width, height))
            .collect::<EngineResult<Vec<_>>>()?;
        let depth_stencil = if depth {
            Some(self.create_render_target("depth", PixelFormat::Depth24Stencil8, width, height)?)
        } else {
            None
        };
        Ok(Arc::new(FrameBuffer::offscreen(self.next_id(), width, height, color_targets, depth_stencil)))
    }

    fn create_render_target(&self, name: impl Into<String>, format: PixelFormat, width: u32, height: u32) -> EngineResult<Arc<Texture>> {
        Texture::new(self.next_id(), name, format, width, height, Vec::new()).map(Arc::new)
    }

    /// Create a 2D texture from texel data
    pub fn create_texture_2d(
        &self,
        name: impl Into<String>,
        format: PixelFormat,
        width: u32,
        height: u32,
        data: Vec<u8>,
    ) -> EngineResult<Arc<Texture>> {
        Texture::new(self.next_id(), name, format, width, height, data).map(Arc::new)
    }

    /// 1x1 texture bound for material maps that were never assigned
    pub fn default_texture(&self) -> Arc<Texture> {
        self.default_texture
            .get_or_init(|| {
                Arc::new(Texture::solid(self.next_id(), "__default", self.default_texture_color))
            })
            .clone()
    }
}

impl Default for RenderFactory {
    fn default() -> Self {
        Self::new([255; 4])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        let factory = RenderFactory::default();
        let a = factory.create_blend_state(BlendStateDesc::opaque());
        let b = factory.create_blend_state(BlendStateDesc::opaque());
        assert_ne!(a.id(), b.id());
        assert_eq!(a.desc(), b.desc());
    }

    #[test]
    fn test_default_texture_is_shared() {
        let factory = RenderFactory::new([10, 20, 30, 255]);
        let first = factory.default_texture();
        let second = factory.default_texture();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.data(), &[10, 20, 30, 255]);
    }

    #[test]
    fn test_offscreen_frame_buffer() {
        let factory = RenderFactory::default();
        let frame_buffer = factory.create_frame_buffer(64, 32, 2, true).unwrap();
        assert_eq!(frame_buffer.color_targets().len(), 2);
        assert!(frame_buffer.depth_stencil().is_some());
        assert!(!frame_buffer.is_screen());
    }
}
