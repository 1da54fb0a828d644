//! Render device
//!
//! [`RenderDevice`] is the stateful front end every draw goes through. It
//! remembers the bound frame buffer, shader pipeline and fixed-function
//! states and only forwards a bind to the [`RenderBackend`] when the value
//! actually changes. Backends therefore see the minimal command stream.

use crate::core::EngineResult;
use crate::render::effect::{Effect, EffectPass, EffectTechnique};
use crate::render::factory::RenderFactory;
use crate::render::frame_buffer::FrameBuffer;
use crate::render::material::ViewContext;
use crate::render::render_operation::RenderOperation;
use crate::render::renderable::Renderable;
use crate::render::shader::ShaderPipeline;
use crate::render::state::{BlendState, DepthStencilState, RasterizerState};
use std::sync::Arc;

/// Graphics API backend
///
/// Implemented by the platform layer; [`RecordingBackend`] is the in-process
/// implementation.
///
/// [`RecordingBackend`]: crate::render::RecordingBackend
pub trait RenderBackend {
    /// Make `frame_buffer` the render target
    fn bind_frame_buffer(&mut self, frame_buffer: &FrameBuffer) -> EngineResult<()>;

    /// Release `frame_buffer` before another one is bound
    fn unbind_frame_buffer(&mut self, frame_buffer: &FrameBuffer) -> EngineResult<()>;

    /// Clear the bound frame buffer
    fn clear(&mut self, color: [f32; 4], depth: f32, stencil: u8) -> EngineResult<()>;

    /// Bind a shader pipeline
    fn bind_shader_pipeline(&mut self, pipeline: &ShaderPipeline) -> EngineResult<()>;

    /// Set blending
    fn set_blend_state(&mut self, state: &BlendState, blend_factor: [f32; 4], sample_mask: u32) -> EngineResult<()>;

    /// Set depth and stencil testing
    fn set_depth_stencil_state(&mut self, state: &DepthStencilState, stencil_ref: u16) -> EngineResult<()>;

    /// Set rasterization
    fn set_rasterizer_state(&mut self, state: &RasterizerState) -> EngineResult<()>;

    /// Issue one draw for `pass`; effect parameters are read from `effect`
    fn draw(&mut self, effect: &Effect, pass: &EffectPass, operation: &RenderOperation) -> EngineResult<()>;

    /// Show the finished frame
    fn present(&mut self) -> EngineResult<()>;
}

/// Per-frame device counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceStats {
    /// Backend draw calls
    pub draw_calls: u32,
    /// Primitives submitted
    pub primitives: u32,
    /// Frame buffer switches
    pub frame_buffer_binds: u32,
    /// Shader pipeline switches
    pub pipeline_binds: u32,
    /// Blend, depth-stencil and rasterizer changes
    pub state_changes: u32,
}

/// Stateful draw dispatcher
pub struct RenderDevice {
    backend: Box<dyn RenderBackend>,
    factory: Arc<RenderFactory>,
    screen_frame_buffer: Arc<FrameBuffer>,
    current_frame_buffer: Option<Arc<FrameBuffer>>,
    current_pipeline: Option<u64>,
    current_blend: Option<(u64, [f32; 4], u32)>,
    current_depth_stencil: Option<(u64, u16)>,
    current_rasterizer: Option<u64>,
    stats: DeviceStats,
}

impl RenderDevice {
    /// Create a device rendering into a `width` x `height` screen
    pub fn new(backend: Box<dyn RenderBackend>, factory: Arc<RenderFactory>, width: u32, height: u32) -> Self {
        let screen_frame_buffer = factory.create_screen_frame_buffer(width, height);
        log::info!("Render device created ({}x{})", width, height);
        Self {
            backend,
            factory,
            screen_frame_buffer,
            current_frame_buffer: None,
            current_pipeline: None,
            current_blend: None,
            current_depth_stencil: None,
            current_rasterizer: None,
            stats: DeviceStats::default(),
        }
    }

    /// Shared object factory
    pub fn factory(&self) -> &Arc<RenderFactory> {
        &self.factory
    }

    /// Swap-chain frame buffer
    pub fn screen_frame_buffer(&self) -> &Arc<FrameBuffer> {
        &self.screen_frame_buffer
    }

    /// Currently bound frame buffer
    pub fn current_frame_buffer(&self) -> Option<&Arc<FrameBuffer>> {
        self.current_frame_buffer.as_ref()
    }

    /// Counters since the last [`begin_frame`](Self::begin_frame)
    pub fn stats(&self) -> DeviceStats {
        self.stats
    }

    /// Reset the per-frame counters
    pub fn begin_frame(&mut self) {
        self.stats = DeviceStats::default();
    }

    /// Bind a frame buffer, unbinding the previous one
    pub fn bind_frame_buffer(&mut self, frame_buffer: &Arc<FrameBuffer>) -> EngineResult<()> {
        if let Some(current) = &self.current_frame_buffer {
            if current.id() == frame_buffer.id() {
                return Ok(());
            }
            self.backend.unbind_frame_buffer(current)?;
        }
        self.backend.bind_frame_buffer(frame_buffer)?;
        self.current_frame_buffer = Some(frame_buffer.clone());
        self.stats.frame_buffer_binds += 1;
        Ok(())
    }

    /// Clear the bound frame buffer
    pub fn clear(&mut self, color: [f32; 4]) -> EngineResult<()> {
        self.backend.clear(color, 1.0, 0)
    }

    /// Bind a shader pipeline unless it is already bound
    pub fn bind_shader_pipeline(&mut self, pipeline: &ShaderPipeline) -> EngineResult<()> {
        if self.current_pipeline == Some(pipeline.id()) {
            return Ok(());
        }
        self.backend.bind_shader_pipeline(pipeline)?;
        self.current_pipeline = Some(pipeline.id());
        self.stats.pipeline_binds += 1;
        Ok(())
    }

    /// Set blending unless state, factor and mask are unchanged
    pub fn set_blend_state(&mut self, state: &BlendState, blend_factor: [f32; 4], sample_mask: u32) -> EngineResult<()> {
        let key = (state.id(), blend_factor, sample_mask);
        if self.current_blend == Some(key) {
            return Ok(());
        }
        self.backend.set_blend_state(state, blend_factor, sample_mask)?;
        self.current_blend = Some(key);
        self.stats.state_changes += 1;
        Ok(())
    }

    /// Set depth-stencil testing unless state and reference are unchanged
    pub fn set_depth_stencil_state(&mut self, state: &DepthStencilState, stencil_ref: u16) -> EngineResult<()> {
        let key = (state.id(), stencil_ref);
        if self.current_depth_stencil == Some(key) {
            return Ok(());
        }
        self.backend.set_depth_stencil_state(state, stencil_ref)?;
        self.current_depth_stencil = Some(key);
        self.stats.state_changes += 1;
        Ok(())
    }

    /// Set rasterization unless unchanged
    pub fn set_rasterizer_state(&mut self, state: &RasterizerState) -> EngineResult<()> {
        if self.current_rasterizer == Some(state.id()) {
            return Ok(());
        }
        self.backend.set_rasterizer_state(state)?;
        self.current_rasterizer = Some(state.id());
        self.stats.state_changes += 1;
        Ok(())
    }

    /// Draw `operation` once per pass of `technique`
    pub fn draw(&mut self, effect: &Effect, technique: &EffectTechnique, operation: &RenderOperation) -> EngineResult<()> {
        debug_assert!(
            operation.vertex_count > 0 || operation.index_count > 0,
            "empty render operation"
        );

        for pass in technique.passes() {
            self.bind_shader_pipeline(&pass.pipeline)?;
            self.set_blend_state(&pass.blend_state, pass.blend_factor, pass.sample_mask)?;
            self.set_depth_stencil_state(&pass.depth_stencil_state, pass.stencil_ref)?;
            self.set_rasterizer_state(&pass.rasterizer_state)?;
            self.backend.draw(effect, pass, operation)?;

            self.stats.draw_calls += 1;
            self.stats.primitives += operation.primitive_count();
        }
        Ok(())
    }

    /// Apply the renderable's material and draw it
    pub fn draw_renderable(&mut self, renderable: &dyn Renderable, view: &ViewContext) -> EngineResult<()> {
        let material = renderable.material();
        material.apply_material(renderable.world_transforms(), view)?;
        self.draw(material.effect(), material.technique(), renderable.render_operation())
    }

    /// Present the frame
    pub fn present(&mut self) -> EngineResult<()> {
        log::trace!(
            "Present: {} draws, {} primitives",
            self.stats.draw_calls,
            self.stats.primitives
        );
        self.backend.present()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::effect::EffectDesc;
    use crate::render::geometry;
    use crate::render::recording::{DeviceCommand, RecordingBackend};

    fn device() -> (RenderDevice, crate::render::CommandLog) {
        let backend = RecordingBackend::new();
        let log = backend.log();
        let factory = Arc::new(RenderFactory::default());
        (RenderDevice::new(Box::new(backend), factory, 320, 240), log)
    }

    fn two_pass_effect(factory: &RenderFactory) -> Effect {
        let desc: EffectDesc = ron::from_str(
            r#"EffectDesc(
                name: "TwoPass",
                parameters: [(name: "World", type: Matrix4, semantic: Some("WorldMatrix"))],
                techniques: [(name: "Default", passes: [(name: "Base"), (name: "Glow", blend: (blend_enable: true))])],
            )"#,
        )
        .unwrap();
        Effect::from_desc(&desc, factory).unwrap()
    }

    #[test]
    fn test_rebinding_same_frame_buffer_is_noop() {
        let (mut device, log) = device();
        let screen = device.screen_frame_buffer().clone();
        device.bind_frame_buffer(&screen).unwrap();
        device.bind_frame_buffer(&screen).unwrap();
        assert_eq!(log.commands(), vec![DeviceCommand::BindFrameBuffer(screen.id())]);

        let offscreen = device.factory().create_frame_buffer(64, 64, 1, true).unwrap();
        device.bind_frame_buffer(&offscreen).unwrap();
        assert_eq!(
            log.commands()[1..],
            [
                DeviceCommand::UnbindFrameBuffer(screen.id()),
                DeviceCommand::BindFrameBuffer(offscreen.id()),
            ]
        );
        assert_eq!(device.stats().frame_buffer_binds, 2);
    }

    #[test]
    fn test_draw_runs_every_pass_and_skips_redundant_state() {
        let (mut device, log) = device();
        let effect = two_pass_effect(device.factory());
        let operation = geometry::unit_cube(device.factory()).unwrap();
        let technique = &effect.techniques()[0];

        device.draw(&effect, technique, &operation).unwrap();
        device.draw(&effect, technique, &operation).unwrap();

        let stats = device.stats();
        assert_eq!(stats.draw_calls, 4);
        assert_eq!(stats.primitives, 4 * 12);
        assert_eq!(log.draws().len(), 4);
        // Both passes use different pipelines, so every pass rebinds
        assert_eq!(stats.pipeline_binds, 4);
    }

    #[test]
    fn test_same_pipeline_is_bound_once() {
        let (mut device, log) = device();
        let desc: EffectDesc = ron::from_str(
            r#"EffectDesc(name: "Flat", techniques: [(name: "Default", passes: [(name: "P0")])])"#,
        )
        .unwrap();
        let effect = Effect::from_desc(&desc, device.factory()).unwrap();
        let operation = geometry::unit_cube(device.factory()).unwrap();
        let technique = &effect.techniques()[0];

        device.draw(&effect, technique, &operation).unwrap();
        device.draw(&effect, technique, &operation).unwrap();

        assert_eq!(device.stats().draw_calls, 2);
        assert_eq!(device.stats().pipeline_binds, 1);
        let pipeline_commands = log
            .commands()
            .iter()
            .filter(|c| matches!(c, DeviceCommand::BindShaderPipeline { .. }))
            .count();
        assert_eq!(pipeline_commands, 1);
    }

    #[test]
    fn test_unchanged_state_is_not_forwarded() {
        let (mut device, log) = device();
        let blend = device.factory().create_blend_state(Default::default());
        device.set_blend_state(&blend, [1.0; 4], u32::MAX).unwrap();
        device.set_blend_state(&blend, [1.0; 4], u32::MAX).unwrap();
        device.set_blend_state(&blend, [0.5; 4], u32::MAX).unwrap();
        assert_eq!(log.commands().len(), 2);
        assert_eq!(device.stats().state_changes, 2);
    }
}
