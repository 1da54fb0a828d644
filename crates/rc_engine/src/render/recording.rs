//! In-process backend that records what it is asked to do
//!
//! Stands in for a graphics API in tests and the headless viewer. Effect
//! parameters are synchronised the way a real backend uploads constant
//! buffers: by comparing each parameter's version with the last uploaded one.

use crate::core::EngineResult;
use crate::render::device::RenderBackend;
use crate::render::effect::{Effect, EffectPass};
use crate::render::frame_buffer::FrameBuffer;
use crate::render::render_operation::RenderOperation;
use crate::render::shader::ShaderPipeline;
use crate::render::state::{BlendState, DepthStencilState, RasterizerState};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// One backend call
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCommand {
    /// Frame buffer bound
    BindFrameBuffer(u64),
    /// Frame buffer released
    UnbindFrameBuffer(u64),
    /// Bound frame buffer cleared
    Clear([f32; 4]),
    /// Pipeline bound
    BindShaderPipeline {
        /// Pipeline id
        id: u64,
        /// Pipeline name
        name: String,
    },
    /// Blend state set
    SetBlendState {
        /// State object id
        id: u64,
        /// Blend factor
        blend_factor: [f32; 4],
        /// Coverage mask
        sample_mask: u32,
    },
    /// Depth-stencil state set
    SetDepthStencilState {
        /// State object id
        id: u64,
        /// Stencil reference
        stencil_ref: u16,
    },
    /// Rasterizer state set
    SetRasterizerState(u64),
    /// Draw call
    Draw {
        /// Effect name
        effect: String,
        /// Pass name
        pass: String,
        /// Primitives drawn
        primitives: u32,
        /// Parameters uploaded because their version changed
        uploaded_parameters: usize,
    },
    /// Frame presented
    Present,
}

/// Shared view of the recorded commands
#[derive(Debug, Clone, Default)]
pub struct CommandLog(Arc<Mutex<Vec<DeviceCommand>>>);

impl CommandLog {
    fn lock(&self) -> MutexGuard<'_, Vec<DeviceCommand>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, command: DeviceCommand) {
        self.lock().push(command);
    }

    /// Copy of every command so far
    pub fn commands(&self) -> Vec<DeviceCommand> {
        self.lock().clone()
    }

    /// Take the commands, leaving the log empty
    pub fn take(&self) -> Vec<DeviceCommand> {
        std::mem::take(&mut *self.lock())
    }

    /// Only the draw commands
    pub fn draws(&self) -> Vec<DeviceCommand> {
        self.lock()
            .iter()
            .filter(|c| matches!(c, DeviceCommand::Draw { .. }))
            .cloned()
            .collect()
    }

    /// Number of recorded commands
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// Backend that appends every call to a [`CommandLog`]
#[derive(Debug, Default)]
pub struct RecordingBackend {
    log: CommandLog,
    uploaded_versions: HashMap<(u64, usize), u64>,
}

impl RecordingBackend {
    /// Create a backend with an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle to the log, valid after the backend moves into a device
    pub fn log(&self) -> CommandLog {
        self.log.clone()
    }
}

impl RenderBackend for RecordingBackend {
    fn bind_frame_buffer(&mut self, frame_buffer: &FrameBuffer) -> EngineResult<()> {
        self.log.push(DeviceCommand::BindFrameBuffer(frame_buffer.id()));
        Ok(())
    }

    fn unbind_frame_buffer(&mut self, frame_buffer: &FrameBuffer) -> EngineResult<()> {
        self.log.push(DeviceCommand::UnbindFrameBuffer(frame_buffer.id()));
        Ok(())
    }

    fn clear(&mut self, color: [f32; 4], _depth: f32, _stencil: u8) -> EngineResult<()> {
        self.log.push(DeviceCommand::Clear(color));
        Ok(())
    }

    fn bind_shader_pipeline(&mut self, pipeline: &ShaderPipeline) -> EngineResult<()> {
        self.log.push(DeviceCommand::BindShaderPipeline {
            id: pipeline.id(),
            name: pipeline.name().to_string(),
        });
        Ok(())
    }

    fn set_blend_state(&mut self, state: &BlendState, blend_factor: [f32; 4], sample_mask: u32) -> EngineResult<()> {
        self.log.push(DeviceCommand::SetBlendState { id: state.id(), blend_factor, sample_mask });
        Ok(())
    }

    fn set_depth_stencil_state(&mut self, state: &DepthStencilState, stencil_ref: u16) -> EngineResult<()> {
        self.log.push(DeviceCommand::SetDepthStencilState { id: state.id(), stencil_ref });
        Ok(())
    }

    fn set_rasterizer_state(&mut self, state: &RasterizerState) -> EngineResult<()> {
        self.log.push(DeviceCommand::SetRasterizerState(state.id()));
        Ok(())
    }

    fn draw(&mut self, effect: &Effect, pass: &EffectPass, operation: &RenderOperation) -> EngineResult<()> {
        let mut uploaded_parameters = 0;
        for (index, parameter) in effect.parameters().iter().enumerate() {
            let version = parameter.version();
            let last = self.uploaded_versions.entry((effect.id(), index)).or_insert(0);
            if *last != version {
                *last = version;
                uploaded_parameters += 1;
            }
        }

        self.log.push(DeviceCommand::Draw {
            effect: effect.name().to_string(),
            pass: pass.name.clone(),
            primitives: operation.primitive_count(),
            uploaded_parameters,
        });
        Ok(())
    }

    fn present(&mut self) -> EngineResult<()> {
        self.log.push(DeviceCommand::Present);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::effect::{EffectDesc, EffectParamValue};
    use crate::render::factory::RenderFactory;
    use crate::render::geometry;
    use crate::foundation::math::Mat4;

    #[test]
    fn test_only_changed_parameters_are_uploaded() {
        let factory = RenderFactory::default();
        let desc: EffectDesc = ron::from_str(
            r#"EffectDesc(
                name: "Upload",
                parameters: [
                    (name: "World", type: Matrix4, semantic: Some("WorldMatrix")),
                    (name: "Tint", type: Float4),
                ],
                techniques: [(name: "T", passes: [(name: "P")])],
            )"#,
        )
        .unwrap();
        let effect = Effect::from_desc(&desc, &factory).unwrap();
        let pass = &effect.techniques()[0].passes()[0];
        let operation = geometry::unit_quad(&factory).unwrap();

        let mut backend = RecordingBackend::new();
        let log = backend.log();
        effect.parameters()[0].set_value(EffectParamValue::Matrix4(Mat4::identity())).unwrap();
        backend.draw(&effect, pass, &operation).unwrap();
        backend.draw(&effect, pass, &operation).unwrap();

        let uploads: Vec<usize> = log
            .draws()
            .into_iter()
            .map(|c| match c {
                DeviceCommand::Draw { uploaded_parameters, .. } => uploaded_parameters,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(uploads, vec![1, 0]);
    }
}
