//! Shader pipelines
//!
//! Compilation is the backend's business; the core only tracks which stage
//! sources make up a pipeline so the device can bind it as a unit.

use serde::{Deserialize, Serialize};

/// Programmable pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShaderStage {
    /// Vertex shader
    Vertex,
    /// Hull / tessellation control shader
    Hull,
    /// Domain / tessellation evaluation shader
    Domain,
    /// Geometry shader
    Geometry,
    /// Pixel / fragment shader
    Pixel,
    /// Compute shader
    Compute,
}

/// Linked set of shader stages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderPipeline {
    id: u64,
    name: String,
    stages: Vec<(ShaderStage, String)>,
}

impl ShaderPipeline {
    pub(crate) fn new(id: u64, name: impl Into<String>, stages: Vec<(ShaderStage, String)>) -> Self {
        Self { id, name: name.into(), stages }
    }

    /// Factory-assigned id
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Pipeline name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `(stage, source)` pairs
    pub fn stages(&self) -> &[(ShaderStage, String)] {
        &self.stages
    }

    /// Source of one stage
    pub fn stage(&self, stage: ShaderStage) -> Option<&str> {
        self.stages
            .iter()
            .find(|(s, _)| *s == stage)
            .map(|(_, source)| source.as_str())
    }
}
