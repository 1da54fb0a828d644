//! Geometry description for a single draw call

use crate::render::buffer::GraphicsBuffer;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Primitive topology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimitiveType {
    /// Isolated points
    PointList,
    /// Isolated line segments
    LineList,
    /// Connected line segments
    LineStrip,
    /// Isolated triangles
    TriangleList,
    /// Connected triangles
    TriangleStrip,
}

impl PrimitiveType {
    /// Number of primitives drawn from `count` vertices or indices
    pub fn primitive_count(self, count: u32) -> u32 {
        match self {
            PrimitiveType::PointList => count,
            PrimitiveType::LineList => count / 2,
            PrimitiveType::LineStrip => count.saturating_sub(1),
            PrimitiveType::TriangleList => count / 3,
            PrimitiveType::TriangleStrip => count.saturating_sub(2),
        }
    }
}

/// Data format of one vertex element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum VertexElementFormat {
    /// One f32
    Float1 = 0,
    /// Two f32
    Float2 = 1,
    /// Three f32
    Float3 = 2,
    /// Four f32
    Float4 = 3,
    /// Four u8
    UByte4 = 4,
}

impl VertexElementFormat {
    /// Size in bytes
    pub const fn size(self) -> u32 {
        match self {
            VertexElementFormat::Float1 => 4,
            VertexElementFormat::Float2 => 8,
            VertexElementFormat::Float3 => 12,
            VertexElementFormat::Float4 => 16,
            VertexElementFormat::UByte4 => 4,
        }
    }

    /// Decode the on-disk tag
    pub fn from_u8(tag: u8) -> Option<Self> {
        Some(match tag {
            0 => Self::Float1,
            1 => Self::Float2,
            2 => Self::Float3,
            3 => Self::Float4,
            4 => Self::UByte4,
            _ => return None,
        })
    }
}

/// Semantic of one vertex element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum VertexElementUsage {
    /// Object-space position
    Position = 0,
    /// Normal vector
    Normal = 1,
    /// Tangent vector
    Tangent = 2,
    /// Binormal vector
    Binormal = 3,
    /// Texture coordinate set
    TextureCoordinate = 4,
    /// Vertex color
    Color = 5,
    /// Skinning weights
    BlendWeight = 6,
    /// Skinning bone indices
    BlendIndices = 7,
}

impl VertexElementUsage {
    /// Decode the on-disk tag
    pub fn from_u8(tag: u8) -> Option<Self> {
        Some(match tag {
            0 => Self::Position,
            1 => Self::Normal,
            2 => Self::Tangent,
            3 => Self::Binormal,
            4 => Self::TextureCoordinate,
            5 => Self::Color,
            6 => Self::BlendWeight,
            7 => Self::BlendIndices,
            _ => return None,
        })
    }
}

/// One attribute inside a vertex
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VertexElement {
    /// Byte offset inside the vertex
    pub offset: u32,
    /// Data format
    pub format: VertexElementFormat,
    /// Semantic
    pub usage: VertexElementUsage,
    /// Semantic index, e.g. the texture coordinate set
    pub usage_index: u16,
}

impl VertexElement {
    /// Create a vertex element
    pub fn new(offset: u32, format: VertexElementFormat, usage: VertexElementUsage, usage_index: u16) -> Self {
        Self { offset, format, usage, usage_index }
    }
}

/// Vertex layout
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct VertexDeclaration {
    elements: Vec<VertexElement>,
}

impl VertexDeclaration {
    /// Create a declaration from its elements
    pub fn new(elements: Vec<VertexElement>) -> Self {
        Self { elements }
    }

    /// Build a tightly packed declaration from `(format, usage, index)` triples
    pub fn packed(layout: &[(VertexElementFormat, VertexElementUsage, u16)]) -> Self {
        let mut offset = 0;
        let elements = layout
            .iter()
            .map(|&(format, usage, usage_index)| {
                let element = VertexElement::new(offset, format, usage, usage_index);
                offset += format.size();
                element
            })
            .collect();
        Self { elements }
    }

    /// Elements in declaration order
    pub fn elements(&self) -> &[VertexElement] {
        &self.elements
    }

    /// Stride of one vertex in bytes
    pub fn vertex_size(&self) -> u32 {
        self.elements
            .iter()
            .map(|e| e.offset + e.format.size())
            .max()
            .unwrap_or(0)
    }

    /// Find an element by semantic
    pub fn find(&self, usage: VertexElementUsage, usage_index: u16) -> Option<&VertexElement> {
        self.elements
            .iter()
            .find(|e| e.usage == usage && e.usage_index == usage_index)
    }
}

/// Index element size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndexFormat {
    /// 16-bit indices
    U16,
    /// 32-bit indices
    U32,
}

impl IndexFormat {
    /// Size of one index in bytes
    pub const fn size(self) -> u32 {
        match self {
            IndexFormat::U16 => 2,
            IndexFormat::U32 => 4,
        }
    }
}

/// Everything the device needs to issue one draw call
#[derive(Debug, Clone)]
pub struct RenderOperation {
    /// Primitive topology
    pub primitive_type: PrimitiveType,
    /// Layout of the vertex stream
    pub vertex_declaration: Arc<VertexDeclaration>,
    /// Vertex streams
    pub vertex_buffers: Vec<Arc<GraphicsBuffer>>,
    /// Optional index buffer
    pub index_buffer: Option<Arc<GraphicsBuffer>>,
    /// Format of `index_buffer`
    pub index_format: IndexFormat,
    /// First vertex
    pub start_vertex: u32,
    /// Number of vertices
    pub vertex_count: u32,
    /// First index
    pub start_index: u32,
    /// Number of indices
    pub index_count: u32,
    /// Value added to every index
    pub base_vertex: i32,
    /// Instance count, 1 for plain draws
    pub instance_count: u32,
}

impl RenderOperation {
    /// Non-indexed operation over `vertex_count` vertices
    pub fn new(
        primitive_type: PrimitiveType,
        vertex_declaration: Arc<VertexDeclaration>,
        vertex_buffer: Arc<GraphicsBuffer>,
        vertex_count: u32,
    ) -> Self {
        Self {
            primitive_type,
            vertex_declaration,
            vertex_buffers: vec![vertex_buffer],
            index_buffer: None,
            index_format: IndexFormat::U16,
            start_vertex: 0,
            vertex_count,
            start_index: 0,
            index_count: 0,
            base_vertex: 0,
            instance_count: 1,
        }
    }

    /// Use an index buffer
    pub fn with_indices(mut self, index_buffer: Arc<GraphicsBuffer>, format: IndexFormat, start: u32, count: u32) -> Self {
        self.index_buffer = Some(index_buffer);
        self.index_format = format;
        self.start_index = start;
        self.index_count = count;
        self
    }

    /// Whether this draw uses indices
    pub fn is_indexed(&self) -> bool {
        self.index_buffer.is_some()
    }

    /// Number of primitives produced by this draw
    pub fn primitive_count(&self) -> u32 {
        let count = if self.is_indexed() { self.index_count } else { self.vertex_count };
        self.primitive_type.primitive_count(count) * self.instance_count.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packed_declaration_offsets() {
        let declaration = VertexDeclaration::packed(&[
            (VertexElementFormat::Float3, VertexElementUsage::Position, 0),
            (VertexElementFormat::Float3, VertexElementUsage::Normal, 0),
            (VertexElementFormat::Float2, VertexElementUsage::TextureCoordinate, 0),
        ]);

        assert_eq!(declaration.vertex_size(), 32);
        let uv = declaration.find(VertexElementUsage::TextureCoordinate, 0).unwrap();
        assert_eq!(uv.offset, 24);
        assert!(declaration.find(VertexElementUsage::TextureCoordinate, 1).is_none());
    }

    #[test]
    fn test_primitive_counts() {
        assert_eq!(PrimitiveType::TriangleList.primitive_count(36), 12);
        assert_eq!(PrimitiveType::TriangleStrip.primitive_count(4), 2);
        assert_eq!(PrimitiveType::LineStrip.primitive_count(0), 0);
    }
}
