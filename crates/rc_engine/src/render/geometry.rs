//! Built-in geometry for sky boxes and sprites

use crate::core::EngineResult;
use crate::foundation::bounds::AABB;
use crate::foundation::math::Vec3;
use crate::render::buffer::AccessHint;
use crate::render::factory::RenderFactory;
use crate::render::render_operation::{
    IndexFormat, PrimitiveType, RenderOperation, VertexDeclaration, VertexElementFormat, VertexElementUsage,
};
use std::sync::Arc;

const POSITION_UV: &[(VertexElementFormat, VertexElementUsage, u16)] = &[
    (VertexElementFormat::Float3, VertexElementUsage::Position, 0),
    (VertexElementFormat::Float2, VertexElementUsage::TextureCoordinate, 0),
];

/// Cube from -1 to 1 with inward-facing triangles, 24 vertices / 36 indices
pub fn unit_cube(factory: &RenderFactory) -> EngineResult<RenderOperation> {
    // (normal, u axis, v axis) per face, wound to be seen from inside
    const FACES: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
        ([1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
        ([-1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
        ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
        ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
        ([0.0, 0.0, 1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([0.0, 0.0, -1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
    ];

    let mut vertices: Vec<f32> = Vec::with_capacity(24 * 5);
    let mut indices: Vec<u16> = Vec::with_capacity(36);
    for (face, (normal, u_axis, v_axis)) in FACES.iter().enumerate() {
        let normal = Vec3::from(*normal);
        let u_axis = Vec3::from(*u_axis);
        let v_axis = Vec3::from(*v_axis);
        for (u, v) in [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)] {
            let p = normal + u_axis * (u * 2.0 - 1.0) + v_axis * (v * 2.0 - 1.0);
            vertices.extend_from_slice(&[p.x, p.y, p.z, u, v]);
        }
        let base = (face * 4) as u16;
        indices.extend_from_slice(&[base, base + 2, base + 1, base, base + 3, base + 2]);
    }

    build(factory, &vertices, &indices)
}

/// Quad from (0, 0) to (1, 1) in the XY plane, 4 vertices / 6 indices
pub fn unit_quad(factory: &RenderFactory) -> EngineResult<RenderOperation> {
    #[rustfmt::skip]
    let vertices: [f32; 20] = [
        0.0, 0.0, 0.0, 0.0, 0.0,
        1.0, 0.0, 0.0, 1.0, 0.0,
        1.0, 1.0, 0.0, 1.0, 1.0,
        0.0, 1.0, 0.0, 0.0, 1.0,
    ];
    build(factory, &vertices, &[0, 1, 2, 0, 2, 3])
}

/// Bounds of [`unit_cube`]
pub fn unit_cube_bounds() -> AABB {
    AABB::new(Vec3::new(-1.0, -1.0, -1.0), Vec3::new(1.0, 1.0, 1.0))
}

fn build(factory: &RenderFactory, vertices: &[f32], indices: &[u16]) -> EngineResult<RenderOperation> {
    let declaration = Arc::new(VertexDeclaration::packed(POSITION_UV));
    let vertex_bytes: &[u8] = bytemuck::cast_slice(vertices);
    let index_bytes: &[u8] = bytemuck::cast_slice(indices);
    let vertex_count = (vertex_bytes.len() / declaration.vertex_size() as usize) as u32;

    let hint = AccessHint::GPU_READ | AccessHint::CPU_READ;
    let vertex_buffer = factory.create_vertex_buffer(vertex_bytes.len(), hint, Some(vertex_bytes))?;
    let index_buffer = factory.create_index_buffer(index_bytes.len(), hint, Some(index_bytes))?;

    Ok(RenderOperation::new(PrimitiveType::TriangleList, declaration, vertex_buffer, vertex_count)
        .with_indices(index_buffer, IndexFormat::U16, 0, indices.len() as u32))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::buffer::MapAccess;

    #[test]
    fn test_cube_layout() {
        let factory = RenderFactory::default();
        let cube = unit_cube(&factory).unwrap();
        assert_eq!(cube.vertex_count, 24);
        assert_eq!(cube.index_count, 36);
        assert_eq!(cube.primitive_count(), 12);
        assert_eq!(cube.vertex_declaration.vertex_size(), 20);

        let mapping = cube.vertex_buffers[0].map(MapAccess::ReadOnly).unwrap();
        let positions: Vec<f32> = mapping.read(0, 24 * 5).unwrap();
        let bounds = unit_cube_bounds();
        for vertex in positions.chunks(5) {
            assert!(bounds.contains_point(Vec3::new(vertex[0], vertex[1], vertex[2])));
        }
    }

    #[test]
    fn test_quad_layout() {
        let quad = unit_quad(&RenderFactory::default()).unwrap();
        assert_eq!(quad.vertex_count, 4);
        assert_eq!(quad.primitive_count(), 2);
    }
}
