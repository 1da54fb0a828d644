//! Meshes
//!
//! A [`Mesh`] is shared read-only geometry: one vertex and index buffer pair
//! split into [`MeshPart`]s, each with its own material and bounds. Entities
//! reference meshes through `Arc` and never modify them.
//!
//! ## RCMESH layout
//!
//! ```text
//! "RCMESH" u32:version(1) string:name vec3:min vec3:max
//! u32:element_count element_count x { u32:offset u8:format u8:usage u16:usage_index }
//! u32:vertex_count bytes:vertex_count*stride
//! u8:index_format(0 = u16, 1 = u32) u32:index_count bytes:index_count*index_size
//! u32:part_count part_count x { string:name string:material vec3:min vec3:max
//!                               u32:start_index u32:index_count u32:start_vertex u32:vertex_count }
//! string:skeleton("" = none)
//! ```

use crate::core::{EngineError, EngineResult};
use crate::foundation::bounds::AABB;
use crate::render::buffer::AccessHint;
use crate::render::material::Material;
use crate::render::render_operation::{
    IndexFormat, PrimitiveType, RenderOperation, VertexDeclaration, VertexElement, VertexElementFormat,
    VertexElementUsage,
};
use crate::resources::resource::{Resource, ResourceKind};
use crate::resources::resource_manager::ResourceManager;
use crate::resources::skeleton::Skeleton;
use crate::resources::stream::{DataStream, DataWriter};
use std::sync::Arc;

const MAGIC: &[u8] = b"RCMESH";
const VERSION: u32 = 1;

/// CPU-side description of one part
#[derive(Debug, Clone, PartialEq)]
pub struct MeshPartData {
    /// Part name
    pub name: String,
    /// Material resource name
    pub material: String,
    /// Object-space bounds
    pub bounds: AABB,
    /// First index
    pub start_index: u32,
    /// Number of indices
    pub index_count: u32,
    /// First vertex
    pub start_vertex: u32,
    /// Number of vertices
    pub vertex_count: u32,
}

/// CPU-side mesh as stored in an RCMESH file
#[derive(Debug, Clone, PartialEq)]
pub struct MeshData {
    /// Mesh name
    pub name: String,
    /// Object-space bounds of the whole mesh
    pub bounds: AABB,
    /// Vertex layout
    pub vertex_declaration: VertexDeclaration,
    /// Number of vertices
    pub vertex_count: u32,
    /// Interleaved vertex bytes
    pub vertex_data: Vec<u8>,
    /// Index format
    pub index_format: IndexFormat,
    /// Number of indices
    pub index_count: u32,
    /// Index bytes
    pub index_data: Vec<u8>,
    /// Parts
    pub parts: Vec<MeshPartData>,
    /// Skeleton resource name
    pub skeleton: Option<String>,
}

fn read_bounds(stream: &mut DataStream) -> EngineResult<AABB> {
    Ok(AABB::new(stream.read_vec3()?, stream.read_vec3()?))
}

fn write_bounds(writer: &mut DataWriter, bounds: &AABB) {
    writer.write_vec3(&bounds.min).write_vec3(&bounds.max);
}

impl MeshData {
    /// Decode an RCMESH stream
    pub fn read(stream: &mut DataStream) -> EngineResult<Self> {
        stream.expect_magic(MAGIC)?;
        let version = stream.read_u32()?;
        if version != VERSION {
            return Err(EngineError::parse(format!("'{}': unsupported RCMESH version {version}", stream.name())));
        }
        let name = stream.read_string()?;
        let bounds = read_bounds(stream)?;

        let element_count = stream.read_u32()?;
        let mut elements = Vec::new();
        for _ in 0..element_count {
            let offset = stream.read_u32()?;
            let format = VertexElementFormat::from_u8(stream.read_u8()?);
            let usage = VertexElementUsage::from_u8(stream.read_u8()?);
            let usage_index = stream.read_u16()?;
            let (Some(format), Some(usage)) = (format, usage) else {
                return Err(EngineError::parse(format!("'{}': unknown vertex element", stream.name())));
            };
            elements.push(VertexElement::new(offset, format, usage, usage_index));
        }
        let vertex_declaration = VertexDeclaration::new(elements);

        let vertex_count = stream.read_u32()?;
        let vertex_data = stream.read_bytes(vertex_count as usize * vertex_declaration.vertex_size() as usize)?;

        let index_format = match stream.read_u8()? {
            0 => IndexFormat::U16,
            1 => IndexFormat::U32,
            other => return Err(EngineError::parse(format!("'{}': unknown index format {other}", stream.name()))),
        };
        let index_count = stream.read_u32()?;
        let index_data = stream.read_bytes(index_count as usize * index_format.size() as usize)?;

        let part_count = stream.read_u32()?;
        let mut parts = Vec::new();
        for _ in 0..part_count {
            parts.push(MeshPartData {
                name: stream.read_string()?,
                material: stream.read_string()?,
                bounds: read_bounds(stream)?,
                start_index: stream.read_u32()?,
                index_count: stream.read_u32()?,
                start_vertex: stream.read_u32()?,
                vertex_count: stream.read_u32()?,
            });
        }
        let skeleton = Some(stream.read_string()?).filter(|s| !s.is_empty());

        let data = Self {
            name,
            bounds,
            vertex_declaration,
            vertex_count,
            vertex_data,
            index_format,
            index_count,
            index_data,
            parts,
            skeleton,
        };
        data.validate()?;
        Ok(data)
    }

    /// Check that every part lies inside the buffers
    pub fn validate(&self) -> EngineResult<()> {
        for part in &self.parts {
            let indices_end = part.start_index as u64 + part.index_count as u64;
            let vertices_end = part.start_vertex as u64 + part.vertex_count as u64;
            if indices_end > self.index_count as u64 || vertices_end > self.vertex_count as u64 {
                return Err(EngineError::invalid_params(format!(
                    "mesh '{}': part '{}' exceeds the mesh buffers",
                    self.name, part.name
                )));
            }
        }
        Ok(())
    }

    /// Encode as RCMESH
    pub fn write(&self, writer: &mut DataWriter) {
        writer.write_bytes(MAGIC).write_u32(VERSION).write_string(&self.name);
        write_bounds(writer, &self.bounds);

        let elements = self.vertex_declaration.elements();
        writer.write_u32(elements.len() as u32);
        for element in elements {
            writer
                .write_u32(element.offset)
                .write_u8(element.format as u8)
                .write_u8(element.usage as u8)
                .write_u16(element.usage_index);
        }

        writer.write_u32(self.vertex_count).write_bytes(&self.vertex_data);
        let index_format = match self.index_format {
            IndexFormat::U16 => 0,
            IndexFormat::U32 => 1,
        };
        writer.write_u8(index_format).write_u32(self.index_count).write_bytes(&self.index_data);

        writer.write_u32(self.parts.len() as u32);
        for part in &self.parts {
            writer.write_string(&part.name).write_string(&part.material);
            write_bounds(writer, &part.bounds);
            writer
                .write_u32(part.start_index)
                .write_u32(part.index_count)
                .write_u32(part.start_vertex)
                .write_u32(part.vertex_count);
        }
        writer.write_string(self.skeleton.as_deref().unwrap_or(""));
    }
}

/// Drawable slice of a mesh
#[derive(Debug, Clone)]
pub struct MeshPart {
    name: String,
    material: Arc<Material>,
    bounds: AABB,
    operation: RenderOperation,
}

impl MeshPart {
    /// Create a part
    pub fn new(name: impl Into<String>, material: Arc<Material>, bounds: AABB, operation: RenderOperation) -> Self {
        Self { name: name.into(), material, bounds, operation }
    }

    /// Part name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Default material
    pub fn material(&self) -> &Arc<Material> {
        &self.material
    }

    /// Object-space bounds
    pub fn bounds(&self) -> &AABB {
        &self.bounds
    }

    /// Geometry
    pub fn render_operation(&self) -> &RenderOperation {
        &self.operation
    }
}

/// Shared read-only geometry
#[derive(Debug, Clone)]
pub struct Mesh {
    name: String,
    bounds: AABB,
    parts: Vec<MeshPart>,
    skeleton: Option<Arc<Skeleton>>,
}

impl Mesh {
    /// Assemble a mesh from parts built in code
    pub fn new(name: impl Into<String>, parts: Vec<MeshPart>, skeleton: Option<Arc<Skeleton>>) -> Self {
        let mut bounds = AABB::empty();
        for part in &parts {
            bounds.merge(part.bounds());
        }
        Self { name: name.into(), bounds, parts, skeleton }
    }

    /// Upload `data` and resolve its materials and skeleton
    ///
    /// A part whose material cannot be loaded fails the whole mesh.
    pub fn from_data(data: &MeshData, manager: &ResourceManager, group: &str) -> EngineResult<Self> {
        data.validate()?;
        let factory = manager.factory();
        let declaration = Arc::new(data.vertex_declaration.clone());
        let vertex_buffer = factory.create_vertex_buffer(data.vertex_data.len(), AccessHint::GPU_READ, Some(&data.vertex_data))?;
        let index_buffer = if data.index_count > 0 {
            Some(factory.create_index_buffer(data.index_data.len(), AccessHint::GPU_READ, Some(&data.index_data))?)
        } else {
            None
        };

        let mut parts = Vec::with_capacity(data.parts.len());
        for part in &data.parts {
            let material = manager.load::<Material>(&part.material, group).map_err(|error| {
                EngineError::new(
                    error.code(),
                    format!("mesh '{}': part '{}' has no usable material: {}", data.name, part.name, error),
                )
            })?;

            let mut operation = RenderOperation::new(
                PrimitiveType::TriangleList,
                declaration.clone(),
                vertex_buffer.clone(),
                part.vertex_count,
            );
            operation.start_vertex = part.start_vertex;
            if let Some(index_buffer) = &index_buffer {
                operation = operation.with_indices(index_buffer.clone(), data.index_format, part.start_index, part.index_count);
            }
            parts.push(MeshPart::new(&part.name, material, part.bounds, operation));
        }

        let skeleton = match &data.skeleton {
            Some(name) => Some(manager.load::<Skeleton>(name, group)?),
            None => None,
        };

        let mut mesh = Mesh::new(&data.name, parts, skeleton);
        mesh.bounds = data.bounds;
        Ok(mesh)
    }

    /// Mesh name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Object-space bounds
    pub fn bounds(&self) -> &AABB {
        &self.bounds
    }

    /// Parts in file order
    pub fn parts(&self) -> &[MeshPart] {
        &self.parts
    }

    /// Skeleton template, cloned by each entity
    pub fn skeleton(&self) -> Option<&Arc<Skeleton>> {
        self.skeleton.as_ref()
    }
}

impl Resource for Mesh {
    const KIND: ResourceKind = ResourceKind::Mesh;

    fn load_impl(manager: &ResourceManager, name: &str, group: &str) -> EngineResult<Self> {
        let mut stream = manager.file_system().open_stream(name, group)?;
        let data = MeshData::read(&mut stream)?;
        let mesh = Mesh::from_data(&data, manager, group)?;
        log::debug!("Loaded mesh '{}' ({} parts)", mesh.name, mesh.parts.len());
        Ok(mesh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ErrorCode;
    use crate::foundation::math::Vec3;
    use crate::render::effect::{Effect, EffectDesc};
    use crate::render::factory::RenderFactory;
    use crate::resources::file_system::FileSystem;

    fn triangle(material: &str) -> MeshData {
        let declaration = VertexDeclaration::packed(&[(VertexElementFormat::Float3, VertexElementUsage::Position, 0)]);
        let positions: [f32; 9] = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
        let indices: [u16; 3] = [0, 1, 2];
        let bounds = AABB::new(Vec3::zeros(), Vec3::new(1.0, 1.0, 0.0));
        MeshData {
            name: "triangle".to_string(),
            bounds,
            vertex_declaration: declaration,
            vertex_count: 3,
            vertex_data: bytemuck::cast_slice(&positions).to_vec(),
            index_format: IndexFormat::U16,
            index_count: 3,
            index_data: bytemuck::cast_slice(&indices).to_vec(),
            parts: vec![MeshPartData {
                name: "body".to_string(),
                material: material.to_string(),
                bounds,
                start_index: 0,
                index_count: 3,
                start_vertex: 0,
                vertex_count: 3,
            }],
            skeleton: None,
        }
    }

    fn manager_with_material(dir: &std::path::Path) -> ResourceManager {
        let mut fs = FileSystem::new();
        fs.add_resource_location("General", dir);
        let manager = ResourceManager::new(Arc::new(fs), Arc::new(RenderFactory::default()));

        let desc: EffectDesc = ron::from_str(
            r#"EffectDesc(name: "Flat", parameters: [], techniques: [(name: "T", passes: [(name: "P")])])"#,
        )
        .unwrap();
        let effect = Arc::new(Effect::from_desc(&desc, manager.factory()).unwrap());
        let material = Material::builder("flat", effect).build(manager.factory().default_texture());
        manager.add_resource("flat.material.ron", "General", material).unwrap();
        manager
    }

    #[test]
    fn test_rcmesh_file_loads() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = DataWriter::new();
        triangle("flat.material.ron").write(&mut writer);
        std::fs::write(dir.path().join("triangle.mesh"), writer.into_bytes()).unwrap();

        let manager = manager_with_material(dir.path());
        let mesh = manager.load::<Mesh>("triangle.mesh", "General").unwrap();
        assert_eq!(mesh.name(), "triangle");
        assert_eq!(mesh.parts().len(), 1);
        let part = &mesh.parts()[0];
        assert_eq!(part.material().name(), "flat");
        assert_eq!(part.render_operation().primitive_count(), 1);
        assert!(mesh.skeleton().is_none());
    }

    #[test]
    fn test_missing_material_fails_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = DataWriter::new();
        triangle("missing.material.ron").write(&mut writer);
        std::fs::write(dir.path().join("triangle.mesh"), writer.into_bytes()).unwrap();

        let manager = manager_with_material(dir.path());
        let error = manager.load::<Mesh>("triangle.mesh", "General").unwrap_err();
        assert_eq!(error.code(), ErrorCode::FileNotFound);
        assert!(error.description().contains("body"));
    }

    #[test]
    fn test_part_outside_buffers_is_rejected() {
        let mut data = triangle("flat.material.ron");
        data.parts[0].index_count = 6;
        assert_eq!(data.validate().unwrap_err().code(), ErrorCode::InvalidParams);
    }
}
