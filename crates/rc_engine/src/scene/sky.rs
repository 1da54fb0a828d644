//! Sky box
//!
//! A textured cube drawn in the Background bucket. It always surrounds the
//! camera: before each background pass the box is re-centered on the eye and
//! scaled to `distance`.

use crate::core::EngineResult;
use crate::foundation::math::{Mat4, Vec3};
use crate::render::factory::RenderFactory;
use crate::render::geometry;
use crate::render::material::Material;
use crate::render::render_operation::RenderOperation;
use std::sync::Arc;

/// Camera-centered background cube
#[derive(Debug, Clone)]
pub struct Sky {
    material: Arc<Material>,
    operation: RenderOperation,
    distance: f32,
    world_transforms: [Mat4; 1],
}

impl Sky {
    /// Sky box using `material`
    pub fn new(factory: &RenderFactory, material: Arc<Material>, distance: f32) -> EngineResult<Self> {
        Ok(Self {
            material,
            operation: geometry::unit_cube(factory)?,
            distance,
            world_transforms: [Mat4::new_scaling(distance)],
        })
    }

    /// Material
    pub fn material(&self) -> &Arc<Material> {
        &self.material
    }

    /// Replace the material
    pub fn set_material(&mut self, material: Arc<Material>) {
        self.material = material;
    }

    /// Cube geometry
    pub fn render_operation(&self) -> &RenderOperation {
        &self.operation
    }

    /// Half extent of the cube
    pub fn distance(&self) -> f32 {
        self.distance
    }

    /// Change the half extent
    pub fn set_distance(&mut self, distance: f32) {
        self.distance = distance;
    }

    /// Current world transform
    pub fn world_transforms(&self) -> &[Mat4] {
        &self.world_transforms
    }

    /// Center the cube on `camera_position`
    pub fn follow_camera(&mut self, camera_position: &Vec3) {
        self.world_transforms[0] = Mat4::new_translation(camera_position) * Mat4::new_scaling(self.distance);
    }
}
