//! Screen-space sprites
//!
//! A sprite is a unit quad scaled to a pixel rectangle and drawn in the
//! Overlay bucket with the screen view (origin top-left, y down).

use crate::core::{EngineError, EngineResult};
use crate::foundation::math::{Mat4, Vec3};
use crate::render::factory::RenderFactory;
use crate::render::geometry;
use crate::render::material::Material;
use crate::render::render_operation::RenderOperation;
use std::sync::Arc;

/// Pixel rectangle
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    /// Left edge
    pub x: f32,
    /// Top edge
    pub y: f32,
    /// Width
    pub width: f32,
    /// Height
    pub height: f32,
}

impl Rect {
    /// Rectangle at `(x, y)` of the given size
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    fn to_matrix(self) -> Mat4 {
        Mat4::new_translation(&Vec3::new(self.x, self.y, 0.0))
            * Mat4::new_nonuniform_scaling(&Vec3::new(self.width, self.height, 1.0))
    }
}

/// Textured screen rectangle
#[derive(Debug, Clone)]
pub struct Sprite {
    material: Arc<Material>,
    operation: RenderOperation,
    rect: Rect,
    z_order: i32,
    world_transforms: [Mat4; 1],
}

impl Sprite {
    /// Sprite covering `rect`
    pub fn new(factory: &RenderFactory, material: Arc<Material>, rect: Rect) -> EngineResult<Self> {
        validate(&rect)?;
        Ok(Self {
            material,
            operation: geometry::unit_quad(factory)?,
            rect,
            z_order: 0,
            world_transforms: [rect.to_matrix()],
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

    /// Quad geometry
    pub fn render_operation(&self) -> &RenderOperation {
        &self.operation
    }

    /// Covered rectangle
    pub fn rect(&self) -> Rect {
        self.rect
    }

    /// Move or resize
    pub fn set_rect(&mut self, rect: Rect) -> EngineResult<()> {
        validate(&rect)?;
        self.rect = rect;
        self.world_transforms[0] = rect.to_matrix();
        Ok(())
    }

    /// Draw order among sprites, lower first
    pub fn z_order(&self) -> i32 {
        self.z_order
    }

    /// Change the draw order
    pub fn set_z_order(&mut self, z_order: i32) {
        self.z_order = z_order;
    }

    /// Pixel-space world transform
    pub fn world_transforms(&self) -> &[Mat4] {
        &self.world_transforms
    }
}

fn validate(rect: &Rect) -> EngineResult<()> {
    if rect.width < 0.0 || rect.height < 0.0 {
        return Err(EngineError::invalid_params(format!("sprite rect has negative size {rect:?}")));
    }
    Ok(())
}
