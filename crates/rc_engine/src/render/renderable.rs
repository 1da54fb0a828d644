//! Drawable capability

use crate::foundation::math::Mat4;
use crate::render::material::Material;
use crate::render::render_operation::RenderOperation;
use std::sync::Arc;

/// Anything the device can draw: material + geometry + transforms
///
/// `world_transforms` ends with the node-level world transform; any
/// elements before it are bone skin matrices.
pub trait Renderable {
    /// Material used for the draw
    fn material(&self) -> &Arc<Material>;

    /// Geometry
    fn render_operation(&self) -> &RenderOperation;

    /// Skin matrices (if any) followed by the world transform
    fn world_transforms(&self) -> &[Mat4];
}
