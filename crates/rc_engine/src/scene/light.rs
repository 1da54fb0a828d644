//! Lights and the per-frame light queue
//!
//! A [`Light`] is a scene object; its world position and direction come from
//! the node it is attached to. Each frame the scene manager collects the
//! lights affecting the view into a [`LightQueue`], resolved to world-space
//! [`LightParams`] ready for the light binders of a material.

use crate::core::{EngineError, EngineResult};
use crate::foundation::bounds::{Frustum, AABB};
use crate::foundation::math::{Mat4, Mat4Ext, Vec3};
use crate::scene::SceneObjectId;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Light source type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LightKind {
    /// Infinitely distant, affects everything
    Directional,
    /// Omnidirectional with a finite range
    Point,
    /// Cone with inner and outer angles
    Spot,
}

impl FromStr for LightKind {
    type Err = EngineError;

    fn from_str(name: &str) -> EngineResult<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "directional" => Ok(LightKind::Directional),
            "point" => Ok(LightKind::Point),
            "spot" => Ok(LightKind::Spot),
            _ => Err(EngineError::invalid_params(format!("undefined light type '{name}'"))),
        }
    }
}

/// World-space light values as seen by the shaders
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightParams {
    /// Light type
    pub kind: LightKind,
    /// Linear RGB color
    pub color: Vec3,
    /// World position
    pub position: Vec3,
    /// Normalized world direction
    pub direction: Vec3,
    /// Constant, linear and quadratic attenuation
    pub attenuation: Vec3,
    /// Cosine of the inner angle, cosine of the outer angle, falloff
    pub spot: Vec3,
    /// Maximum reach
    pub range: f32,
    /// Whether the light casts shadows
    pub cast_shadows: bool,
}

/// Light scene object
#[derive(Debug, Clone, PartialEq)]
pub struct Light {
    kind: LightKind,
    color: Vec3,
    direction: Vec3,
    attenuation: Vec3,
    range: f32,
    inner_angle: f32,
    outer_angle: f32,
    falloff: f32,
    cast_shadows: bool,
}

impl Light {
    /// White light pointing down -Z
    pub fn new(kind: LightKind) -> Self {
        Self {
            kind,
            color: Vec3::new(1.0, 1.0, 1.0),
            direction: Vec3::new(0.0, 0.0, -1.0),
            attenuation: Vec3::new(1.0, 0.0, 0.0),
            range: 100.0,
            inner_angle: 30f32.to_radians(),
            outer_angle: 40f32.to_radians(),
            falloff: 1.0,
            cast_shadows: false,
        }
    }

    /// Light type
    pub fn kind(&self) -> LightKind {
        self.kind
    }

    /// Change the light type
    pub fn set_kind(&mut self, kind: LightKind) {
        self.kind = kind;
    }

    /// Color
    pub fn color(&self) -> Vec3 {
        self.color
    }

    /// Set the color
    pub fn set_color(&mut self, color: Vec3) {
        self.color = color;
    }

    /// Direction relative to the attached node
    pub fn direction(&self) -> Vec3 {
        self.direction
    }

    /// Set the local direction; a zero vector is rejected
    pub fn set_direction(&mut self, direction: Vec3) -> EngineResult<()> {
        let direction = direction
            .try_normalize(f32::EPSILON)
            .ok_or_else(|| EngineError::invalid_params("light direction must not be zero"))?;
        self.direction = direction;
        Ok(())
    }

    /// Reach of point and spot lights
    pub fn range(&self) -> f32 {
        self.range
    }

    /// Set range and attenuation coefficients
    pub fn set_attenuation(&mut self, range: f32, constant: f32, linear: f32, quadratic: f32) -> EngineResult<()> {
        if range <= 0.0 {
            return Err(EngineError::invalid_params(format!("light range must be positive, got {range}")));
        }
        self.range = range;
        self.attenuation = Vec3::new(constant, linear, quadratic);
        Ok(())
    }

    /// Constant, linear and quadratic attenuation
    pub fn attenuation(&self) -> Vec3 {
        self.attenuation
    }

    /// Set the cone of a spot light, angles in radians
    ///
    /// Only valid on spot lights.
    pub fn set_spot_range(&mut self, inner: f32, outer: f32, falloff: f32) -> EngineResult<()> {
        if self.kind != LightKind::Spot {
            return Err(EngineError::invalid_state(format!("a {:?} light has no spot cone", self.kind)));
        }
        if inner < 0.0 || outer < inner {
            return Err(EngineError::invalid_params(format!(
                "spot cone needs 0 <= inner <= outer, got {inner} and {outer}"
            )));
        }
        self.inner_angle = inner;
        self.outer_angle = outer;
        self.falloff = falloff;
        Ok(())
    }

    /// Inner and outer cone angles in radians
    pub fn spot_angles(&self) -> (f32, f32) {
        (self.inner_angle, self.outer_angle)
    }

    /// Whether the light casts shadows
    pub fn casts_shadows(&self) -> bool {
        self.cast_shadows
    }

    /// Toggle shadow casting
    pub fn set_cast_shadows(&mut self, cast_shadows: bool) {
        self.cast_shadows = cast_shadows;
    }

    /// Range sphere in world space; empty for directional lights
    pub fn world_bounds(&self, world: &Mat4) -> AABB {
        match self.kind {
            LightKind::Directional => AABB::empty(),
            _ => AABB::from_center_extents(world.translation_part(), Vec3::repeat(self.range)),
        }
    }

    /// Resolve against the attached node's world transform
    pub fn params(&self, world: &Mat4) -> LightParams {
        let direction = world
            .transform_vector(&self.direction)
            .try_normalize(f32::EPSILON)
            .unwrap_or(self.direction);
        LightParams {
            kind: self.kind,
            color: self.color,
            position: world.translation_part(),
            direction,
            attenuation: self.attenuation,
            spot: Vec3::new(self.inner_angle.cos(), self.outer_angle.cos(), self.falloff),
            range: self.range,
            cast_shadows: self.cast_shadows,
        }
    }

    /// Whether the light can affect anything inside `frustum`
    pub fn affects(params: &LightParams, frustum: &Frustum) -> bool {
        match params.kind {
            LightKind::Directional => true,
            LightKind::Point | LightKind::Spot => frustum.intersects_sphere(params.position, params.range),
        }
    }
}

/// One queued light
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightQueueItem {
    /// Light scene object
    pub object: SceneObjectId,
    /// World-space values
    pub params: LightParams,
}

/// Lights affecting the current view
#[derive(Debug, Clone, Default)]
pub struct LightQueue {
    items: Vec<LightQueueItem>,
}

impl LightQueue {
    /// Empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a light
    pub fn push(&mut self, object: SceneObjectId, params: LightParams) {
        self.items.push(LightQueueItem { object, params });
    }

    /// Queued lights in collection order
    pub fn lights(&self) -> &[LightQueueItem] {
        &self.items
    }

    /// Shadow-casting lights
    pub fn shadow_casters(&self) -> impl Iterator<Item = &LightQueueItem> {
        self.items.iter().filter(|item| item.params.cast_shadows)
    }

    /// Number of queued lights
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether no light is queued
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Drop every light
    pub fn clear(&mut self) {
        self.items.clear();
    }
}
