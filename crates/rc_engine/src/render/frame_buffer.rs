//! Render target sets

use crate::render::texture::Texture;
use std::sync::Arc;

/// Pixel rectangle rendered into
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// Left edge
    pub left: f32,
    /// Top edge
    pub top: f32,
    /// Width in pixels
    pub width: f32,
    /// Height in pixels
    pub height: f32,
}

impl Viewport {
    /// Viewport covering a `width` x `height` target
    pub fn full(width: u32, height: u32) -> Self {
        Self { left: 0.0, top: 0.0, width: width as f32, height: height as f32 }
    }

    /// Width over height
    pub fn aspect(&self) -> f32 {
        if self.height > 0.0 { self.width / self.height } else { 1.0 }
    }
}

/// Set of color targets plus an optional depth-stencil target
///
/// The screen frame buffer has no attachments of its own; backends map it to
/// the swap chain.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameBuffer {
    id: u64,
    width: u32,
    height: u32,
    viewport: Viewport,
    color_targets: Vec<Arc<Texture>>,
    depth_stencil: Option<Arc<Texture>>,
    screen: bool,
}

impl FrameBuffer {
    pub(crate) fn screen(id: u64, width: u32, height: u32) -> Self {
        Self {
            id,
            width,
            height,
            viewport: Viewport::full(width, height),
            color_targets: Vec::new(),
            depth_stencil: None,
            screen: true,
        }
    }

    pub(crate) fn offscreen(
        id: u64,
        width: u32,
        height: u32,
        color_targets: Vec<Arc<Texture>>,
        depth_stencil: Option<Arc<Texture>>,
    ) -> Self {
        Self {
            id,
            width,
            height,
            viewport: Viewport::full(width, height),
            color_targets,
            depth_stencil,
            screen: false,
        }
    }

    /// Factory-assigned id
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Width in pixels
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Active viewport
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Restrict rendering to `viewport`
    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    /// Color attachments
    pub fn color_targets(&self) -> &[Arc<Texture>] {
        &self.color_targets
    }

    /// Depth-stencil attachment
    pub fn depth_stencil(&self) -> Option<&Arc<Texture>> {
        self.depth_stencil.as_ref()
    }

    /// Whether this is the swap-chain frame buffer
    pub fn is_screen(&self) -> bool {
        self.screen
    }
}
