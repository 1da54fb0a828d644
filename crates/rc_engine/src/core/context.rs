//! Engine context
//!
//! Owns every subsystem and passes them explicitly; there is no global
//! state. One call to [`EngineContext::frame`] runs the whole frame:
//!
//! 1. scene update (animation before any queue is filled)
//! 2. background pass (sky boxes)
//! 3. light queue, then the Opaque, Transparent and Translucent buckets
//! 4. overlay pass (sprites) with the pixel-space screen view
//! 5. animation event dispatch and present

use crate::core::config::EngineConfig;
use crate::core::error::{EngineError, EngineResult};
use crate::events::{AnimationEvent, EventBus};
use crate::render::device::{RenderBackend, RenderDevice};
use crate::render::factory::RenderFactory;
use crate::render::material::ViewContext;
use crate::resources::{FileSystem, ResourceManager};
use crate::scene::{Camera, RenderBucket, SceneManager};
use std::sync::Arc;

/// Counters of one frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Frame number, starting at 1
    pub frame: u64,
    /// Items queued across all buckets
    pub queued_items: usize,
    /// Lights in the light queue
    pub lights: usize,
    /// Backend draw calls
    pub draw_calls: u32,
    /// Primitives submitted
    pub primitives: u32,
    /// Pipeline and render state changes
    pub state_changes: u32,
    /// Animation events delivered to subscribers
    pub events_dispatched: usize,
}

/// Owner of the device, scene, resources and event bus
pub struct EngineContext {
    config: EngineConfig,
    file_system: Arc<FileSystem>,
    resources: ResourceManager,
    device: RenderDevice,
    scene: SceneManager,
    events: EventBus<AnimationEvent>,
    frame: u64,
}

impl EngineContext {
    /// Build every subsystem from `config`, drawing through `backend`
    pub fn new(config: EngineConfig, backend: Box<dyn RenderBackend>) -> EngineResult<Self> {
        let render = &config.render;
        if render.width == 0 || render.height == 0 {
            return Err(EngineError::invalid_params(format!(
                "screen size must be non-zero, got {}x{}",
                render.width, render.height
            )));
        }

        log::info!("Initializing engine context...");
        let factory = Arc::new(RenderFactory::new(render.default_texture_color));
        let file_system = Arc::new(FileSystem::from_config(&config.resources));
        let resources = ResourceManager::new(file_system.clone(), factory.clone());
        let device = RenderDevice::new(backend, factory.clone(), render.width, render.height);
        let scene = SceneManager::new(factory, config.scene.clone());

        Ok(Self {
            config,
            file_system,
            resources,
            device,
            scene,
            events: EventBus::new(),
            frame: 0,
        })
    }

    /// Active configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Resource search paths
    pub fn file_system(&self) -> &Arc<FileSystem> {
        &self.file_system
    }

    /// Resource registry
    pub fn resources(&self) -> &ResourceManager {
        &self.resources
    }

    /// Render device
    pub fn device(&self) -> &RenderDevice {
        &self.device
    }

    /// Mutable render device
    pub fn device_mut(&mut self) -> &mut RenderDevice {
        &mut self.device
    }

    /// Scene
    pub fn scene(&self) -> &SceneManager {
        &self.scene
    }

    /// Mutable scene
    pub fn scene_mut(&mut self) -> &mut SceneManager {
        &mut self.scene
    }

    /// Animation event bus; subscribe here
    pub fn events_mut(&mut self) -> &mut EventBus<AnimationEvent> {
        &mut self.events
    }

    /// Frames run so far
    pub fn frame_count(&self) -> u64 {
        self.frame
    }

    /// Run one frame seen through `camera`, `dt` seconds after the last one
    pub fn frame(&mut self, dt: f32, camera: &Camera) -> EngineResult<FrameStats> {
        self.frame += 1;
        self.device.begin_frame();

        self.scene.update_scene_graph(dt, &mut self.events)?;

        let screen = self.device.screen_frame_buffer().clone();
        self.device.bind_frame_buffer(&screen)?;
        self.device.clear(self.config.render.clear_color)?;

        let view = ViewContext::from_camera(camera);
        self.scene.update_background_queue(camera)?;
        self.draw_bucket(RenderBucket::Background, &view)?;

        self.scene.update_light_queue(camera)?;
        self.scene.update_render_queue(camera, self.config.scene.render_order)?;
        let primary_light = self.scene.light_queue().lights().first().map(|item| item.params);
        let lit = view.with_light(primary_light);
        for bucket in [RenderBucket::Opaque, RenderBucket::Transparent, RenderBucket::Translucent] {
            self.draw_bucket(bucket, &lit)?;
        }

        self.scene.update_overlay_queue()?;
        let screen_view = ViewContext::screen(screen.width(), screen.height());
        self.draw_bucket(RenderBucket::Overlay, &screen_view)?;

        let events_dispatched = self.events.dispatch();
        self.device.present()?;

        let device = self.device.stats();
        let stats = FrameStats {
            frame: self.frame,
            queued_items: self.scene.render_queue().item_count(),
            lights: self.scene.light_queue().len(),
            draw_calls: device.draw_calls,
            primitives: device.primitives,
            state_changes: device.pipeline_binds + device.state_changes,
            events_dispatched,
        };
        log::trace!("Frame {}: {:?}", self.frame, stats);
        Ok(stats)
    }

    fn draw_bucket(&mut self, bucket: RenderBucket, view: &ViewContext) -> EngineResult<()> {
        self.scene.render_queue_mut().render_bucket(bucket, true);
        for item in self.scene.render_queue().bucket(bucket) {
            match self.scene.resolve_renderable(&item.renderable) {
                Some(renderable) => self.device.draw_renderable(&renderable, view)?,
                None => log::warn!("Skipping {:?}: its scene object no longer exists", item.renderable),
            }
        }
        Ok(())
    }
}
