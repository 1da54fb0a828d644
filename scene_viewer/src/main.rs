//! Headless scene viewer
//!
//! Builds the procedural demo scene, orbits a camera around it for a fixed
//! number of frames and logs what the device recorded. Pass a `.toml` or
//! `.ron` engine configuration as the first argument to override defaults.
//!
//! ```text
//! RUST_LOG=rc_engine=debug cargo run -p scene_viewer -- viewer.toml
//! ```

mod demo_scene;

use demo_scene::DemoScene;
use rc_engine::core::Config;
use rc_engine::foundation::logging;
use rc_engine::prelude::*;
use rc_engine::render::DeviceCommand;

const FRAME_COUNT: u64 = 120;
const FRAME_TIME: f32 = 1.0 / 60.0;
const ORBIT_RADIUS: f32 = 14.0;
const ORBIT_SPEED: f32 = 0.5;

struct SceneViewerApp {
    context: EngineContext,
    commands: CommandLog,
    camera: Camera,
    demo: DemoScene,
    elapsed: f32,
    total_draws: u64,
}

impl SceneViewerApp {
    fn new(config: EngineConfig) -> EngineResult<Self> {
        let aspect = config.render.width as f32 / config.render.height as f32;
        let backend = RecordingBackend::new();
        let commands = backend.log();
        let mut context = EngineContext::new(config, Box::new(backend))?;

        let demo = demo_scene::build(&mut context)?;
        context.events_mut().subscribe(|event: &AnimationEvent| {
            match event.kind {
                AnimationEventKind::Begin => log::info!("Animation '{}' started", event.clip),
                AnimationEventKind::Loop => log::debug!("Animation '{}' looped", event.clip),
                AnimationEventKind::End => log::info!("Animation '{}' finished", event.clip),
            }
            false
        });

        let camera = Camera::perspective(Vec3::new(0.0, 4.0, ORBIT_RADIUS), 60.0, aspect, 0.1, 200.0);
        Ok(Self {
            context,
            commands,
            camera,
            demo,
            elapsed: 0.0,
            total_draws: 0,
        })
    }

    fn update(&mut self, dt: f32) -> EngineResult<()> {
        self.elapsed += dt;

        let angle = self.elapsed * ORBIT_SPEED;
        self.camera
            .set_position(Vec3::new(angle.sin() * ORBIT_RADIUS, 4.0, angle.cos() * ORBIT_RADIUS));

        let scene = self.context.scene_mut();
        let lamp_angle = -self.elapsed * 1.5;
        let lamp_position = Vec3::new(lamp_angle.cos() * 3.0, 2.5, lamp_angle.sin() * 3.0);
        scene.scene_graph_mut().set_position(self.demo.lamp_node, lamp_position)?;

        let hud_width = 128.0 + (self.elapsed * 2.0).sin() * 32.0;
        scene
            .sprite_mut(self.demo.hud)?
            .set_rect(Rect::new(16.0, 16.0, hud_width, 32.0))?;
        Ok(())
    }

    fn run(&mut self) -> EngineResult<()> {
        for _ in 0..FRAME_COUNT {
            self.update(FRAME_TIME)?;
            let stats = self.context.frame(FRAME_TIME, &self.camera)?;

            let commands = self.commands.take();
            self.total_draws += commands
                .iter()
                .filter(|c| matches!(c, DeviceCommand::Draw { .. }))
                .count() as u64;

            if stats.frame % 30 == 0 {
                log::info!(
                    "Frame {}: {} queued, {} lights, {} draws, {} primitives, {} state changes",
                    stats.frame,
                    stats.queued_items,
                    stats.lights,
                    stats.draw_calls,
                    stats.primitives,
                    stats.state_changes
                );
            }
        }

        let arm = self.context.scene().entity(self.demo.arm)?;
        log::info!(
            "Ran {} frames, {} draws recorded, arm animated: {}",
            self.context.frame_count(),
            self.total_draws,
            arm.is_animated()
        );
        Ok(())
    }
}

fn load_config() -> Result<EngineConfig, Box<dyn std::error::Error>> {
    match std::env::args().nth(1) {
        Some(path) => Ok(EngineConfig::load_from_file(&path)?),
        None => Ok(EngineConfig::default()),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("PANIC occurred: {panic_info}");
    }));

    let config = load_config()?;
    logging::init(&config.logging.level);
    log::info!("Starting scene viewer ({}x{})", config.render.width, config.render.height);

    let mut app = SceneViewerApp::new(config)?;
    match app.run() {
        Ok(()) => {
            log::info!("Scene viewer completed successfully");
            Ok(())
        }
        Err(e) => {
            log::error!("Scene viewer failed: {e}");
            Err(e.into())
        }
    }
}
