//! Core engine implementation

use std::time::Duration;

use crate::{
    application::Application,
    config::{ConfigError, EngineConfig},
    foundation::{
        logging,
        time::{Stopwatch, Timer},
    },
    scene::{RenderQueue, Scene, SceneError, VisitStats},
};
use thiserror::Error;

/// Summary of one frame
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameStats {
    /// Frame number, starting at 1
    pub frame: u64,
    /// Step used for the application update
    pub delta_time: f32,
    /// Scene traversal counters
    pub visit: VisitStats,
    /// Batches queued for drawing
    pub batches: usize,
}

/// Main engine struct
///
/// The engine owns the scene and the render queue it is traversed into, and
/// drives the per-frame update/traverse cycle.
pub struct Engine {
    scene: Scene,
    render_queue: RenderQueue,
    timer: Timer,
    config: EngineConfig,
    running: bool,
    last_frame: FrameStats,
}

impl Engine {
    /// Create a new engine instance
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        logging::init_with_level(&config.log_level);
        config.validate()?;

        log::info!("Initializing engine...");
        let scene = Scene::new(&config.scene)?;

        Ok(Self {
            scene,
            render_queue: RenderQueue::new(),
            timer: Timer::new(),
            config,
            running: true,
            last_frame: FrameStats::default(),
        })
    }

    /// Run the frame loop with the given application
    ///
    /// Stops when the application calls [`quit`](Self::quit) or after
    /// `max_frames` frames.
    pub fn run<A: Application>(config: EngineConfig, app: &mut A, max_frames: Option<u64>) -> Result<(), EngineError> {
        let mut engine = Self::new(config)?;

        app.initialize(&mut engine)
            .map_err(|e| EngineError::ApplicationError(format!("App initialization: {}", e)))?;

        log::info!("Starting main loop...");
        let frame_budget = engine.config.frame_time().map(Duration::from_secs_f32);

        while engine.running && max_frames.map_or(true, |max| engine.timer.frame_count() < max) {
            let frame_clock = Stopwatch::start_new();
            let delta_time = engine.timer.update();

            engine.frame(app, delta_time)?;

            if let Some(budget) = frame_budget {
                if let Some(remaining) = budget.checked_sub(frame_clock.elapsed()) {
                    std::thread::sleep(remaining);
                }
            }
        }

        app.cleanup(&mut engine);

        log::info!(
            "Engine shutdown complete after {} frames ({:.1} fps average)",
            engine.timer.frame_count(),
            engine.timer.average_fps()
        );
        Ok(())
    }

    /// Advance one frame by an explicit step
    pub fn step<A: Application + ?Sized>(&mut self, app: &mut A, delta_time: f32) -> Result<FrameStats, EngineError> {
        self.timer.advance(delta_time);
        self.frame(app, delta_time)
    }

    fn frame<A: Application + ?Sized>(&mut self, app: &mut A, delta_time: f32) -> Result<FrameStats, EngineError> {
        app.update(self, delta_time)
            .map_err(|e| EngineError::ApplicationError(format!("App update: {}", e)))?;

        let visit = self.scene.update_scene_graph(&mut self.render_queue);
        self.last_frame = FrameStats {
            frame: self.timer.frame_count(),
            delta_time,
            visit,
            batches: self.render_queue.batch_count(),
        };

        log::trace!("Frame {}: {:?}", self.last_frame.frame, self.last_frame);
        Ok(self.last_frame)
    }

    /// Request engine shutdown
    pub fn quit(&mut self) {
        log::info!("Engine shutdown requested");
        self.running = false;
    }

    /// Whether the frame loop keeps going
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// The scene being driven
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// The scene being driven, mutable
    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    /// Render queue filled by the last frame
    pub fn render_queue(&self) -> &RenderQueue {
        &self.render_queue
    }

    /// Frame timer
    pub fn timer(&self) -> &Timer {
        &self.timer
    }

    /// Engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Statistics of the last completed frame
    pub fn last_frame(&self) -> &FrameStats {
        &self.last_frame
    }
}

/// Engine errors
#[derive(Error, Debug)]
pub enum EngineError {
    /// Configuration rejected
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Scene setup failed
    #[error("Scene error: {0}")]
    Scene(#[from] SceneError),

    /// Application returned an error
    #[error("Application error: {0}")]
    ApplicationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::AppError;
    use crate::config::PoolConfig;
    use crate::foundation::math::{Quat, Vec3};
    use crate::scene::{Entity, MaterialId, MeshId, NodeHandle, NodeRef};

    #[derive(Default)]
    struct Spinner {
        node: Option<NodeHandle>,
        updates: u32,
        cleaned_up: bool,
        quit_after: Option<u32>,
    }

    impl Application for Spinner {
        fn initialize(&mut self, engine: &mut Engine) -> Result<(), AppError> {
            let scene = engine.scene_mut();
            let node = scene.create_node("spinner", NodeRef::Root)?;
            let mesh = scene.create_entity(Entity::new(MeshId(1), MaterialId(1)))?;
            scene.attach_entity(node, mesh)?;
            self.node = Some(node);
            Ok(())
        }

        fn update(&mut self, engine: &mut Engine, delta_time: f32) -> Result<(), AppError> {
            self.updates += 1;
            let node = self.node.ok_or_else(|| AppError::Custom("not initialized".to_string()))?;
            if let Some(node) = engine.scene_mut().node_mut(node) {
                node.rotate(Quat::from_axis_angle(&Vec3::y_axis(), delta_time));
            }
            if self.quit_after == Some(self.updates) {
                engine.quit();
            }
            Ok(())
        }

        fn cleanup(&mut self, _engine: &mut Engine) {
            self.cleaned_up = true;
        }
    }

    fn headless_config() -> EngineConfig {
        EngineConfig::default().with_target_fps(0)
    }

    #[test]
    fn test_run_stops_after_max_frames() {
        let mut app = Spinner::default();
        Engine::run(headless_config(), &mut app, Some(3)).unwrap();

        assert_eq!(app.updates, 3);
        assert!(app.cleaned_up);
    }

    #[test]
    fn test_quit_ends_loop() {
        let mut app = Spinner {
            quit_after: Some(2),
            ..Spinner::default()
        };
        Engine::run(headless_config(), &mut app, None).unwrap();

        assert_eq!(app.updates, 2);
    }

    #[test]
    fn test_step_traverses_scene() {
        let mut engine = Engine::new(headless_config()).unwrap();
        let mut app = Spinner::default();
        app.initialize(&mut engine).unwrap();

        let first = engine.step(&mut app, 0.5).unwrap();
        assert_eq!(first.frame, 1);
        assert_eq!(first.visit.visited, 2);
        assert_eq!(first.visit.dispatched, 1);
        assert_eq!(first.batches, 1);

        let second = engine.step(&mut app, 0.5).unwrap();
        assert_eq!(second.frame, 2);
        assert_eq!(second.visit.recomputed, 1);
        assert_eq!(engine.last_frame(), &second);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = headless_config()
            .with_scene(crate::config::SceneConfig::new("bad").with_pools(PoolConfig::default().with_nodes(0)));

        assert!(matches!(Engine::new(config), Err(EngineError::Config(_))));
    }
}
