//! # Scene Engine
//!
//! The object-memory and scene-graph core of a real-time rendering engine.
//!
//! ## Features
//!
//! - **Pooled Memory**: Fixed-capacity object pools with O(1) create/destroy
//!   and generation-checked handles
//! - **Pool Cluster**: One registry of pools keyed by type
//! - **Scene Graph**: Node hierarchy with dirty-flag transform propagation
//! - **Renderer Dispatch**: Every live attachment handed to a pluggable renderer
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use scene_engine::prelude::*;
//!
//! struct MyApp;
//!
//! impl Application for MyApp {
//!     fn initialize(&mut self, engine: &mut Engine) -> Result<(), AppError> {
//!         engine.scene_mut().create_node("player", NodeRef::Root)?;
//!         Ok(())
//!     }
//!
//!     fn update(&mut self, engine: &mut Engine, delta_time: f32) -> Result<(), AppError> {
//!         if let Some(player) = engine.scene().find_node("player") {
//!             if let Some(node) = engine.scene_mut().node_mut(player) {
//!                 node.translate(Vec3::new(delta_time, 0.0, 0.0));
//!             }
//!         }
//!         Ok(())
//!     }
//!
//!     fn cleanup(&mut self, _engine: &mut Engine) {}
//! }
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = EngineConfig::default();
//!     let mut app = MyApp;
//!     Engine::run(config, &mut app, Some(600))?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::must_use_candidate)]

pub mod foundation;
pub mod memory;
pub mod config;
pub mod scene;

mod application;
mod engine;

pub use application::{Application, AppError};
pub use engine::{Engine, EngineError, FrameStats};

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        Application, AppError,
        Engine, EngineError, FrameStats,
        config::{Config, EngineConfig, PoolConfig, SceneConfig},
        foundation::{
            math::{Vec3, Mat4, Quat, Transform},
            time::{Timer, Stopwatch},
        },
        memory::{Handle, MemoryPool, PoolCluster, PoolError},
        scene::{
            Entity, Light, MaterialId, MeshId, Node, NodeHandle, NodeRef, RenderQueue, Renderer, Scene,
            SceneError, Skybox, TextBox, UiBox,
        },
    };
}
