//! # Engine and Scene Configuration
//!
//! Builder-style configuration for the frame driver, the scene and the pool
//! capacities that back it. Every structure has sensible defaults so partial
//! configuration files load cleanly.

use serde::{Serialize, Deserialize};

use super::{Config, ConfigError};

/// # Pool Capacities
///
/// Number of slots reserved for each poolable scene type. Pools never grow, so
/// these are hard upper bounds on live objects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Scene graph nodes
    pub nodes: usize,
    /// Drawable entities
    pub entities: usize,
    /// Lights
    pub lights: usize,
    /// UI boxes
    pub boxes: usize,
    /// Text boxes
    pub textboxes: usize,
}

impl PoolConfig {
    /// Set node capacity
    pub fn with_nodes(mut self, capacity: usize) -> Self {
        self.nodes = capacity;
        self
    }

    /// Set entity capacity
    pub fn with_entities(mut self, capacity: usize) -> Self {
        self.entities = capacity;
        self
    }

    /// Set light capacity
    pub fn with_lights(mut self, capacity: usize) -> Self {
        self.lights = capacity;
        self
    }

    /// Set UI box capacity
    pub fn with_boxes(mut self, capacity: usize) -> Self {
        self.boxes = capacity;
        self
    }

    /// Set text box capacity
    pub fn with_textboxes(mut self, capacity: usize) -> Self {
        self.textboxes = capacity;
        self
    }

    /// Validate pool capacities
    pub fn validate(&self) -> Result<(), ConfigError> {
        let capacities = [
            ("nodes", self.nodes),
            ("entities", self.entities),
            ("lights", self.lights),
            ("boxes", self.boxes),
            ("textboxes", self.textboxes),
        ];

        for (pool, capacity) in capacities {
            if capacity == 0 {
                return Err(ConfigError::Invalid(format!("{} pool capacity must be greater than zero", pool)));
            }
            if capacity >= u32::MAX as usize {
                return Err(ConfigError::Invalid(format!("{} pool capacity {} is too large", pool, capacity)));
            }
        }
        Ok(())
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            nodes: 1024,
            entities: 1024,
            lights: 64,
            boxes: 256,
            textboxes: 256,
        }
    }
}

/// # Scene Configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Scene name, used in log output
    pub name: String,
    /// Pool capacities
    pub pools: PoolConfig,
}

impl SceneConfig {
    /// Create a scene configuration with default pool sizes
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pools: PoolConfig::default(),
        }
    }

    /// Replace pool capacities
    pub fn with_pools(mut self, pools: PoolConfig) -> Self {
        self.pools = pools;
        self
    }

    /// Validate scene configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pools.validate()
    }
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self::new("main")
    }
}

impl Config for SceneConfig {}

/// # Engine Configuration
///
/// Core engine behavior: logging, frame pacing and the scene to build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Default log filter when `RUST_LOG` is unset
    pub log_level: String,
    /// Target frames per second (0 = unlimited)
    pub target_fps: u32,
    /// Scene configuration
    pub scene: SceneConfig,
}

impl EngineConfig {
    /// Create default engine configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default log filter
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Set target frame rate
    pub fn with_target_fps(mut self, fps: u32) -> Self {
        self.target_fps = fps;
        self
    }

    /// Replace the scene configuration
    pub fn with_scene(mut self, scene: SceneConfig) -> Self {
        self.scene = scene;
        self
    }

    /// Fixed timestep implied by the target frame rate
    pub fn frame_time(&self) -> Option<f32> {
        (self.target_fps > 0).then(|| 1.0 / self.target_fps as f32)
    }

    /// Validate engine configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.log_level.trim().is_empty() {
            return Err(ConfigError::Invalid("log_level must not be empty".to_string()));
        }
        self.scene.validate()
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            target_fps: 60,
            scene: SceneConfig::default(),
        }
    }
}

impl Config for EngineConfig {}
