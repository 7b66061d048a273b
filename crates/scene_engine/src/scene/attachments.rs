//! Objects that can be attached to scene nodes
//!
//! Attachments live in their own pools and are referenced from nodes by
//! handle. Nodes never own them: destroying an attachment leaves a stale handle
//! behind that traversal skips.

use crate::foundation::math::{Vec2, Vec3, Vec4};
use crate::memory::Handle;
use super::bounds::Aabb;

/// Mesh identifier in the resource layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct MeshId(pub u32);

/// Material identifier in the resource layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct MaterialId(pub u32);

/// Texture identifier in the resource layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TextureId(pub u32);

/// Drawable mesh/material pair
///
/// An instanced entity is drawn once per attachment with one matrix per
/// instance; every live attachment holds its own instance index. Indices
/// released by detaching are handed out again before new ones.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    /// Mesh to draw
    pub mesh: MeshId,
    /// Material to draw with
    pub material: MaterialId,
    /// Bounds in mesh space
    pub local_bounds: Aabb,
    /// Transparent entities are queued separately
    pub transparent: bool,
    instanced: bool,
    next_instance: u32,
    free_instances: Vec<u32>,
}

impl Entity {
    /// Create a non-instanced entity
    pub fn new(mesh: MeshId, material: MaterialId) -> Self {
        Self {
            mesh,
            material,
            ..Self::default()
        }
    }

    /// Set mesh-space bounds
    pub fn with_bounds(mut self, bounds: Aabb) -> Self {
        self.local_bounds = bounds;
        self
    }

    /// Mark as transparent
    pub fn with_transparency(mut self, transparent: bool) -> Self {
        self.transparent = transparent;
        self
    }

    /// Draw all attachments of this entity as instances of one batch
    pub fn instanced(mut self) -> Self {
        self.instanced = true;
        self
    }

    /// Whether attachments of this entity are instanced
    pub fn is_instanced(&self) -> bool {
        self.instanced
    }

    /// Number of instance indices currently held by attachments
    pub fn instance_count(&self) -> u32 {
        self.next_instance - self.free_instances.len() as u32
    }

    /// Released indices first, then a fresh one. `None` once the index
    /// space is used up.
    pub(crate) fn assign_instance(&mut self) -> Option<u32> {
        if let Some(index) = self.free_instances.pop() {
            return Some(index);
        }
        let index = self.next_instance;
        self.next_instance = index.checked_add(1)?;
        Some(index)
    }

    pub(crate) fn release_instance(&mut self, index: u32) {
        if index >= self.next_instance || self.free_instances.contains(&index) {
            log::warn!("Ignoring release of unassigned instance index {}", index);
            return;
        }
        self.free_instances.push(index);
    }
}

impl Default for Entity {
    fn default() -> Self {
        Self {
            mesh: MeshId::default(),
            material: MaterialId::default(),
            local_bounds: Aabb::empty(),
            transparent: false,
            instanced: false,
            next_instance: 0,
            free_instances: Vec::new(),
        }
    }
}

/// Entity reference held by a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityAttachment {
    /// Attached entity
    pub entity: Handle<Entity>,
    /// Instance index when the entity is instanced
    pub instance: Option<u32>,
}

/// Light type
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum LightKind {
    /// Omnidirectional light at the node origin
    #[default]
    Point,
    /// Light along the node's -Z axis, position ignored
    Directional,
    /// Cone along the node's -Z axis
    Spot {
        /// Inner cone angle in radians
        inner_angle: f32,
        /// Outer cone angle in radians
        outer_angle: f32,
    },
}

/// Light source
#[derive(Debug, Clone, PartialEq)]
pub struct Light {
    /// Light type
    pub kind: LightKind,
    /// Linear RGB color
    pub color: Vec3,
    /// Intensity multiplier
    pub intensity: f32,
    /// Attenuation range (ignored for directional lights)
    pub range: f32,
    /// Whether this light casts shadows
    pub cast_shadows: bool,
}

impl Light {
    /// Point light
    pub fn point(color: Vec3, intensity: f32, range: f32) -> Self {
        Self {
            kind: LightKind::Point,
            color,
            intensity,
            range,
            ..Self::default()
        }
    }

    /// Directional light
    pub fn directional(color: Vec3, intensity: f32) -> Self {
        Self {
            kind: LightKind::Directional,
            color,
            intensity,
            ..Self::default()
        }
    }

    /// Spot light
    pub fn spot(color: Vec3, intensity: f32, range: f32, inner_angle: f32, outer_angle: f32) -> Self {
        Self {
            kind: LightKind::Spot { inner_angle, outer_angle },
            color,
            intensity,
            range,
            ..Self::default()
        }
    }
}

impl Default for Light {
    fn default() -> Self {
        Self {
            kind: LightKind::Point,
            color: Vec3::repeat(1.0),
            intensity: 1.0,
            range: 10.0,
            cast_shadows: false,
        }
    }
}

/// Screen-space rectangle drawn at the node's projected position
#[derive(Debug, Clone, PartialEq)]
pub struct UiBox {
    /// Size in pixels
    pub size: Vec2,
    /// RGBA fill color
    pub color: Vec4,
    /// Draw order, higher draws on top
    pub layer: u8,
}

impl Default for UiBox {
    fn default() -> Self {
        Self {
            size: Vec2::new(100.0, 100.0),
            color: Vec4::repeat(1.0),
            layer: 0,
        }
    }
}

/// Text label drawn at the node's projected position
#[derive(Debug, Clone, PartialEq)]
pub struct TextBox {
    /// Text contents
    pub text: String,
    /// Font size in pixels
    pub font_size: f32,
    /// RGBA text color
    pub color: Vec4,
}

impl TextBox {
    /// Create a white label
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }
}

impl Default for TextBox {
    fn default() -> Self {
        Self {
            text: String::new(),
            font_size: 16.0,
            color: Vec4::repeat(1.0),
        }
    }
}

/// Environment cube map
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Skybox {
    /// Cube map texture
    pub cubemap: TextureId,
    /// Brightness multiplier
    pub intensity: f32,
}
