//! Interface between scene traversal and the graphics backend

use crate::foundation::math::{Mat4, Vec3};
use crate::memory::Handle;
use super::attachments::{Entity, Light, Skybox, TextBox, UiBox};

/// Receiver of the drawables found during a scene graph traversal
///
/// The scene calls [`begin_frame`](Self::begin_frame) once, then hands over
/// every live attachment exactly once together with its node's world matrix.
pub trait Renderer {
    /// Start collecting a new frame
    fn begin_frame(&mut self) {}

    /// Entity attached to a node
    fn add_renderable(&mut self, handle: Handle<Entity>, entity: &Entity, world: &Mat4);

    /// Per-instance matrix for an instanced entity, sent after `add_renderable`
    fn update_instance(&mut self, handle: Handle<Entity>, instance: u32, world: &Mat4) {
        let _ = (handle, instance, world);
    }

    /// UI box attached to a node
    fn add_box(&mut self, ui_box: &UiBox, world: &Mat4);

    /// Text box attached to a node
    fn add_textbox(&mut self, textbox: &TextBox, world: &Mat4);

    /// Light attached to a node
    fn add_light(&mut self, light: &Light, world: &Mat4);

    /// Scene environment map
    fn set_skybox(&mut self, _skybox: &Skybox) {}

    /// Scene ambient light color
    fn set_ambient_color(&mut self, _color: Vec3) {}
}
