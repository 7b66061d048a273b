//! Scenario tests for the scene graph

mod traversal;

use crate::config::{PoolConfig, SceneConfig};
use crate::foundation::math::{Mat4, Vec3};
use crate::memory::Handle;
use super::{Entity, Light, Renderer, Scene, Skybox, TextBox, UiBox};

/// Renderer that records everything dispatched during the last frame
#[derive(Debug, Default)]
pub(super) struct RecordingRenderer {
    pub frames: usize,
    pub renderables: Vec<(Handle<Entity>, Mat4)>,
    pub instances: Vec<(Handle<Entity>, u32, Mat4)>,
    pub lights: Vec<Mat4>,
    pub boxes: usize,
    pub textboxes: Vec<String>,
    pub skybox: Option<Skybox>,
    pub ambient: Vec3,
}

impl Renderer for RecordingRenderer {
    fn begin_frame(&mut self) {
        let frames = self.frames + 1;
        *self = Self::default();
        self.frames = frames;
    }

    fn add_renderable(&mut self, handle: Handle<Entity>, _entity: &Entity, world: &Mat4) {
        self.renderables.push((handle, *world));
    }

    fn update_instance(&mut self, handle: Handle<Entity>, instance: u32, world: &Mat4) {
        self.instances.push((handle, instance, *world));
    }

    fn add_box(&mut self, _ui_box: &UiBox, _world: &Mat4) {
        self.boxes += 1;
    }

    fn add_textbox(&mut self, textbox: &TextBox, _world: &Mat4) {
        self.textboxes.push(textbox.text.clone());
    }

    fn add_light(&mut self, _light: &Light, world: &Mat4) {
        self.lights.push(*world);
    }

    fn set_skybox(&mut self, skybox: &Skybox) {
        self.skybox = Some(*skybox);
    }

    fn set_ambient_color(&mut self, color: Vec3) {
        self.ambient = color;
    }
}

pub(super) fn test_scene() -> Scene {
    let config = SceneConfig::new("test").with_pools(
        PoolConfig::default()
            .with_nodes(16)
            .with_entities(8)
            .with_lights(4)
            .with_boxes(4)
            .with_textboxes(4),
    );
    Scene::new(&config).unwrap()
}

pub(super) fn translation_of(matrix: &Mat4) -> Vec3 {
    Vec3::new(matrix[(0, 3)], matrix[(1, 3)], matrix[(2, 3)])
}
