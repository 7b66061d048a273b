//! Render queue for batched rendering
//!
//! Collects what the scene graph traversal dispatches and organizes it for
//! submission: plain entities are batched by material, instanced entities get
//! one GPU-ready instance buffer each.

use std::collections::HashMap;

use bytemuck::{Pod, Zeroable};

use crate::foundation::math::{Mat4, Vec3};
use crate::memory::Handle;
use super::attachments::{Entity, Light, MaterialId, MeshId, Skybox, TextBox, UiBox};
use super::renderer::Renderer;

/// Entity queued for drawing
#[derive(Debug, Clone, PartialEq)]
pub struct RenderableObject {
    /// Source entity
    pub handle: Handle<Entity>,
    /// Mesh to draw
    pub mesh: MeshId,
    /// World matrix of the owning node
    pub world: Mat4,
}

/// A batch of objects sharing the same material
#[derive(Debug, Clone)]
pub struct RenderBatch {
    /// Material used by all objects in this batch
    pub material_id: MaterialId,

    /// Objects in this batch
    pub objects: Vec<RenderableObject>,
}

impl RenderBatch {
    /// Create a new empty batch for a material
    pub fn new(material_id: MaterialId) -> Self {
        Self {
            material_id,
            objects: Vec::new(),
        }
    }

    /// Get the number of objects in this batch
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }
}

/// Per-instance data laid out for upload to a vertex buffer
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct InstanceData {
    /// Column-major world matrix
    pub model: [[f32; 4]; 4],
}

impl From<&Mat4> for InstanceData {
    fn from(matrix: &Mat4) -> Self {
        Self { model: (*matrix).into() }
    }
}

/// All instances of one instanced entity
///
/// Instances are packed in the order they were dispatched. `indices` maps each
/// packed slot back to the attachment's instance index.
#[derive(Debug, Clone)]
pub struct InstanceBatch {
    /// Mesh to draw
    pub mesh: MeshId,
    /// Material to draw with
    pub material_id: MaterialId,
    instances: Vec<InstanceData>,
    indices: Vec<u32>,
    slots: HashMap<u32, usize>,
}

impl InstanceBatch {
    fn new(mesh: MeshId, material_id: MaterialId) -> Self {
        Self {
            mesh,
            material_id,
            instances: Vec::new(),
            indices: Vec::new(),
            slots: HashMap::new(),
        }
    }

    /// Packed instance data, one entry per live instance
    pub fn instances(&self) -> &[InstanceData] {
        &self.instances
    }

    /// Instance index of each packed entry
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Data for one instance index
    pub fn instance(&self, index: u32) -> Option<&InstanceData> {
        self.slots.get(&index).map(|&slot| &self.instances[slot])
    }

    fn set(&mut self, index: u32, data: InstanceData) {
        match self.slots.get(&index) {
            Some(&slot) => self.instances[slot] = data,
            None => {
                self.slots.insert(index, self.instances.len());
                self.indices.push(index);
                self.instances.push(data);
            }
        }
    }

    /// Raw bytes for buffer upload
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.instances)
    }
}

/// UI element queued for the overlay pass
#[derive(Debug, Clone, PartialEq)]
pub enum OverlayItem {
    /// Rectangle
    Box(UiBox, Mat4),
    /// Label
    Text(TextBox, Mat4),
}

/// Frame render queue
///
/// Implements [`Renderer`] so it can be filled directly by a scene traversal,
/// then read back by the backend.
#[derive(Debug, Default)]
pub struct RenderQueue {
    opaque_batches: HashMap<MaterialId, RenderBatch>,
    transparent_batches: HashMap<MaterialId, RenderBatch>,
    instance_batches: HashMap<Handle<Entity>, InstanceBatch>,
    lights: Vec<(Light, Mat4)>,
    overlay: Vec<OverlayItem>,
    skybox: Option<Skybox>,
    ambient_color: Vec3,
}

impl RenderQueue {
    /// Create an empty render queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop everything queued
    pub fn clear(&mut self) {
        self.opaque_batches.clear();
        self.transparent_batches.clear();
        self.instance_batches.clear();
        self.lights.clear();
        self.overlay.clear();
        self.skybox = None;
        self.ambient_color = Vec3::zeros();
    }

    /// Opaque batches sorted by material
    pub fn opaque_batches(&self) -> Vec<&RenderBatch> {
        Self::sorted(&self.opaque_batches)
    }

    /// Transparent batches sorted by material
    pub fn transparent_batches(&self) -> Vec<&RenderBatch> {
        Self::sorted(&self.transparent_batches)
    }

    fn sorted(batches: &HashMap<MaterialId, RenderBatch>) -> Vec<&RenderBatch> {
        let mut sorted: Vec<_> = batches.values().collect();
        sorted.sort_by_key(|batch| batch.material_id);
        sorted
    }

    /// Instance batch for an instanced entity
    pub fn instance_batch(&self, handle: Handle<Entity>) -> Option<&InstanceBatch> {
        self.instance_batches.get(&handle)
    }

    /// Number of instance batches
    pub fn instance_batch_count(&self) -> usize {
        self.instance_batches.len()
    }

    /// Queued lights with their world matrices
    pub fn lights(&self) -> &[(Light, Mat4)] {
        &self.lights
    }

    /// Queued UI elements in dispatch order
    pub fn overlay(&self) -> &[OverlayItem] {
        &self.overlay
    }

    /// Skybox for this frame
    pub fn skybox(&self) -> Option<&Skybox> {
        self.skybox.as_ref()
    }

    /// Ambient color for this frame
    pub fn ambient_color(&self) -> Vec3 {
        self.ambient_color
    }

    /// Number of non-instanced objects
    pub fn object_count(&self) -> usize {
        self.opaque_batches
            .values()
            .chain(self.transparent_batches.values())
            .map(RenderBatch::object_count)
            .sum()
    }

    /// Number of material and instance batches
    pub fn batch_count(&self) -> usize {
        self.opaque_batches.len() + self.transparent_batches.len() + self.instance_batches.len()
    }
}

impl Renderer for RenderQueue {
    fn begin_frame(&mut self) {
        self.clear();
    }

    fn add_renderable(&mut self, handle: Handle<Entity>, entity: &Entity, world: &Mat4) {
        if entity.is_instanced() {
            self.instance_batches
                .entry(handle)
                .or_insert_with(|| InstanceBatch::new(entity.mesh, entity.material));
            return;
        }

        let batches = if entity.transparent {
            &mut self.transparent_batches
        } else {
            &mut self.opaque_batches
        };
        batches
            .entry(entity.material)
            .or_insert_with(|| RenderBatch::new(entity.material))
            .objects
            .push(RenderableObject {
                handle,
                mesh: entity.mesh,
                world: *world,
            });
    }

    fn update_instance(&mut self, handle: Handle<Entity>, instance: u32, world: &Mat4) {
        let Some(batch) = self.instance_batches.get_mut(&handle) else {
            log::warn!("Instance {} update for unqueued entity {:?}", instance, handle);
            return;
        };
        batch.set(instance, InstanceData::from(world));
    }

    fn add_box(&mut self, ui_box: &UiBox, world: &Mat4) {
        self.overlay.push(OverlayItem::Box(ui_box.clone(), *world));
    }

    fn add_textbox(&mut self, textbox: &TextBox, world: &Mat4) {
        self.overlay.push(OverlayItem::Text(textbox.clone(), *world));
    }

    fn add_light(&mut self, light: &Light, world: &Mat4) {
        self.lights.push((light.clone(), *world));
    }

    fn set_skybox(&mut self, skybox: &Skybox) {
        self.skybox = Some(*skybox);
    }

    fn set_ambient_color(&mut self, color: Vec3) {
        self.ambient_color = color;
    }
}
