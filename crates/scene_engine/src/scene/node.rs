//! Scene graph nodes

use bitflags::bitflags;

use crate::foundation::math::{Mat4, Quat, Transform, Vec3};
use crate::memory::Handle;
use super::attachments::{EntityAttachment, Light, TextBox, UiBox};
use super::bounds::Aabb;

/// Handle to a pooled scene node
pub type NodeHandle = Handle<Node>;

bitflags! {
    /// Per-node update state
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct NodeFlags: u8 {
        /// Local placement changed since the last traversal
        const TRANSFORM_DIRTY = 1 << 0;
        /// Local scale changed since the last traversal
        const SCALE_DIRTY = 1 << 1;
    }
}

/// Parent reference: either the scene root or a pooled node
///
/// The root is owned by the scene itself rather than allocated from the node
/// pool, so it has no handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeRef {
    /// The scene root
    Root,
    /// A pooled node
    Node(NodeHandle),
}

impl From<NodeHandle> for NodeRef {
    fn from(handle: NodeHandle) -> Self {
        NodeRef::Node(handle)
    }
}

/// Element of the scene hierarchy
///
/// A node holds its placement relative to its parent plus the world-space
/// state computed during traversal. Scale is tracked separately from the rigid
/// part of the transform: children inherit their parent's translation and
/// rotation through the rigid world matrix, and the parent's scale only through
/// [`derived_scale`](Self::derived_scale).
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub(crate) name: String,
    local: Transform,
    derived_scale: Vec3,
    world_rigid: Mat4,
    world: Mat4,
    pub(crate) world_bounds: Aabb,
    flags: NodeFlags,
    pub(crate) parent: Option<NodeRef>,
    pub(crate) children: Vec<NodeHandle>,
    pub(crate) entities: Vec<EntityAttachment>,
    pub(crate) lights: Vec<Handle<Light>>,
    pub(crate) boxes: Vec<Handle<UiBox>>,
    pub(crate) textboxes: Vec<Handle<TextBox>>,
}

impl Node {
    pub(crate) fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Node name, empty for anonymous nodes
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Local placement relative to the parent
    pub fn transform(&self) -> &Transform {
        &self.local
    }

    /// Local position
    pub fn position(&self) -> Vec3 {
        self.local.position
    }

    /// Local orientation
    pub fn orientation(&self) -> Quat {
        self.local.rotation
    }

    /// Local scale
    pub fn scale(&self) -> Vec3 {
        self.local.scale
    }

    /// Replace the whole local placement
    pub fn set_transform(&mut self, transform: Transform) {
        let scale_changed = transform.scale != self.local.scale;
        self.local = transform;
        self.flags.insert(NodeFlags::TRANSFORM_DIRTY);
        if scale_changed {
            self.flags.insert(NodeFlags::SCALE_DIRTY);
        }
    }

    /// Set local position
    pub fn set_position(&mut self, position: Vec3) {
        self.local.position = position;
        self.flags.insert(NodeFlags::TRANSFORM_DIRTY);
    }

    /// Move by `offset` in parent space
    pub fn translate(&mut self, offset: Vec3) {
        self.local.position += offset;
        self.flags.insert(NodeFlags::TRANSFORM_DIRTY);
    }

    /// Set local orientation
    pub fn set_orientation(&mut self, orientation: Quat) {
        self.local.rotation = orientation;
        self.flags.insert(NodeFlags::TRANSFORM_DIRTY);
    }

    /// Apply `rotation` after the current orientation, in local space
    pub fn rotate(&mut self, rotation: Quat) {
        self.local.rotation *= rotation;
        self.flags.insert(NodeFlags::TRANSFORM_DIRTY);
    }

    /// Set local scale
    pub fn set_scale(&mut self, scale: Vec3) {
        self.local.scale = scale;
        self.flags.insert(NodeFlags::SCALE_DIRTY);
    }

    /// Accumulated scale of this node and all ancestors
    pub fn derived_scale(&self) -> Vec3 {
        self.derived_scale
    }

    /// World matrix including derived scale, as handed to the renderer
    pub fn world_transform(&self) -> &Mat4 {
        &self.world
    }

    /// World matrix without scale, as inherited by children
    pub fn world_rigid_transform(&self) -> &Mat4 {
        &self.world_rigid
    }

    /// World-space origin of this node
    pub fn world_position(&self) -> Vec3 {
        self.world_rigid.fixed_view::<3, 1>(0, 3).into_owned()
    }

    /// World-space bounds of the attached entities
    pub fn world_bounds(&self) -> &Aabb {
        &self.world_bounds
    }

    /// Current update flags
    pub fn flags(&self) -> NodeFlags {
        self.flags
    }

    /// Whether the next traversal will recompute this node
    pub fn is_dirty(&self) -> bool {
        self.flags.intersects(NodeFlags::TRANSFORM_DIRTY | NodeFlags::SCALE_DIRTY)
    }

    /// Parent node, `None` only for the root
    pub fn parent(&self) -> Option<NodeRef> {
        self.parent
    }

    /// Child nodes in attachment order
    pub fn children(&self) -> &[NodeHandle] {
        &self.children
    }

    /// Attached entities
    pub fn entities(&self) -> &[EntityAttachment] {
        &self.entities
    }

    /// Attached lights
    pub fn lights(&self) -> &[Handle<Light>] {
        &self.lights
    }

    /// Attached UI boxes
    pub fn boxes(&self) -> &[Handle<UiBox>] {
        &self.boxes
    }

    /// Attached text boxes
    pub fn textboxes(&self) -> &[Handle<TextBox>] {
        &self.textboxes
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.flags.insert(NodeFlags::TRANSFORM_DIRTY | NodeFlags::SCALE_DIRTY);
    }

    pub(crate) fn is_transform_dirty(&self) -> bool {
        self.flags.contains(NodeFlags::TRANSFORM_DIRTY)
    }

    pub(crate) fn is_scale_dirty(&self) -> bool {
        self.flags.contains(NodeFlags::SCALE_DIRTY)
    }

    /// Derived scale feeds the world matrix, so it also forces a transform update
    pub(crate) fn inherit_scale(&mut self, parent_scale: &Vec3) {
        self.derived_scale = parent_scale.component_mul(&self.local.scale);
        self.flags.remove(NodeFlags::SCALE_DIRTY);
        self.flags.insert(NodeFlags::TRANSFORM_DIRTY);
    }

    pub(crate) fn update_world(&mut self, parent_rigid: &Mat4) {
        self.world_rigid = parent_rigid * self.local.rigid_matrix();
        self.world = self.world_rigid * Mat4::new_nonuniform_scaling(&self.derived_scale);
        self.flags.remove(NodeFlags::TRANSFORM_DIRTY);
    }
}

impl Default for Node {
    fn default() -> Self {
        Self {
            name: String::new(),
            local: Transform::identity(),
            derived_scale: Vec3::repeat(1.0),
            world_rigid: Mat4::identity(),
            world: Mat4::identity(),
            world_bounds: Aabb::empty(),
            flags: NodeFlags::TRANSFORM_DIRTY | NodeFlags::SCALE_DIRTY,
            parent: None,
            children: Vec::new(),
            entities: Vec::new(),
            lights: Vec::new(),
            boxes: Vec::new(),
            textboxes: Vec::new(),
        }
    }
}
