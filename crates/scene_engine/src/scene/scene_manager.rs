//! Scene ownership and mutation
//!
//! A [`Scene`] owns the root node and the pool cluster that every other node
//! and attachment is allocated from. All structural changes go through it so
//! parent/child links, the name registry and the pools stay consistent.

use std::any::TypeId;
use std::collections::HashMap;

use thiserror::Error;

use crate::config::SceneConfig;
use crate::foundation::math::Vec3;
use crate::memory::{Handle, MemoryPool, PoolCluster, PoolError};
use super::attachments::{Entity, EntityAttachment, Light, Skybox, TextBox, UiBox};
use super::node::{Node, NodeHandle, NodeRef};
use super::renderer::Renderer;
use super::visitor::{SceneGraphVisitor, VisitStats};

/// Scene errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SceneError {
    /// Allocation failure in the backing pools
    #[error(transparent)]
    Pool(#[from] PoolError),

    /// Handle does not refer to a live node
    #[error("Node {0:?} does not exist")]
    NodeNotFound(NodeRef),

    /// Another live node already uses this name
    #[error("A node named '{0}' already exists")]
    DuplicateName(String),

    /// Reparenting would make a node its own ancestor
    #[error("Moving {child:?} under {parent:?} would create a cycle")]
    CycleDetected {
        /// Node being moved
        child: NodeHandle,
        /// Requested parent
        parent: NodeRef,
    },

    /// Attachment handle does not resolve
    #[error("{kind} handle is not live")]
    InvalidHandle {
        /// Attachment type
        kind: &'static str,
    },

    /// An instanced entity has no instance index left to hand out
    #[error("Entity {0:?} has run out of instance indices")]
    InstanceLimit(Handle<Entity>),
}

/// Node hierarchy plus the pools backing it
pub struct Scene {
    name: String,
    cluster: PoolCluster,
    root: Node,
    names: HashMap<String, NodeHandle>,
    skybox: Option<Skybox>,
    ambient_color: Vec3,
}

impl Scene {
    /// Create a scene with its own pool cluster
    pub fn new(config: &SceneConfig) -> Result<Self, SceneError> {
        Self::with_cluster(PoolCluster::new(), config)
    }

    /// Create a scene on top of an existing cluster
    ///
    /// Pools already registered in `cluster` are reused as they are.
    pub fn with_cluster(mut cluster: PoolCluster, config: &SceneConfig) -> Result<Self, SceneError> {
        let pools = &config.pools;
        cluster.register_pool::<Node>(pools.nodes)?;
        cluster.register_pool::<Entity>(pools.entities)?;
        cluster.register_pool::<Light>(pools.lights)?;
        cluster.register_pool::<UiBox>(pools.boxes)?;
        cluster.register_pool::<TextBox>(pools.textboxes)?;

        log::info!(
            "Created scene '{}' ({} nodes, {} entities, {} lights)",
            config.name,
            pools.nodes,
            pools.entities,
            pools.lights
        );

        Ok(Self {
            name: config.name.clone(),
            cluster,
            root: Node::named("root"),
            names: HashMap::new(),
            skybox: None,
            ambient_color: Vec3::repeat(0.1),
        })
    }

    /// Scene name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Backing pools
    pub fn cluster(&self) -> &PoolCluster {
        &self.cluster
    }

    /// Register a pool for a type the scene does not manage itself
    ///
    /// A type that already has a pool, including the scene's own, keeps it.
    pub fn register_pool<T: Default + 'static>(&mut self, capacity: usize) -> Result<(), SceneError> {
        Ok(self.cluster.register_pool::<T>(capacity)?)
    }

    /// Mutable access to a pool the scene does not manage
    ///
    /// Returns `None` for nodes and attachments; those pools only change
    /// through `Scene` so child links and the name registry stay in sync.
    pub fn pool_mut<T: 'static>(&mut self) -> Option<&mut MemoryPool<T>> {
        if Self::is_scene_type::<T>() {
            log::warn!("Refusing mutable access to scene-owned pool {}", std::any::type_name::<T>());
            return None;
        }
        self.cluster.pool_mut::<T>()
    }

    fn is_scene_type<T: 'static>() -> bool {
        [
            TypeId::of::<Node>(),
            TypeId::of::<Entity>(),
            TypeId::of::<Light>(),
            TypeId::of::<UiBox>(),
            TypeId::of::<TextBox>(),
        ]
        .contains(&TypeId::of::<T>())
    }

    /// Root node
    pub fn root(&self) -> &Node {
        &self.root
    }

    /// Root node, mutable
    pub fn root_mut(&mut self) -> &mut Node {
        &mut self.root
    }

    /// Look up a node
    pub fn node(&self, node: impl Into<NodeRef>) -> Option<&Node> {
        match node.into() {
            NodeRef::Root => Some(&self.root),
            NodeRef::Node(handle) => self.cluster.get(handle),
        }
    }

    /// Look up a node for modification
    pub fn node_mut(&mut self, node: impl Into<NodeRef>) -> Option<&mut Node> {
        match node.into() {
            NodeRef::Root => Some(&mut self.root),
            NodeRef::Node(handle) => self.cluster.get_mut(handle),
        }
    }

    /// Find a node by name
    pub fn find_node(&self, name: &str) -> Option<NodeHandle> {
        self.names.get(name).copied()
    }

    /// Number of live nodes, root excluded
    pub fn node_count(&self) -> usize {
        self.cluster
            .pool::<Node>()
            .map_or(0, |pool| pool.active_object_count())
    }

    /// Create a node under `parent`
    ///
    /// Names must be unique among live nodes; the empty name is exempt.
    pub fn create_node(&mut self, name: impl Into<String>, parent: impl Into<NodeRef>) -> Result<NodeHandle, SceneError> {
        let name = name.into();
        let parent = parent.into();

        if !name.is_empty() && self.names.contains_key(&name) {
            return Err(SceneError::DuplicateName(name));
        }
        if self.node(parent).is_none() {
            return Err(SceneError::NodeNotFound(parent));
        }

        let handle = self.cluster.create::<Node>()?;
        if let Some(node) = self.cluster.get_mut(handle) {
            node.name = name.clone();
            node.parent = Some(parent);
        }
        if let Some(parent_node) = self.node_mut(parent) {
            parent_node.children.push(handle);
        }
        if !name.is_empty() {
            self.names.insert(name, handle);
        }

        log::debug!("Created node {:?} under {:?}", handle, parent);
        Ok(handle)
    }

    /// Destroy a node and its whole subtree
    ///
    /// Attachments are only detached, never destroyed; instance indices held
    /// by the subtree go back to their entities. Returns `false` for a handle
    /// that is already dead.
    pub fn destroy_node(&mut self, handle: NodeHandle) -> bool {
        let Some(parent) = self.cluster.get::<Node>(handle).map(|node| node.parent) else {
            log::warn!("Attempted to destroy dead node {:?}", handle);
            return false;
        };

        if let Some(parent) = parent {
            if let Some(parent_node) = self.node_mut(parent) {
                parent_node.children.retain(|&child| child != handle);
            }
        }

        let mut stack = vec![handle];
        let mut subtree = Vec::new();
        while let Some(current) = stack.pop() {
            if let Some(node) = self.cluster.get::<Node>(current) {
                stack.extend(node.children.iter().copied());
                subtree.push(current);
            }
        }

        // Children first so nothing ever refers to an already freed slot.
        for &current in subtree.iter().rev() {
            let mut released = Vec::new();
            if let Some(node) = self.cluster.get::<Node>(current) {
                if self.names.get(&node.name) == Some(&current) {
                    self.names.remove(&node.name);
                }
                released.extend(node.entities.iter().copied());
            }
            for attachment in released {
                self.release_instance(attachment);
            }
            self.cluster.destroy(current);
        }

        log::debug!("Destroyed node {:?} ({} nodes removed)", handle, subtree.len());
        true
    }

    /// Move `child` and its subtree under `new_parent`
    pub fn reparent(&mut self, child: NodeHandle, new_parent: impl Into<NodeRef>) -> Result<(), SceneError> {
        let new_parent = new_parent.into();
        let old_parent = self
            .cluster
            .get::<Node>(child)
            .ok_or(SceneError::NodeNotFound(NodeRef::Node(child)))?
            .parent;

        if self.node(new_parent).is_none() {
            return Err(SceneError::NodeNotFound(new_parent));
        }
        if self.is_self_or_ancestor(child, new_parent) {
            return Err(SceneError::CycleDetected { child, parent: new_parent });
        }
        if old_parent == Some(new_parent) {
            return Ok(());
        }

        if let Some(old) = old_parent.and_then(|parent| self.node_mut(parent)) {
            old.children.retain(|&c| c != child);
        }
        if let Some(parent_node) = self.node_mut(new_parent) {
            parent_node.children.push(child);
        }
        if let Some(node) = self.cluster.get_mut::<Node>(child) {
            node.parent = Some(new_parent);
            node.mark_dirty();
        }
        Ok(())
    }

    fn is_self_or_ancestor(&self, ancestor: NodeHandle, node: NodeRef) -> bool {
        let mut cursor = Some(node);
        while let Some(NodeRef::Node(handle)) = cursor {
            if handle == ancestor {
                return true;
            }
            cursor = self.cluster.get::<Node>(handle).and_then(|n| n.parent);
        }
        false
    }

    /// Change a node's registered name
    pub fn rename_node(&mut self, handle: NodeHandle, name: impl Into<String>) -> Result<(), SceneError> {
        let name = name.into();
        if !name.is_empty() && self.names.get(&name).is_some_and(|&other| other != handle) {
            return Err(SceneError::DuplicateName(name));
        }

        let node = self
            .cluster
            .get_mut::<Node>(handle)
            .ok_or(SceneError::NodeNotFound(NodeRef::Node(handle)))?;
        let old_name = std::mem::replace(&mut node.name, name.clone());

        if self.names.get(&old_name) == Some(&handle) {
            self.names.remove(&old_name);
        }
        if !name.is_empty() {
            self.names.insert(name, handle);
        }
        Ok(())
    }

    /// Allocate an entity
    pub fn create_entity(&mut self, entity: Entity) -> Result<Handle<Entity>, SceneError> {
        self.create_in_pool(entity)
    }

    /// Release an entity; nodes still referring to it skip it from now on
    pub fn destroy_entity(&mut self, handle: Handle<Entity>) -> bool {
        self.cluster.destroy(handle)
    }

    /// Allocate a light
    pub fn create_light(&mut self, light: Light) -> Result<Handle<Light>, SceneError> {
        self.create_in_pool(light)
    }

    /// Release a light
    pub fn destroy_light(&mut self, handle: Handle<Light>) -> bool {
        self.cluster.destroy(handle)
    }

    /// Allocate a UI box
    pub fn create_box(&mut self, ui_box: UiBox) -> Result<Handle<UiBox>, SceneError> {
        self.create_in_pool(ui_box)
    }

    /// Release a UI box
    pub fn destroy_box(&mut self, handle: Handle<UiBox>) -> bool {
        self.cluster.destroy(handle)
    }

    /// Allocate a text box
    pub fn create_textbox(&mut self, textbox: TextBox) -> Result<Handle<TextBox>, SceneError> {
        self.create_in_pool(textbox)
    }

    /// Release a text box
    pub fn destroy_textbox(&mut self, handle: Handle<TextBox>) -> bool {
        self.cluster.destroy(handle)
    }

    fn create_in_pool<T: Default + 'static>(&mut self, value: T) -> Result<Handle<T>, SceneError> {
        let handle = self.cluster.create::<T>()?;
        if let Some(slot) = self.cluster.get_mut(handle) {
            *slot = value;
        }
        Ok(handle)
    }

    /// Entity attachment with an instance index when the entity is instanced
    ///
    /// Attaching the same live entity to a node twice returns the existing
    /// attachment.
    pub fn attach_entity(&mut self, node: impl Into<NodeRef>, entity: Handle<Entity>) -> Result<EntityAttachment, SceneError> {
        let node = node.into();
        if !self.cluster.is_alive(entity) {
            return Err(SceneError::InvalidHandle { kind: "entity" });
        }
        let existing = self
            .node(node)
            .ok_or(SceneError::NodeNotFound(node))?
            .entities
            .iter()
            .find(|attachment| attachment.entity == entity)
            .copied();
        if let Some(attachment) = existing {
            return Ok(attachment);
        }

        let target = self
            .cluster
            .get_mut::<Entity>(entity)
            .ok_or(SceneError::InvalidHandle { kind: "entity" })?;
        let instance = if target.is_instanced() {
            Some(target.assign_instance().ok_or(SceneError::InstanceLimit(entity))?)
        } else {
            None
        };

        let attachment = EntityAttachment { entity, instance };
        if let Some(node) = self.node_mut(node) {
            node.entities.push(attachment);
        }
        Ok(attachment)
    }

    /// Remove an entity from a node, handing its instance index back
    pub fn detach_entity(&mut self, node: impl Into<NodeRef>, entity: Handle<Entity>) -> bool {
        let Some(node) = self.node_mut(node) else {
            return false;
        };
        let Some(position) = node.entities.iter().position(|attachment| attachment.entity == entity) else {
            return false;
        };
        let attachment = node.entities.remove(position);
        self.release_instance(attachment);
        true
    }

    fn release_instance(&mut self, attachment: EntityAttachment) {
        let Some(index) = attachment.instance else {
            return;
        };
        if let Some(entity) = self.cluster.get_mut::<Entity>(attachment.entity) {
            entity.release_instance(index);
        }
    }

    /// Attach a light to a node
    pub fn attach_light(&mut self, node: impl Into<NodeRef>, light: Handle<Light>) -> Result<(), SceneError> {
        self.attach(node.into(), light, "light", |node| &mut node.lights)
    }

    /// Remove a light from a node
    pub fn detach_light(&mut self, node: impl Into<NodeRef>, light: Handle<Light>) -> bool {
        self.detach(node.into(), light, |node| &mut node.lights)
    }

    /// Attach a UI box to a node
    pub fn attach_box(&mut self, node: impl Into<NodeRef>, ui_box: Handle<UiBox>) -> Result<(), SceneError> {
        self.attach(node.into(), ui_box, "box", |node| &mut node.boxes)
    }

    /// Remove a UI box from a node
    pub fn detach_box(&mut self, node: impl Into<NodeRef>, ui_box: Handle<UiBox>) -> bool {
        self.detach(node.into(), ui_box, |node| &mut node.boxes)
    }

    /// Attach a text box to a node
    pub fn attach_textbox(&mut self, node: impl Into<NodeRef>, textbox: Handle<TextBox>) -> Result<(), SceneError> {
        self.attach(node.into(), textbox, "textbox", |node| &mut node.textboxes)
    }

    /// Remove a text box from a node
    pub fn detach_textbox(&mut self, node: impl Into<NodeRef>, textbox: Handle<TextBox>) -> bool {
        self.detach(node.into(), textbox, |node| &mut node.textboxes)
    }

    fn attach<T: 'static>(
        &mut self,
        node: NodeRef,
        handle: Handle<T>,
        kind: &'static str,
        list: fn(&mut Node) -> &mut Vec<Handle<T>>,
    ) -> Result<(), SceneError> {
        if !self.cluster.is_alive(handle) {
            return Err(SceneError::InvalidHandle { kind });
        }
        let target = self.node_mut(node).ok_or(SceneError::NodeNotFound(node))?;
        let attached = list(target);
        if !attached.contains(&handle) {
            attached.push(handle);
        }
        Ok(())
    }

    fn detach<T>(&mut self, node: NodeRef, handle: Handle<T>, list: fn(&mut Node) -> &mut Vec<Handle<T>>) -> bool {
        let Some(target) = self.node_mut(node) else {
            return false;
        };
        let attached = list(target);
        let before = attached.len();
        attached.retain(|&h| h != handle);
        before != attached.len()
    }

    /// Environment map handed to the renderer each frame
    pub fn set_skybox(&mut self, skybox: Option<Skybox>) {
        self.skybox = skybox;
    }

    /// Current skybox
    pub fn skybox(&self) -> Option<&Skybox> {
        self.skybox.as_ref()
    }

    /// Ambient color handed to the renderer each frame
    pub fn set_ambient_color(&mut self, color: Vec3) {
        self.ambient_color = color;
    }

    /// Current ambient color
    pub fn ambient_color(&self) -> Vec3 {
        self.ambient_color
    }

    /// Refresh world transforms and feed the renderer for this frame
    pub fn update_scene_graph<R: Renderer + ?Sized>(&mut self, renderer: &mut R) -> VisitStats {
        renderer.begin_frame();
        renderer.set_ambient_color(self.ambient_color);
        if let Some(skybox) = &self.skybox {
            renderer.set_skybox(skybox);
        }

        SceneGraphVisitor::new(&mut self.root, &mut self.cluster, renderer).run()
    }

    /// Destroy every node and attachment, keeping the pools registered
    pub fn clear(&mut self) {
        self.cluster.reset_all_pools();
        self.root = Node::named("root");
        self.names.clear();
        self.skybox = None;
        log::info!("Cleared scene '{}'", self.name);
    }
}

impl std::fmt::Debug for Scene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scene")
            .field("name", &self.name)
            .field("nodes", &self.node_count())
            .field("cluster", &self.cluster)
            .finish()
    }
}
