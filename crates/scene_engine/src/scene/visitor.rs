//! Scene graph traversal
//!
//! The visitor walks the node hierarchy once per frame. Construction settles
//! derived scale; [`SceneGraphVisitor::run`] then recomputes world matrices for
//! dirty subtrees only, hands every live attachment to the renderer and
//! refreshes each node's world bounds from what it dispatched.

use crate::foundation::math::{Mat4, Vec3};
use crate::memory::PoolCluster;
use super::attachments::{Entity, Light, TextBox, UiBox};
use super::bounds::Aabb;
use super::node::{Node, NodeHandle};
use super::renderer::Renderer;

/// Counters from one traversal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VisitStats {
    /// Nodes visited, root included
    pub visited: usize,
    /// Nodes whose world matrix was recomputed
    pub recomputed: usize,
    /// Attachments handed to the renderer
    pub dispatched: usize,
    /// Attachment handles that no longer resolve
    pub skipped_stale: usize,
}

#[derive(Debug, Clone, Copy)]
struct Visit {
    node: NodeHandle,
    depth: usize,
    parent_dirty: bool,
}

/// One-shot traversal of a scene graph
///
/// The traversal is iterative. `transforms[d]` holds the rigid world matrix of
/// the ancestor at depth `d - 1`, with identity at index 0 for the root's
/// parent, so a node at depth `d` truncates the stack to `d + 1` entries and
/// reads its parent matrix from the top.
pub struct SceneGraphVisitor<'a, R: Renderer + ?Sized> {
    root: &'a mut Node,
    cluster: &'a mut PoolCluster,
    renderer: &'a mut R,
    transforms: Vec<Mat4>,
    worklist: Vec<Visit>,
    stats: VisitStats,
}

impl<'a, R: Renderer + ?Sized> SceneGraphVisitor<'a, R> {
    /// Prepare a traversal, propagating pending scale changes
    pub fn new(root: &'a mut Node, cluster: &'a mut PoolCluster, renderer: &'a mut R) -> Self {
        let mut visitor = Self {
            root,
            cluster,
            renderer,
            transforms: Vec::with_capacity(16),
            worklist: Vec::new(),
            stats: VisitStats::default(),
        };
        visitor.propagate_scale();
        visitor
    }

    /// Any node whose scale changed, and everything below it, gets a fresh
    /// derived scale and is marked for a transform update.
    fn propagate_scale(&mut self) {
        let root_dirty = self.root.is_scale_dirty();
        if root_dirty {
            self.root.inherit_scale(&Vec3::repeat(1.0));
        }

        let root_scale = self.root.derived_scale();
        let mut pending: Vec<(NodeHandle, Vec3, bool)> = self
            .root
            .children()
            .iter()
            .map(|&child| (child, root_scale, root_dirty))
            .collect();

        while let Some((handle, parent_scale, parent_dirty)) = pending.pop() {
            let Some(node) = self.cluster.get_mut::<Node>(handle) else {
                log::warn!("Scale pass reached dead node {:?}", handle);
                continue;
            };

            let dirty = parent_dirty || node.is_scale_dirty();
            if dirty {
                node.inherit_scale(&parent_scale);
            }

            let scale = node.derived_scale();
            pending.extend(node.children().iter().map(|&child| (child, scale, dirty)));
        }
    }

    /// Traverse the graph, returning what was done
    pub fn run(mut self) -> VisitStats {
        self.transforms.clear();
        self.transforms.push(Mat4::identity());

        let recomputed = self.root.is_transform_dirty();
        if recomputed {
            self.root.update_world(&Mat4::identity());
            self.stats.recomputed += 1;
        }
        self.stats.visited += 1;

        self.root.world_bounds =
            dispatch_attachments(&*self.root, &*self.cluster, &mut *self.renderer, &mut self.stats);

        if !self.root.children().is_empty() {
            self.transforms.push(*self.root.world_rigid_transform());
            self.worklist.extend(self.root.children().iter().rev().map(|&child| Visit {
                node: child,
                depth: 1,
                parent_dirty: recomputed,
            }));
        }

        while let Some(visit) = self.worklist.pop() {
            self.visit(visit);
        }

        log::trace!(
            "Scene traversal: {} visited, {} recomputed, {} dispatched, {} stale",
            self.stats.visited,
            self.stats.recomputed,
            self.stats.dispatched,
            self.stats.skipped_stale
        );
        self.stats
    }

    fn visit(&mut self, visit: Visit) {
        let Visit { node: handle, depth, parent_dirty } = visit;
        self.transforms.truncate(depth + 1);
        let parent_rigid = self.transforms[depth];

        let Some(node) = self.cluster.get_mut::<Node>(handle) else {
            log::warn!("Traversal reached dead node {:?}", handle);
            return;
        };

        let recomputed = parent_dirty || node.is_transform_dirty();
        if recomputed {
            node.update_world(&parent_rigid);
            self.stats.recomputed += 1;
        }
        self.stats.visited += 1;

        // Attachments live in the same cluster, so dispatch needs a shared borrow.
        let Some(node) = self.cluster.get::<Node>(handle) else {
            return;
        };
        let bounds = dispatch_attachments(node, &*self.cluster, &mut *self.renderer, &mut self.stats);
        let bounds_changed = node.world_bounds != bounds;

        if !node.children().is_empty() {
            self.transforms.push(*node.world_rigid_transform());
            self.worklist.extend(node.children().iter().rev().map(|&child| Visit {
                node: child,
                depth: depth + 1,
                parent_dirty: recomputed,
            }));
        }

        // Attachments change without dirtying the node, so bounds are rebuilt
        // on every visit.
        if bounds_changed {
            if let Some(node) = self.cluster.get_mut::<Node>(handle) {
                node.world_bounds = bounds;
            }
        }
    }
}

/// Hand each live attachment of `node` to the renderer and return the union
/// of the attached entities' world bounds.
fn dispatch_attachments<R: Renderer + ?Sized>(
    node: &Node,
    cluster: &PoolCluster,
    renderer: &mut R,
    stats: &mut VisitStats,
) -> Aabb {
    let world = node.world_transform();
    let mut bounds = Aabb::empty();

    for attachment in node.entities() {
        let Some(entity) = cluster.get::<Entity>(attachment.entity) else {
            log::trace!("Skipping stale entity {:?} on node '{}'", attachment.entity, node.name());
            stats.skipped_stale += 1;
            continue;
        };

        bounds = bounds.merge(&entity.local_bounds.transformed(world));
        renderer.add_renderable(attachment.entity, entity, world);
        if let Some(instance) = attachment.instance {
            renderer.update_instance(attachment.entity, instance, world);
        }
        stats.dispatched += 1;
    }

    for &handle in node.lights() {
        match cluster.get::<Light>(handle) {
            Some(light) => {
                renderer.add_light(light, world);
                stats.dispatched += 1;
            }
            None => {
                log::trace!("Skipping stale light {:?} on node '{}'", handle, node.name());
                stats.skipped_stale += 1;
            }
        }
    }

    for &handle in node.boxes() {
        match cluster.get::<UiBox>(handle) {
            Some(ui_box) => {
                renderer.add_box(ui_box, world);
                stats.dispatched += 1;
            }
            None => {
                log::trace!("Skipping stale box {:?} on node '{}'", handle, node.name());
                stats.skipped_stale += 1;
            }
        }
    }

    for &handle in node.textboxes() {
        match cluster.get::<TextBox>(handle) {
            Some(textbox) => {
                renderer.add_textbox(textbox, world);
                stats.dispatched += 1;
            }
            None => {
                log::trace!("Skipping stale text box {:?} on node '{}'", handle, node.name());
                stats.skipped_stale += 1;
            }
        }
    }

    bounds
}
