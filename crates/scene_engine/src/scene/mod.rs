//! Scene management system
//!
//! A hierarchy of pooled nodes, each carrying a local transform and handles to
//! the drawables, lights and UI elements attached to it. Once per frame the
//! scene graph visitor recomputes world transforms for dirty subtrees and feeds
//! everything attached to a [`Renderer`].
//!
//! ## Architecture
//!
//! ```text
//! Scene
//!   ├── root Node
//!   │     └── children (Handle<Node>) → entities, lights, boxes, text boxes
//!   └── PoolCluster (Node, Entity, Light, UiBox, TextBox pools)
//!            ↓
//!   SceneGraphVisitor (scale pass, transform pass, dispatch)
//!            ↓
//!   Renderer (e.g. RenderQueue)
//! ```

mod attachments;
mod bounds;
mod node;
mod render_queue;
mod renderer;
mod scene_manager;
mod visitor;

#[cfg(test)]
mod tests;

pub use attachments::{
    Entity, EntityAttachment, Light, LightKind, MaterialId, MeshId, Skybox, TextBox, TextureId, UiBox,
};
pub use bounds::Aabb;
pub use node::{Node, NodeFlags, NodeHandle, NodeRef};
pub use render_queue::{InstanceBatch, InstanceData, OverlayItem, RenderBatch, RenderQueue, RenderableObject};
pub use renderer::Renderer;
pub use scene_manager::{Scene, SceneError};
pub use visitor::{SceneGraphVisitor, VisitStats};
