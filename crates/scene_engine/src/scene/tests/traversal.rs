//! Transform propagation and attachment dispatch

use approx::assert_relative_eq;

use crate::foundation::math::{constants::HALF_PI, Quat, Vec3};
use crate::scene::{Aabb, Entity, Light, MaterialId, MeshId, NodeRef, RenderQueue, Skybox, TextBox, TextureId, UiBox};
use super::{test_scene, translation_of, RecordingRenderer};

#[test]
fn test_first_frame_computes_everything() {
    let mut scene = test_scene();
    let a = scene.create_node("a", NodeRef::Root).unwrap();
    let b = scene.create_node("b", a).unwrap();
    scene.create_node("c", b).unwrap();

    let stats = scene.update_scene_graph(&mut RecordingRenderer::default());

    assert_eq!(stats.visited, 4);
    assert_eq!(stats.recomputed, 4);
    assert!(!scene.root().is_dirty());
    assert!(!scene.node(a).unwrap().is_dirty());
}

#[test]
fn test_dirty_parent_updates_clean_descendants() {
    let mut scene = test_scene();
    let a = scene.create_node("a", NodeRef::Root).unwrap();
    let b = scene.create_node("b", a).unwrap();
    let c = scene.create_node("c", b).unwrap();
    scene.node_mut(b).unwrap().set_position(Vec3::new(0.0, 1.0, 0.0));
    scene.node_mut(c).unwrap().set_position(Vec3::new(0.0, 0.0, 1.0));

    let mut renderer = RecordingRenderer::default();
    scene.update_scene_graph(&mut renderer);

    scene.node_mut(a).unwrap().set_position(Vec3::new(5.0, 0.0, 0.0));
    assert!(!scene.node(b).unwrap().is_dirty());
    assert!(!scene.node(c).unwrap().is_dirty());

    let stats = scene.update_scene_graph(&mut renderer);

    assert_eq!(stats.recomputed, 3);
    assert_relative_eq!(scene.node(b).unwrap().world_position(), Vec3::new(5.0, 1.0, 0.0));
    assert_relative_eq!(scene.node(c).unwrap().world_position(), Vec3::new(5.0, 1.0, 1.0));
    for node in [a, b, c] {
        assert!(!scene.node(node).unwrap().is_dirty());
    }
}

#[test]
fn test_clean_graph_does_no_work() {
    let mut scene = test_scene();
    let a = scene.create_node("a", NodeRef::Root).unwrap();
    scene.create_node("b", a).unwrap();

    let mut renderer = RecordingRenderer::default();
    scene.update_scene_graph(&mut renderer);
    let before = *scene.node(a).unwrap().world_transform();

    let stats = scene.update_scene_graph(&mut renderer);

    assert_eq!(stats.visited, 3);
    assert_eq!(stats.recomputed, 0);
    assert_eq!(*scene.node(a).unwrap().world_transform(), before);
}

#[test]
fn test_only_dirty_subtree_is_recomputed() {
    let mut scene = test_scene();
    let left = scene.create_node("left", NodeRef::Root).unwrap();
    scene.create_node("left_child", left).unwrap();
    let right = scene.create_node("right", NodeRef::Root).unwrap();
    scene.create_node("right_child", right).unwrap();

    let mut renderer = RecordingRenderer::default();
    scene.update_scene_graph(&mut renderer);

    scene.node_mut(right).unwrap().translate(Vec3::x());
    let stats = scene.update_scene_graph(&mut renderer);

    assert_eq!(stats.visited, 5);
    assert_eq!(stats.recomputed, 2);
}

#[test]
fn test_parent_rotation_moves_children() {
    let mut scene = test_scene();
    let pivot = scene.create_node("pivot", NodeRef::Root).unwrap();
    let arm = scene.create_node("arm", pivot).unwrap();
    scene.node_mut(arm).unwrap().set_position(Vec3::new(1.0, 0.0, 0.0));
    scene
        .node_mut(pivot)
        .unwrap()
        .set_orientation(Quat::from_axis_angle(&Vec3::y_axis(), HALF_PI));

    scene.update_scene_graph(&mut RecordingRenderer::default());

    assert_relative_eq!(
        scene.node(arm).unwrap().world_position(),
        Vec3::new(0.0, 0.0, -1.0),
        epsilon = 1e-5
    );
}

#[test]
fn test_scale_is_propagated_separately() {
    let mut scene = test_scene();
    let parent = scene.create_node("parent", NodeRef::Root).unwrap();
    let child = scene.create_node("child", parent).unwrap();
    scene.node_mut(child).unwrap().set_position(Vec3::new(1.0, 0.0, 0.0));

    let mut renderer = RecordingRenderer::default();
    scene.update_scene_graph(&mut renderer);

    scene.node_mut(parent).unwrap().set_scale(Vec3::repeat(2.0));
    let stats = scene.update_scene_graph(&mut renderer);

    let child_node = scene.node(child).unwrap();
    assert_eq!(stats.recomputed, 2);
    assert_relative_eq!(child_node.derived_scale(), Vec3::repeat(2.0));
    assert_relative_eq!(child_node.world_position(), Vec3::new(1.0, 0.0, 0.0));
    assert_relative_eq!(child_node.world_transform()[(0, 0)], 2.0);
}

#[test]
fn test_children_dispatched_in_list_order() {
    let mut scene = test_scene();
    let first = scene.create_node("first", NodeRef::Root).unwrap();
    let nested = scene.create_node("nested", first).unwrap();
    let second = scene.create_node("second", NodeRef::Root).unwrap();

    for (node, text) in [(first, "first"), (nested, "nested"), (second, "second")] {
        let label = scene.create_textbox(TextBox::new(text)).unwrap();
        scene.attach_textbox(node, label).unwrap();
    }

    let mut renderer = RecordingRenderer::default();
    scene.update_scene_graph(&mut renderer);

    assert_eq!(renderer.textboxes, vec!["first", "nested", "second"]);
}

#[test]
fn test_attachments_receive_node_world_transform() {
    let mut scene = test_scene();
    let ship = scene.create_node("ship", NodeRef::Root).unwrap();
    scene.node_mut(ship).unwrap().set_position(Vec3::new(3.0, 0.0, 0.0));

    let hull = scene.create_entity(Entity::new(MeshId(1), MaterialId(1))).unwrap();
    let lamp = scene.create_light(Light::point(Vec3::repeat(1.0), 2.0, 5.0)).unwrap();
    let marker = scene.create_box(UiBox::default()).unwrap();
    scene.attach_entity(ship, hull).unwrap();
    scene.attach_light(ship, lamp).unwrap();
    scene.attach_box(ship, marker).unwrap();

    let mut renderer = RecordingRenderer::default();
    let stats = scene.update_scene_graph(&mut renderer);

    assert_eq!(stats.dispatched, 3);
    assert_eq!(renderer.renderables.len(), 1);
    assert_eq!(renderer.renderables[0].0, hull);
    assert_relative_eq!(translation_of(&renderer.renderables[0].1), Vec3::new(3.0, 0.0, 0.0));
    assert_relative_eq!(translation_of(&renderer.lights[0]), Vec3::new(3.0, 0.0, 0.0));
    assert_eq!(renderer.boxes, 1);
}

#[test]
fn test_stale_attachments_are_skipped() {
    let mut scene = test_scene();
    let node = scene.create_node("node", NodeRef::Root).unwrap();
    let kept = scene.create_entity(Entity::new(MeshId(1), MaterialId(0))).unwrap();
    let doomed = scene.create_entity(Entity::new(MeshId(2), MaterialId(0))).unwrap();
    let light = scene.create_light(Light::default()).unwrap();
    scene.attach_entity(node, kept).unwrap();
    scene.attach_entity(node, doomed).unwrap();
    scene.attach_light(node, light).unwrap();

    assert!(scene.destroy_entity(doomed));
    assert!(scene.destroy_light(light));
    // Reuses the freed slot; the old handle must still not resolve.
    let replacement = scene.create_entity(Entity::new(MeshId(3), MaterialId(0))).unwrap();
    assert_eq!(replacement.index(), doomed.index());

    let mut renderer = RecordingRenderer::default();
    let stats = scene.update_scene_graph(&mut renderer);

    assert_eq!(stats.dispatched, 1);
    assert_eq!(stats.skipped_stale, 2);
    assert_eq!(renderer.renderables.len(), 1);
    assert_eq!(renderer.renderables[0].0, kept);
    assert!(renderer.lights.is_empty());
}

#[test]
fn test_instanced_entity_gets_one_matrix_per_attachment() {
    let mut scene = test_scene();
    let rock = scene.create_entity(Entity::new(MeshId(7), MaterialId(2)).instanced()).unwrap();

    let mut nodes = Vec::new();
    for i in 0..3 {
        let node = scene.create_node(format!("rock_{}", i), NodeRef::Root).unwrap();
        scene.node_mut(node).unwrap().set_position(Vec3::new(i as f32, 0.0, 0.0));
        let attachment = scene.attach_entity(node, rock).unwrap();
        assert_eq!(attachment.instance, Some(i));
        nodes.push(node);
    }

    let mut queue = RenderQueue::new();
    scene.update_scene_graph(&mut queue);

    let batch = queue.instance_batch(rock).unwrap();
    assert_eq!(batch.instances().len(), 3);
    assert_eq!(batch.instance(2).unwrap().model[3], [2.0, 0.0, 0.0, 1.0]);
    assert_eq!(queue.object_count(), 0);

    // A detached index is handed to the next attachment.
    assert!(scene.detach_entity(nodes[1], rock));
    let again = scene.attach_entity(nodes[1], rock).unwrap();
    assert_eq!(again.instance, Some(1));
    assert_eq!(scene.cluster().get(rock).unwrap().instance_count(), 3);
}

#[test]
fn test_instance_churn_keeps_batch_bounded() {
    let mut scene = test_scene();
    let rock = scene.create_entity(Entity::new(MeshId(7), MaterialId(2)).instanced()).unwrap();
    let node = scene.create_node("rock", NodeRef::Root).unwrap();
    let anchor = scene.create_node("anchor", NodeRef::Root).unwrap();
    scene.attach_entity(anchor, rock).unwrap();

    let mut queue = RenderQueue::new();
    for _ in 0..1000 {
        let attachment = scene.attach_entity(node, rock).unwrap();
        assert_eq!(attachment.instance, Some(1));
        scene.update_scene_graph(&mut queue);
        assert!(scene.detach_entity(node, rock));
    }

    scene.update_scene_graph(&mut queue);
    let batch = queue.instance_batch(rock).unwrap();
    assert_eq!(batch.instances().len(), 1);
    assert_eq!(batch.indices(), &[0]);
    assert_eq!(scene.cluster().get(rock).unwrap().instance_count(), 1);
}

#[test]
fn test_destroying_node_releases_instances() {
    let mut scene = test_scene();
    let rock = scene.create_entity(Entity::new(MeshId(7), MaterialId(2)).instanced()).unwrap();
    let belt = scene.create_node("belt", NodeRef::Root).unwrap();
    for _ in 0..3 {
        let node = scene.create_node("", belt).unwrap();
        scene.attach_entity(node, rock).unwrap();
    }
    assert_eq!(scene.cluster().get(rock).unwrap().instance_count(), 3);

    assert!(scene.destroy_node(belt));
    assert_eq!(scene.cluster().get(rock).unwrap().instance_count(), 0);

    let node = scene.create_node("", NodeRef::Root).unwrap();
    let attachment = scene.attach_entity(node, rock).unwrap();
    assert!(attachment.instance.is_some_and(|index| index < 3));
}

#[test]
fn test_attach_entity_to_clean_chain_does_not_recompute() {
    let mut scene = test_scene();
    let a = scene.create_node("a", NodeRef::Root).unwrap();
    let b = scene.create_node("b", a).unwrap();
    scene.create_node("c", b).unwrap();
    let entity = scene.create_entity(Entity::new(MeshId(1), MaterialId(1))).unwrap();

    let mut renderer = RecordingRenderer::default();
    scene.update_scene_graph(&mut renderer);

    scene.attach_entity(a, entity).unwrap();
    assert!(!scene.node(a).unwrap().is_dirty());
    let stats = scene.update_scene_graph(&mut renderer);

    assert_eq!(stats.recomputed, 0);
    assert_eq!(stats.dispatched, 1);

    assert!(scene.detach_entity(a, entity));
    let stats = scene.update_scene_graph(&mut renderer);
    assert_eq!(stats.recomputed, 0);
    assert_eq!(stats.dispatched, 0);
}

#[test]
fn test_world_bounds_track_attachment_changes() {
    let mut scene = test_scene();
    let node = scene.create_node("crate", NodeRef::Root).unwrap();
    let entity = Entity::new(MeshId(1), MaterialId(1))
        .with_bounds(Aabb::from_center_extents(Vec3::zeros(), Vec3::repeat(0.5)));
    let entity = scene.create_entity(entity).unwrap();

    let mut renderer = RecordingRenderer::default();
    scene.update_scene_graph(&mut renderer);
    assert!(scene.node(node).unwrap().world_bounds().is_empty());

    scene.attach_entity(node, entity).unwrap();
    scene.update_scene_graph(&mut renderer);
    assert!(!scene.node(node).unwrap().world_bounds().is_empty());

    assert!(scene.destroy_entity(entity));
    let stats = scene.update_scene_graph(&mut renderer);
    assert_eq!(stats.skipped_stale, 1);
    assert!(scene.node(node).unwrap().world_bounds().is_empty());

    let unit = Aabb::from_center_extents(Vec3::zeros(), Vec3::repeat(1.0));
    let root_entity = scene.create_entity(Entity::new(MeshId(1), MaterialId(1)).with_bounds(unit)).unwrap();
    scene.attach_entity(NodeRef::Root, root_entity).unwrap();
    scene.update_scene_graph(&mut renderer);
    assert!(!scene.root().world_bounds().is_empty());

    assert!(scene.detach_entity(NodeRef::Root, root_entity));
    scene.update_scene_graph(&mut renderer);
    assert!(scene.root().world_bounds().is_empty());
}

#[test]
fn test_world_bounds_follow_node() {
    let mut scene = test_scene();
    let node = scene.create_node("crate", NodeRef::Root).unwrap();
    let entity = Entity::new(MeshId(1), MaterialId(1))
        .with_bounds(Aabb::from_center_extents(Vec3::zeros(), Vec3::repeat(0.5)));
    let entity = scene.create_entity(entity).unwrap();
    scene.attach_entity(node, entity).unwrap();
    scene.node_mut(node).unwrap().set_position(Vec3::new(0.0, 10.0, 0.0));

    scene.update_scene_graph(&mut RecordingRenderer::default());

    let bounds = scene.node(node).unwrap().world_bounds();
    assert_relative_eq!(bounds.center(), Vec3::new(0.0, 10.0, 0.0), epsilon = 1e-5);
    assert_relative_eq!(bounds.extents(), Vec3::repeat(0.5), epsilon = 1e-5);
}

#[test]
fn test_frame_state_reaches_renderer() {
    let mut scene = test_scene();
    let skybox = Skybox {
        cubemap: TextureId(9),
        intensity: 0.5,
    };
    scene.set_skybox(Some(skybox));
    scene.set_ambient_color(Vec3::new(0.2, 0.2, 0.3));

    let mut renderer = RecordingRenderer::default();
    scene.update_scene_graph(&mut renderer);
    scene.update_scene_graph(&mut renderer);

    assert_eq!(renderer.frames, 2);
    assert_eq!(renderer.skybox, Some(skybox));
    assert_eq!(renderer.ambient, Vec3::new(0.2, 0.2, 0.3));
}
