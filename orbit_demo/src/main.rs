//! Orbit demo
//!
//! A small solar system built as a scene graph: planets hang off rotating
//! pivots under the sun, moons hang off their planets, and an instanced
//! asteroid belt shares one mesh. Runs headless and logs what each frame
//! hands to the render queue.
//!
//! Usage: `orbit_demo [config.toml|config.ron]`

use scene_engine::prelude::*;
use scene_engine::foundation::math::constants::TAU;
use scene_engine::scene::Aabb;

const FRAME_COUNT: u64 = 600;
const ASTEROID_COUNT: u32 = 48;
const REPORT_INTERVAL: u64 = 120;

struct Planet {
    pivot: NodeHandle,
    body: NodeHandle,
    orbit_speed: f32,
    spin_speed: f32,
}

struct OrbitDemo {
    planets: Vec<Planet>,
    belt: Option<NodeHandle>,
    moons: Vec<NodeHandle>,
}

impl OrbitDemo {
    fn new() -> Self {
        Self {
            planets: Vec::new(),
            belt: None,
            moons: Vec::new(),
        }
    }

    fn add_planet(
        &mut self,
        scene: &mut Scene,
        name: &str,
        distance: f32,
        radius: f32,
        orbit_speed: f32,
        material: MaterialId,
    ) -> Result<NodeHandle, AppError> {
        let pivot = scene.create_node(format!("{}_pivot", name), NodeRef::Root)?;
        let body = scene.create_node(name, pivot)?;

        if let Some(node) = scene.node_mut(body) {
            node.set_position(Vec3::new(distance, 0.0, 0.0));
            node.set_scale(Vec3::repeat(radius));
        }

        let sphere = Entity::new(MeshId(1), material)
            .with_bounds(Aabb::from_center_extents(Vec3::zeros(), Vec3::repeat(1.0)));
        let entity = scene.create_entity(sphere)?;
        scene.attach_entity(body, entity)?;

        let label = scene.create_textbox(TextBox::new(name))?;
        scene.attach_textbox(body, label)?;

        self.planets.push(Planet {
            pivot,
            body,
            orbit_speed,
            spin_speed: orbit_speed * 4.0,
        });
        Ok(body)
    }
}

impl Application for OrbitDemo {
    fn initialize(&mut self, engine: &mut Engine) -> Result<(), AppError> {
        let scene = engine.scene_mut();
        scene.set_ambient_color(Vec3::new(0.02, 0.02, 0.05));

        let sun_light = scene.create_light(Light::point(Vec3::new(1.0, 0.95, 0.8), 4.0, 200.0))?;
        scene.attach_light(NodeRef::Root, sun_light)?;
        let sun = scene.create_entity(Entity::new(MeshId(1), MaterialId(0)))?;
        scene.attach_entity(NodeRef::Root, sun)?;

        self.add_planet(scene, "mercury", 6.0, 0.4, 1.6, MaterialId(1))?;
        let earth = self.add_planet(scene, "earth", 12.0, 1.0, 1.0, MaterialId(2))?;
        let mars = self.add_planet(scene, "mars", 18.0, 0.6, 0.8, MaterialId(3))?;

        for (parent, name, distance) in [(earth, "moon", 2.0), (mars, "phobos", 1.2), (mars, "deimos", 2.0)] {
            let moon = scene.create_node(name, parent)?;
            if let Some(node) = scene.node_mut(moon) {
                node.set_position(Vec3::new(distance, 0.0, 0.0));
                node.set_scale(Vec3::repeat(0.3));
            }
            let rock = scene.create_entity(Entity::new(MeshId(1), MaterialId(4)))?;
            scene.attach_entity(moon, rock)?;
            self.moons.push(moon);
        }

        let belt = scene.create_node("asteroid_belt", NodeRef::Root)?;
        let asteroid = scene.create_entity(Entity::new(MeshId(2), MaterialId(5)).instanced())?;
        for i in 0..ASTEROID_COUNT {
            let angle = TAU * i as f32 / ASTEROID_COUNT as f32;
            let node = scene.create_node("", belt)?;
            if let Some(rock) = scene.node_mut(node) {
                rock.set_position(Vec3::new(angle.cos() * 24.0, 0.0, angle.sin() * 24.0));
                rock.set_scale(Vec3::repeat(0.1 + 0.05 * (i % 3) as f32));
            }
            scene.attach_entity(node, asteroid)?;
        }
        self.belt = Some(belt);

        log::info!(
            "Built solar system: {} nodes, {} planets, {} moons, {} asteroids",
            scene.node_count(),
            self.planets.len(),
            self.moons.len(),
            ASTEROID_COUNT
        );
        Ok(())
    }

    fn update(&mut self, engine: &mut Engine, delta_time: f32) -> Result<(), AppError> {
        let scene = engine.scene_mut();

        for planet in &self.planets {
            if let Some(pivot) = scene.node_mut(planet.pivot) {
                pivot.rotate(Quat::from_axis_angle(&Vec3::y_axis(), planet.orbit_speed * delta_time));
            }
            if let Some(body) = scene.node_mut(planet.body) {
                body.rotate(Quat::from_axis_angle(&Vec3::y_axis(), planet.spin_speed * delta_time));
            }
        }

        if let Some(belt) = self.belt.and_then(|belt| scene.node_mut(belt)) {
            belt.rotate(Quat::from_axis_angle(&Vec3::y_axis(), 0.05 * delta_time));
        }

        let frame = engine.timer().frame_count();
        if frame % REPORT_INTERVAL == 0 {
            let stats = engine.last_frame();
            let queue = engine.render_queue();
            log::info!(
                "Frame {}: {} nodes visited, {} recomputed, {} dispatched, {} batches, {} lights, {} labels",
                stats.frame,
                stats.visit.visited,
                stats.visit.recomputed,
                stats.visit.dispatched,
                stats.batches,
                queue.lights().len(),
                queue.overlay().len()
            );
            if let Some(earth) = engine.scene().find_node("earth").and_then(|earth| engine.scene().node(earth)) {
                let position = earth.world_position();
                log::debug!("Earth at ({:.2}, {:.2}, {:.2})", position.x, position.y, position.z);
            }
        }
        Ok(())
    }

    fn cleanup(&mut self, engine: &mut Engine) {
        for stats in engine.scene().cluster().stats() {
            log::info!(
                "Pool {}: {}/{} in use ({} bytes)",
                stats.type_name,
                stats.active,
                stats.capacity,
                stats.size_in_bytes
            );
        }
        engine.scene_mut().clear();
    }
}

fn load_config() -> Result<EngineConfig, Box<dyn std::error::Error>> {
    match std::env::args().nth(1) {
        Some(path) => Ok(EngineConfig::load_from_file(path)?),
        None => Ok(EngineConfig::default().with_scene(SceneConfig::new("solar_system"))),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let mut app = OrbitDemo::new();

    Engine::run(config, &mut app, Some(FRAME_COUNT))?;
    Ok(())
}
