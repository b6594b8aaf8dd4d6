//! Scene Roundtrip — save a small hierarchy to JSON and load it back.
//!
//! Run with: `cargo run -p ormr --example scene_roundtrip`

use ormr::prelude::*;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct Label(String);

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct Health(u32);

fn make_registry() -> ComponentRegistry {
    let mut registry = ComponentRegistry::new();
    registry.register::<Transform>();
    registry.register::<Label>();
    registry.register::<Health>();
    registry
}

fn main() -> Result<(), SceneError> {
    env_logger::init();

    let registry = make_registry();
    let save_path = std::env::temp_dir().join("ormr_scene.json");

    // Build a little scene: a cart with two wheels.
    let mut world = World::new();
    let cart = world.spawn_bundle((
        Transform::from_xy(10.0, 0.0),
        Label("cart".to_string()),
        Health(100),
    ));
    world.spawn_child(cart, (Transform::from_xy(-2.0, -1.0), Label("wheel.l".to_string())));
    world.spawn_child(cart, (Transform::from_xy(2.0, -1.0), Label("wheel.r".to_string())));
    propagate_transforms(&mut world);

    save_scene_to_file(&world, &registry, &save_path)?;
    println!("saved {} entities to {}", world.entity_count(), save_path.display());

    // Load into a fresh world and verify the hierarchy came back.
    let mut restored = World::new();
    let spawned = load_scene_from_file(&mut restored, &registry, &save_path)?;
    propagate_transforms(&mut restored);

    println!("loaded {} entities:", spawned.len());
    for &entity in &spawned {
        let label = restored
            .get::<Label>(entity)
            .map(|l| l.0.clone())
            .unwrap_or_else(|| "<unlabeled>".to_string());
        let world_x = restored
            .get::<GlobalTransform>(entity)
            .map(|g| g.matrix.w_axis.x)
            .unwrap_or(0.0);
        let children = restored
            .get::<Children>(entity)
            .map(|c| c.0.len())
            .unwrap_or(0);
        println!("  {label:10} world_x={world_x:5.1} children={children}");
    }

    Ok(())
}
