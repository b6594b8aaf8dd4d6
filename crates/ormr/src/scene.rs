//! # Scene — Saving, Loading, and Switching Entity Sets
//!
//! A scene is the world's entities serialized to JSON: one record per entity
//! with a map of component name → value, plus child id lists encoding the
//! hierarchy. Component conversion goes through the
//! [`ComponentRegistry`] — only registered types survive a round trip;
//! anything else is skipped with a warning.
//!
//! ```ignore
//! let mut registry = ComponentRegistry::new();
//! registry.register::<Transform>();
//! registry.register::<Health>();
//!
//! save_scene_to_file(&world, &registry, "level.json")?;
//! let entities = load_scene_from_file(&mut world, &registry, "level.json")?;
//! ```
//!
//! [`Parent`], [`Children`], and [`GlobalTransform`] are never serialized as
//! components; the hierarchy is rebuilt from the child id lists, and global
//! transforms are recomputed by the next
//! [`propagate_transforms`](crate::hierarchy::propagate_transforms).

use std::any::TypeId;
use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::component::ComponentRegistry;
use crate::entity::Entity;
use crate::hierarchy::{Children, GlobalTransform, Parent};
use crate::world::World;

/// Errors from scene persistence.
#[derive(Debug, Error)]
pub enum SceneError {
    #[error("scene io: {0}")]
    Io(#[from] std::io::Error),
    #[error("scene json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("component '{name}': {message}")]
    Component { name: String, message: String },
}

// ── Wire format ──────────────────────────────────────────────────────────

/// A serialized scene: entities with components and hierarchy links.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneData {
    pub entities: Vec<SceneEntity>,
}

/// One entity in a serialized scene. `id` is only meaningful within the
/// scene file (it keys the `children` references); entities get fresh
/// handles on load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneEntity {
    pub id: u32,
    pub components: HashMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<u32>,
}

/// Tags an entity as belonging to a named scene, for
/// [`unload_scene`]/[`switch_scene`].
#[derive(Debug, Clone)]
pub struct SceneMarker(pub String);

// ── Save ─────────────────────────────────────────────────────────────────

/// Serialize every live entity's registered components.
///
/// Root entities come first in the output (stable, sorted by slot index),
/// children after — so a loader walking the file meets parents before their
/// children. Unregistered component types are skipped with a warning.
pub fn save_scene(world: &World, registry: &ComponentRegistry) -> SceneData {
    let skip = [
        TypeId::of::<Parent>(),
        TypeId::of::<Children>(),
        TypeId::of::<GlobalTransform>(),
        TypeId::of::<SceneMarker>(),
    ];

    let mut roots = Vec::new();
    let mut children = Vec::new();

    for entity in world.entities() {
        let mut components = HashMap::new();
        if let Some((arch, row)) = world.entity_storage(entity) {
            for info in arch.infos() {
                let type_id = info.type_id();
                if skip.contains(&type_id) {
                    continue;
                }
                if !registry.contains(type_id) {
                    log::warn!(
                        "scene save: skipping unregistered component `{}` on {entity}",
                        info.type_name()
                    );
                    continue;
                }
                let Some(ptr) = arch.slot_ptr(row, type_id) else {
                    continue;
                };
                let value = unsafe { registry.serialize_slot(type_id, ptr) };
                if let (Some(name), Some(value)) = (registry.short_name(type_id), value) {
                    components.insert(name.to_string(), value);
                }
            }
        }

        let child_ids: Vec<u32> = world
            .get::<Children>(entity)
            .map(|c| {
                c.0.iter()
                    .filter(|&&child| world.is_alive(child))
                    .map(|child| child.index())
                    .collect()
            })
            .unwrap_or_default();

        let record = SceneEntity {
            id: entity.index(),
            components,
            children: child_ids,
        };
        if world.get::<Parent>(entity).is_some() {
            children.push(record);
        } else {
            roots.push(record);
        }
    }

    roots.sort_by_key(|e| e.id);
    children.sort_by_key(|e| e.id);
    roots.extend(children);
    SceneData { entities: roots }
}

/// Save every live entity to a pretty-printed JSON file.
pub fn save_scene_to_file(
    world: &World,
    registry: &ComponentRegistry,
    path: impl AsRef<Path>,
) -> Result<(), SceneError> {
    let data = save_scene(world, registry);
    let json = serde_json::to_string_pretty(&data)?;
    std::fs::write(path, json)?;
    Ok(())
}

// ── Load ─────────────────────────────────────────────────────────────────

/// Spawn the scene's entities into the world.
///
/// Scene-file ids are remapped to fresh handles; hierarchy links are rebuilt
/// afterwards from the child id lists. Components whose name is not
/// registered are skipped with a warning; a value that fails to deserialize
/// is an error.
///
/// Returns the spawned entities in file order.
pub fn load_scene(
    world: &mut World,
    registry: &ComponentRegistry,
    data: &SceneData,
) -> Result<Vec<Entity>, SceneError> {
    let mut id_map: HashMap<u32, Entity> = HashMap::new();
    let mut spawned = Vec::new();

    for scene_entity in &data.entities {
        let entity = world.spawn();
        id_map.insert(scene_entity.id, entity);
        spawned.push(entity);

        for (name, value) in &scene_entity.components {
            if registry.type_id_by_name(name).is_none() {
                log::warn!("scene load: skipping unregistered component `{name}`");
                continue;
            }
            registry
                .insert_by_name(world, entity, name, value.clone())
                .map_err(|message| SceneError::Component {
                    name: name.clone(),
                    message,
                })?;
        }
    }

    for scene_entity in &data.entities {
        if scene_entity.children.is_empty() {
            continue;
        }
        let Some(&parent) = id_map.get(&scene_entity.id) else {
            continue;
        };
        let mut linked = Vec::new();
        for child_id in &scene_entity.children {
            match id_map.get(child_id) {
                Some(&child) => {
                    // Both handles were just spawned; inserts cannot fail.
                    let _ = world.insert(child, Parent(parent));
                    linked.push(child);
                }
                None => log::warn!("scene load: child id {child_id} missing from scene"),
            }
        }
        if !linked.is_empty() {
            let _ = world.insert(parent, Children(linked));
        }
    }

    Ok(spawned)
}

/// Load a scene from a JSON file.
pub fn load_scene_from_file(
    world: &mut World,
    registry: &ComponentRegistry,
    path: impl AsRef<Path>,
) -> Result<Vec<Entity>, SceneError> {
    let json = std::fs::read_to_string(path)?;
    let data: SceneData = serde_json::from_str(&json)?;
    load_scene(world, registry, &data)
}

// ── Scene switching ──────────────────────────────────────────────────────

/// Load a scene and tag every spawned entity with a scene name for later
/// [`unload_scene`].
pub fn load_scene_tagged(
    world: &mut World,
    registry: &ComponentRegistry,
    data: &SceneData,
    scene_name: &str,
) -> Result<Vec<Entity>, SceneError> {
    let entities = load_scene(world, registry, data)?;
    for &entity in &entities {
        let _ = world.insert(entity, SceneMarker(scene_name.to_string()));
    }
    Ok(entities)
}

/// Despawn every entity tagged with the given scene name (including their
/// descendants).
pub fn unload_scene(world: &mut World, scene_name: &str) {
    let mut to_despawn = Vec::new();
    world.query::<(&SceneMarker,)>(|entity, (marker,)| {
        if marker.0 == scene_name {
            to_despawn.push(entity);
        }
    });
    for entity in to_despawn {
        world.despawn_recursive(entity);
    }
}

/// Unload `old_name` and load `new_data` tagged as `new_name`.
pub fn switch_scene(
    world: &mut World,
    registry: &ComponentRegistry,
    old_name: &str,
    new_data: &SceneData,
    new_name: &str,
) -> Result<Vec<Entity>, SceneError> {
    unload_scene(world, old_name);
    load_scene_tagged(world, registry, new_data, new_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Transform;
    use glam::Vec3;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Health(u32);

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Label(String);

    struct Unregistered;

    fn registry() -> ComponentRegistry {
        let mut registry = ComponentRegistry::new();
        registry.register::<Transform>();
        registry.register::<Health>();
        registry.register::<Label>();
        registry
    }

    #[test]
    fn roundtrip_preserves_components() {
        let registry = registry();
        let mut world = World::new();
        world.spawn_bundle((
            Transform::from_xyz(1.0, 2.0, 3.0),
            Health(40),
            Label("guard".to_string()),
        ));
        world.spawn_one(Health(7));
        world.spawn(); // empty entity survives as an empty record

        let data = save_scene(&world, &registry);
        assert_eq!(data.entities.len(), 3);

        let mut restored = World::new();
        let spawned = load_scene(&mut restored, &registry, &data).unwrap();
        assert_eq!(spawned.len(), 3);
        assert_eq!(restored.entity_count(), 3);

        let guards = restored.entities_with::<Label>();
        assert_eq!(guards.len(), 1);
        let guard = guards[0];
        assert_eq!(restored.get::<Health>(guard), Some(&Health(40)));
        assert_eq!(
            restored.get::<Transform>(guard).map(|t| t.translation),
            Some(Vec3::new(1.0, 2.0, 3.0))
        );
    }

    #[test]
    fn hierarchy_is_rebuilt_from_child_lists() {
        let registry = registry();
        let mut world = World::new();
        let root = world.spawn_one(Transform::from_xy(10.0, 0.0));
        world.spawn_child(root, (Transform::from_xy(1.0, 0.0), Label("arm".into())));

        let data = save_scene(&world, &registry);
        // Roots come before children in the file.
        assert_eq!(data.entities[0].children.len(), 1);
        assert!(data.entities[1].children.is_empty());

        let mut restored = World::new();
        load_scene(&mut restored, &registry, &data).unwrap();

        let arm = restored.entities_with::<Label>()[0];
        let parent = restored.get::<Parent>(arm).map(|p| p.0).unwrap();
        assert_eq!(
            restored.get::<Children>(parent).map(|c| c.0.clone()),
            Some(vec![arm])
        );
        assert_eq!(
            restored.get::<Transform>(parent).map(|t| t.translation.x),
            Some(10.0)
        );
    }

    #[test]
    fn unregistered_components_are_skipped_on_save() {
        let registry = registry();
        let mut world = World::new();
        world.spawn_bundle((Health(1), Unregistered));

        let data = save_scene(&world, &registry);
        assert_eq!(data.entities.len(), 1);
        assert_eq!(data.entities[0].components.len(), 1);
        assert!(data.entities[0].components.contains_key("Health"));
    }

    #[test]
    fn unknown_component_names_are_skipped_on_load() {
        let registry = registry();
        let data = SceneData {
            entities: vec![SceneEntity {
                id: 0,
                components: HashMap::from([
                    ("Health".to_string(), serde_json::json!(12)),
                    ("Mystery".to_string(), serde_json::json!({"a": 1})),
                ]),
                children: Vec::new(),
            }],
        };

        let mut world = World::new();
        let spawned = load_scene(&mut world, &registry, &data).unwrap();
        assert_eq!(world.get::<Health>(spawned[0]), Some(&Health(12)));
    }

    #[test]
    fn malformed_component_value_is_an_error() {
        let registry = registry();
        let data = SceneData {
            entities: vec![SceneEntity {
                id: 0,
                components: HashMap::from([(
                    "Health".to_string(),
                    serde_json::json!("not a number"),
                )]),
                children: Vec::new(),
            }],
        };

        let mut world = World::new();
        let err = load_scene(&mut world, &registry, &data);
        assert!(matches!(err, Err(SceneError::Component { .. })));
    }

    #[test]
    fn file_helpers_roundtrip() {
        let registry = registry();
        let mut world = World::new();
        world.spawn_one(Health(99));

        let path = std::env::temp_dir().join("ormr_scene_roundtrip_test.json");
        save_scene_to_file(&world, &registry, &path).unwrap();

        let mut restored = World::new();
        let spawned = load_scene_from_file(&mut restored, &registry, &path).unwrap();
        assert_eq!(restored.get::<Health>(spawned[0]), Some(&Health(99)));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn switch_scene_replaces_tagged_entities() {
        let registry = registry();
        let mut world = World::new();

        let town = SceneData {
            entities: vec![SceneEntity {
                id: 0,
                components: HashMap::from([("Label".to_string(), serde_json::json!("town"))]),
                children: Vec::new(),
            }],
        };
        let dungeon = SceneData {
            entities: vec![SceneEntity {
                id: 0,
                components: HashMap::from([("Label".to_string(), serde_json::json!("dungeon"))]),
                children: Vec::new(),
            }],
        };

        load_scene_tagged(&mut world, &registry, &town, "town").unwrap();
        assert_eq!(world.entities_with::<Label>().len(), 1);

        switch_scene(&mut world, &registry, "town", &dungeon, "dungeon").unwrap();
        let labels = world.entities_with::<Label>();
        assert_eq!(labels.len(), 1);
        assert_eq!(
            world.get::<Label>(labels[0]),
            Some(&Label("dungeon".to_string()))
        );
    }
}
