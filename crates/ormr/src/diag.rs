//! Diagnostics snapshots of ECS state. Compiled under the `diagnostics`
//! feature (on by default); the snapshots are plain data so callers can
//! print them, ship them over a socket, or feed them to an inspector.

use crate::component::{ComponentRegistry, short_type_name};
use crate::entity::Entity;
use crate::world::World;

/// Entity pool occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityPoolStats {
    /// Slots ever allocated; the generation table's length.
    pub total_slots: u32,
    /// Slots currently on the free list.
    pub free_count: usize,
    pub alive_count: usize,
}

/// Shape and population of one archetype.
#[derive(Debug, Clone)]
pub struct ArchetypeSnapshot {
    pub entity_count: usize,
    /// Short component type names, in storage order.
    pub component_names: Vec<String>,
}

/// One component on one entity, optionally rendered to JSON when the
/// registry knows the type.
#[derive(Debug, Clone)]
pub struct ComponentSnapshot {
    pub name: String,
    pub value: Option<serde_json::Value>,
}

/// A single entity's components.
#[derive(Debug, Clone)]
pub struct EntitySnapshot {
    pub id: u32,
    pub generation: u32,
    pub components: Vec<ComponentSnapshot>,
}

impl World {
    /// Entity pool occupancy counters.
    pub fn entity_pool_stats(&self) -> EntityPoolStats {
        let pool = self.pool();
        EntityPoolStats {
            total_slots: pool.total_slots(),
            free_count: pool.free_count(),
            alive_count: pool.alive_count(),
        }
    }

    /// Snapshot of every non-empty archetype, most populated first.
    pub fn archetype_snapshots(&self) -> Vec<ArchetypeSnapshot> {
        let mut snapshots: Vec<ArchetypeSnapshot> = self
            .archetypes()
            .iter()
            .filter(|arch| !arch.is_empty())
            .map(|arch| ArchetypeSnapshot {
                entity_count: arch.len(),
                component_names: arch
                    .infos()
                    .iter()
                    .map(|info| short_type_name(info.type_name()).to_string())
                    .collect(),
            })
            .collect();
        snapshots.sort_by(|a, b| b.entity_count.cmp(&a.entity_count));
        snapshots
    }

    /// The components currently on `entity`. Values are rendered through
    /// `registry` where possible; unregistered types appear with `value:
    /// None`. Returns `None` for dead entities; an empty component list for
    /// live entities with no archetype.
    pub fn entity_snapshot(
        &self,
        entity: Entity,
        registry: Option<&ComponentRegistry>,
    ) -> Option<EntitySnapshot> {
        if !self.is_alive(entity) {
            return None;
        }
        let mut components = Vec::new();
        if let Some((arch, row)) = self.entity_storage(entity) {
            for info in arch.infos() {
                let type_id = info.type_id();
                let value = registry
                    .filter(|r| r.contains(type_id))
                    .and_then(|r| {
                        let ptr = arch.slot_ptr(row, type_id)?;
                        unsafe { r.serialize_slot(type_id, ptr) }
                    });
                components.push(ComponentSnapshot {
                    name: short_type_name(info.type_name()).to_string(),
                    value,
                });
            }
        }
        Some(EntitySnapshot {
            id: entity.index(),
            generation: entity.generation(),
            components,
        })
    }
}
