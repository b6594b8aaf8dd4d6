//! # World — Entity-to-Archetype Mapping
//!
//! The [`World`] owns everything: the entity pool, every [`Archetype`], the
//! side table mapping each entity to its current `(archetype, row)`, and
//! global resources.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │ World                                                │
//! │                                                      │
//! │  pool: EntityPool          handle allocation          │
//! │                                                      │
//! │  archetypes: Vec<Archetype>                          │
//! │  by_layout:  HashMap<u64, Vec<ArchetypeId>>           │
//! │      key = layout hash of the component-name set      │
//! │                                                      │
//! │  locations: HashMap<u32, (ArchetypeId, row)>          │
//! │      absent ⇒ the entity is empty (no archetype)      │
//! │                                                      │
//! │  resources: HashMap<TypeId, Box<dyn Any>>             │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! ## Lifecycle
//!
//! Entities start **empty** — a bare handle, member of no archetype. Each
//! component added or removed migrates the entity to the archetype matching
//! its new component set: the target archetype is found (or created) by
//! layout hash, the shared column bytes move over, and the entity leaves its
//! old archetype via swap-remove. Removing the last component returns the
//! entity to the empty state.
//!
//! Every archetype creation bumps a revision counter so cached
//! [`Query`](crate::query::Query) matches know when to recompute.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::mem::ManuallyDrop;

use thiserror::Error;

use crate::archetype::{Archetype, ArchetypeId, layout_hash};
use crate::component::{Component, ComponentInfo};
use crate::entity::{Entity, EntityPool};
use crate::hierarchy::{Children, Parent};

/// Operations on a despawned or never-valid handle report this.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EcsError {
    #[error("entity {0} is stale or was never spawned")]
    StaleEntity(Entity),
}

/// Where an entity currently lives.
#[derive(Debug, Clone, Copy)]
pub(crate) struct EntityLocation {
    pub(crate) archetype: ArchetypeId,
    pub(crate) row: usize,
}

/// The central container for entities, components, and resources.
pub struct World {
    pool: EntityPool,
    /// All archetypes ever created, indexed by [`ArchetypeId`].
    archetypes: Vec<Archetype>,
    /// Layout hash → archetypes with that hash. Normally one entry; hash
    /// collisions degrade to a linear probe over the bucket.
    by_layout: HashMap<u64, Vec<ArchetypeId>>,
    /// Entity index → current location. Absent for empty entities.
    locations: HashMap<u32, EntityLocation>,
    /// Bumped whenever the archetype set grows.
    revision: u64,
    /// Type-keyed singletons not tied to any entity.
    resources: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl World {
    pub fn new() -> Self {
        Self {
            pool: EntityPool::new(),
            archetypes: Vec::new(),
            by_layout: HashMap::new(),
            locations: HashMap::new(),
            revision: 0,
            resources: HashMap::new(),
        }
    }

    // ── Entity lifecycle ─────────────────────────────────────────────

    /// Spawn an empty entity: a live handle that belongs to no archetype
    /// until its first component is inserted.
    pub fn spawn(&mut self) -> Entity {
        self.pool.allocate()
    }

    /// Spawn an entity with a bundle of components (a tuple, arity 1–8).
    ///
    /// ```ignore
    /// let e = world.spawn_bundle((Position { x: 0.0, y: 0.0 }, Velocity::default()));
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if the bundle contains two components of the same type.
    pub fn spawn_bundle<B: Bundle>(&mut self, bundle: B) -> Entity {
        let infos = B::component_infos();
        {
            let mut ids: Vec<TypeId> = infos.iter().map(|i| i.type_id()).collect();
            ids.sort_unstable();
            assert!(
                ids.windows(2).all(|w| w[0] != w[1]),
                "bundle contains duplicate component types"
            );
        }

        let entity = self.pool.allocate();
        let archetype = self.get_or_create_archetype(infos);
        let arch = &mut self.archetypes[archetype.index()];
        bundle.write(&mut |type_id, ptr| unsafe {
            arch.push_value(type_id, ptr);
        });
        let row = arch.push_entity(entity);
        #[cfg(debug_assertions)]
        arch.assert_consistent();

        self.locations
            .insert(entity.index(), EntityLocation { archetype, row });
        entity
    }

    /// Spawn an entity with a single component, no tuple wrapping needed.
    pub fn spawn_one<T: Component>(&mut self, component: T) -> Entity {
        self.spawn_bundle((component,))
    }

    /// Despawn an entity: swap-remove its row, fix the moved entity's
    /// location, release the handle for reuse.
    ///
    /// Returns `false` if the handle was already stale.
    pub fn despawn(&mut self, entity: Entity) -> bool {
        if !self.pool.is_alive(entity) {
            return false;
        }
        if let Some(loc) = self.locations.remove(&entity.index()) {
            let moved = self.archetypes[loc.archetype.index()].swap_remove_row(loc.row);
            if let Some(moved) = moved {
                if let Some(moved_loc) = self.locations.get_mut(&moved.index()) {
                    moved_loc.row = loc.row;
                }
            }
        }
        self.pool.release(entity)
    }

    /// Despawn every live entity. Archetypes are kept (empty) for reuse.
    pub fn despawn_all(&mut self) {
        for entity in self.pool.live_entities() {
            self.despawn(entity);
        }
    }

    /// Whether the handle still refers to a live entity.
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.pool.is_alive(entity)
    }

    /// Number of live entities.
    pub fn entity_count(&self) -> usize {
        self.pool.alive_count()
    }

    /// Number of archetypes ever created.
    pub fn archetype_count(&self) -> usize {
        self.archetypes.len()
    }

    /// Snapshot of every live entity, including empty ones.
    pub fn entities(&self) -> Vec<Entity> {
        self.pool.live_entities()
    }

    // ── Component access ─────────────────────────────────────────────

    /// Shared reference to a component on an entity. `None` for dead
    /// entities, empty entities, and missing components.
    pub fn get<T: Component>(&self, entity: Entity) -> Option<&T> {
        if !self.pool.is_alive(entity) {
            return None;
        }
        let loc = self.locations.get(&entity.index())?;
        self.archetypes[loc.archetype.index()].get::<T>(loc.row)
    }

    /// Mutable reference to a component on an entity.
    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        if !self.pool.is_alive(entity) {
            return None;
        }
        let loc = self.locations.get(&entity.index())?;
        self.archetypes[loc.archetype.index()].get_mut::<T>(loc.row)
    }

    /// Whether the entity currently has a component of type `T`.
    pub fn has<T: Component>(&self, entity: Entity) -> bool {
        self.get::<T>(entity).is_some()
    }

    /// Insert a component, migrating the entity to the matching archetype.
    /// If the entity already has the type, the value is overwritten in place
    /// (no migration).
    pub fn insert<T: Component>(&mut self, entity: Entity, value: T) -> Result<(), EcsError> {
        if !self.pool.is_alive(entity) {
            return Err(EcsError::StaleEntity(entity));
        }
        let type_id = TypeId::of::<T>();

        let Some(loc) = self.locations.get(&entity.index()).copied() else {
            // First component: the entity enters its single-component archetype.
            let archetype = self.get_or_create_archetype(vec![ComponentInfo::of::<T>()]);
            let arch = &mut self.archetypes[archetype.index()];
            let value = ManuallyDrop::new(value);
            unsafe {
                arch.push_value(type_id, &*value as *const T as *const u8);
            }
            let row = arch.push_entity(entity);
            self.locations
                .insert(entity.index(), EntityLocation { archetype, row });
            return Ok(());
        };

        if self.archetypes[loc.archetype.index()].has(type_id) {
            // Overwrite in place; the old value drops through the assignment.
            let slot = self.archetypes[loc.archetype.index()]
                .get_mut::<T>(loc.row)
                .expect("location desynced from archetype");
            *slot = value;
            return Ok(());
        }

        // Migrate: old component set plus T.
        let mut infos = self.archetypes[loc.archetype.index()].infos().to_vec();
        infos.push(ComponentInfo::of::<T>());
        let target_id = self.get_or_create_archetype(infos);

        let (moved, new_row) = {
            let (source, target) = self.two_archetypes(loc.archetype, target_id);
            let moved = source.move_row_to(loc.row, target);
            let value = ManuallyDrop::new(value);
            unsafe {
                target.push_value(type_id, &*value as *const T as *const u8);
            }
            #[cfg(debug_assertions)]
            target.assert_consistent();
            (moved, target.len() - 1)
        };

        if let Some(moved) = moved {
            if let Some(moved_loc) = self.locations.get_mut(&moved.index()) {
                moved_loc.row = loc.row;
            }
        }
        self.locations.insert(
            entity.index(),
            EntityLocation {
                archetype: target_id,
                row: new_row,
            },
        );
        Ok(())
    }

    /// Remove a component, migrating the entity to the archetype without it.
    /// The removed value is dropped. Removing the last component returns the
    /// entity to the empty state.
    ///
    /// Returns `Ok(false)` if the entity does not have the component.
    pub fn remove<T: Component>(&mut self, entity: Entity) -> Result<bool, EcsError> {
        if !self.pool.is_alive(entity) {
            return Err(EcsError::StaleEntity(entity));
        }
        let type_id = TypeId::of::<T>();

        let Some(loc) = self.locations.get(&entity.index()).copied() else {
            return Ok(false);
        };
        if !self.archetypes[loc.archetype.index()].has(type_id) {
            return Ok(false);
        }

        let remaining: Vec<ComponentInfo> = self.archetypes[loc.archetype.index()]
            .infos()
            .iter()
            .filter(|info| info.type_id != type_id)
            .cloned()
            .collect();

        if remaining.is_empty() {
            // Back to the empty state: no target archetype.
            let moved = self.archetypes[loc.archetype.index()].swap_remove_row(loc.row);
            self.locations.remove(&entity.index());
            if let Some(moved) = moved {
                if let Some(moved_loc) = self.locations.get_mut(&moved.index()) {
                    moved_loc.row = loc.row;
                }
            }
            return Ok(true);
        }

        let target_id = self.get_or_create_archetype(remaining);
        let (moved, new_row) = {
            let (source, target) = self.two_archetypes(loc.archetype, target_id);
            let moved = source.move_row_to(loc.row, target);
            #[cfg(debug_assertions)]
            target.assert_consistent();
            (moved, target.len() - 1)
        };

        if let Some(moved) = moved {
            if let Some(moved_loc) = self.locations.get_mut(&moved.index()) {
                moved_loc.row = loc.row;
            }
        }
        self.locations.insert(
            entity.index(),
            EntityLocation {
                archetype: target_id,
                row: new_row,
            },
        );
        Ok(true)
    }

    /// All entities currently carrying a component of type `T`.
    pub fn entities_with<T: Component>(&self) -> Vec<Entity> {
        let type_id = TypeId::of::<T>();
        let mut result = Vec::new();
        for arch in &self.archetypes {
            if arch.has(type_id) {
                result.extend_from_slice(arch.entities());
            }
        }
        result
    }

    // ── Archetype management ─────────────────────────────────────────

    /// Find the archetype for a component set by layout hash, creating it on
    /// first use. Creation bumps the revision counter.
    fn get_or_create_archetype(&mut self, mut infos: Vec<ComponentInfo>) -> ArchetypeId {
        infos.sort_unstable_by_key(|info| info.type_id());
        let hash = layout_hash(&infos);

        if let Some(bucket) = self.by_layout.get(&hash) {
            for &id in bucket {
                let existing = &self.archetypes[id.index()];
                // Hash equality alone is not identity; verify the type set.
                if existing.layout_hash() == hash
                    && existing.infos().len() == infos.len()
                    && existing
                        .type_ids()
                        .zip(infos.iter().map(|i| i.type_id()))
                        .all(|(a, b)| a == b)
                {
                    return id;
                }
            }
        }

        let id = ArchetypeId(self.archetypes.len() as u32);
        log::trace!(
            "new archetype {:?}: [{}]",
            id,
            infos
                .iter()
                .map(|i| i.type_name())
                .collect::<Vec<_>>()
                .join(", ")
        );
        self.archetypes.push(Archetype::new(id, infos));
        self.by_layout.entry(hash).or_default().push(id);
        self.revision += 1;
        id
    }

    /// Mutable access to two distinct archetypes at once (migration source
    /// and target).
    fn two_archetypes(
        &mut self,
        a: ArchetypeId,
        b: ArchetypeId,
    ) -> (&mut Archetype, &mut Archetype) {
        let (ai, bi) = (a.index(), b.index());
        assert_ne!(ai, bi, "migration source and target must differ");
        if ai < bi {
            let (left, right) = self.archetypes.split_at_mut(bi);
            (&mut left[ai], &mut right[0])
        } else {
            let (left, right) = self.archetypes.split_at_mut(ai);
            (&mut right[0], &mut left[bi])
        }
    }

    /// The archetype-set revision. Grows monotonically; queries compare it
    /// to decide whether their cached matches are stale.
    pub fn archetype_revision(&self) -> u64 {
        self.revision
    }

    pub(crate) fn archetypes(&self) -> &[Archetype] {
        &self.archetypes
    }

    pub(crate) fn archetype_mut(&mut self, id: ArchetypeId) -> &mut Archetype {
        &mut self.archetypes[id.index()]
    }

    /// The archetype and row an entity currently occupies, if it has any
    /// components.
    pub(crate) fn entity_storage(&self, entity: Entity) -> Option<(&Archetype, usize)> {
        if !self.pool.is_alive(entity) {
            return None;
        }
        let loc = self.locations.get(&entity.index())?;
        Some((&self.archetypes[loc.archetype.index()], loc.row))
    }

    #[cfg(feature = "diagnostics")]
    pub(crate) fn pool(&self) -> &EntityPool {
        &self.pool
    }

    // ── Resources ────────────────────────────────────────────────────

    /// Insert a resource (type-keyed singleton), replacing any existing
    /// value of the same type.
    pub fn insert_resource<T: Component>(&mut self, value: T) {
        self.resources.insert(TypeId::of::<T>(), Box::new(value));
    }

    /// Shared reference to a resource.
    ///
    /// # Panics
    ///
    /// Panics if the resource was never inserted.
    pub fn resource<T: Component>(&self) -> &T {
        self.get_resource().unwrap_or_else(|| {
            panic!(
                "resource `{}` not found; insert it before use",
                std::any::type_name::<T>()
            )
        })
    }

    /// Mutable reference to a resource.
    ///
    /// # Panics
    ///
    /// Panics if the resource was never inserted.
    pub fn resource_mut<T: Component>(&mut self) -> &mut T {
        self.get_resource_mut().unwrap_or_else(|| {
            panic!(
                "resource `{}` not found; insert it before use",
                std::any::type_name::<T>()
            )
        })
    }

    /// Shared reference to a resource, `None` when absent.
    pub fn get_resource<T: Component>(&self) -> Option<&T> {
        self.resources
            .get(&TypeId::of::<T>())
            .and_then(|r| r.downcast_ref::<T>())
    }

    /// Mutable reference to a resource, `None` when absent.
    pub fn get_resource_mut<T: Component>(&mut self) -> Option<&mut T> {
        self.resources
            .get_mut(&TypeId::of::<T>())
            .and_then(|r| r.downcast_mut::<T>())
    }

    /// Remove a resource, taking ownership. Useful when a resource must be
    /// borrowed alongside the rest of the world: take it out, work, reinsert.
    pub fn remove_resource<T: Component>(&mut self) -> Option<T> {
        self.resources
            .remove(&TypeId::of::<T>())
            .and_then(|r| r.downcast::<T>().ok())
            .map(|b| *b)
    }

    /// Whether a resource of type `T` is present.
    pub fn has_resource<T: Component>(&self) -> bool {
        self.resources.contains_key(&TypeId::of::<T>())
    }

    // ── Hierarchy ────────────────────────────────────────────────────

    /// Spawn a child entity under `parent`: the bundle plus a [`Parent`]
    /// link, and the parent's [`Children`] list is updated.
    ///
    /// # Panics
    ///
    /// Panics if `parent` is not alive.
    pub fn spawn_child<B: Bundle>(&mut self, parent: Entity, bundle: B) -> Entity {
        assert!(
            self.pool.is_alive(parent),
            "cannot spawn child under dead parent {parent:?}"
        );
        let child = self.spawn_bundle(bundle);
        // Both inserts are on entities spawned or checked alive above.
        let _ = self.insert(child, Parent(parent));
        if let Some(children) = self.get_mut::<Children>(parent) {
            children.0.push(child);
        } else {
            let _ = self.insert(parent, Children(vec![child]));
        }
        child
    }

    /// Despawn an entity and all of its descendants. The entity is also
    /// detached from its parent's [`Children`] list.
    ///
    /// Returns `false` if the handle was already stale.
    pub fn despawn_recursive(&mut self, entity: Entity) -> bool {
        if !self.pool.is_alive(entity) {
            return false;
        }

        if let Some(parent) = self.get::<Parent>(entity).map(|p| p.0) {
            if let Some(children) = self.get_mut::<Children>(parent) {
                children.0.retain(|&c| c != entity);
            }
        }

        // Collect the subtree breadth-first, then despawn.
        let mut pending = vec![entity];
        let mut cursor = 0;
        while cursor < pending.len() {
            if let Some(children) = self.get::<Children>(pending[cursor]) {
                pending.extend(children.0.iter().copied());
            }
            cursor += 1;
        }
        for e in pending {
            self.despawn(e);
        }
        true
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("entities", &self.pool.alive_count())
            .field("archetypes", &self.archetypes.len())
            .finish()
    }
}

// ── Bundle ───────────────────────────────────────────────────────────────

/// A set of components spawned together. Implemented for tuples of
/// components up to arity 8.
pub trait Bundle {
    /// Descriptors for every component in the bundle, in tuple order.
    fn component_infos() -> Vec<ComponentInfo>;

    /// Hand each component to `write` as a `(TypeId, pointer)` pair.
    /// Ownership of the pointed-at value transfers the moment `write` is
    /// called; the consumer must copy the bytes out before returning.
    fn write(self, write: &mut dyn FnMut(TypeId, *const u8));
}

macro_rules! impl_bundle {
    ($($T:ident),+) => {
        impl<$($T: Component),+> Bundle for ($($T,)+) {
            fn component_infos() -> Vec<ComponentInfo> {
                vec![$(ComponentInfo::of::<$T>()),+]
            }

            #[allow(non_snake_case)]
            fn write(self, write: &mut dyn FnMut(TypeId, *const u8)) {
                let ($($T,)+) = self;
                $(
                    let $T = ManuallyDrop::new($T);
                    write(TypeId::of::<$T>(), &*$T as *const $T as *const u8);
                )+
            }
        }
    };
}

impl_bundle!(A);
impl_bundle!(A, B);
impl_bundle!(A, B, C);
impl_bundle!(A, B, C, D);
impl_bundle!(A, B, C, D, E);
impl_bundle!(A, B, C, D, E, F);
impl_bundle!(A, B, C, D, E, F, G);
impl_bundle!(A, B, C, D, E, F, G, H);
