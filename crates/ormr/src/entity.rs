//! # Entity — Generational Handles
//!
//! An [`Entity`] is a plain identifier; it carries no data of its own. The
//! [`World`](crate::world::World) decides what the identifier currently maps
//! to. What makes the handle safe to hold onto is the **generation**: every
//! slot in the [`EntityPool`] remembers how many times it has been recycled,
//! and a handle is only valid while its generation matches the slot's.
//!
//! ```text
//! spawn  → Entity { index: 5, generation: 0 }
//! despawn, spawn again
//!        → Entity { index: 5, generation: 1 }   (same slot, new generation)
//! ```
//!
//! The stale handle still says `generation: 0`, so every lookup through it
//! resolves to "not alive" instead of silently reading the new entity's data.
//!
//! The index space only grows. Released indices go on a free list and get
//! handed out again, but the generation table itself is never shrunk.

use std::fmt;

/// A lightweight handle to an entity in the [`World`](crate::world::World).
///
/// Handles are created by the world's spawn methods and stay valid until the
/// entity is despawned. Holding a handle past despawn is fine — it just stops
/// resolving.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Entity {
    /// Slot index in the pool. Recycled after despawn.
    pub(crate) index: u32,
    /// Bumped every time the slot is recycled; stale handles fail to match.
    pub(crate) generation: u32,
}

impl Entity {
    /// Raw slot index. Intended for diagnostics and serialization, not as a
    /// substitute for the handle.
    pub fn index(self) -> u32 {
        self.index
    }

    /// Generation counter of this handle.
    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({}v{})", self.index, self.generation)
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

/// Allocates and recycles entity handles.
///
/// ```text
/// generations: [0, 2, 0, 1, 0]   one entry per slot ever handed out
/// free_list:   [3, 1]            slots waiting for reuse
/// len:         5                 next fresh index when the free list is empty
/// ```
pub(crate) struct EntityPool {
    /// Live generation for each slot, indexed by `Entity::index`.
    generations: Vec<u32>,
    /// Released slots available for reuse.
    free_list: Vec<u32>,
    /// Number of slots ever allocated; also the next fresh index.
    len: u32,
}

impl EntityPool {
    pub fn new() -> Self {
        Self {
            generations: Vec::new(),
            free_list: Vec::new(),
            len: 0,
        }
    }

    /// Hand out a handle, preferring a recycled slot over a fresh one.
    pub fn allocate(&mut self) -> Entity {
        if let Some(index) = self.free_list.pop() {
            // Generation was already bumped when the slot was released.
            let generation = self.generations[index as usize];
            Entity { index, generation }
        } else {
            let index = self.len;
            self.len += 1;
            self.generations.push(0);
            Entity {
                index,
                generation: 0,
            }
        }
    }

    /// Release a handle, making its slot reusable.
    ///
    /// Returns `false` if the handle was already stale, so double-release is
    /// harmless.
    pub fn release(&mut self, entity: Entity) -> bool {
        let idx = entity.index as usize;
        if idx < self.generations.len() && self.generations[idx] == entity.generation {
            // Bump now so every outstanding copy of this handle goes stale.
            self.generations[idx] += 1;
            self.free_list.push(entity.index);
            true
        } else {
            false
        }
    }

    /// Whether the handle still refers to a live entity.
    pub fn is_alive(&self, entity: Entity) -> bool {
        let idx = entity.index as usize;
        idx < self.generations.len() && self.generations[idx] == entity.generation
    }

    /// Number of currently live entities.
    pub fn alive_count(&self) -> usize {
        (self.len as usize) - self.free_list.len()
    }

    /// Snapshot of every live handle. Walks the whole slot table; meant for
    /// bulk operations (save, despawn-all), not per-tick use.
    pub fn live_entities(&self) -> Vec<Entity> {
        let free: std::collections::HashSet<u32> = self.free_list.iter().copied().collect();
        (0..self.len)
            .filter(|index| !free.contains(index))
            .map(|index| Entity {
                index,
                generation: self.generations[index as usize],
            })
            .collect()
    }

    /// Number of slots waiting on the free list.
    #[cfg(any(feature = "diagnostics", test))]
    pub(crate) fn free_count(&self) -> usize {
        self.free_list.len()
    }

    /// Total slots ever allocated.
    #[cfg(any(feature = "diagnostics", test))]
    pub(crate) fn total_slots(&self) -> u32 {
        self.len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_indices_are_sequential() {
        let mut pool = EntityPool::new();
        let e0 = pool.allocate();
        let e1 = pool.allocate();
        assert_eq!((e0.index, e0.generation), (0, 0));
        assert_eq!((e1.index, e1.generation), (1, 0));
    }

    #[test]
    fn release_recycles_slot_with_bumped_generation() {
        let mut pool = EntityPool::new();
        let e0 = pool.allocate();
        assert!(pool.release(e0));
        let reused = pool.allocate();
        assert_eq!(reused.index, 0);
        assert_eq!(reused.generation, 1);
    }

    #[test]
    fn stale_handle_is_not_alive() {
        let mut pool = EntityPool::new();
        let e0 = pool.allocate();
        assert!(pool.is_alive(e0));
        pool.release(e0);
        assert!(!pool.is_alive(e0));

        // The recycled slot does not resurrect the old handle.
        let _reused = pool.allocate();
        assert!(!pool.is_alive(e0));
    }

    #[test]
    fn double_release_returns_false() {
        let mut pool = EntityPool::new();
        let e0 = pool.allocate();
        assert!(pool.release(e0));
        assert!(!pool.release(e0));
        assert_eq!(pool.alive_count(), 0);
    }

    #[test]
    fn counters_track_alloc_and_release() {
        let mut pool = EntityPool::new();
        let e0 = pool.allocate();
        let _e1 = pool.allocate();
        assert_eq!(pool.alive_count(), 2);
        assert_eq!(pool.total_slots(), 2);
        assert_eq!(pool.free_count(), 0);

        pool.release(e0);
        assert_eq!(pool.alive_count(), 1);
        assert_eq!(pool.total_slots(), 2);
        assert_eq!(pool.free_count(), 1);
    }

    #[test]
    fn out_of_range_handle_is_dead() {
        let pool = EntityPool::new();
        let bogus = Entity {
            index: 42,
            generation: 0,
        };
        assert!(!pool.is_alive(bogus));
    }
}
