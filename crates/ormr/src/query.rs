//! # Query — Matching Archetypes and Iterating Rows
//!
//! A query is two sets of component types: **include** (the archetype must
//! have all of them) and **exclude** (it must have none). Built through
//! [`QueryBuilder`], the sets are fixed for the query's lifetime; what
//! changes is the cached list of matching archetypes.
//!
//! ```text
//! QueryBuilder::new().include::<Position>().include::<Velocity>()
//!                    .exclude::<Frozen>().build()
//!
//! update_matches:  scan all archetypes        O(archetypes × include)
//! iteration:       outer loop over matched archetypes,
//!                  inner loop over that archetype's rows
//! ```
//!
//! The cache is keyed to the world's archetype revision: any operation that
//! creates an archetype bumps the revision, and the next use of the query
//! recomputes its matches. [`Query::update_matches`] does the same
//! explicitly.
//!
//! ## Typed access
//!
//! Row data comes out through the [`Fetch`] trait, implemented for `&T`,
//! `&mut T`, and tuples of those up to arity 8. Iteration is closure-based:
//! yielded items borrow from the world's column buffers, which Rust's
//! `Iterator` cannot express, and [`Query::for_each`] holds the world
//! exclusively for exactly the duration of the loop. Fetching the same type
//! twice in one query is rejected up front — that would alias.

use std::any::TypeId;

use crate::archetype::{Archetype, ArchetypeId};
use crate::component::Component;
use crate::entity::Entity;
use crate::world::World;

/// Builds a [`Query`] from include/exclude component sets.
#[derive(Default)]
pub struct QueryBuilder {
    include: Vec<TypeId>,
    exclude: Vec<TypeId>,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require the component type `T` to be present.
    pub fn include<T: Component>(self) -> Self {
        self.include_type_id(TypeId::of::<T>())
    }

    /// Require the component type `T` to be absent.
    pub fn exclude<T: Component>(self) -> Self {
        self.exclude_type_id(TypeId::of::<T>())
    }

    /// Dynamic form of [`include`](Self::include) for callers that only have
    /// a `TypeId`.
    pub fn include_type_id(mut self, type_id: TypeId) -> Self {
        self.include.push(type_id);
        self
    }

    /// Dynamic form of [`exclude`](Self::exclude).
    pub fn exclude_type_id(mut self, type_id: TypeId) -> Self {
        self.exclude.push(type_id);
        self
    }

    /// Finish the query. The filter sets are immutable from here on.
    pub fn build(mut self) -> Query {
        self.include.sort_unstable();
        self.include.dedup();
        self.exclude.sort_unstable();
        self.exclude.dedup();
        Query {
            include: self.include,
            exclude: self.exclude,
            matches: Vec::new(),
            seen_revision: None,
        }
    }
}

/// A reusable filter over the world's archetypes, with a cached match list.
pub struct Query {
    include: Vec<TypeId>,
    exclude: Vec<TypeId>,
    /// Archetypes satisfying the filter as of `seen_revision`.
    matches: Vec<ArchetypeId>,
    /// Archetype revision the cache was computed at; `None` before first use.
    seen_revision: Option<u64>,
}

impl Query {
    pub fn builder() -> QueryBuilder {
        QueryBuilder::new()
    }

    /// Recompute the matching archetypes: every include type present, no
    /// exclude type present. One linear scan over the world's archetypes.
    pub fn update_matches(&mut self, world: &World) {
        self.matches.clear();
        for arch in world.archetypes() {
            let all_included = self.include.iter().all(|t| arch.has(*t));
            let none_excluded = self.exclude.iter().all(|t| !arch.has(*t));
            if all_included && none_excluded {
                self.matches.push(arch.id());
            }
        }
        self.seen_revision = Some(world.archetype_revision());
    }

    fn refresh_if_stale(&mut self, world: &World) {
        if self.seen_revision != Some(world.archetype_revision()) {
            self.update_matches(world);
        }
    }

    /// The cached match list. Only meaningful after
    /// [`update_matches`](Self::update_matches) or an iteration call.
    pub fn matches(&self) -> &[ArchetypeId] {
        &self.matches
    }

    /// Whether the cache is out of date with the world's archetype set.
    pub fn is_stale(&self, world: &World) -> bool {
        self.seen_revision != Some(world.archetype_revision())
    }

    /// Collect all matching entities. Refreshes the cache if stale.
    pub fn entities(&mut self, world: &World) -> Vec<Entity> {
        self.refresh_if_stale(world);
        let mut out = Vec::new();
        for &arch_id in &self.matches {
            out.extend_from_slice(world.archetypes()[arch_id.index()].entities());
        }
        out
    }

    /// Iterate all matching entities, yielding `(Entity, Q::Item)` per row.
    /// Refreshes the cache if stale.
    ///
    /// # Panics
    ///
    /// Panics if `Q` fetches a type outside the query's include set, or
    /// fetches the same type twice.
    pub fn for_each<Q: Fetch>(
        &mut self,
        world: &mut World,
        mut f: impl FnMut(Entity, Q::Item<'_>),
    ) {
        self.refresh_if_stale(world);

        let mut fetched = Vec::new();
        Q::push_type_ids(&mut fetched);
        {
            let mut sorted = fetched.clone();
            sorted.sort_unstable();
            sorted.dedup();
            assert_eq!(
                sorted.len(),
                fetched.len(),
                "query fetches the same component type twice"
            );
        }
        for tid in &fetched {
            assert!(
                self.include.binary_search(tid).is_ok(),
                "query fetches a component type outside its include set"
            );
        }

        for &arch_id in &self.matches {
            let arch = world.archetype_mut(arch_id);
            let len = arch.len();
            if len == 0 {
                continue;
            }
            let state = Q::state(arch);
            for row in 0..len {
                let entity = arch.entities()[row];
                // Exclusive access to the world is held by this call; the
                // duplicate-fetch check above rules out column aliasing.
                let item = unsafe { Q::fetch(state, row) };
                f(entity, item);
            }
        }
    }
}

// ── Fetch ────────────────────────────────────────────────────────────────

/// Typed per-row access for queries: `&T`, `&mut T`, and tuples of those.
pub trait Fetch {
    /// The item yielded per entity.
    type Item<'w>;

    /// Column base pointer(s) captured once per archetype.
    type State: Copy;

    /// Append the fetched component type ids.
    fn push_type_ids(out: &mut Vec<TypeId>);

    /// Capture column pointers for an archetype known to contain every
    /// fetched type.
    fn state(archetype: &Archetype) -> Self::State;

    /// Produce the item for one row.
    ///
    /// # Safety
    ///
    /// `row` must be within the archetype the state was captured from, the
    /// archetype must not be mutated while items are live, and no other
    /// fetch in the same query may target the same component type.
    unsafe fn fetch<'w>(state: Self::State, row: usize) -> Self::Item<'w>;
}

/// Shared read access to a component.
impl<T: Component> Fetch for &T {
    type Item<'w> = &'w T;
    type State = *const T;

    fn push_type_ids(out: &mut Vec<TypeId>) {
        out.push(TypeId::of::<T>());
    }

    fn state(archetype: &Archetype) -> Self::State {
        archetype
            .column_base(TypeId::of::<T>())
            .unwrap_or_else(|| {
                panic!(
                    "matched archetype is missing column `{}`",
                    std::any::type_name::<T>()
                )
            }) as *const T
    }

    unsafe fn fetch<'w>(state: Self::State, row: usize) -> Self::Item<'w> {
        unsafe { &*state.add(row) }
    }
}

/// Exclusive write access to a component.
impl<T: Component> Fetch for &mut T {
    type Item<'w> = &'w mut T;
    type State = *mut T;

    fn push_type_ids(out: &mut Vec<TypeId>) {
        out.push(TypeId::of::<T>());
    }

    fn state(archetype: &Archetype) -> Self::State {
        archetype
            .column_base(TypeId::of::<T>())
            .unwrap_or_else(|| {
                panic!(
                    "matched archetype is missing column `{}`",
                    std::any::type_name::<T>()
                )
            }) as *mut T
    }

    unsafe fn fetch<'w>(state: Self::State, row: usize) -> Self::Item<'w> {
        unsafe { &mut *state.add(row) }
    }
}

macro_rules! impl_fetch_tuple {
    ($($P:ident),+) => {
        impl<$($P: Fetch),+> Fetch for ($($P,)+) {
            type Item<'w> = ($($P::Item<'w>,)+);
            type State = ($($P::State,)+);

            fn push_type_ids(out: &mut Vec<TypeId>) {
                $($P::push_type_ids(out);)+
            }

            fn state(archetype: &Archetype) -> Self::State {
                ($($P::state(archetype),)+)
            }

            #[allow(non_snake_case)]
            unsafe fn fetch<'w>(state: Self::State, row: usize) -> Self::Item<'w> {
                let ($($P,)+) = state;
                ($(unsafe { $P::fetch($P, row) },)+)
            }
        }
    };
}

impl_fetch_tuple!(A);
impl_fetch_tuple!(A, B);
impl_fetch_tuple!(A, B, C);
impl_fetch_tuple!(A, B, C, D);
impl_fetch_tuple!(A, B, C, D, E);
impl_fetch_tuple!(A, B, C, D, E, F);
impl_fetch_tuple!(A, B, C, D, E, F, G);
impl_fetch_tuple!(A, B, C, D, E, F, G, H);

// ── World conveniences ───────────────────────────────────────────────────

impl World {
    /// Run a one-off query over every entity that has all of `Q`'s component
    /// types.
    ///
    /// ```ignore
    /// world.query::<(&mut Position, &Velocity)>(|entity, (pos, vel)| {
    ///     pos.x += vel.dx;
    /// });
    /// ```
    pub fn query<Q: Fetch>(&mut self, f: impl FnMut(Entity, Q::Item<'_>)) {
        let mut ids = Vec::new();
        Q::push_type_ids(&mut ids);
        let mut query = ids
            .into_iter()
            .fold(QueryBuilder::new(), QueryBuilder::include_type_id)
            .build();
        query.for_each::<Q>(self, f);
    }

    /// Like [`query`](Self::query), with an extra presence filter: only
    /// entities that also carry the marker component `F`. The marker itself
    /// is not yielded.
    pub fn query_filtered<Q: Fetch, F: Component>(
        &mut self,
        f: impl FnMut(Entity, Q::Item<'_>),
    ) {
        let mut ids = Vec::new();
        Q::push_type_ids(&mut ids);
        let mut query = ids
            .into_iter()
            .fold(QueryBuilder::new(), QueryBuilder::include_type_id)
            .include::<F>()
            .build();
        query.for_each::<Q>(self, f);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Position {
        x: f32,
        y: f32,
    }

    #[derive(Debug, PartialEq)]
    struct Velocity {
        dx: f32,
        dy: f32,
    }

    struct Frozen;
    struct Marker;

    #[test]
    fn include_matches_across_archetypes() {
        let mut world = World::new();
        world.spawn_bundle((Position { x: 1.0, y: 0.0 }, Velocity { dx: 1.0, dy: 0.0 }));
        world.spawn_bundle((
            Position { x: 2.0, y: 0.0 },
            Velocity { dx: 2.0, dy: 0.0 },
            Marker,
        ));
        world.spawn_one(Position { x: 3.0, y: 0.0 }); // no velocity

        let mut seen = Vec::new();
        world.query::<(&Position, &Velocity)>(|_, (pos, vel)| {
            seen.push((pos.x, vel.dx));
        });
        seen.sort_by(|a, b| a.0.total_cmp(&b.0));
        assert_eq!(seen, vec![(1.0, 1.0), (2.0, 2.0)]);
    }

    #[test]
    fn exclude_filters_out_archetypes() {
        let mut world = World::new();
        let moving = world.spawn_bundle((Position { x: 0.0, y: 0.0 }, Velocity { dx: 1.0, dy: 0.0 }));
        let frozen = world.spawn_bundle((
            Position { x: 0.0, y: 0.0 },
            Velocity { dx: 1.0, dy: 0.0 },
            Frozen,
        ));

        let mut query = Query::builder()
            .include::<Position>()
            .include::<Velocity>()
            .exclude::<Frozen>()
            .build();

        let entities = query.entities(&world);
        assert_eq!(entities, vec![moving]);
        assert!(!entities.contains(&frozen));
    }

    #[test]
    fn cache_refreshes_when_archetypes_change() {
        let mut world = World::new();
        world.spawn_one(Position { x: 0.0, y: 0.0 });

        let mut query = Query::builder().include::<Position>().build();
        query.update_matches(&world);
        assert_eq!(query.matches().len(), 1);
        assert!(!query.is_stale(&world));

        // A new archetype containing Position appears.
        world.spawn_bundle((Position { x: 1.0, y: 1.0 }, Marker));
        assert!(query.is_stale(&world));
        assert_eq!(query.entities(&world).len(), 2);
        assert_eq!(query.matches().len(), 2);
    }

    #[test]
    fn spawning_into_known_archetype_keeps_cache() {
        let mut world = World::new();
        world.spawn_one(Position { x: 0.0, y: 0.0 });

        let mut query = Query::builder().include::<Position>().build();
        query.update_matches(&world);

        world.spawn_one(Position { x: 1.0, y: 1.0 });
        assert!(!query.is_stale(&world));
        // The cached archetype list still covers the new entity.
        assert_eq!(query.entities(&world).len(), 2);
    }

    #[test]
    fn for_each_mutates_through_mut_fetch() {
        let mut world = World::new();
        world.spawn_bundle((Position { x: 0.0, y: 0.0 }, Velocity { dx: 1.0, dy: 2.0 }));

        let mut query = Query::builder()
            .include::<Position>()
            .include::<Velocity>()
            .build();
        query.for_each::<(&mut Position, &Velocity)>(&mut world, |_, (pos, vel)| {
            pos.x += vel.dx;
            pos.y += vel.dy;
        });

        let mut seen = Vec::new();
        world.query::<(&Position,)>(|_, (pos,)| seen.push((pos.x, pos.y)));
        assert_eq!(seen, vec![(1.0, 2.0)]);
    }

    #[test]
    fn empty_include_matches_all_componentful_entities() {
        let mut world = World::new();
        world.spawn_one(Position { x: 0.0, y: 0.0 });
        world.spawn_one(Marker);
        world.spawn(); // empty entity, member of no archetype

        let mut query = Query::builder().build();
        assert_eq!(query.entities(&world).len(), 2);
    }

    #[test]
    fn exclude_only_query() {
        let mut world = World::new();
        let plain = world.spawn_one(Position { x: 0.0, y: 0.0 });
        let _frozen = world.spawn_bundle((Position { x: 1.0, y: 1.0 }, Frozen));

        let mut query = Query::builder().exclude::<Frozen>().build();
        assert_eq!(query.entities(&world), vec![plain]);
    }

    #[test]
    fn query_filtered_by_marker() {
        let mut world = World::new();
        let marked = world.spawn_bundle((Position { x: 5.0, y: 0.0 }, Marker));
        world.spawn_one(Position { x: 7.0, y: 0.0 });

        let mut seen = Vec::new();
        world.query_filtered::<(&Position,), Marker>(|entity, (pos,)| {
            seen.push((entity, pos.x));
        });
        assert_eq!(seen, vec![(marked, 5.0)]);
    }

    #[test]
    fn zst_markers_fetch_fine() {
        let mut world = World::new();
        world.spawn_bundle((Marker, Position { x: 1.0, y: 0.0 }));
        world.spawn_one(Marker);

        let mut count = 0;
        world.query::<(&Marker,)>(|_, _| count += 1);
        assert_eq!(count, 2);
    }

    #[test]
    fn entities_reflect_despawn() {
        let mut world = World::new();
        let e0 = world.spawn_one(Position { x: 0.0, y: 0.0 });
        let e1 = world.spawn_one(Position { x: 1.0, y: 0.0 });
        world.despawn(e0);

        let mut query = Query::builder().include::<Position>().build();
        assert_eq!(query.entities(&world), vec![e1]);
    }

    #[test]
    #[should_panic(expected = "outside its include set")]
    fn fetch_outside_include_panics() {
        let mut world = World::new();
        world.spawn_bundle((Position { x: 0.0, y: 0.0 }, Velocity { dx: 0.0, dy: 0.0 }));

        let mut query = Query::builder().include::<Position>().build();
        query.for_each::<(&Position, &Velocity)>(&mut world, |_, _| {});
    }

    #[test]
    #[should_panic(expected = "same component type twice")]
    fn duplicate_fetch_panics() {
        let mut world = World::new();
        world.spawn_one(Position { x: 0.0, y: 0.0 });

        let mut query = Query::builder().include::<Position>().build();
        query.for_each::<(&Position, &mut Position)>(&mut world, |_, _| {});
    }

    #[test]
    fn include_and_exclude_same_type_matches_nothing() {
        let mut world = World::new();
        world.spawn_one(Frozen);

        let mut query = Query::builder().include::<Frozen>().exclude::<Frozen>().build();
        assert!(query.entities(&world).is_empty());
    }
}
