//! # Ormr — Archetype-Based Entity Component System
//!
//! A small ECS built around archetype tables: entities sharing the same
//! component set live together in columnar storage, queries iterate matching
//! archetypes linearly, and component add/remove migrates entities between
//! archetypes.
//!
//! ```ignore
//! use ormr::prelude::*;
//!
//! let mut world = World::new();
//! world.spawn_bundle((Position { x: 0.0, y: 0.0 }, Velocity { dx: 1.0, dy: 0.0 }));
//!
//! world.query::<(&mut Position, &Velocity)>(|_, (pos, vel)| {
//!     pos.x += vel.dx;
//! });
//! ```
//!
//! ## Module Overview
//!
//! - [`entity`] — generational entity handles
//! - [`component`] — type descriptors and the name/serde registry
//! - [`archetype`] — raw columnar storage per component set
//! - [`world`] — entity↔archetype mapping, migration, resources
//! - [`query`] — include/exclude matching with cached archetype lists
//! - [`schedule`] — ordered system execution
//! - [`hierarchy`] — parent/child links and transform propagation
//! - [`scene`] — JSON save/load/switch
//! - [`diag`] — state snapshots (feature `diagnostics`, on by default)

pub mod archetype;
pub mod component;
pub mod entity;
pub mod hierarchy;
pub mod math;
pub mod prelude;
pub mod query;
pub mod scene;
pub mod schedule;
pub mod world;

#[cfg(feature = "diagnostics")]
pub mod diag;

pub use archetype::ArchetypeId;
pub use component::{Component, ComponentInfo, ComponentRegistry};
pub use entity::Entity;
pub use hierarchy::{Children, GlobalTransform, Parent};
pub use query::{Fetch, Query, QueryBuilder};
pub use schedule::{Schedule, System};
pub use world::{Bundle, EcsError, World};
