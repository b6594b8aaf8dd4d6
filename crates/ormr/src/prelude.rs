//! Convenience re-exports — `use ormr::prelude::*` for the common items.

pub use crate::component::{Component, ComponentRegistry};
pub use crate::entity::Entity;
pub use crate::hierarchy::{Children, GlobalTransform, Parent, propagate_transforms};
pub use crate::math::Transform;
pub use crate::query::{Query, QueryBuilder};
pub use crate::scene::{
    SceneData, SceneError, SceneMarker, load_scene, load_scene_from_file, save_scene,
    save_scene_to_file, switch_scene, unload_scene,
};
pub use crate::schedule::{Schedule, System};
pub use crate::world::{EcsError, World};

pub use glam::{Mat4, Quat, Vec2, Vec3, Vec4};
