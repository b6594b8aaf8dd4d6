//! # Hierarchy — Parent/Child Links and Transform Propagation
//!
//! [`Parent`] and [`Children`] are ordinary components that the world's
//! [`spawn_child`](crate::world::World::spawn_child) and
//! [`despawn_recursive`](crate::world::World::despawn_recursive) keep in
//! sync. [`propagate_transforms`] walks the hierarchy breadth-first so a
//! parent's world-space matrix is always computed before its children's.

use std::collections::VecDeque;

use glam::Mat4;

use crate::entity::Entity;
use crate::math::Transform;
use crate::world::World;

/// Marks an entity as the child of another entity.
#[derive(Debug, Clone, Copy)]
pub struct Parent(pub Entity);

/// The child entities of a parent, in spawn order.
#[derive(Debug, Clone)]
pub struct Children(pub Vec<Entity>);

/// World-space transform computed by [`propagate_transforms`].
///
/// Roots (no [`Parent`]) get their local matrix; children get
/// `parent_global * child_local`.
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobalTransform {
    pub matrix: Mat4,
}

/// Recompute [`GlobalTransform`] for every entity with a [`Transform`].
///
/// Entities whose parent has no transform inherit from the nearest
/// transformed ancestor, because propagation passes the accumulated matrix
/// down the BFS queue.
pub fn propagate_transforms(world: &mut World) {
    // Collect local matrices first; the closure cannot reach back into the
    // world while the query holds it.
    let mut transformed = Vec::new();
    world.query::<(&Transform,)>(|entity, (transform,)| {
        transformed.push((entity, transform.matrix()));
    });

    let mut queue: VecDeque<(Entity, Mat4)> = VecDeque::new();
    for (entity, matrix) in transformed {
        if world.get::<Parent>(entity).is_some() {
            continue; // reached through its root instead
        }
        let _ = world.insert(entity, GlobalTransform { matrix });
        if let Some(children) = world.get::<Children>(entity) {
            for &child in &children.0 {
                queue.push_back((child, matrix));
            }
        }
    }

    while let Some((entity, parent_matrix)) = queue.pop_front() {
        let local = world
            .get::<Transform>(entity)
            .map(|t| t.matrix())
            .unwrap_or(Mat4::IDENTITY);
        let global = parent_matrix * local;
        let _ = world.insert(entity, GlobalTransform { matrix: global });

        if let Some(children) = world.get::<Children>(entity) {
            for &child in &children.0 {
                queue.push_back((child, global));
            }
        }
    }
}
