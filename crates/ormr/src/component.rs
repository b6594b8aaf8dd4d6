//! # Component — Type Descriptors and the Registry
//!
//! Components are plain Rust data: a `Position`, a `Health`, a zero-sized
//! marker. Archetype storage is assembled at runtime from component sets it
//! has never seen at compile time, so each type is described by a
//! [`ComponentInfo`] — type id, name, size, alignment, and a type-erased drop
//! function. Columns operate purely on descriptors; the concrete type only
//! reappears at the typed access points.
//!
//! The [`ComponentRegistry`] is a separate, optional layer: scene save/load
//! and diagnostics need to map component *names* to types and convert values
//! to and from JSON, and the registry holds the monomorphized function
//! pointers for that. Core world operations never require registration.

use std::any::TypeId;
use std::collections::HashMap;
use std::ptr;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::entity::Entity;
use crate::world::World;

/// Marker trait for component types. Blanket-implemented; any
/// `Send + Sync + 'static` type is a component.
pub trait Component: Send + Sync + 'static {}

impl<T: Send + Sync + 'static> Component for T {}

/// Runtime descriptor for one component type: everything a column needs to
/// store, move, and drop values without knowing the type.
#[derive(Clone)]
pub struct ComponentInfo {
    pub(crate) type_id: TypeId,
    /// Fully qualified type name. Stable within a build; feeds the layout hash.
    pub(crate) type_name: &'static str,
    pub(crate) size: usize,
    pub(crate) align: usize,
    /// Drop a single value in place. `None` when the type has no drop glue.
    pub(crate) drop_fn: Option<unsafe fn(*mut u8)>,
}

impl ComponentInfo {
    /// Build the descriptor for a concrete component type.
    pub fn of<T: Component>() -> Self {
        unsafe fn drop_in_place_erased<T>(ptr: *mut u8) {
            unsafe { ptr::drop_in_place(ptr as *mut T) }
        }

        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            size: size_of::<T>(),
            align: align_of::<T>(),
            drop_fn: if std::mem::needs_drop::<T>() {
                Some(drop_in_place_erased::<T>)
            } else {
                None
            },
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl std::fmt::Debug for ComponentInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentInfo")
            .field("type_name", &self.type_name)
            .field("size", &self.size)
            .field("align", &self.align)
            .finish()
    }
}

/// Strip the module path from a fully qualified type name
/// (`ormr::math::Transform` → `Transform`).
pub(crate) fn short_type_name(full: &str) -> &str {
    full.rsplit("::").next().unwrap_or(full)
}

// ── ComponentRegistry ────────────────────────────────────────────────────

/// Read one value out of a column slot and render it as JSON.
type SerializeFn = unsafe fn(*const u8) -> Option<serde_json::Value>;

/// Deserialize a JSON value and insert it on an entity through the typed
/// `World::insert` path (which handles archetype migration).
type InsertFn = fn(&mut World, Entity, serde_json::Value) -> Result<(), String>;

struct RegisteredComponent {
    serialize: SerializeFn,
    insert: InsertFn,
    short_name: String,
}

/// Maps component names to types and holds the type-erased JSON conversion
/// functions for each registered component.
///
/// Register every component type that should survive a scene round trip:
///
/// ```ignore
/// let mut registry = ComponentRegistry::new();
/// registry.register::<Transform>();
/// registry.register::<Health>();
/// ```
pub struct ComponentRegistry {
    by_type_id: HashMap<TypeId, RegisteredComponent>,
    by_name: HashMap<String, TypeId>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self {
            by_type_id: HashMap::new(),
            by_name: HashMap::new(),
        }
    }

    /// Register a component type under its short type name.
    pub fn register<T>(&mut self)
    where
        T: Component + Serialize + DeserializeOwned,
    {
        unsafe fn serialize_slot<T: Serialize>(ptr: *const u8) -> Option<serde_json::Value> {
            let value = unsafe { &*(ptr as *const T) };
            serde_json::to_value(value).ok()
        }

        fn insert_json<T: Component + DeserializeOwned>(
            world: &mut World,
            entity: Entity,
            value: serde_json::Value,
        ) -> Result<(), String> {
            let typed: T = serde_json::from_value(value).map_err(|e| e.to_string())?;
            world.insert(entity, typed).map_err(|e| e.to_string())
        }

        let info = ComponentInfo::of::<T>();
        let short = short_type_name(info.type_name).to_string();
        self.by_name.insert(short.clone(), info.type_id);
        self.by_type_id.insert(
            info.type_id,
            RegisteredComponent {
                serialize: serialize_slot::<T>,
                insert: insert_json::<T>,
                short_name: short,
            },
        );
    }

    /// Names of all registered components.
    pub fn component_names(&self) -> Vec<&str> {
        self.by_name.keys().map(|s| s.as_str()).collect()
    }

    /// Whether a type id has been registered.
    pub fn contains(&self, type_id: TypeId) -> bool {
        self.by_type_id.contains_key(&type_id)
    }

    /// Look up a registered type id by short name.
    pub(crate) fn type_id_by_name(&self, name: &str) -> Option<TypeId> {
        self.by_name.get(name).copied()
    }

    /// The registered short name for a type id.
    pub(crate) fn short_name(&self, type_id: TypeId) -> Option<&str> {
        self.by_type_id
            .get(&type_id)
            .map(|r| r.short_name.as_str())
    }

    /// Render the value in a column slot as JSON.
    ///
    /// # Safety
    ///
    /// `ptr` must point at a live value of the registered type for `type_id`.
    pub(crate) unsafe fn serialize_slot(
        &self,
        type_id: TypeId,
        ptr: *const u8,
    ) -> Option<serde_json::Value> {
        let reg = self.by_type_id.get(&type_id)?;
        unsafe { (reg.serialize)(ptr) }
    }

    /// Deserialize `value` and insert it on `entity` by registered name.
    pub(crate) fn insert_by_name(
        &self,
        world: &mut World,
        entity: Entity,
        name: &str,
        value: serde_json::Value,
    ) -> Result<(), String> {
        let type_id = self
            .by_name
            .get(name)
            .ok_or_else(|| format!("component '{name}' is not registered"))?;
        let reg = &self.by_type_id[type_id];
        (reg.insert)(world, entity, value)
    }
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(serde::Serialize, serde::Deserialize)]
    struct Health(u32);

    struct NeedsDrop(#[allow(dead_code)] String);

    #[test]
    fn info_captures_layout() {
        let info = ComponentInfo::of::<u64>();
        assert_eq!(info.size, 8);
        assert_eq!(info.align, 8);
        assert!(info.drop_fn.is_none());

        let info = ComponentInfo::of::<NeedsDrop>();
        assert!(info.drop_fn.is_some());
    }

    #[test]
    fn zst_info() {
        struct Marker;
        let info = ComponentInfo::of::<Marker>();
        assert_eq!(info.size, 0);
        assert!(info.drop_fn.is_none());
    }

    #[test]
    fn short_names() {
        assert_eq!(short_type_name("ormr::math::Transform"), "Transform");
        assert_eq!(short_type_name("Health"), "Health");
    }

    #[test]
    fn registry_maps_names() {
        let mut registry = ComponentRegistry::new();
        registry.register::<Health>();

        assert!(registry.contains(TypeId::of::<Health>()));
        assert_eq!(
            registry.type_id_by_name("Health"),
            Some(TypeId::of::<Health>())
        );
        assert_eq!(
            registry.short_name(TypeId::of::<Health>()),
            Some("Health")
        );
        assert!(registry.type_id_by_name("Mana").is_none());
    }

    #[test]
    fn registry_serializes_slot() {
        let mut registry = ComponentRegistry::new();
        registry.register::<Health>();

        let value = Health(17);
        let json = unsafe {
            registry.serialize_slot(
                TypeId::of::<Health>(),
                &value as *const Health as *const u8,
            )
        };
        assert_eq!(json, Some(serde_json::json!(17)));
    }
}
